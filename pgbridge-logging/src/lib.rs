use std::sync::atomic::{AtomicBool, Ordering};

pub use env_logger::{init, init_from_env};
pub use log::*;

static TEST_MODE: AtomicBool = AtomicBool::new(false);

/// Configures the logger from the standard env vars, defaulting to `info`.
pub fn init_logging() {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
}

/// Logging init function for tests
pub fn init_for_tests() {
    TEST_MODE.store(true, Ordering::Relaxed);

    let res = env_logger::builder()
        .filter_module("pgbridge", LevelFilter::Trace)
        .is_test(true)
        .try_init();
    if let Err(err) = res {
        eprintln!("Failed to init logging: {:?}", err);
    }
}

pub fn test_mode() -> bool {
    TEST_MODE.load(Ordering::Relaxed)
}
