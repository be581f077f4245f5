// Standard error handling for the workspace.
// All fallible pgbridge APIs return this module's Result type.

pub use anyhow::{anyhow, bail, ensure, Context, Error, Result};
