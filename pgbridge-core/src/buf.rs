//! Append-only SQL text buffer used by the deparser and statement builders.
//!
//! Identifier quoting and string-literal escaping follow the host dialect's
//! rules so the emitted text parses identically on the remote session
//! (which is assumed to run with `search_path = pg_catalog`).

use std::fmt::Display;

/// Fully reserved words of the dialect; quoting one of these is mandatory
/// even when it is otherwise a plain lowercase identifier.
const RESERVED_KEYWORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both", "case",
    "cast", "check", "collate", "column", "constraint", "create", "current_catalog",
    "current_date", "current_role", "current_time", "current_timestamp", "current_user",
    "default", "deferrable", "desc", "distinct", "do", "else", "end", "except", "false", "fetch",
    "for", "foreign", "from", "grant", "group", "having", "in", "initially", "intersect", "into",
    "lateral", "leading", "limit", "localtime", "localtimestamp", "not", "null", "offset", "on",
    "only", "or", "order", "placing", "primary", "references", "returning", "select",
    "session_user", "some", "symmetric", "table", "then", "to", "trailing", "true", "union",
    "unique", "user", "using", "variadic", "when", "where", "window", "with",
];

/// Quote an identifier if required by the dialect's rules: identifiers that
/// are not all-lowercase `[a-z_][a-z0-9_$]*`, or that collide with a
/// reserved keyword, are wrapped in double quotes with embedded quotes
/// doubled.
pub fn quote_identifier(ident: &str) -> String {
    let safe = !ident.is_empty()
        && ident
            .chars()
            .next()
            .map(|c| c.is_ascii_lowercase() || c == '_')
            .unwrap_or(false)
        && ident
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$')
        && !RESERVED_KEYWORDS.contains(&ident);

    if safe {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

/// An appendable UTF-8 SQL text buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlBuffer {
    data: String,
}

impl SqlBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_str(&mut self, s: &str) {
        self.data.push_str(s);
    }

    pub fn push_char(&mut self, c: char) {
        self.data.push(c);
    }

    pub fn push_display(&mut self, val: impl Display) {
        self.data.push_str(&val.to_string());
    }

    /// Append an identifier, quoting it when the dialect requires.
    pub fn push_identifier(&mut self, ident: &str) {
        self.data.push_str(&quote_identifier(ident));
    }

    /// Append a SQL string literal representing `val`.
    ///
    /// Rather than making assumptions about the remote server's
    /// `standard_conforming_strings` setting, any value containing a
    /// backslash is emitted in `E'...'` form; embedded single quotes are
    /// always doubled, and backslashes are doubled in escape form.
    pub fn push_string_literal(&mut self, val: &str) {
        if val.contains('\\') {
            self.data.push('E');
        }
        self.data.push('\'');
        for ch in val.chars() {
            if ch == '\'' || ch == '\\' {
                self.data.push(ch);
            }
            self.data.push(ch);
        }
        self.data.push('\'');
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn as_str(&self) -> &str {
        &self.data
    }

    pub fn into_string(self) -> String {
        self.data
    }
}

impl Display for SqlBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buf_quote_identifier_plain() {
        assert_eq!(quote_identifier("c2"), "c2");
        assert_eq!(quote_identifier("_tab$1"), "_tab$1");
    }

    #[test]
    fn test_buf_quote_identifier_mixed_case_and_spaces() {
        assert_eq!(quote_identifier("C 1"), "\"C 1\"");
        assert_eq!(quote_identifier("Tab"), "\"Tab\"");
        assert_eq!(quote_identifier(""), "\"\"");
    }

    #[test]
    fn test_buf_quote_identifier_keyword() {
        assert_eq!(quote_identifier("select"), "\"select\"");
        assert_eq!(quote_identifier("user"), "\"user\"");
    }

    #[test]
    fn test_buf_quote_identifier_embedded_quote() {
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_buf_string_literal_plain() {
        let mut buf = SqlBuffer::new();
        buf.push_string_literal("foo");
        assert_eq!(buf.as_str(), "'foo'");
    }

    #[test]
    fn test_buf_string_literal_quotes_doubled() {
        let mut buf = SqlBuffer::new();
        buf.push_string_literal("it's");
        assert_eq!(buf.as_str(), "'it''s'");
    }

    #[test]
    fn test_buf_string_literal_backslash_escape_form() {
        let mut buf = SqlBuffer::new();
        buf.push_string_literal("foo's\\bar");
        assert_eq!(buf.as_str(), "E'foo''s\\\\bar'");
    }

    #[test]
    fn test_buf_append_ops() {
        let mut buf = SqlBuffer::new();
        buf.push_str("SELECT ");
        buf.push_identifier("C 1");
        buf.push_str(" + ");
        buf.push_display(42);
        buf.push_char(';');
        assert_eq!(buf.as_str(), "SELECT \"C 1\" + 42;");
    }
}
