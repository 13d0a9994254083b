//! Structured logger for aeroschema
//!
//! - One log line = one event
//! - Deterministic key ordering
//! - Explicit severity levels
//!
//! Lines are emitted through `tracing`; the binary decides where they go.

use std::collections::BTreeMap;
use std::fmt;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug-level detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured logger with a fixed event/fields shape
pub struct Logger;

impl Logger {
    /// Log an event with the given severity and fields
    ///
    /// Fields are rendered in deterministic order (alphabetical by key)
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        let rendered = render_fields(fields);
        match severity {
            Severity::Trace => tracing::trace!(event = event, fields = %rendered),
            Severity::Info => tracing::info!(event = event, fields = %rendered),
            Severity::Warn => tracing::warn!(event = event, fields = %rendered),
            Severity::Error => tracing::error!(event = event, fields = %rendered),
        }
    }

    /// Log at TRACE level
    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    /// Log at INFO level
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    /// Log at WARN level
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Log at ERROR level
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }
}

/// Renders fields as a key-sorted JSON object.
///
/// Later duplicates of a key replace earlier ones.
pub fn render_fields(fields: &[(&str, &str)]) -> String {
    let sorted: BTreeMap<&str, &str> = fields.iter().copied().collect();
    serde_json::to_string(&sorted).unwrap_or_else(|_| String::from("{}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
    }

    #[test]
    fn test_render_fields_sorted() {
        let rendered = render_fields(&[("zebra", "z"), ("apple", "a"), ("mango", "m")]);
        assert_eq!(rendered, r#"{"apple":"a","mango":"m","zebra":"z"}"#);
    }

    #[test]
    fn test_render_fields_escapes() {
        let rendered = render_fields(&[("path", "a\"b\nc")]);
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["path"], "a\"b\nc");
    }

    #[test]
    fn test_logging_without_subscriber_is_silent() {
        Logger::info("TEST_EVENT", &[("k", "v")]);
        Logger::error("TEST_EVENT", &[]);
    }
}
