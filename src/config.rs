//! Bridge options and connection-string parsing.

use tracing::{trace, Level};

use crate::error::{Error, Result};

/// Options applied to every command run through a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Read-only flag passed to non-query execution.
    pub read_only: bool,
    /// Maximum rows processed by non-query execution (0 = all).
    pub count_limit: i64,
    /// Level of per-statement log events, or `None` to disable them.
    pub log_statements: Option<Level>,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            count_limit: 0,
            log_statements: Some(Level::DEBUG),
        }
    }
}

impl BridgeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the read-only flag.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Set the row-count limit for non-query execution.
    pub fn with_count_limit(mut self, count_limit: i64) -> Self {
        self.count_limit = count_limit;
        self
    }

    /// Set the statement log level. `None` turns statement logging off.
    pub fn with_log_statements(mut self, level: Option<Level>) -> Self {
        self.log_statements = level;
        self
    }

    /// Parse a `Key=Value;Key=Value` connection string.
    ///
    /// Keys are matched case-insensitively with spaces ignored. `Read Only`
    /// and `Command Count` are recognised; everything else (host, user and
    /// so on) has no meaning in-process and is skipped.
    pub fn parse(conn_str: &str) -> Result<Self> {
        let mut options = Self::default();

        for pair in conn_str.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| Error::InvalidConnectionString {
                message: format!("Expected Key=Value, got '{}'", pair),
            })?;
            let key: String = key
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "readonly" => options.read_only = parse_bool(value)?,
                "commandcount" => {
                    options.count_limit = value
                        .parse::<i64>()
                        .ok()
                        .filter(|n| *n >= 0)
                        .ok_or_else(|| Error::InvalidConnectionString {
                            message: format!("Invalid Command Count: {}", value),
                        })?;
                }
                _ => trace!(key = %key, "ignoring connection string key"),
            }
        }

        Ok(options)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(Error::InvalidConnectionString {
            message: format!("Invalid boolean: {}", value),
        }),
    }
}

// `tracing` has no dynamic-level event macro.
macro_rules! dynamic_event {
    ($level:expr, $($args:tt)*) => {{
        use ::tracing::Level;

        match $level {
            Level::ERROR => ::tracing::event!(Level::ERROR, $($args)*),
            Level::WARN => ::tracing::event!(Level::WARN, $($args)*),
            Level::INFO => ::tracing::event!(Level::INFO, $($args)*),
            Level::DEBUG => ::tracing::event!(Level::DEBUG, $($args)*),
            Level::TRACE => ::tracing::event!(Level::TRACE, $($args)*),
        }
    }};
}

/// Emit a statement event at the configured level.
pub(crate) fn log_statement(options: &BridgeOptions, sql: &str, summary: &str, rows: Option<u64>) {
    if let Some(level) = options.log_statements {
        match rows {
            Some(rows) => dynamic_event!(level, sql, rows, "{}", summary),
            None => dynamic_event!(level, sql, "{}", summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BridgeOptions::new();
        assert!(!options.read_only);
        assert_eq!(options.count_limit, 0);
        assert_eq!(options.log_statements, Some(Level::DEBUG));
    }

    #[test]
    fn test_builder() {
        let options = BridgeOptions::new()
            .with_read_only(true)
            .with_count_limit(10)
            .with_log_statements(None);
        assert!(options.read_only);
        assert_eq!(options.count_limit, 10);
        assert_eq!(options.log_statements, None);
    }

    #[test]
    fn test_parse_recognised_keys() {
        let options =
            BridgeOptions::parse("Host=localhost; Read Only=true; command count = 5;").unwrap();
        assert!(options.read_only);
        assert_eq!(options.count_limit, 5);

        let options = BridgeOptions::parse("").unwrap();
        assert_eq!(options, BridgeOptions::default());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            BridgeOptions::parse("Read Only"),
            Err(Error::InvalidConnectionString { .. })
        ));
        assert!(matches!(
            BridgeOptions::parse("Read Only=maybe"),
            Err(Error::InvalidConnectionString { .. })
        ));
        assert!(matches!(
            BridgeOptions::parse("Command Count=-1"),
            Err(Error::InvalidConnectionString { .. })
        ));
    }
}
