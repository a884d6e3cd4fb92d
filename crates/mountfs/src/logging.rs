//! Logging infrastructure for Mountfs
//!
//! Structured logging goes through the `tracing` crate when the `logging`
//! feature is enabled. Without the feature the macros below expand to nothing,
//! so call sites stay free of `cfg` noise.
//!
//! # Log Levels
//!
//! - **DEBUG**: mount/unmount, routing decisions, persistence flushes
//! - **TRACE**: per-operation store activity
//!
//! File contents never reach the log unless [`LogConfig::log_file_contents`]
//! is switched on; by default only a byte count is recorded.

use std::borrow::Cow;

/// Configuration for logging behavior
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether to include file contents in logs (default: false)
    pub log_file_contents: bool,

    /// Maximum length of logged values before truncation (default: 200)
    pub max_value_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_file_contents: false,
            max_value_length: 200,
        }
    }
}

impl LogConfig {
    /// Create a new log configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable logging of file contents
    ///
    /// # Warning
    ///
    /// Files may hold credentials or other sensitive data.
    pub fn unsafe_log_file_contents(mut self) -> Self {
        self.log_file_contents = true;
        self
    }

    /// Set maximum length for logged values
    pub fn max_value_length(mut self, len: usize) -> Self {
        self.max_value_length = len;
        self
    }

    /// Truncate value if it exceeds max length
    ///
    /// Handles UTF-8 char boundaries properly to avoid panics on multi-byte chars.
    pub fn truncate<'a>(&self, value: &'a str) -> Cow<'a, str> {
        if value.len() <= self.max_value_length {
            Cow::Borrowed(value)
        } else {
            let mut end = self.max_value_length;
            while end > 0 && !value.is_char_boundary(end) {
                end -= 1;
            }
            Cow::Owned(format!(
                "{}...[truncated {} bytes]",
                &value[..end],
                value.len() - end
            ))
        }
    }

    /// Render an address for logging: control characters escaped, length capped.
    pub fn format_address(&self, address: &str) -> String {
        let sanitized = sanitize_for_log(address);
        self.truncate(&sanitized).into_owned()
    }
}

/// Escape characters that could be used for log injection.
pub fn sanitize_for_log(input: &str) -> String {
    input
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .chars()
        .filter(|c| !c.is_control() || *c == ' ')
        .collect()
}

/// Format file content for logging with optional preview
pub fn format_content_for_log(content: &[u8], config: &LogConfig) -> String {
    if !config.log_file_contents {
        return format!("[{} bytes]", content.len());
    }

    let preview = String::from_utf8_lossy(content);
    let sanitized = sanitize_for_log(&preview);
    config.truncate(&sanitized).into_owned()
}

macro_rules! fs_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        {
            tracing::debug!($($arg)*);
        }
    };
}

macro_rules! fs_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        {
            tracing::trace!($($arg)*);
        }
    };
}

pub(crate) use fs_debug;
pub(crate) use fs_trace;
