//! Error types for the portreaper-core library.

use thiserror::Error;

/// Result type alias for portreaper operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving and releasing ports.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to spawn or drive a system command.
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// A system command did not exit within its budget and was reclaimed.
    #[error("Command timeout after {timeout_ms}ms: {command}")]
    Timeout { command: String, timeout_ms: u64 },

    /// The process still holds the port after the whole retry budget.
    #[error("Kill failed: pid {pid} still holds port {port} after {attempts} attempts")]
    KillFailed { pid: u32, port: u16, attempts: u32 },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error is a command timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::KillFailed {
            pid: 1234,
            port: 8080,
            attempts: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("1234"));
        assert!(msg.contains("8080"));

        let err = Error::Timeout {
            command: "taskkill.exe /PID 1".to_string(),
            timeout_ms: 45000,
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("45000ms"));
    }
}
