//! services/tracker/src/error.rs
//!
//! Defines the primary error type for the tracker service.

use crate::config::ConfigError;
use employee_tracker_core::ports::PortError;

/// The primary error type for the `tracker` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the local cache's database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_failures_convert_with_their_context() {
        let port: ApiError = PortError::Storage("disk full".into()).into();
        assert!(matches!(port, ApiError::Port(_)));
        assert!(port.to_string().starts_with("Service Port Error:"));

        let io: ApiError = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken").into();
        assert_eq!(io.to_string(), "IO error: taken");
    }
}
