//! CLI error types.

use std::fmt;

use skyresample::config::ConfigError;
use skyresample::logging::LoggingError;
use skyresample::{ErrorKind, ReprojectError};

/// Exit status after an interrupted run (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid or missing setting.
    Config(String),

    /// The configuration file could not be read or written.
    ConfigFile(ConfigError),

    /// Logging could not be initialized.
    Logging(LoggingError),

    /// An image could not be read, converted or written.
    Image(String),

    /// The reprojection failed.
    Reproject(ReprojectError),

    /// The interrupt handler could not be installed.
    Signal(String),
}

impl CliError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Reproject(e) if e.kind() == ErrorKind::Cancelled => EXIT_INTERRUPTED,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Image(msg) => write!(f, "Image error: {}", msg),
            CliError::Reproject(e) => write!(f, "Reprojection failed: {}", e),
            CliError::Signal(msg) => write!(f, "Failed to set signal handler: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Reproject(e) => Some(e),
            CliError::Config(_) | CliError::Image(_) | CliError::Signal(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<ReprojectError> for CliError {
    fn from(e: ReprojectError) -> Self {
        CliError::Reproject(e)
    }
}

impl From<image::ImageError> for CliError {
    fn from(e: image::ImageError) -> Self {
        CliError::Image(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = CliError::Config("output.naxis1 is not set".to_string());
        assert_eq!(err.to_string(), "Configuration error: output.naxis1 is not set");
    }

    #[test]
    fn test_cancelled_exit_code() {
        let err: CliError = ReprojectError::Cancelled.into();
        assert_eq!(err.exit_code(), EXIT_INTERRUPTED);
        assert_eq!(CliError::Image("bad".into()).exit_code(), 1);
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;
        let err: CliError = ReprojectError::InvalidWorkerCount(0).into();
        assert!(err.source().is_some());
        assert!(CliError::Signal("x".into()).source().is_none());
    }
}
