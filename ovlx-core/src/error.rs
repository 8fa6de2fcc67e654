//! Error handling for the OVLX engine

use thiserror::Error;

/// Errors that can abort graph construction or layout.
///
/// Inconsistent data found during discovery or pruning (stale vertices,
/// relationships naming unknown sequences) is never reported through this
/// type: it is skipped and logged.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Resource error: {message}")]
    Resource { message: String },

    #[error("Phase '{phase}' interrupted by a failing worker")]
    Interrupted { phase: String },

    #[error("Task {id} of phase '{phase}' failed: {message}")]
    TaskFailed {
        phase: String,
        id: usize,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl LayoutError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn resource<S: Into<String>>(message: S) -> Self {
        Self::Resource { message: message.into() }
    }

    pub fn interrupted<S: Into<String>>(phase: S) -> Self {
        Self::Interrupted { phase: phase.into() }
    }

    pub fn task_failed<S: Into<String>>(phase: S, id: usize, message: S) -> Self {
        Self::TaskFailed {
            phase: phase.into(),
            id,
            message: message.into(),
        }
    }

    /// Whether the error stopped a concurrent phase midway
    pub fn is_fatal_phase_error(&self) -> bool {
        matches!(self, Self::Interrupted { .. } | Self::TaskFailed { .. })
    }
}

impl From<std::collections::TryReserveError> for LayoutError {
    fn from(err: std::collections::TryReserveError) -> Self {
        Self::resource(format!("allocation failed: {}", err))
    }
}

/// Result type for engine operations
pub type LayoutResult<T> = Result<T, LayoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LayoutError::config("num_threads must be at least 1");
        assert_eq!(err.to_string(), "Configuration error: num_threads must be at least 1");

        let err = LayoutError::task_failed("discovery", 7, "boom");
        assert!(err.to_string().contains("Task 7"));
        assert!(err.is_fatal_phase_error());
        assert!(!LayoutError::resource("oom").is_fatal_phase_error());
    }

    #[test]
    fn test_try_reserve_conversion() {
        let mut v: Vec<u64> = Vec::new();
        let err = v.try_reserve(usize::MAX).unwrap_err();
        let converted: LayoutError = err.into();
        assert!(matches!(converted, LayoutError::Resource { .. }));
    }
}
