/// Result alias that carries the custom [`MoodSyncError`] type.
pub type Result<T> = std::result::Result<T, MoodSyncError>;

/// Common error type for the core crate.
///
/// Degenerate audio input never produces one of these: empty frames and
/// silent histories are skipped by the analyzer. Errors only come from the
/// boundary (configuration, lock poisoning, the command line).
#[derive(Debug, thiserror::Error)]
pub enum MoodSyncError {
    /// Free-form message surfaced to the application.
    #[error("{0}")]
    Message(String),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A shared lock was poisoned by a panicking producer.
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration could not be parsed or serialised.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl MoodSyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_poisoned_lock() {
        let err = MoodSyncError::Poisoned("sync state");
        assert_eq!(err.to_string(), "sync state has been poisoned");
    }

    #[test]
    fn converts_json_errors() {
        let parse = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: MoodSyncError = parse.into();
        assert!(matches!(err, MoodSyncError::Json(_)));
    }
}
