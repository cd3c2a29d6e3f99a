use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the restriction policy core and its collaborators
#[derive(Error, Debug)]
pub enum LimiterError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Failed to persist record '{key}': {message}")]
    Persistence { key: String, message: String },

    #[error("{service} service unavailable: {message}")]
    ServiceUnavailable { service: &'static str, message: String },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout { operation: &'static str, after: Duration },

    #[error("Restriction state has not been loaded yet")]
    NotReady,
}

impl LimiterError {
    pub fn persistence(key: &str, err: impl std::fmt::Display) -> Self {
        Self::Persistence {
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    pub fn shield(err: impl std::fmt::Display) -> Self {
        Self::ServiceUnavailable {
            service: "shield",
            message: err.to_string(),
        }
    }

    pub fn monitor(err: impl std::fmt::Display) -> Self {
        Self::ServiceUnavailable {
            service: "activity monitor",
            message: err.to_string(),
        }
    }
}

pub type Result<T, E = LimiterError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_reports_milliseconds() {
        let err = LimiterError::Timeout {
            operation: "apply shield",
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "apply shield timed out after 1500ms");
    }

    #[test]
    fn persistence_helper_names_the_record() {
        let err = LimiterError::persistence("selectionToDiscourage", "disk full");
        assert_eq!(
            err.to_string(),
            "Failed to persist record 'selectionToDiscourage': disk full"
        );
    }

    #[test]
    fn service_helpers_name_the_service() {
        assert!(LimiterError::shield("declined").to_string().starts_with("shield service"));
        assert!(
            LimiterError::monitor("declined")
                .to_string()
                .starts_with("activity monitor service")
        );
    }
}
