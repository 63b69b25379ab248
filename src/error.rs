//! Error taxonomy for job control and remote fetches.
//!
//! | Variant | Origin | Surfaced to the user |
//! |---------|--------|----------------------|
//! | [`DashboardError::RejectedAction`] | start/stop refused or failed | yes, verbatim message |
//! | [`DashboardError::TransientFetch`] | stats poll or listing failed | no, logged and retried next tick |
//! | [`DashboardError::InvalidSetting`] | start settings out of bounds | yes, before any request |
//!
//! An empty document list or an empty filtered table is not an error.

use thiserror::Error;

/// Failure reported by the remote pipeline API or the transport underneath it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    /// HTTP status, when the server answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DashboardError {
    /// The remote refused a start/stop request, or it never reached the remote.
    #[error("{0}")]
    RejectedAction(String),

    /// A background fetch failed; the next tick retries.
    #[error("fetch failed: {0}")]
    TransientFetch(String),

    /// A start setting lies outside its allowed closed range.
    #[error("{field} must be between {min} and {max} (got {value})")]
    InvalidSetting {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

impl DashboardError {
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, DashboardError::TransientFetch(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_message_is_verbatim() {
        let err = DashboardError::RejectedAction("Batch processing already running".into());
        assert_eq!(err.to_string(), "Batch processing already running");
        assert!(err.is_user_facing());
    }

    #[test]
    fn transient_errors_stay_in_the_background() {
        let err = DashboardError::TransientFetch("connection refused".into());
        assert!(!err.is_user_facing());
    }

    #[test]
    fn invalid_setting_names_the_bounds() {
        let err = DashboardError::InvalidSetting {
            field: "ocr_workers",
            value: 0,
            min: 1,
            max: 20,
        };
        assert_eq!(err.to_string(), "ocr_workers must be between 1 and 20 (got 0)");
    }
}
