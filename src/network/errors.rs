use std::time::Duration;
use thiserror::Error;

use crate::engine::retry::TimeoutClassify;

// * Unified Error type for calls to the alerting service.
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Operation timed out in {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("HTTP {status} from {operation}")]
    UnexpectedStatus { operation: &'static str, status: u16 },

    #[error("Malformed response from {operation}: {reason}")]
    Decode {
        operation: &'static str,
        reason: String,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl AlertError {
    // * Maps a transport error, keeping timeouts structurally distinct
    pub fn from_transport(err: reqwest::Error, budget: Duration) -> Self {
        if err.is_timeout() {
            AlertError::Timeout(budget)
        } else {
            AlertError::Request(err)
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AlertError::UnexpectedStatus { status, .. } => Some(*status),
            AlertError::Request(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl TimeoutClassify for AlertError {
    fn is_timeout(&self) -> bool {
        matches!(self, AlertError::Timeout(_))
    }

    fn timed_out(after: Duration) -> Self {
        AlertError::Timeout(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_the_only_retryable_kind() {
        assert!(AlertError::Timeout(Duration::from_secs(1)).is_timeout());
        assert!(!AlertError::UnexpectedStatus {
            operation: "close",
            status: 500
        }
        .is_timeout());
        assert!(!AlertError::InvalidUrl("x".into()).is_timeout());
    }

    #[test]
    fn test_timeout_message() {
        let err = AlertError::timed_out(Duration::from_millis(10_000));
        assert_eq!(err.to_string(), "Operation timed out in 10000 ms");
    }

    #[test]
    fn test_status_accessor() {
        let err = AlertError::UnexpectedStatus {
            operation: "close",
            status: 500,
        };
        assert_eq!(err.status(), Some(500));
        assert_eq!(AlertError::Timeout(Duration::ZERO).status(), None);
    }
}
