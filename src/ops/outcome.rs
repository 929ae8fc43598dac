// * Call Outcomes
// * Skips and best-effort failures are values, not hidden control flow

use tracing::error;

use crate::network::errors::AlertError;
use crate::ops::telemetry::record_delivery_failure;

/// Result of a gateway call that may be skipped for a missing API key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Done(T),
    Skipped,
}

impl<T> Outcome<T> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped)
    }

    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            Outcome::Skipped => None,
        }
    }
}

/// Result of a best-effort delivery; failures were already logged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery<T> {
    Delivered(T),
    Skipped,
    Failed,
}

impl<T> Delivery<T> {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Delivery::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Delivery::Failed)
    }
}

/// Converts a strict gateway result into a logged, never-failing [`Delivery`]
pub trait BestEffort<T> {
    fn or_log(self, operation: &str, context: &str) -> Delivery<T>;
}

impl<T> BestEffort<T> for Result<Outcome<T>, AlertError> {
    fn or_log(self, operation: &str, context: &str) -> Delivery<T> {
        match self {
            Ok(Outcome::Done(value)) => Delivery::Delivered(value),
            Ok(Outcome::Skipped) => Delivery::Skipped,
            Err(e) => {
                record_delivery_failure(operation);
                error!(operation, context, error = %e, "Alerting call failed");
                Delivery::Failed
            }
        }
    }
}

/// Per-id results of closing a set of alerts
#[derive(Debug, Default)]
pub struct BatchReport {
    pub closed: Vec<String>,
    pub rejected: Vec<(String, AlertError)>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.closed.len() + self.rejected.len()
    }

    pub fn rejection_count(&self) -> usize {
        self.rejected.len()
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_best_effort_mapping() {
        let ok: Result<Outcome<u8>, AlertError> = Ok(Outcome::Done(1));
        assert_eq!(ok.or_log("create_alert", "test"), Delivery::Delivered(1));

        let skipped: Result<Outcome<u8>, AlertError> = Ok(Outcome::Skipped);
        assert!(skipped.or_log("create_alert", "test").is_skipped());

        let failed: Result<Outcome<u8>, AlertError> = Err(AlertError::Timeout(Duration::from_secs(1)));
        assert!(failed.or_log("create_alert", "test").is_failed());
    }

    #[test]
    fn test_outcome_helpers() {
        assert_eq!(Outcome::Done(2).done(), Some(2));
        assert_eq!(Outcome::<u8>::Skipped.done(), None);
        assert!(Outcome::<u8>::Skipped.is_skipped());
    }

    #[test]
    fn test_batch_report_counts() {
        let report = BatchReport {
            closed: vec!["a".into()],
            rejected: vec![(
                "b".into(),
                AlertError::UnexpectedStatus {
                    operation: "close_alert",
                    status: 500,
                },
            )],
        };
        assert_eq!(report.attempted(), 2);
        assert_eq!(report.rejection_count(), 1);
        assert!(!report.is_clean());
    }
}
