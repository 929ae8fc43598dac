// * Alert delivery: gateway, open-alert cache, rate-limited dispatch and telemetry

pub mod alert_cache;
pub mod alerting;
pub mod dispatcher;
pub mod outcome;
pub mod telemetry;

// * Re-exports for convenient access
pub use alert_cache::{AlertCache, CacheState};
pub use alerting::{list_retry_policy, AlertGateway};
pub use dispatcher::AlertDispatcher;
pub use outcome::{BatchReport, BestEffort, Delivery, Outcome};
pub use telemetry::{
    get_metrics_string, init_tracing, init_tracing_pretty, init_tracing_with_level,
    start_metrics_server, MetricsServerHandle,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        // * Verify all major types are accessible
        let _cache = AlertCache::new();
        let _outcome: Outcome<()> = Outcome::Skipped;
        let _policy = list_retry_policy();
        assert!(AlertGateway::new().is_ok());
    }
}
