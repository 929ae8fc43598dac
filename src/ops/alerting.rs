// * Alert Gateway - the only component talking to the alerting service
// * Hashes aliases at the wire boundary, keeps the open-alert cache in step with
// * creates and closes, and turns a missing API key into a skip instead of a failure

use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

use crate::config::constants::{
    CACHE_FAILURE_ALIAS, CLOSE_ACCEPTED_STATUS, DEFAULT_BASE_URL, LIST_DEADLINE, LIST_MAX_RETRIES,
    LIST_RETRY_DELAY, REQUEST_TIMEOUT, UPDATE_DESCRIPTION_TIMEOUT,
};
use crate::config::GatewayConfig;
use crate::engine::hashing::{hash_alias, HashedAlias};
use crate::engine::retry::{retry_on_timeout, RetryPolicy};
use crate::network::client::GenieClient;
use crate::network::errors::AlertError;
use crate::network::wire::{AlertContents, AlertMessage, AlertRecord, CreateAck, CreateAlertPayload};
use crate::ops::alert_cache::{AlertCache, PopulateGuard, PopulateTicket};
use crate::ops::outcome::{BatchReport, BestEffort, Delivery, Outcome};
use crate::ops::telemetry::{record_cache_population, record_skipped_call};

/// Retry policy for listing open alerts: 10s per attempt, 5s between attempts,
/// five retries, all inside a 10s overall deadline.
pub fn list_retry_policy() -> RetryPolicy {
    RetryPolicy::new(LIST_RETRY_DELAY, LIST_MAX_RETRIES).with_attempt_timeout(REQUEST_TIMEOUT)
}

/// Gateway to the alerting service.
///
/// Owns the process-lifetime state: the open-alert cache and the one-shot
/// missing-key warning. Share it behind an `Arc` for the life of the agent.
pub struct AlertGateway {
    client: GenieClient,
    cache: AlertCache,
    key_warning_issued: AtomicBool,
}

impl std::fmt::Debug for AlertGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertGateway")
            .field("base_url", &self.client.base_url().as_str())
            .field("cache_state", &self.cache.state())
            .field("cached_alerts", &self.cache.len())
            .finish()
    }
}

impl AlertGateway {
    /// Gateway for the public service endpoint
    pub fn new() -> Result<Self, AlertError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, AlertError> {
        Ok(Self {
            client: GenieClient::new(base_url)?,
            cache: AlertCache::new(),
            key_warning_issued: AtomicBool::new(false),
        })
    }

    pub fn cache(&self) -> &AlertCache {
        &self.cache
    }

    pub fn key_warning_issued(&self) -> bool {
        self.key_warning_issued.load(Ordering::Relaxed)
    }

    // * Returns the key, or None after warning (once per gateway) that calls are skipped
    fn api_key<'c>(&self, config: &'c GatewayConfig, operation: &str) -> Option<&'c str> {
        if let Some(key) = config.api_key() {
            return Some(key);
        }

        record_skipped_call(operation);
        if !self.key_warning_issued.swap(true, Ordering::Relaxed) {
            warn!(operation, "No alerting API key configured, alerting calls will be skipped");
        }
        None
    }

    // ---------------------------------------------------------------------
    // * Read path: failures surface to the caller
    // ---------------------------------------------------------------------

    /// Lists open alerts as `{id, alias}` pairs, retrying timeouts
    pub async fn list_open(&self, config: &GatewayConfig) -> Result<Outcome<Vec<AlertRecord>>, AlertError> {
        let Some(key) = self.api_key(config, "list_alerts") else {
            return Ok(Outcome::Skipped);
        };

        let result = retry_on_timeout(LIST_DEADLINE, list_retry_policy(), || {
            self.client.list_alerts(key, "status:open", REQUEST_TIMEOUT)
        })
        .await;

        match result {
            Ok(records) => {
                debug!(count = records.len(), "Listed open alerts");
                Ok(Outcome::Done(records))
            }
            Err(e) => {
                error!(error = %e, "Unable to list open alerts");
                Err(e)
            }
        }
    }

    /// Lists open alerts for one alias straight from the service, bypassing the cache
    pub async fn list_open_for_alias(
        &self,
        alias: &str,
        config: &GatewayConfig,
    ) -> Result<Outcome<Vec<AlertRecord>>, AlertError> {
        let Some(key) = self.api_key(config, "list_alerts") else {
            return Ok(Outcome::Skipped);
        };

        let query = format!("status:open AND alias:{}", hash_alias(alias));
        self.client
            .list_alerts(key, &query, REQUEST_TIMEOUT)
            .await
            .map(Outcome::Done)
    }

    pub async fn get_alert_contents(
        &self,
        id: &str,
        config: &GatewayConfig,
    ) -> Result<Outcome<AlertContents>, AlertError> {
        let Some(key) = self.api_key(config, "fetch_alert") else {
            return Ok(Outcome::Skipped);
        };
        self.client
            .fetch_alert(key, id, REQUEST_TIMEOUT)
            .await
            .map(Outcome::Done)
    }

    pub async fn update_description(
        &self,
        description: &str,
        id: &str,
        config: &GatewayConfig,
    ) -> Result<Outcome<()>, AlertError> {
        let Some(key) = self.api_key(config, "update_description") else {
            return Ok(Outcome::Skipped);
        };
        self.client
            .update_description(key, id, description, UPDATE_DESCRIPTION_TIMEOUT)
            .await
            .map(Outcome::Done)
    }

    // ---------------------------------------------------------------------
    // * Cache population
    // ---------------------------------------------------------------------

    /// Makes sure the cache has been populated, fetching at most once across
    /// all concurrent callers. `force` refreshes a ready cache.
    pub async fn ensure_cache(&self, config: &GatewayConfig, force: bool) {
        match self.cache.begin_populate(force) {
            PopulateTicket::Fresh => {}
            PopulateTicket::Wait(wait) => wait.finished().await,
            PopulateTicket::Lead(guard) => self.populate(guard, config).await,
        }
    }

    async fn populate(&self, guard: PopulateGuard<'_>, config: &GatewayConfig) {
        match self.list_open(config).await {
            Ok(Outcome::Done(records)) => {
                info!(count = records.len(), "Cached open alerts");
                guard.complete(records);
                record_cache_population("success");

                // * A working cache resolves any earlier cache-failure alert
                self.close_cached(&hash_alias(CACHE_FAILURE_ALIAS), config).await;
            }
            Ok(Outcome::Skipped) => {
                guard.complete(Vec::new());
                record_cache_population("skipped");
            }
            Err(e) => {
                // * Stay ready on failure so callers do not stampede the service
                guard.fail();
                record_cache_population("failure");

                let message = AlertMessage::new(
                    format!("Unable to cache open alerts: {}", e),
                    CACHE_FAILURE_ALIAS,
                )
                .with_description(format!("{:?}", e));
                self.create(&message, config).await;
            }
        }
    }

    /// Cached records for an alias; refreshes once if none are cached
    pub async fn resolve_alias(&self, alias: &str, config: &GatewayConfig) -> Outcome<Vec<AlertRecord>> {
        if self.api_key(config, "resolve_alias").is_none() {
            return Outcome::Skipped;
        }

        let hashed = hash_alias(alias);
        self.ensure_cache(config, false).await;
        let cached = self.cache.matching(&hashed);
        if !cached.is_empty() {
            return Outcome::Done(cached);
        }

        self.ensure_cache(config, true).await;
        Outcome::Done(self.cache.matching(&hashed))
    }

    // ---------------------------------------------------------------------
    // * Delivery path: strict try_* variants plus best-effort wrappers
    // ---------------------------------------------------------------------

    /// Creates (or, server-side, de-duplicates) an alert
    pub async fn try_create(
        &self,
        message: &AlertMessage,
        config: &GatewayConfig,
    ) -> Result<Outcome<CreateAck>, AlertError> {
        info!(
            alias = %message.alias,
            priority = ?message.priority,
            description = message.description.as_deref().unwrap_or_default(),
            "{}", message.message
        );

        let Some(key) = self.api_key(config, "create_alert") else {
            return Ok(Outcome::Skipped);
        };

        let hashed = hash_alias(&message.alias);
        let payload = CreateAlertPayload::new(message, &hashed, &config.responders);
        let ack = self.client.create_alert(key, &payload, REQUEST_TIMEOUT).await?;

        if let Some(request_id) = ack.request_id.as_deref() {
            self.cache.record_created(AlertRecord::new(request_id, hashed));
        }

        Ok(Outcome::Done(ack))
    }

    /// Best-effort [`try_create`](Self::try_create); failures are logged
    pub async fn create(&self, message: &AlertMessage, config: &GatewayConfig) -> Delivery<CreateAck> {
        self.try_create(message, config)
            .await
            .or_log("create_alert", &message.alias)
    }

    /// Closes one alert; the cache entry goes only after the service accepts
    pub async fn try_close_by_id(&self, id: &str, config: &GatewayConfig) -> Result<Outcome<()>, AlertError> {
        let Some(key) = self.api_key(config, "close_alert") else {
            return Ok(Outcome::Skipped);
        };

        let status = self.client.close_alert(key, id, REQUEST_TIMEOUT).await?;
        if status != CLOSE_ACCEPTED_STATUS {
            return Err(AlertError::UnexpectedStatus {
                operation: "close_alert",
                status,
            });
        }

        let removed = self.cache.remove_id(id);
        debug!(id, removed, "Alert close accepted");
        Ok(Outcome::Done(()))
    }

    /// Best-effort [`try_close_by_id`](Self::try_close_by_id)
    pub async fn close_by_id(&self, id: &str, config: &GatewayConfig) -> Delivery<()> {
        self.try_close_by_id(id, config).await.or_log("close_alert", id)
    }

    /// Closes every cached alert created with `alias`
    pub async fn close_by_alias(&self, alias: &str, config: &GatewayConfig) -> Outcome<BatchReport> {
        if self.api_key(config, "close_by_alias").is_none() {
            return Outcome::Skipped;
        }

        self.ensure_cache(config, false).await;
        Outcome::Done(self.close_cached(&hash_alias(alias), config).await)
    }

    /// Closes an explicit set of already-resolved alerts
    pub async fn close_batch(&self, records: &[AlertRecord], config: &GatewayConfig) -> Outcome<BatchReport> {
        if self.api_key(config, "close_batch").is_none() {
            return Outcome::Skipped;
        }
        Outcome::Done(self.close_records(records, config).await)
    }

    async fn close_cached(&self, alias: &HashedAlias, config: &GatewayConfig) -> BatchReport {
        let matches = self.cache.matching(alias);
        self.close_records(&matches, config).await
    }

    // * Issues all closes at once and waits for every one; no short-circuit
    async fn close_records(&self, records: &[AlertRecord], config: &GatewayConfig) -> BatchReport {
        let results = join_all(records.iter().map(|record| self.try_close_by_id(&record.id, config))).await;

        let mut report = BatchReport::default();
        for (record, result) in records.iter().zip(results) {
            match result {
                Ok(_) => report.closed.push(record.id.clone()),
                Err(e) => {
                    error!(id = %record.id, alias = %record.alias, error = %e, "Alert close rejected");
                    report.rejected.push((record.id.clone(), e));
                }
            }
        }
        report
    }

    /// Liveness ping
    pub async fn try_send_heartbeat(&self, service: &str, config: &GatewayConfig) -> Result<Outcome<()>, AlertError> {
        let Some(key) = self.api_key(config, "ping_heartbeat") else {
            return Ok(Outcome::Skipped);
        };

        let body = self.client.ping_heartbeat(key, service, REQUEST_TIMEOUT).await?;
        debug!(service, response = %body, "Heartbeat sent");
        Ok(Outcome::Done(()))
    }

    /// Best-effort [`try_send_heartbeat`](Self::try_send_heartbeat); always resolves
    pub async fn send_heartbeat(&self, service: &str, config: &GatewayConfig) -> Delivery<()> {
        self.try_send_heartbeat(service, config)
            .await
            .or_log("ping_heartbeat", service)
    }
}
