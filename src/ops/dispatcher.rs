// * Rate-Limited Alert Dispatcher
// * Routes state-changing gateway calls through one shared limiter so the
// * alerting API sees at most one call at a time, spaced apart

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::engine::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::network::wire::{AlertMessage, AlertRecord, CreateAck};
use crate::ops::alerting::AlertGateway;
use crate::ops::outcome::{BatchReport, Delivery, Outcome};

/// Limited front door to an [`AlertGateway`]
pub struct AlertDispatcher {
    gateway: Arc<AlertGateway>,
    limiter: RateLimiter,
}

impl AlertDispatcher {
    pub fn new(gateway: Arc<AlertGateway>) -> Self {
        Self::with_limiter(gateway, RateLimiterConfig::default())
    }

    pub fn with_limiter(gateway: Arc<AlertGateway>, config: RateLimiterConfig) -> Self {
        Self {
            gateway,
            limiter: RateLimiter::new(config),
        }
    }

    pub fn gateway(&self) -> &Arc<AlertGateway> {
        &self.gateway
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub async fn create(&self, message: &AlertMessage, config: &GatewayConfig) -> Delivery<CreateAck> {
        self.limiter
            .schedule("create_alert", || self.gateway.create(message, config))
            .await
    }

    pub async fn close_by_alias(&self, alias: &str, config: &GatewayConfig) -> Outcome<BatchReport> {
        self.limiter
            .schedule("close_by_alias", || self.gateway.close_by_alias(alias, config))
            .await
    }

    pub async fn close_batch(&self, records: &[AlertRecord], config: &GatewayConfig) -> Outcome<BatchReport> {
        self.limiter
            .schedule("close_batch", || self.gateway.close_batch(records, config))
            .await
    }

    pub async fn send_heartbeat(&self, service: &str, config: &GatewayConfig) -> Delivery<()> {
        self.limiter
            .schedule("ping_heartbeat", || self.gateway.send_heartbeat(service, config))
            .await
    }

    /// Creates `message` while `breached`, otherwise closes its alias
    pub async fn reconcile(&self, breached: bool, message: &AlertMessage, config: &GatewayConfig) {
        if breached {
            self.create(message, config).await;
        } else {
            self.close_by_alias(&message.alias, config).await;
        }
    }
}
