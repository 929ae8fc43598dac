//! Alert delivery core for a telemetry monitoring agent.
//!
//! Creates, de-duplicates and closes incident alerts in an OpsGenie-compatible
//! service. Aliases are hashed before they leave the process, open alerts are
//! cached so closes need no extra lookups, listing retries on timeout inside a
//! hard deadline, and mutating calls can be serialized through a rate limiter.

pub mod config;
pub mod engine;
pub mod network;
pub mod ops;

pub use config::{AgentConfig, GatewayConfig, Responder, ResponderKind};
pub use engine::hashing::{hash_alias, HashedAlias};
pub use engine::rate_limiter::{RateLimiter, RateLimiterConfig};
pub use engine::retry::{retry_on_timeout, RetryPolicy, TimeoutClassify};
pub use network::errors::AlertError;
pub use network::wire::{AlertContents, AlertMessage, AlertRecord, CreateAck, Priority};
pub use ops::{AlertCache, AlertDispatcher, AlertGateway, BatchReport, CacheState, Delivery, Outcome};
