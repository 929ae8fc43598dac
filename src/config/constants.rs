// * Configuration Constants
// * Central location for alerting endpoints, timeouts and environment names

use std::time::Duration;

// * Alerting service base URL used when none is configured
pub const DEFAULT_BASE_URL: &str = "https://api.opsgenie.com";

// * Environment variable holding the API key; takes precedence over the config file
pub const API_KEY_ENV: &str = "OPSGENIE_API_KEY";

// * Environment variables read by the agent binary
pub const CONFIG_PATH_ENV: &str = "ALERTING_CONFIG_PATH";
pub const BASE_URL_ENV: &str = "ALERTING_BASE_URL";
pub const HEARTBEAT_SERVICE_ENV: &str = "HEARTBEAT_SERVICE";
pub const METRICS_PORT_ENV: &str = "METRICS_PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

// * Per-call timeout for most alerting API requests
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);

// * Per-call timeout for description updates
pub const UPDATE_DESCRIPTION_TIMEOUT: Duration = Duration::from_millis(9_000);

// * Listing open alerts: overall deadline, retry delay and retry budget
pub const LIST_DEADLINE: Duration = Duration::from_millis(10_000);
pub const LIST_RETRY_DELAY: Duration = Duration::from_millis(5_000);
pub const LIST_MAX_RETRIES: u32 = 5;

// * Delay between timeout retries when the caller does not choose one
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(50);

// * Outbound limiter defaults: one call in flight, 500ms between dispatches
pub const DEFAULT_MAX_CONCURRENT: usize = 1;
pub const DEFAULT_MIN_TIME: Duration = Duration::from_millis(500);

// * Alias of the alert raised when the open-alert cache cannot be populated
pub const CACHE_FAILURE_ALIAS: &str = "opsgenie-open-alerts-cache-failure";

// * HTTP status the service returns for an accepted close request
pub const CLOSE_ACCEPTED_STATUS: u16 = 202;
