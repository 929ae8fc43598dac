// * Alerting Service Wire Types
// * Request bodies and response projections for the /v2 alert API

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::config::Responder;
use crate::engine::hashing::HashedAlias;

/// Alert priority as understood by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    P1,
    P2,
    P3,
    P4,
    P5,
}

/// An alert as callers describe it; the alias is human-readable and only
/// hashed when the gateway puts it on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertMessage {
    pub message: String,
    pub alias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
}

impl AlertMessage {
    pub fn new(message: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            alias: alias.into(),
            description: None,
            priority: None,
            details: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// An open alert: service id plus the hashed alias it was created with
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: String,
    pub alias: HashedAlias,
}

impl AlertRecord {
    pub fn new(id: impl Into<String>, alias: HashedAlias) -> Self {
        Self {
            id: id.into(),
            alias,
        }
    }
}

// * Body of POST /v2/alerts
#[derive(Debug, Serialize)]
pub(crate) struct CreateAlertPayload<'a> {
    pub message: &'a str,
    pub alias: &'a HashedAlias,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<&'a BTreeMap<String, String>>,
    pub responders: &'a [Responder],
}

impl<'a> CreateAlertPayload<'a> {
    pub fn new(message: &'a AlertMessage, alias: &'a HashedAlias, responders: &'a [Responder]) -> Self {
        Self {
            message: &message.message,
            alias,
            description: message.description.as_deref(),
            priority: message.priority,
            details: message.details.as_ref(),
            responders,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DescriptionPayload<'a> {
    pub description: &'a str,
}

// * Response of GET /v2/alerts; only id and alias are kept
#[derive(Debug, Deserialize)]
pub(crate) struct ListAlertsResponse {
    #[serde(default)]
    pub data: Option<Vec<ListedAlert>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListedAlert {
    pub id: String,
    #[serde(default)]
    pub alias: Option<HashedAlias>,
}

impl ListedAlert {
    pub fn into_record(self) -> Option<AlertRecord> {
        self.alias.map(|alias| AlertRecord { id: self.id, alias })
    }
}

/// Acknowledgement of an accepted create request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAck {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
}

/// Full contents of a single alert
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertContents {
    pub id: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub details: BTreeMap<String, String>,
}

// * The service sends null for empty collections on some alerts
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlertContentsResponse {
    pub data: Option<AlertContents>,
}
