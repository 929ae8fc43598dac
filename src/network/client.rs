use crate::engine::retry::TimeoutClassify;
use crate::network::errors::AlertError;
use crate::network::wire::{
    AlertContents, AlertContentsResponse, AlertRecord, CreateAck, CreateAlertPayload,
    DescriptionPayload, ListAlertsResponse, ListedAlert,
};
use crate::ops::telemetry::record_api_request;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use std::time::Duration;
use url::Url;

// * Thin HTTP transport for the /v2 alert API.
// * Knows paths, headers and status codes; knows nothing about caching or keys.
pub struct GenieClient {
    inner: Client,
    base: Url,
}

impl GenieClient {
    // * @param base_url - Service root, e.g. "https://api.opsgenie.com"
    pub fn new(base_url: &str) -> Result<Self, AlertError> {
        let base = Url::parse(base_url)
            .map_err(|e| AlertError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(AlertError::InvalidUrl(base_url.to_string()));
        }

        let inner = Client::builder().build().map_err(AlertError::Request)?;

        Ok(Self { inner, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    // * GET /v2/alerts?query=<query>
    pub async fn list_alerts(
        &self,
        api_key: &str,
        query: &str,
        timeout: Duration,
    ) -> Result<Vec<AlertRecord>, AlertError> {
        const OP: &str = "list_alerts";
        let url = self.endpoint(&["v2", "alerts"])?;
        let request = self
            .request(Method::GET, url, api_key, timeout)
            .query(&[("query", query)]);

        let resp = self.send(OP, request, timeout).await?;
        expect_status(OP, &resp, |code| code == 200)?;

        let body: ListAlertsResponse = read_json(OP, resp, timeout).await?;
        let listed = body.data.ok_or_else(|| AlertError::Decode {
            operation: OP,
            reason: "missing data field".to_string(),
        })?;

        Ok(listed.into_iter().filter_map(ListedAlert::into_record).collect())
    }

    // * POST /v2/alerts
    pub(crate) async fn create_alert(
        &self,
        api_key: &str,
        payload: &CreateAlertPayload<'_>,
        timeout: Duration,
    ) -> Result<CreateAck, AlertError> {
        const OP: &str = "create_alert";
        let url = self.endpoint(&["v2", "alerts"])?;
        let request = self.request(Method::POST, url, api_key, timeout).json(payload);

        let resp = self.send(OP, request, timeout).await?;
        expect_status(OP, &resp, |code| (200..300).contains(&code))?;

        read_json(OP, resp, timeout).await
    }

    // * POST /v2/alerts/{id}/close, returns the raw status for the caller to judge
    pub async fn close_alert(&self, api_key: &str, id: &str, timeout: Duration) -> Result<u16, AlertError> {
        let url = self.endpoint(&["v2", "alerts", id, "close"])?;
        let request = self
            .request(Method::POST, url, api_key, timeout)
            .json(&serde_json::json!({}));

        let resp = self.send("close_alert", request, timeout).await?;
        Ok(resp.status().as_u16())
    }

    // * PUT /v2/alerts/{id}/description
    pub async fn update_description(
        &self,
        api_key: &str,
        id: &str,
        description: &str,
        timeout: Duration,
    ) -> Result<(), AlertError> {
        const OP: &str = "update_description";
        let url = self.endpoint(&["v2", "alerts", id, "description"])?;
        let request = self
            .request(Method::PUT, url, api_key, timeout)
            .json(&DescriptionPayload { description });

        let resp = self.send(OP, request, timeout).await?;
        expect_status(OP, &resp, |code| (200..300).contains(&code))
    }

    // * GET /v2/alerts/{id}?identifierType=id
    pub async fn fetch_alert(&self, api_key: &str, id: &str, timeout: Duration) -> Result<AlertContents, AlertError> {
        const OP: &str = "fetch_alert";
        let url = self.endpoint(&["v2", "alerts", id])?;
        let request = self
            .request(Method::GET, url, api_key, timeout)
            .query(&[("identifierType", "id")]);

        let resp = self.send(OP, request, timeout).await?;
        expect_status(OP, &resp, |code| code == 200)?;

        let body: AlertContentsResponse = read_json(OP, resp, timeout).await?;
        body.data.ok_or_else(|| AlertError::Decode {
            operation: OP,
            reason: "missing data field".to_string(),
        })
    }

    // * POST /v2/heartbeats/{name}/ping, returns the response body for debug logging
    pub async fn ping_heartbeat(&self, api_key: &str, service: &str, timeout: Duration) -> Result<String, AlertError> {
        const OP: &str = "ping_heartbeat";
        let url = self.endpoint(&["v2", "heartbeats", service, "ping"])?;
        let request = self
            .request(Method::POST, url, api_key, timeout)
            .json(&serde_json::json!({}));

        let resp = self.send(OP, request, timeout).await?;
        expect_status(OP, &resp, |code| (200..300).contains(&code))?;

        resp.text()
            .await
            .map_err(|e| AlertError::from_transport(e, timeout))
    }

    // * Appends percent-encoded path segments to the base URL
    fn endpoint(&self, segments: &[&str]) -> Result<Url, AlertError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| AlertError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, api_key: &str, timeout: Duration) -> RequestBuilder {
        self.inner
            .request(method, url)
            .header(AUTHORIZATION, format!("GenieKey {}", api_key))
            .header(CONTENT_TYPE, "application/json")
            .timeout(timeout)
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder, timeout: Duration) -> Result<Response, AlertError> {
        match request.send().await {
            Ok(resp) => {
                let outcome = if resp.status().is_success() { "success" } else { "failure" };
                record_api_request(operation, outcome);
                Ok(resp)
            }
            Err(e) => {
                let err = AlertError::from_transport(e, timeout);
                record_api_request(operation, if err.is_timeout() { "timeout" } else { "failure" });
                Err(err)
            }
        }
    }
}

fn expect_status(operation: &'static str, resp: &Response, accept: impl Fn(u16) -> bool) -> Result<(), AlertError> {
    let status = resp.status().as_u16();
    if accept(status) {
        Ok(())
    } else {
        Err(AlertError::UnexpectedStatus { operation, status })
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    operation: &'static str,
    resp: Response,
    timeout: Duration,
) -> Result<T, AlertError> {
    resp.json::<T>().await.map_err(|e| {
        if e.is_decode() {
            AlertError::Decode {
                operation,
                reason: e.to_string(),
            }
        } else {
            AlertError::from_transport(e, timeout)
        }
    })
}
