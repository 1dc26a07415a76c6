use std::time::Instant;

use http::header::{CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::conversation::config::{Config, InsertKey};
use crate::conversation::process::CollectorEvent;
use crate::error::ProcessError;

/// Client for the metrics collector's event ingestion endpoint.
///
/// Delivery is acknowledged once the request reaches the collector: a
/// non-success status is logged and returned but is not an error. Only a
/// transport failure fails the call.
#[derive(Debug, Clone)]
pub struct Collector {
    client: reqwest::Client,
    uri: String,
    api_key: InsertKey,
}

impl Collector {
    pub fn new(config: &Config) -> Self {
        Collector {
            client: reqwest::Client::new(),
            uri: format!(
                "{}/v1/accounts/{}/events",
                config.endpoint, config.account_id
            ),
            api_key: config.api_key.clone(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Posts all events in a single request. Returns `None` when there was
    /// nothing to send.
    pub async fn publish(
        &self,
        events: &[CollectorEvent],
    ) -> Result<Option<StatusCode>, ProcessError> {
        if events.is_empty() {
            info!("No events to send");
            return Ok(None);
        }

        let body = serde_json::to_vec(events)?;
        let bytes = body.len();
        debug!("sending {} events to uri: {:?}", events.len(), self.uri);

        let start = Instant::now();
        let response = self
            .client
            .post(&self.uri)
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, bytes)
            .header("X-Insert-Key", self.api_key.token())
            .header(
                USER_AGENT,
                concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                status = %status,
                uri = %self.uri,
                "metrics collector did not accept events"
            );
        }

        info!(
            status = %status,
            events = events.len(),
            bytes,
            elapsed_ms = start.elapsed().as_millis(),
            uri = %self.uri,
            "events HTTP request completed"
        );

        Ok(Some(status))
    }
}
