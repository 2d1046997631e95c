//! Outbound HTTP client.
//!
//! A `reqwest` client with short timeouts whose calls can be timed into a
//! [`MetricSink`] labelled by response status code.

use std::time::Duration;

use crate::config::HttpClientConfig;
use crate::observability::instrument::{observe_with, CODE_LABEL};
use crate::observability::MetricSink;

/// HTTP client recording `{"code": <status>}` latency for completed calls.
#[derive(Debug, Clone)]
pub struct InstrumentedClient {
    inner: reqwest::Client,
}

impl InstrumentedClient {
    pub fn new(config: &HttpClientConfig) -> Result<Self, reqwest::Error> {
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self { inner })
    }

    /// The wrapped client, for building requests.
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Execute `request`. Any response, whatever its status, is recorded;
    /// transport errors are returned untouched and not recorded.
    pub async fn send(
        &self,
        request: reqwest::Request,
        sink: Option<&dyn MetricSink>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        observe_with(
            sink,
            |response: &reqwest::Response| vec![(CODE_LABEL, response.status().as_u16().to_string())],
            self.inner.execute(request),
        )
        .await
    }
}
