use std::time::Duration;

use async_trait::async_trait;

use crate::{AttemptError, CallRequest, RawResponse, Transport};

/// [`Transport`] over a shared `reqwest::Client`.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured client (proxies, TLS roots, default headers).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &CallRequest,
        timeout: Duration,
    ) -> Result<RawResponse, AttemptError> {
        let mut builder = self
            .http
            .request(request.method().clone(), request.target())
            .timeout(timeout);

        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_reqwest_error)?;

        tracing::trace!(
            status,
            bytes = body.len(),
            target = %request.target(),
            "response received"
        );

        Ok(RawResponse::new(status, body))
    }
}

/// Maps a reqwest failure onto the attempt taxonomy.
///
/// Timeouts and connection-level failures are retryable; anything that would
/// fail the same way again (bad URL or header, redirect loop, undecodable
/// body) is malformed.
fn classify_reqwest_error(err: reqwest::Error) -> AttemptError {
    if err.is_timeout() {
        AttemptError::Timeout
    } else if err.is_builder() {
        AttemptError::Malformed(format!("invalid request: {err}"))
    } else if err.is_connect() || err.is_request() || err.is_body() {
        AttemptError::transport(err)
    } else {
        AttemptError::Malformed(err.to_string())
    }
}
