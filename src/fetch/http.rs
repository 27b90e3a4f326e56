//! HTTP fetching.

use std::time::Duration;

use reqwest::blocking::Client;

use super::{read_at_most, CancelToken, Cancellable};
use crate::error::{Result, TemplateError};

/// User agent sent with every request.
pub const USER_AGENT: &str = "limatmpl";

/// Fetches content over HTTP/HTTPS with one reusable client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

/// Status and (possibly truncated) body of a response.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl HttpFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| TemplateError::Other(anyhow::Error::new(e).context("Failed to build HTTP client")))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GETs `url`, reading at most `limit` bytes of the body.
    ///
    /// `timeout` overrides the client timeout when it is shorter. `cancel` is
    /// checked before the request is sent and while the body is read, where
    /// it stops with [`TemplateError::Cancelled`]. Connecting and waiting for
    /// headers cannot be interrupted; that phase is bounded by the timeout.
    pub fn get(
        &self,
        url: &str,
        headers: &[(&str, String)],
        timeout: Option<Duration>,
        limit: usize,
        cancel: &CancelToken,
    ) -> Result<HttpResponse> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }
        if let Some(timeout) = timeout.filter(|t| *t < self.timeout) {
            request = request.timeout(timeout);
        }

        if cancel.is_cancelled() {
            return Err(TemplateError::Cancelled);
        }
        let response = request.send().map_err(|e| TemplateError::fetch(url, e))?;
        let status = response.status().as_u16();
        let body = read_at_most(Cancellable::new(response, cancel.clone()), limit).map_err(|e| {
            if cancel.is_cancelled() {
                TemplateError::Cancelled
            } else {
                TemplateError::fetch(url, e)
            }
        })?;
        Ok(HttpResponse { status, body })
    }
}
