//! Fetching template and script bytes.
//!
//! Every fetch goes through a [`FetchContext`], which carries the HTTP
//! client, the template store, the size ceiling, and the cancellation and
//! deadline state for one resolution.

pub mod http;

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

pub use http::{HttpFetcher, HttpResponse};

use crate::config::Settings;
use crate::error::{Result, TemplateError};
use crate::locator::github::GithubEndpoints;
use crate::store::TemplateStore;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A reader that fails once its token is cancelled.
pub struct Cancellable<R> {
    inner: R,
    token: CancelToken,
}

impl<R> Cancellable<R> {
    pub fn new(inner: R, token: CancelToken) -> Self {
        Self { inner, token }
    }
}

impl<R: Read> Read for Cancellable<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.token.is_cancelled() {
            return Err(io::Error::other("cancelled"));
        }
        self.inner.read(buf)
    }
}

/// Reads `reader` to the end, failing if it holds more than `limit` bytes.
pub fn read_at_most(reader: impl Read, limit: usize) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut bytes)?;
    if bytes.len() > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("content exceeds {limit} bytes"),
        ));
    }
    Ok(bytes)
}

/// Everything a resolution needs to fetch bytes.
#[derive(Debug, Clone)]
pub struct FetchContext {
    http: HttpFetcher,
    store: TemplateStore,
    github: GithubEndpoints,
    github_token: Option<String>,
    cancel: CancelToken,
    deadline: Option<Instant>,
    max_size: usize,
    stdin: Option<Vec<u8>>,
}

impl FetchContext {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::with_timeout(settings.timeout())?,
            store: TemplateStore::from_settings(settings),
            github: GithubEndpoints::default(),
            github_token: settings.github_token.clone(),
            cancel: CancelToken::new(),
            deadline: None,
            max_size: settings.max_template_size,
            stdin: None,
        })
    }

    pub fn with_store(mut self, store: TemplateStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_github(mut self, endpoints: GithubEndpoints) -> Self {
        self.github = endpoints;
        self
    }

    pub fn with_github_token(mut self, token: Option<String>) -> Self {
        self.github_token = token;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Fails every fetch started after `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Serves `-` from `bytes` instead of the process stdin.
    pub fn with_stdin(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(bytes.into());
        self
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn github(&self) -> &GithubEndpoints {
        &self.github
    }

    pub fn github_token(&self) -> Option<&str> {
        self.github_token.as_deref()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// The size ceiling for a single source and for a merged template.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fails if the context is cancelled or past its deadline.
    pub fn check(&self, locator: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(TemplateError::Cancelled);
        }
        if self.remaining() == Some(Duration::ZERO) {
            return Err(TemplateError::DeadlineExceeded {
                locator: locator.to_string(),
            });
        }
        Ok(())
    }

    /// Issues a GET and returns the response whatever its status.
    pub fn http_request(
        &self,
        url: &str,
        headers: &[(&str, String)],
        limit: usize,
    ) -> Result<HttpResponse> {
        self.check(url)?;
        debug!(url, "GET");
        self.http
            .get(url, headers, self.remaining(), limit, &self.cancel)
            .map_err(|e| self.deadline_error(url, e))
    }

    /// GETs `url`; non-2xx responses are errors.
    pub fn http_get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http_request(url, &[], self.max_size)?;
        if !response.is_success() {
            return Err(TemplateError::fetch(url, format!("HTTP status {}", response.status)));
        }
        Ok(response.body)
    }

    pub fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let locator = path.display().to_string();
        self.check(&locator)?;
        let file = File::open(path).map_err(|e| TemplateError::fetch(&locator, e))?;
        read_at_most(Cancellable::new(file, self.cancel.clone()), self.max_size)
            .map_err(|e| self.read_error(&locator, e))
    }

    pub fn read_stdin(&self) -> Result<Vec<u8>> {
        self.check("-")?;
        if let Some(bytes) = &self.stdin {
            if bytes.len() > self.max_size {
                return Err(TemplateError::fetch("-", format!("content exceeds {} bytes", self.max_size)));
            }
            return Ok(bytes.clone());
        }
        read_at_most(io::stdin().lock(), self.max_size)
            .map_err(|e| TemplateError::fetch("-", format!("unexpected error reading stdin: {e}")))
    }

    /// Reads `template://name` from the store.
    pub fn read_template(&self, name: &str) -> Result<Vec<u8>> {
        self.check(&format!("template://{name}"))?;
        let bytes = self.store.read(name)?;
        if bytes.len() > self.max_size {
            return Err(TemplateError::fetch(
                format!("template://{name}"),
                format!("content exceeds {} bytes", self.max_size),
            ));
        }
        Ok(bytes)
    }

    fn read_error(&self, locator: &str, err: io::Error) -> TemplateError {
        if self.cancel.is_cancelled() {
            TemplateError::Cancelled
        } else {
            TemplateError::fetch(locator, err)
        }
    }

    fn deadline_error(&self, locator: &str, err: TemplateError) -> TemplateError {
        match err {
            TemplateError::Fetch { .. } if self.remaining() == Some(Duration::ZERO) => {
                TemplateError::DeadlineExceeded {
                    locator: locator.to_string(),
                }
            }
            other => other,
        }
    }
}
