//! Stream session driver.
//!
//! Owns one HTTP streaming request end to end: sends it, handles auth and
//! status failures, pumps the body through the decoder, and dispatches
//! callbacks. Every exit path drops the response, which releases the
//! connection.

use super::cancel::StreamHandle;
use super::error::{StreamError, extract_detail};
use super::event::{StreamCallbacks, StreamDecoder};
use crate::auth::{CredentialStore, Navigator};
use crate::config::Config;
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Connection timeout. There is deliberately no overall timeout: a stream
/// may stay open for as long as generation takes.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of a stream request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamRequest {
    pub message: String,
    /// `None` targets the current/default session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,
}

impl StreamRequest {
    pub fn new(message: impl Into<String>, session_id: Option<i64>) -> Self {
        Self {
            message: message.into(),
            session_id,
        }
    }
}

/// How a stream that was not cancelled ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    /// A `complete` or `error` event was dispatched.
    Terminal,
    /// Body exhausted with no terminal event.
    Exhausted,
}

type StreamKey = (String, Option<i64>);

/// Active streams by `(endpoint, session)`, for single-flight.
#[derive(Debug, Default)]
struct ActiveStreams {
    inner: Mutex<ActiveInner>,
}

#[derive(Debug, Default)]
struct ActiveInner {
    next_generation: u64,
    entries: HashMap<StreamKey, (u64, CancellationToken)>,
}

impl ActiveStreams {
    /// Register `token` for `key`, cancelling whatever stream held it.
    fn register(&self, key: StreamKey, token: CancellationToken) -> u64 {
        let Ok(mut inner) = self.inner.lock() else {
            return 0;
        };
        inner.next_generation += 1;
        let generation = inner.next_generation;
        if let Some((_, previous)) = inner.entries.insert(key.clone(), (generation, token)) {
            info!(endpoint = %key.0, session_id = ?key.1, "Superseding active stream");
            previous.cancel();
        }
        generation
    }

    /// Drop the entry for `key` if it still belongs to `generation`.
    fn release(&self, key: &StreamKey, generation: u64) {
        if let Ok(mut inner) = self.inner.lock()
            && inner.entries.get(key).is_some_and(|(g, _)| *g == generation)
        {
            inner.entries.remove(key);
        }
    }

    fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }
}

/// Starts and runs streaming requests against one server.
///
/// Cheap to clone; clones share the HTTP connection pool and the
/// single-flight registry.
#[derive(Clone)]
pub struct StreamDriver {
    client: reqwest::Client,
    base_url: String,
    sign_in_path: String,
    credentials: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    active: Option<Arc<ActiveStreams>>,
}

impl std::fmt::Debug for StreamDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDriver")
            .field("base_url", &self.base_url)
            .field("sign_in_path", &self.sign_in_path)
            .field("single_flight", &self.active.is_some())
            .finish_non_exhaustive()
    }
}

impl StreamDriver {
    /// Create a driver with single-flight enabled and `/login` as sign-in route.
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            client: build_client(CONNECT_TIMEOUT),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sign_in_path: "/login".to_string(),
            credentials,
            navigator,
            active: Some(Arc::new(ActiveStreams::default())),
        }
    }

    pub fn from_config(
        config: &Config,
        credentials: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let mut driver = Self::new(config.base_url.clone(), credentials, navigator)
            .with_sign_in_path(config.sign_in_path.clone())
            .with_single_flight(config.single_flight);
        driver.client = build_client(Duration::from_secs(config.connect_timeout_secs));
        driver
    }

    #[must_use]
    pub fn with_sign_in_path(mut self, path: impl Into<String>) -> Self {
        self.sign_in_path = path.into();
        self
    }

    /// Toggle auto-cancellation of a prior stream on the same session.
    #[must_use]
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.active = enabled.then(|| Arc::new(ActiveStreams::default()));
        self
    }

    /// Number of streams currently registered for single-flight.
    pub fn active_streams(&self) -> usize {
        self.active.as_ref().map_or(0, |a| a.len())
    }

    /// Start streaming `request` to `path`.
    ///
    /// Never fails: every error is reported through `callbacks.on_error`
    /// (except 401, which clears the credential and navigates to sign-in).
    /// Must be called from within a Tokio runtime.
    pub fn start_stream<C>(
        &self,
        path: &str,
        request: StreamRequest,
        callbacks: StreamCallbacks<C>,
    ) -> StreamHandle
    where
        C: DeserializeOwned + Send + 'static,
    {
        let token = CancellationToken::new();
        let key: StreamKey = (path.to_string(), request.session_id);
        let registration = self
            .active
            .as_ref()
            .map(|active| (active.clone(), active.register(key.clone(), token.clone())));

        let driver = self.clone();
        let path = path.to_string();
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            driver.run(&path, request, callbacks, task_token).await;
            if let Some((active, generation)) = registration {
                active.release(&key, generation);
            }
        });

        StreamHandle::new(token, task)
    }

    async fn run<C: DeserializeOwned>(
        &self,
        path: &str,
        request: StreamRequest,
        mut callbacks: StreamCallbacks<C>,
        token: CancellationToken,
    ) {
        debug!(endpoint = path, session_id = ?request.session_id, "Starting stream");

        // Cancellation drops the in-flight future, aborting the request or body read.
        let result = tokio::select! {
            biased;
            () = token.cancelled() => Err(StreamError::Cancelled),
            result = self.execute(path, &request, &mut callbacks, &token) => result,
        };

        match result {
            Ok(StreamEnd::Terminal) => debug!(endpoint = path, "Stream finished"),
            Ok(StreamEnd::Exhausted) => {
                debug!(endpoint = path, "Stream ended without a terminal event");
            }
            Err(StreamError::Cancelled) => debug!(endpoint = path, "Stream cancelled"),
            Err(StreamError::Unauthorized) => {
                info!(endpoint = path, "Credential rejected, redirecting to sign-in");
                self.credentials.clear();
                self.navigator.navigate(&self.sign_in_path);
            }
            // Errors raised by an abort are expected, not reported.
            Err(_) if token.is_cancelled() => debug!(endpoint = path, "Stream cancelled"),
            Err(e) => {
                debug!(endpoint = path, "Stream failed: {e}");
                callbacks.fail(e.to_string());
            }
        }
    }

    async fn execute<C: DeserializeOwned>(
        &self,
        path: &str,
        request: &StreamRequest,
        callbacks: &mut StreamCallbacks<C>,
        token: &CancellationToken,
    ) -> Result<StreamEnd, StreamError> {
        let url = endpoint_url(&self.base_url, path)?;

        let mut builder = self
            .client
            .post(url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(request);
        if let Some(credential) = self.credentials.get() {
            builder = builder.bearer_auth(credential);
        }

        let response = builder.send().await?;

        let status = response.status();
        debug!(endpoint = path, status = status.as_u16(), "Stream response");
        if status == StatusCode::UNAUTHORIZED {
            return Err(StreamError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::Status {
                status: status.as_u16(),
                detail: extract_detail(status.as_u16(), &body),
            });
        }

        let mut body = response.bytes_stream();
        let mut decoder = StreamDecoder::<C>::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for event in decoder.feed(&chunk) {
                if token.is_cancelled() {
                    return Err(StreamError::Cancelled);
                }
                if callbacks.dispatch(event) {
                    return Ok(StreamEnd::Terminal);
                }
            }
        }

        decoder.finish();
        Ok(StreamEnd::Exhausted)
    }
}

fn build_client(connect_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Join the base URL and an endpoint path.
fn endpoint_url(base_url: &str, path: &str) -> Result<url::Url, StreamError> {
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url::Url::parse(&joined).map_err(|e| StreamError::InvalidUrl(format!("{joined}: {e}")))
}
