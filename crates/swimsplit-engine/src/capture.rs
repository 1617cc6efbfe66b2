//! Passive capture of the session headers.
//!
//! A [`CaptureLatch`] watches the browser's request stream for the first
//! request whose URL contains a fixed pattern and that carries both an
//! `Authorization` and a `Cookie` header. It never blocks or alters traffic;
//! it only records what it saw and fires its [`CaptureSignal`] once.

use crate::backend::{InterceptedRequest, RequestObserver};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Authorization material lifted from one intercepted request.
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedSession {
    pub authorization: String,
    pub cookie: String,
}

impl CapturedSession {
    /// Both values must be present and non-empty.
    pub fn new(authorization: Option<&str>, cookie: Option<&str>) -> Option<Self> {
        match (authorization, cookie) {
            (Some(auth), Some(cookie)) if !auth.is_empty() && !cookie.is_empty() => Some(Self {
                authorization: auth.to_string(),
                cookie: cookie.to_string(),
            }),
            _ => None,
        }
    }
}

impl std::fmt::Debug for CapturedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedSession")
            .field("authorization", &"<redacted>")
            .field("cookie", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Timeout: did not capture session headers within {0:?}")]
    Timeout(Duration),
    #[error("Target request failed: {0}")]
    RequestFailed(String),
    #[error("Capture observer dropped before firing")]
    Closed,
}

type CaptureResult = Result<CapturedSession, CaptureError>;

pub struct CaptureLatch {
    pattern: String,
    captured: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<CaptureResult>>>,
}

impl CaptureLatch {
    pub fn new(pattern: impl Into<String>) -> (Self, CaptureSignal) {
        let (tx, rx) = oneshot::channel();
        let latch = Self {
            pattern: pattern.into(),
            captured: AtomicBool::new(false),
            sender: Mutex::new(Some(tx)),
        };
        (latch, CaptureSignal { receiver: rx })
    }

    pub fn is_captured(&self) -> bool {
        self.captured.load(Ordering::SeqCst)
    }

    fn matches(&self, url: &str) -> bool {
        url.contains(&self.pattern)
    }

    fn fire(&self, result: CaptureResult) {
        let sender = self.sender.lock().ok().and_then(|mut guard| guard.take());
        if let Some(sender) = sender {
            // Receiver gone means nobody waits any more.
            let _ = sender.send(result);
        }
    }
}

impl RequestObserver for CaptureLatch {
    fn on_request(&self, request: &InterceptedRequest) {
        if !self.matches(&request.url) || self.is_captured() {
            return;
        }

        let authorization = request.header("authorization");
        let cookie = request.header("cookie");
        match CapturedSession::new(authorization, cookie) {
            Some(session) => {
                if self
                    .captured
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    info!("Captured Authorization and Cookie headers from {}", request.url);
                    self.fire(Ok(session));
                }
            }
            None => {
                let mut names: Vec<&str> = request.headers.keys().map(String::as_str).collect();
                names.sort_unstable();
                warn!(
                    "Matched {} but Authorization/Cookie headers were missing. Headers found: {:?}",
                    request.url, names
                );
            }
        }
    }

    fn on_request_failed(&self, url: &str, error_text: &str) {
        if !self.matches(url) || self.is_captured() {
            return;
        }
        error!("Target request failed! URL: {}, Failure: {}", url, error_text);
        self.fire(Err(CaptureError::RequestFailed(error_text.to_string())));
    }
}

/// Completion side of a [`CaptureLatch`].
pub struct CaptureSignal {
    receiver: oneshot::Receiver<CaptureResult>,
}

impl CaptureSignal {
    /// First of {capture, deadline} wins.
    pub async fn wait(self, timeout: Duration) -> CaptureResult {
        tokio::select! {
            received = self.receiver => received.unwrap_or(Err(CaptureError::Closed)),
            _ = tokio::time::sleep(timeout) => Err(CaptureError::Timeout(timeout)),
        }
    }
}
