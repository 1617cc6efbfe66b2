use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum BackendError {
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Timeout: {operation}")]
    Timeout { operation: String },

    #[error("Script execution error: {0}")]
    Script(String),

    #[error("Request interception failed: {0}")]
    Interception(String),

    #[error("Not ready")]
    NotReady,

    #[error("Backend error: {0}")]
    Other(String),
}

/// An outgoing request as seen by the interception layer.
#[derive(Debug, Clone, Default)]
pub struct InterceptedRequest {
    pub url: String,
    /// Header names are stored lowercased.
    pub headers: HashMap<String, String>,
}

impl InterceptedRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Receives request notifications while interception is enabled.
///
/// Called from the browser's event path, so implementations must return
/// quickly and never block. The backend continues every request itself,
/// exactly once, after the observer returns.
pub trait RequestObserver: Send + Sync {
    fn on_request(&self, request: &InterceptedRequest);

    fn on_request_failed(&self, url: &str, error_text: &str);
}

/// An anchor on the rendered page.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct PageLink {
    pub text: String,
    pub href: String,
}

/// Browser automation surface the session acquirer drives.
///
/// Page operations take `&self` so navigation, clicking and waiting can be
/// awaited concurrently.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Launch the browser and open a page.
    async fn launch(&mut self) -> Result<(), BackendError>;

    /// Close the browser and cleanup resources.
    async fn close(&mut self) -> Result<(), BackendError>;

    /// Start passing every outgoing request through `observer`.
    async fn enable_interception(
        &self,
        observer: Arc<dyn RequestObserver>,
    ) -> Result<(), BackendError>;

    async fn disable_interception(&self) -> Result<(), BackendError>;

    async fn navigate(&self, url: &str) -> Result<NavigationResult, BackendError>;

    /// Resolve once `selector` matches an element, or fail after `timeout`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
    -> Result<(), BackendError>;

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BackendError>;

    async fn click(&self, selector: &str) -> Result<(), BackendError>;

    /// Resolve when the current page finishes its next navigation.
    async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), BackendError>;

    /// All anchors matching `selector`, in document order.
    async fn query_links(&self, selector: &str) -> Result<Vec<PageLink>, BackendError>;
}
