//! Passive request interception over the CDP Fetch domain.
//!
//! Every request is paused, shown to the observer and continued unmodified.
//! Chromium attaches cookies after the Fetch stage, so the full header set
//! from `Network.requestWillBeSentExtraInfo` is forwarded as well, under the
//! URL of the same request.

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, DisableParams, EnableParams, EventRequestPaused, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventRequestWillBeSent, EventRequestWillBeSentExtraInfo, Headers,
};
use futures::stream::{BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use swimsplit_engine::backend::{BackendError, InterceptedRequest, RequestObserver};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

enum NetworkEvent {
    Paused(Arc<EventRequestPaused>),
    Sent(Arc<EventRequestWillBeSent>),
    ExtraInfo(Arc<EventRequestWillBeSentExtraInfo>),
    Failed(Arc<EventLoadingFailed>),
}

/// Live interception on one page. Dropping it without [`disable`] leaves
/// the Fetch domain enabled.
///
/// [`disable`]: Interception::disable
pub struct Interception {
    page: Page,
    task: JoinHandle<()>,
}

impl Interception {
    pub async fn enable(
        page: &Page,
        observer: Arc<dyn RequestObserver>,
    ) -> Result<Self, BackendError> {
        // Subscribe first so no paused request slips through unobserved.
        let paused = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(interception_error)?;
        let sent = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(interception_error)?;
        let extra_info = page
            .event_listener::<EventRequestWillBeSentExtraInfo>()
            .await
            .map_err(interception_error)?;
        let failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(interception_error)?;

        let streams: Vec<BoxStream<'static, NetworkEvent>> = vec![
            paused.map(NetworkEvent::Paused).boxed(),
            sent.map(NetworkEvent::Sent).boxed(),
            extra_info.map(NetworkEvent::ExtraInfo).boxed(),
            failed.map(NetworkEvent::Failed).boxed(),
        ];
        let events = futures::stream::select_all(streams);

        let pattern = RequestPattern::builder().url_pattern("*").build();
        page.execute(EnableParams::builder().pattern(pattern).build())
            .await
            .map_err(interception_error)?;
        info!("Request interception enabled");

        let task = tokio::spawn(dispatch(page.clone(), events, observer));
        Ok(Self {
            page: page.clone(),
            task,
        })
    }

    /// Stop pausing requests. Anything still paused is released by Chromium.
    pub async fn disable(self) -> Result<(), BackendError> {
        self.task.abort();
        self.page
            .execute(DisableParams::default())
            .await
            .map_err(interception_error)?;
        info!("Request interception disabled");
        Ok(())
    }
}

async fn dispatch(
    page: Page,
    mut events: futures::stream::SelectAll<BoxStream<'static, NetworkEvent>>,
    observer: Arc<dyn RequestObserver>,
) {
    let mut tracker = RequestTracker::default();

    while let Some(event) = events.next().await {
        match event {
            NetworkEvent::Paused(event) => {
                let url = event.request.url.clone();
                let request = InterceptedRequest {
                    url: url.clone(),
                    headers: header_map(&event.request.headers),
                };
                observer.on_request(&request);

                if let Some(network_id) = &event.network_id {
                    if let Some(extra) = tracker.record(network_id.inner(), &url) {
                        observer.on_request(&extra);
                    }
                }

                // Continue exactly once, off the event path.
                let page = page.clone();
                let request_id = event.request_id.clone();
                tokio::spawn(async move {
                    if let Err(e) = page.execute(ContinueRequestParams::new(request_id)).await {
                        debug!("Failed to continue request {}: {}", url, e);
                    }
                });
            }
            NetworkEvent::Sent(event) => {
                if let Some(extra) = tracker.record(event.request_id.inner(), &event.request.url) {
                    observer.on_request(&extra);
                }
            }
            NetworkEvent::ExtraInfo(event) => {
                let headers = header_map(&event.headers);
                if let Some(extra) = tracker.extra_info(event.request_id.inner(), headers) {
                    observer.on_request(&extra);
                }
            }
            NetworkEvent::Failed(event) => match tracker.url(event.request_id.inner()) {
                Some(url) => observer.on_request_failed(url, &event.error_text),
                None => debug!("Untracked request failed: {}", event.error_text),
            },
        }
    }
    warn!("Interception event stream ended");
}

/// Network request id to URL, plus header sets that arrived before their URL.
#[derive(Default)]
struct RequestTracker {
    urls: HashMap<String, String>,
    pending_extra: HashMap<String, HashMap<String, String>>,
}

impl RequestTracker {
    /// Remember the URL; returns a completed request if extra headers were waiting.
    fn record(&mut self, request_id: &str, url: &str) -> Option<InterceptedRequest> {
        self.urls.insert(request_id.to_string(), url.to_string());
        self.pending_extra
            .remove(request_id)
            .map(|headers| InterceptedRequest {
                url: url.to_string(),
                headers,
            })
    }

    fn extra_info(
        &mut self,
        request_id: &str,
        headers: HashMap<String, String>,
    ) -> Option<InterceptedRequest> {
        match self.urls.get(request_id) {
            Some(url) => Some(InterceptedRequest {
                url: url.clone(),
                headers,
            }),
            None => {
                self.pending_extra.insert(request_id.to_string(), headers);
                None
            }
        }
    }

    fn url(&self, request_id: &str) -> Option<&str> {
        self.urls.get(request_id).map(String::as_str)
    }
}

fn header_map(headers: &Headers) -> HashMap<String, String> {
    headers
        .inner()
        .as_object()
        .map(|object| {
            object
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .as_str()
                        .map(|value| (name.to_ascii_lowercase(), value.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn interception_error(e: chromiumoxide::error::CdpError) -> BackendError {
    BackendError::Interception(e.to_string())
}
