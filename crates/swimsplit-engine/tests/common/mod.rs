#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swimsplit_engine::backend::{
    Backend, BackendError, InterceptedRequest, NavigationResult, PageLink, RequestObserver,
};
use swimsplit_engine::capture::CapturedSession;
use swimsplit_engine::config::{BrowserOptions, Config, SheetsConfig};
use swimsplit_engine::fetch::{ActivitySplits, FetchError, SplitsSource};
use swimsplit_engine::publish::{PublishError, SheetsApi, SheetsConnector, SheetsError};
use swimsplit_engine::session::{Credentials, DEVICE_REQUEST_PATTERN, SessionOptions};

pub fn device_url() -> String {
    format!(
        "https://connect.garmin.com{}12345?includeDevices=true",
        DEVICE_REQUEST_PATTERN
    )
}

pub fn device_request() -> InterceptedRequest {
    InterceptedRequest::new(device_url())
        .with_header("Authorization", "Bearer eyJ.token")
        .with_header("Cookie", "SESSIONID=abc")
}

pub fn link(text: &str, href: &str) -> PageLink {
    PageLink {
        text: text.to_string(),
        href: href.to_string(),
    }
}

pub fn fast_options() -> SessionOptions {
    SessionOptions {
        email_field_timeout: Duration::from_millis(50),
        password_field_timeout: Duration::from_millis(50),
        navigation_timeout: Duration::from_millis(200),
        capture_timeout: Duration::from_millis(100),
        activity_list_timeout: Duration::from_millis(50),
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        email: "swimmer@example.com".into(),
        password: "hunter2".into(),
    }
}

pub fn config(sheets: SheetsConfig) -> Config {
    Config {
        credentials: credentials(),
        target_activity: "Pool Swim".into(),
        sheets,
        browser: BrowserOptions::default(),
    }
}

/// What the fake page does when the submit button is clicked.
pub enum OnSubmit {
    Request(InterceptedRequest),
    Fail(String),
    Nothing,
}

/// Scripted browser: records every call and replays network events on submit.
pub struct MockBackend {
    pub calls: Mutex<Vec<String>>,
    observer: Mutex<Option<Arc<dyn RequestObserver>>>,
    pub on_submit: OnSubmit,
    pub links: Vec<PageLink>,
    pub missing_selectors: Vec<String>,
    pub fail_launch: bool,
}

impl MockBackend {
    pub fn new(on_submit: OnSubmit, links: Vec<PageLink>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            observer: Mutex::new(None),
            on_submit,
            links,
            missing_selectors: Vec::new(),
            fail_launch: false,
        }
    }

    pub fn logging_in() -> Self {
        Self::new(
            OnSubmit::Request(device_request()),
            vec![
                link("Morning Run", "/modern/activity/111"),
                link("Pool Swim", "/modern/activity/222"),
            ],
        )
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn observer(&self) -> Option<Arc<dyn RequestObserver>> {
        self.observer.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        self.record("launch");
        if self.fail_launch {
            return Err(BackendError::Other("no chromium".into()));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.record("close");
        Ok(())
    }

    async fn enable_interception(
        &self,
        observer: Arc<dyn RequestObserver>,
    ) -> Result<(), BackendError> {
        self.record("enable_interception");
        *self.observer.lock().unwrap() = Some(observer);
        Ok(())
    }

    async fn disable_interception(&self) -> Result<(), BackendError> {
        self.record("disable_interception");
        *self.observer.lock().unwrap() = None;
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<NavigationResult, BackendError> {
        self.record(format!("navigate:{}", url));
        // Background noise that must be ignored.
        if let Some(observer) = self.observer() {
            observer.on_request(&InterceptedRequest::new(format!("{}/favicon.ico", url)));
        }
        Ok(NavigationResult {
            url: url.to_string(),
            title: String::new(),
        })
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BackendError> {
        self.record(format!("wait:{}", selector));
        if self.missing_selectors.iter().any(|s| s == selector) {
            tokio::time::sleep(timeout).await;
            return Err(BackendError::Timeout {
                operation: format!("waiting for {}", selector),
            });
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, _text: &str) -> Result<(), BackendError> {
        self.record(format!("type:{}", selector));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), BackendError> {
        self.record(format!("click:{}", selector));
        if let Some(observer) = self.observer() {
            match &self.on_submit {
                OnSubmit::Request(request) => observer.on_request(request),
                OnSubmit::Fail(text) => observer.on_request_failed(&device_url(), text),
                OnSubmit::Nothing => {}
            }
        }
        Ok(())
    }

    async fn wait_for_navigation(&self, _timeout: Duration) -> Result<(), BackendError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.record("wait_for_navigation");
        Ok(())
    }

    async fn query_links(&self, _selector: &str) -> Result<Vec<PageLink>, BackendError> {
        self.record("query_links");
        Ok(self.links.clone())
    }
}

/// Splits source returning a fixed body and counting calls.
pub struct MockSplits {
    pub body: String,
    pub calls: AtomicUsize,
    pub seen_activity: Mutex<Option<String>>,
}

impl MockSplits {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            calls: AtomicUsize::new(0),
            seen_activity: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SplitsSource for MockSplits {
    async fn fetch_splits(
        &self,
        session: &CapturedSession,
        activity_id: &str,
    ) -> Result<ActivitySplits, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(session.authorization, "Bearer eyJ.token");
        *self.seen_activity.lock().unwrap() = Some(activity_id.to_string());
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[derive(Default)]
pub struct SheetsState {
    pub existing: Mutex<HashSet<String>>,
    pub created: Mutex<Vec<String>>,
    pub writes: Mutex<Vec<(String, Vec<Vec<String>>)>>,
    pub fail_create: Mutex<Option<String>>,
    pub fail_write: bool,
}

impl SheetsState {
    pub fn with_existing(titles: &[&str]) -> Self {
        let state = Self::default();
        state
            .existing
            .lock()
            .unwrap()
            .extend(titles.iter().map(|t| t.to_string()));
        state
    }
}

/// In-memory spreadsheet.
#[derive(Clone, Default)]
pub struct MockSheets {
    pub state: Arc<SheetsState>,
}

#[async_trait]
impl SheetsApi for MockSheets {
    async fn add_sheet(&self, title: &str) -> Result<(), SheetsError> {
        if let Some(message) = self.state.fail_create.lock().unwrap().clone() {
            return Err(SheetsError::Api {
                status: 403,
                message,
            });
        }
        let mut existing = self.state.existing.lock().unwrap();
        if !existing.insert(title.to_string()) {
            return Err(SheetsError::AlreadyExists(title.to_string()));
        }
        self.state.created.lock().unwrap().push(title.to_string());
        Ok(())
    }

    async fn update_values(&self, range: &str, rows: &[Vec<String>]) -> Result<(), SheetsError> {
        if self.state.fail_write {
            return Err(SheetsError::Api {
                status: 500,
                message: "backend error".into(),
            });
        }
        self.state
            .writes
            .lock()
            .unwrap()
            .push((range.to_string(), rows.to_vec()));
        Ok(())
    }
}

pub struct MockConnector {
    pub sheets: MockSheets,
    pub connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(sheets: MockSheets) -> Self {
        Self {
            sheets,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl SheetsConnector for MockConnector {
    fn connect(&self, config: &SheetsConfig) -> Result<Box<dyn SheetsApi>, PublishError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        config.require()?;
        Ok(Box::new(self.sheets.clone()))
    }
}

pub fn sheets_config() -> SheetsConfig {
    SheetsConfig {
        service_account_key_base64: Some("e30=".into()),
        spreadsheet_id: Some("sheet-1".into()),
    }
}
