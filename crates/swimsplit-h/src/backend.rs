use crate::cdp::CdpClient;
use crate::intercept::Interception;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use swimsplit_engine::backend::{
    Backend, BackendError, NavigationResult, PageLink, RequestObserver,
};
use swimsplit_engine::config::BrowserOptions;
use tokio::sync::Mutex;
use tracing::{debug, info};

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct HeadlessBackend {
    client: Option<CdpClient>,
    options: BrowserOptions,
    interception: Mutex<Option<Interception>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::with_options(BrowserOptions::default())
    }

    pub fn with_options(options: BrowserOptions) -> Self {
        Self {
            client: None,
            options,
            interception: Mutex::new(None),
        }
    }

    fn page(&self) -> Result<&chromiumoxide::Page, BackendError> {
        self.client
            .as_ref()
            .map(|client| &client.page)
            .ok_or(BackendError::NotReady)
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    async fn get_navigation_result(
        page: &chromiumoxide::Page,
    ) -> Result<NavigationResult, BackendError> {
        let title = page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let url = page
            .url()
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(NavigationResult { url, title })
    }
}

#[async_trait]
impl Backend for HeadlessBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        info!("Launching Headless Backend (Chromium)...");
        let client = CdpClient::launch(&self.options)
            .await
            .map_err(|e| BackendError::Other(e.to_string()))?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        if let Some(interception) = self.interception.get_mut().take() {
            interception.disable().await.ok();
        }
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| BackendError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn enable_interception(
        &self,
        observer: Arc<dyn RequestObserver>,
    ) -> Result<(), BackendError> {
        let page = self.page()?;
        let mut slot = self.interception.lock().await;
        if slot.is_some() {
            return Err(BackendError::Interception(
                "interception already enabled".into(),
            ));
        }
        *slot = Some(Interception::enable(page, observer).await?);
        Ok(())
    }

    async fn disable_interception(&self) -> Result<(), BackendError> {
        match self.interception.lock().await.take() {
            Some(interception) => interception.disable().await,
            None => Ok(()),
        }
    }

    async fn navigate(&self, url: &str) -> Result<NavigationResult, BackendError> {
        let page = self.page()?;

        info!("Navigating to: {}", url);
        page.goto(url)
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?;

        Self::get_navigation_result(page).await
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BackendError> {
        let page = self.page()?;
        let poll = async {
            loop {
                if page.find_element(selector).await.is_ok() {
                    return;
                }
                tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| BackendError::Timeout {
                operation: format!("waiting for selector {}", selector),
            })
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BackendError> {
        let page = self.page()?;
        let element = page
            .find_element(selector)
            .await
            .map_err(|_| BackendError::ElementNotFound {
                selector: selector.to_string(),
            })?;
        element
            .click()
            .await
            .map_err(|e| BackendError::Other(format!("Focus failed: {}", e)))?;
        element
            .type_str(text)
            .await
            .map_err(|e| BackendError::Other(format!("Typing failed: {}", e)))?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), BackendError> {
        let page = self.page()?;
        debug!("Clicking {}", selector);
        let element = page
            .find_element(selector)
            .await
            .map_err(|_| BackendError::ElementNotFound {
                selector: selector.to_string(),
            })?;
        element
            .click()
            .await
            .map_err(|e| BackendError::Other(format!("Click failed: {}", e)))?;
        Ok(())
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), BackendError> {
        let page = self.page()?;
        tokio::time::timeout(timeout, page.wait_for_navigation())
            .await
            .map_err(|_| BackendError::Timeout {
                operation: "waiting for navigation".into(),
            })?
            .map_err(|e| BackendError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn query_links(&self, selector: &str) -> Result<Vec<PageLink>, BackendError> {
        let page = self.page()?;
        let script = links_script(selector)?;
        page.evaluate(script)
            .await
            .map_err(|e| BackendError::Script(e.to_string()))?
            .into_value::<Vec<PageLink>>()
            .map_err(|e| BackendError::Script(e.to_string()))
    }
}

fn links_script(selector: &str) -> Result<String, BackendError> {
    let selector =
        serde_json::to_string(selector).map_err(|e| BackendError::Script(e.to_string()))?;
    Ok(format!(
        "Array.from(document.querySelectorAll({selector})).map(a => ({{ \
         text: (a.textContent || '').trim(), \
         href: a.getAttribute('href') || '' }}))"
    ))
}
