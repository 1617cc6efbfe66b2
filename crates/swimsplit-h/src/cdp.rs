use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use swimsplit_engine::config::BrowserOptions;
use swimsplit_engine::fetch::USER_AGENT;
use tokio::task::JoinHandle;

const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 800;

pub struct CdpClient {
    pub browser: Browser,
    pub handler_task: JoinHandle<()>,
    pub page: Page,
    user_data_dir: PathBuf,
    cleanup_user_data_dir: bool,
}

impl CdpClient {
    pub async fn launch(
        options: &BrowserOptions,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let mut config_builder = BrowserConfig::builder()
            .no_sandbox() // Often needed in docker/CI/restricted envs
            .window_size(WINDOW_WIDTH, WINDOW_HEIGHT);
        let (user_data_dir, cleanup_user_data_dir) =
            resolve_user_data_dir(options.user_data_dir.as_ref())?;
        config_builder = config_builder.user_data_dir(&user_data_dir);

        if options.visible {
            tracing::info!("Launching browser in visible mode");
            config_builder = config_builder.with_head();
        } else {
            tracing::info!("Launching browser in headless mode");
        }

        if let Some(chrome_bin) = &options.chrome_bin {
            tracing::info!("Using custom Chrome binary: {}", chrome_bin.display());
            config_builder = config_builder.chrome_executable(chrome_bin);
        }

        let (browser, mut handler) = Browser::launch(
            config_builder
                .build()
                .map_err(|e| format!("Failed to build browser config: {}", e))?,
        )
        .await
        .map_err(|e| format!("Failed to launch browser: {}", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    tracing::debug!("Browser handler error (ignoring): {}", e);
                    continue;
                }
            }
            tracing::info!("Browser handler task ended");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| format!("Failed to create page: {}", e))?;

        page.set_user_agent(SetUserAgentOverrideParams::new(USER_AGENT))
            .await
            .map_err(|e| format!("Failed to set user agent: {}", e))?;

        forward_console(&page)
            .await
            .map_err(|e| format!("Failed to subscribe to console events: {}", e))?;
        accept_dialogs(&page)
            .await
            .map_err(|e| format!("Failed to subscribe to dialog events: {}", e))?;

        Ok(Self {
            browser,
            handler_task,
            page,
            user_data_dir,
            cleanup_user_data_dir,
        })
    }

    pub async fn close(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let closed = self
            .browser
            .close()
            .await
            .map_err(|e| format!("Error closing browser: {}", e));
        if closed.is_ok() {
            self.handler_task
                .await
                .map_err(|e| format!("Error awaiting handler: {}", e))?;
        } else {
            self.handler_task.abort();
        }

        if self.cleanup_user_data_dir {
            if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
                tracing::debug!(
                    "Failed to clean up user-data-dir {}: {}",
                    self.user_data_dir.display(),
                    e
                );
            }
        }

        closed?;
        Ok(())
    }
}

/// Mirror page console output into the log at debug level.
async fn forward_console(page: &Page) -> Result<(), CdpError> {
    let mut events = page.event_listener::<EventConsoleApiCalled>().await?;
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let text = event
                .args
                .iter()
                .filter_map(|arg| arg.description.as_deref())
                .collect::<Vec<_>>()
                .join(" ");
            tracing::debug!("Browser Console [{:?}]: {}", event.r#type, text);
        }
    });
    Ok(())
}

/// A stray alert on the sign-in page would otherwise stall the login flow.
async fn accept_dialogs(page: &Page) -> Result<(), CdpError> {
    let mut events = page.event_listener::<EventJavascriptDialogOpening>().await?;
    let page = page.clone();
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            tracing::info!("Accepting JavaScript dialog: {}", event.message);
            if let Err(e) = page.execute(HandleJavaScriptDialogParams::new(true)).await {
                tracing::error!("Failed to accept dialog: {}", e);
            }
        }
    });
    Ok(())
}

/// Configured profile directory, or a fresh one under the temp dir that is
/// removed again on close.
fn resolve_user_data_dir(
    configured: Option<&PathBuf>,
) -> Result<(PathBuf, bool), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(path) = configured {
        std::fs::create_dir_all(path)?;
        tracing::info!("Using user data dir: {}", path.display());
        return Ok((path.clone(), false));
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("System clock error: {}", e))?
        .as_nanos();
    let unique = format!("swimsplit-chromium-profile-{}-{}", std::process::id(), nanos);
    let path = std::env::temp_dir().join(unique);
    std::fs::create_dir_all(&path)?;
    tracing::info!("Using isolated user data dir: {}", path.display());
    Ok((path, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_user_data_dir_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile");
        let (resolved, cleanup) = resolve_user_data_dir(Some(&path)).unwrap();
        assert_eq!(resolved, path);
        assert!(!cleanup);
        assert!(path.is_dir());
    }

    #[test]
    fn test_isolated_user_data_dir_is_marked_for_cleanup() {
        let (resolved, cleanup) = resolve_user_data_dir(None).unwrap();
        assert!(cleanup);
        assert!(resolved.is_dir());
        std::fs::remove_dir_all(resolved).ok();
    }
}
