//! Session acquisition.
//!
//! Logs in through a real browser while a [`CaptureLatch`] listens to the
//! request stream, then reads the activity list to find the newest activity
//! of the wanted type. The browser is closed on every exit path.

use crate::backend::{Backend, BackendError, PageLink};
use crate::capture::{CaptureError, CaptureLatch, CapturedSession};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const LOGIN_URL: &str = "https://sso.garmin.com/portal/sso/en-US/sign-in?clientId=GarminConnect&service=https%3A%2F%2Fconnect.garmin.com%2Fmodern";
pub const ACTIVITIES_URL: &str = "https://connect.garmin.com/modern/activities";

/// Background request issued right after login; it carries the bearer token.
pub const DEVICE_REQUEST_PATTERN: &str = "/device-service/deviceservice/user-device/";

pub const EMAIL_SELECTOR: &str = "input#email";
pub const PASSWORD_SELECTOR: &str = "input#password";
pub const SUBMIT_SELECTOR: &str = "button[type=submit]";
pub const ACTIVITY_LINK_SELECTOR: &str =
    r#"div[class^="ActivityList_activitiesListItems"] a[href*="/activity/"]"#;

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"********")
            .finish()
    }
}

/// Wait bounds for each step of the login flow.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub email_field_timeout: Duration,
    pub password_field_timeout: Duration,
    pub navigation_timeout: Duration,
    pub capture_timeout: Duration,
    pub activity_list_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            email_field_timeout: Duration::from_secs(15),
            password_field_timeout: Duration::from_secs(10),
            navigation_timeout: Duration::from_secs(60),
            capture_timeout: Duration::from_secs(30),
            activity_list_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcquiredSession {
    pub session: CapturedSession,
    pub activity_id: String,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Login field {selector} not found: {source}")]
    LoginFieldNotFound {
        selector: String,
        source: BackendError,
    },
    #[error("Login submit failed: {0}")]
    Login(BackendError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("Activity list did not render: {0}")]
    ActivityList(BackendError),
    #[error("Target activity \"{0}\" not found.")]
    ActivityNotFound(String),
    #[error(transparent)]
    Browser(#[from] BackendError),
}

/// Log in, capture the session headers and locate the target activity.
pub async fn acquire_session<B: Backend + ?Sized>(
    backend: &mut B,
    credentials: &Credentials,
    target_activity: &str,
    options: &SessionOptions,
) -> Result<AcquiredSession, SessionError> {
    info!("Launching browser...");
    let result = match backend.launch().await {
        Ok(()) => drive(&*backend, credentials, target_activity, options).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = &result {
        error!("Session acquisition failed: {}", e);
        if let Err(e) = backend.disable_interception().await {
            debug!("Ignoring interception cleanup error: {}", e);
        }
    }

    info!("Closing browser...");
    if let Err(e) = backend.close().await {
        warn!("Ignoring browser close error: {}", e);
    }

    result
}

async fn drive<B: Backend + ?Sized>(
    backend: &B,
    credentials: &Credentials,
    target_activity: &str,
    options: &SessionOptions,
) -> Result<AcquiredSession, SessionError> {
    let (latch, signal) = CaptureLatch::new(DEVICE_REQUEST_PATTERN);
    backend.enable_interception(Arc::new(latch)).await?;
    info!("Request interception enabled.");

    info!("Navigating to login page");
    let login_page = backend.navigate(LOGIN_URL).await?;
    debug!("Login page: {} ({})", login_page.title, login_page.url);

    info!("Entering credentials...");
    fill_field(
        backend,
        EMAIL_SELECTOR,
        &credentials.email,
        options.email_field_timeout,
    )
    .await?;
    fill_field(
        backend,
        PASSWORD_SELECTOR,
        &credentials.password,
        options.password_field_timeout,
    )
    .await?;

    info!("Submitting login & waiting for redirect and header capture...");
    let capture_timeout = options.capture_timeout;
    let (_, _, session) = tokio::try_join!(
        async {
            backend
                .wait_for_navigation(options.navigation_timeout)
                .await
                .map_err(SessionError::Login)
        },
        async { backend.click(SUBMIT_SELECTOR).await.map_err(SessionError::Login) },
        async move {
            signal
                .wait(capture_timeout)
                .await
                .map_err(SessionError::from)
        },
    )?;
    info!("Login complete and required headers captured.");

    backend.disable_interception().await?;
    info!("Request interception disabled.");

    info!("Navigating to activities list...");
    let list_page = backend.navigate(ACTIVITIES_URL).await?;
    debug!("Activities page: {} ({})", list_page.title, list_page.url);
    info!(
        "Waiting for activities list and searching for \"{}\"...",
        target_activity
    );
    backend
        .wait_for_selector(ACTIVITY_LINK_SELECTOR, options.activity_list_timeout)
        .await
        .map_err(SessionError::ActivityList)?;

    let links = backend.query_links(ACTIVITY_LINK_SELECTOR).await?;
    let activity_id = find_activity_id(&links, target_activity).ok_or_else(|| {
        error!("No \"{}\" activity found on the first page.", target_activity);
        SessionError::ActivityNotFound(target_activity.to_string())
    })?;
    info!("Found latest \"{}\" activity ID: {}", target_activity, activity_id);

    Ok(AcquiredSession {
        session,
        activity_id,
    })
}

async fn fill_field<B: Backend + ?Sized>(
    backend: &B,
    selector: &str,
    value: &str,
    timeout: Duration,
) -> Result<(), SessionError> {
    backend
        .wait_for_selector(selector, timeout)
        .await
        .map_err(|source| SessionError::LoginFieldNotFound {
            selector: selector.to_string(),
            source,
        })?;
    backend.type_text(selector, value).await?;
    Ok(())
}

/// Id of the first link whose text contains `target`, taken from the last
/// path segment of its href. Case-sensitive.
pub fn find_activity_id(links: &[PageLink], target: &str) -> Option<String> {
    let link = links.iter().find(|l| l.text.trim().contains(target))?;
    link.href
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(text: &str, href: &str) -> PageLink {
        PageLink {
            text: text.into(),
            href: href.into(),
        }
    }

    #[test]
    fn test_find_first_matching_activity() {
        let links = vec![
            link("Morning Run", "/modern/activity/100"),
            link(" Pool Swim ", "/modern/activity/200"),
            link("Pool Swim", "/modern/activity/300"),
        ];
        assert_eq!(find_activity_id(&links, "Pool Swim"), Some("200".into()));
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let links = vec![link("pool swim", "/modern/activity/200")];
        assert_eq!(find_activity_id(&links, "Pool Swim"), None);
    }

    #[test]
    fn test_empty_trailing_segment_is_not_an_id() {
        let links = vec![link("Pool Swim", "/modern/activity/")];
        assert_eq!(find_activity_id(&links, "Pool Swim"), None);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials {
            email: "me@example.com".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
