//! Google Sheets v4 client authenticated with a service account.
//!
//! The service account key is exchanged for a bearer token with the JWT
//! bearer grant on first use; the token is reused for the rest of the run.

use crate::config::{ConfigError, SheetsConfig};
use crate::publish::{PublishError, SheetsApi, SheetsConnector, SheetsError};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use url::Url;

pub const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Decode base64 key material. The decoded text may be the key object or
    /// a JSON string holding the key object.
    pub fn from_base64(encoded: &str) -> Result<Self, ConfigError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ConfigError::InvalidKey(format!("not base64: {}", e)))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| ConfigError::InvalidKey(format!("not UTF-8: {}", e)))?;

        let mut value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| ConfigError::InvalidKey(format!("not JSON: {}", e)))?;
        if let serde_json::Value::String(inner) = &value {
            value = serde_json::from_str(inner)
                .map_err(|e| ConfigError::InvalidKey(format!("not JSON: {}", e)))?;
        }
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidKey(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: ApiErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorReason>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorReason {
    #[serde(default)]
    reason: String,
}

/// Map a failed Sheets response to an error, recognising tab-name collisions.
pub fn classify_error(status: u16, body: &str, title: Option<&str>) -> SheetsError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let detail = parsed.error;
    let duplicate = detail.message.contains("already exists")
        || detail.errors.iter().any(|e| e.reason == "duplicate");

    match title {
        Some(title) if duplicate => SheetsError::AlreadyExists(title.to_string()),
        _ => SheetsError::Api {
            status,
            message: if detail.message.is_empty() {
                body.chars().take(500).collect()
            } else {
                detail.message
            },
        },
    }
}

pub struct GoogleSheetsClient {
    http: reqwest::Client,
    key: ServiceAccountKey,
    spreadsheet_id: String,
    base_url: String,
    token: OnceCell<String>,
}

impl GoogleSheetsClient {
    pub fn new(key: ServiceAccountKey, spreadsheet_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            key,
            spreadsheet_id: spreadsheet_id.into(),
            base_url: SHEETS_BASE_URL.to_string(),
            token: OnceCell::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn signed_assertion(&self) -> Result<String, SheetsError> {
        let iat = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat,
            exp: iat + TOKEN_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| SheetsError::Auth(format!("invalid private key: {}", e)))?;
        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| SheetsError::Auth(format!("failed to sign assertion: {}", e)))
    }

    async fn access_token(&self) -> Result<&str, SheetsError> {
        let token = self
            .token
            .get_or_try_init(|| async {
                debug!("Requesting access token for {}", self.key.client_email);
                let assertion = self.signed_assertion()?;
                let response = self
                    .http
                    .post(&self.key.token_uri)
                    .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(SheetsError::Auth(format!(
                        "token endpoint returned {}: {}",
                        status, body
                    )));
                }
                let token: TokenResponse = response.json().await?;
                Ok(token.access_token)
            })
            .await?;
        Ok(token.as_str())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SheetsError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| SheetsError::Url(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::Url(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl SheetsApi for GoogleSheetsClient {
    async fn add_sheet(&self, title: &str) -> Result<(), SheetsError> {
        let token = self.access_token().await?;
        let batch_update = format!("{}:batchUpdate", self.spreadsheet_id);
        let url = self.endpoint(&["v4", "spreadsheets", &batch_update])?;
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });

        let response = self.http.post(url).bearer_auth(token).json(&body).send().await?;
        let status = response.status();
        if status.is_success() {
            info!("Created sheet tab \"{}\"", title);
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(classify_error(status.as_u16(), &text, Some(title)))
    }

    async fn update_values(&self, range: &str, rows: &[Vec<String>]) -> Result<(), SheetsError> {
        let token = self.access_token().await?;
        let mut url = self.endpoint(&["v4", "spreadsheets", &self.spreadsheet_id, "values", range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let response = self
            .http
            .put(url)
            .bearer_auth(token)
            .json(&json!({ "range": range, "values": rows }))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(classify_error(status.as_u16(), &text, None))
    }
}

/// Connects to Google Sheets using `SERVICE_ACCOUNT_KEY_BASE64` and
/// `GOOGLE_SHEET_ID`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoogleSheetsConnector;

impl SheetsConnector for GoogleSheetsConnector {
    fn connect(&self, config: &SheetsConfig) -> Result<Box<dyn SheetsApi>, PublishError> {
        let (encoded_key, spreadsheet_id) = config.require()?;
        let key = ServiceAccountKey::from_base64(encoded_key)?;
        Ok(Box::new(GoogleSheetsClient::new(key, spreadsheet_id)))
    }
}
