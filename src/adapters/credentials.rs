use crate::domain::ports::CredentialProvider;
use crate::utils::error::{MealError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;

/// 提前刷新，避免請求途中過期
const REFRESH_MARGIN_SECONDS: i64 = 60;
/// Google caps service-account assertions at one hour.
const ASSERTION_LIFETIME_SECONDS: i64 = 3600;
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

pub const DEFAULT_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/calendar.readonly",
    "https://www.googleapis.com/auth/gmail.send",
];

/// A pre-issued bearer token, e.g. injected through `${GOOGLE_ACCESS_TOKEN}`.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        if self.token.trim().is_empty() {
            return Err(MealError::CredentialError {
                message: "access token is empty".to_string(),
            });
        }
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(REFRESH_MARGIN_SECONDS) < expires_at,
            None => true,
        }
    }
}

/// OAuth2 refresh-token grant. The consent flow that produced the refresh
/// token happens elsewhere.
pub struct RefreshTokenProvider {
    client: Client,
    token_endpoint: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    cached: Mutex<Option<CachedToken>>,
}

impl RefreshTokenProvider {
    pub fn new(
        client: Client,
        token_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_endpoint: token_endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            cached: Mutex::new(None),
        }
    }

    async fn refresh(&self) -> Result<CachedToken> {
        tracing::debug!("Refreshing access token at {}", self.token_endpoint);
        request_token(
            &self.client,
            &self.token_endpoint,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
            ],
        )
        .await
    }
}

/// POSTs a token grant and turns the reply into a cache entry.
async fn request_token(client: &Client, endpoint: &str, form: &[(&str, &str)]) -> Result<CachedToken> {
    let response = client.post(endpoint).form(form).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(MealError::CredentialError {
            message: format!("token request returned {}: {}", status, body),
        });
    }

    let token: TokenResponse = response.json().await?;
    Ok(CachedToken {
        value: token.access_token,
        expires_at: token
            .expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| Utc::now() + Duration::seconds(secs)),
    })
}

#[async_trait]
impl CredentialProvider for RefreshTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.value.clone());
        }

        let token = self.refresh().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

/// The fields of a Google service-account JSON key that the JWT grant needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| MealError::CredentialError {
            message: format!("invalid service account key: {}", e),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| MealError::CredentialError {
            message: format!("cannot read service account key {}: {}", path.display(), e),
        })?;
        Self::from_json(&content)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
    /// 代理寄信的使用者
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
}

/// Service-account JWT bearer grant (RS256), optionally impersonating
/// `subject` through domain-wide delegation.
pub struct ServiceAccountProvider {
    client: Client,
    token_endpoint: String,
    client_email: String,
    subject: Option<String>,
    scopes: Vec<String>,
    signing_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountProvider {
    /// Fails with `CredentialError` when the private key is not RSA PEM.
    pub fn new(
        client: Client,
        key: ServiceAccountKey,
        subject: Option<String>,
        scopes: Vec<String>,
        token_endpoint: impl Into<String>,
    ) -> Result<Self> {
        // 環境變數裡的金鑰常把換行寫成字面的 \n
        let pem = key.private_key.replace("\\n", "\n");
        let signing_key =
            EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| MealError::CredentialError {
                message: format!("invalid service account private key: {}", e),
            })?;

        Ok(Self {
            client,
            token_endpoint: token_endpoint.into(),
            client_email: key.client_email,
            subject,
            scopes,
            signing_key,
            cached: Mutex::new(None),
        })
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: self.scopes.join(" "),
            aud: self.token_endpoint.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECONDS,
            sub: self.subject.clone(),
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key).map_err(|e| {
            MealError::CredentialError {
                message: format!("signing service account assertion failed: {}", e),
            }
        })
    }
}

#[async_trait]
impl CredentialProvider for ServiceAccountProvider {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.value.clone());
        }

        tracing::debug!(
            "🔑 Requesting service account token for {} (subject: {:?})",
            self.client_email,
            self.subject
        );
        let assertion = self.assertion(Utc::now())?;
        let token = request_token(
            &self.client,
            &self.token_endpoint,
            &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
        )
        .await?;

        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}
