use crate::domain::ports::{CredentialProvider, Notifier};
use crate::utils::error::{MealError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use chrono::NaiveDate;
use reqwest::Client;
use std::sync::Arc;

pub const DEFAULT_GMAIL_API: &str = "https://gmail.googleapis.com/gmail/v1";
pub const DEFAULT_SUBJECT_TEMPLATE: &str = "[{date}] 연구소 식사 인원: {count} 명";

#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub sender: String,
    pub to: Vec<String>,
    pub subject_template: String,
}

impl EmailSettings {
    pub fn subject(&self, date: NaiveDate, count: u32) -> String {
        self.subject_template
            .replace("{date}", &date.format("%Y-%m-%d").to_string())
            .replace("{count}", &count.to_string())
    }
}

/// RFC 2047 encoded-word for non-ASCII header values.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// Minimal text/plain message; the count lives in the subject, the body is empty.
pub fn build_raw_message(settings: &EmailSettings, subject: &str) -> String {
    let message = format!(
        "To: {}\r\nFrom: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=\"utf-8\"\r\nContent-Transfer-Encoding: 7bit\r\n\r\n",
        settings.to.join(", "),
        settings.sender,
        encode_header(subject)
    );
    URL_SAFE.encode(message.as_bytes())
}

/// Sends the daily count through the Gmail `users.messages.send` API.
pub struct GmailNotifier {
    client: Client,
    api_base: String,
    credentials: Arc<dyn CredentialProvider>,
    settings: EmailSettings,
}

impl GmailNotifier {
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        settings: EmailSettings,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            credentials,
            settings,
        }
    }
}

#[async_trait]
impl Notifier for GmailNotifier {
    async fn send_count(&self, date: NaiveDate, count: u32) -> Result<()> {
        let subject = self.settings.subject(date, count);
        let raw = build_raw_message(&self.settings, &subject);

        let token = self
            .credentials
            .access_token()
            .await
            .map_err(|e| MealError::DeliveryError {
                message: e.to_string(),
            })?;

        let response = self
            .client
            .post(format!("{}/users/me/messages/send", self.api_base))
            .bearer_auth(token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await
            .map_err(|e| MealError::DeliveryError {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MealError::DeliveryError {
                message: format!("Gmail returned {}: {}", status, body),
            });
        }

        tracing::info!("📧 Email sent -> To: {} ({})", self.settings.to.join(", "), subject);
        Ok(())
    }
}
