//! Post-call summary notification.
//!
//! [`SummaryNotifier`] is injected into every call session. The production
//! implementation sends an SMS through the Twilio Messages API;
//! [`LogNotifier`] is used when Twilio credentials are not configured.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use zeroize::Zeroize;

use super::prompts::summary_message;

/// Twilio REST API base URL.
pub const TWILIO_API_BASE_URL: &str = "https://api.twilio.com";

/// Errors from sending a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("Twilio API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid notifier configuration: {0}")]
    InvalidConfiguration(String),
}

/// Receives the summary of a finished call.
#[async_trait]
pub trait SummaryNotifier: Send + Sync {
    /// Whether a summary for a call from `caller` has somewhere to go.
    /// Sessions skip the summary request when this is false.
    fn has_recipient(&self, caller: Option<&str>) -> bool {
        caller.is_some()
    }

    /// Deliver `summary` for the call placed by `caller`, when known.
    async fn send_summary(&self, caller: Option<&str>, summary: &str) -> Result<(), NotifyError>;
}

/// Twilio SMS settings.
#[derive(Clone)]
pub struct TwilioSmsConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number
    pub from_number: String,
    /// Recipient. When unset the summary is texted to the caller.
    pub notify_number: Option<String>,
    /// API base URL, overridable for testing
    pub api_base_url: String,
    pub request_timeout: Duration,
}

impl fmt::Debug for TwilioSmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioSmsConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .field("notify_number", &self.notify_number)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl Drop for TwilioSmsConfig {
    fn drop(&mut self) {
        self.auth_token.zeroize();
    }
}

/// Sends call summaries as SMS through the Twilio Messages API.
pub struct TwilioSmsNotifier {
    client: reqwest::Client,
    config: TwilioSmsConfig,
}

impl TwilioSmsNotifier {
    pub fn new(config: TwilioSmsConfig) -> Result<Self, NotifyError> {
        if config.account_sid.is_empty() || config.auth_token.is_empty() {
            return Err(NotifyError::InvalidConfiguration(
                "Twilio account SID and auth token are required".to_string(),
            ));
        }
        if config.from_number.is_empty() {
            return Err(NotifyError::InvalidConfiguration(
                "a sender number is required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    /// Send an SMS.
    pub async fn send_sms(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", to),
                ("From", self.config.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(%to, "Summary SMS sent");
        Ok(())
    }
}

#[async_trait]
impl SummaryNotifier for TwilioSmsNotifier {
    fn has_recipient(&self, caller: Option<&str>) -> bool {
        self.config.notify_number.is_some() || caller.is_some()
    }

    async fn send_summary(&self, caller: Option<&str>, summary: &str) -> Result<(), NotifyError> {
        let Some(to) = self.config.notify_number.as_deref().or(caller) else {
            return Err(NotifyError::InvalidConfiguration(
                "no summary recipient: caller unknown and no notify number set".to_string(),
            ));
        };
        self.send_sms(to, &summary_message(caller, summary)).await
    }
}

/// Writes summaries to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl SummaryNotifier for LogNotifier {
    async fn send_summary(&self, caller: Option<&str>, summary: &str) -> Result<(), NotifyError> {
        tracing::info!(caller = caller.unwrap_or("-"), %summary, "Call summary");
        Ok(())
    }
}
