//! Configuration module for the call bridge server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use waav_call_bridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::core::realtime::{
    OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice, RealtimeConfig, SessionSettings,
};
use crate::core::session::notifier::TWILIO_API_BASE_URL;
use crate::core::session::prompts::{DEFAULT_INSTRUCTIONS, hang_up_tool};
use crate::core::session::{SessionOptions, SessionTimeouts, TwilioSmsConfig};

mod env;
mod merge;
mod validation;
mod yaml;

/// Server configuration
///
/// Contains everything needed to run the call bridge:
/// - Server settings (host, port)
/// - Dialogue service settings (OpenAI Realtime API key, model, voice, audio format)
/// - Twilio SMS credentials for call summaries
/// - Call session deadlines and the optional recording directory
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Dialogue service
    pub openai_api_key: Option<String>,
    pub openai_realtime_model: String,
    pub openai_realtime_voice: OpenAIRealtimeVoice,
    /// Endpoint override for the realtime WebSocket
    pub openai_realtime_url: Option<String>,
    /// Audio format used in both directions. `g711_ulaw` matches Twilio media streams.
    pub audio_format: OpenAIRealtimeAudioFormat,
    /// Assistant instructions. Falls back to the built-in receptionist prompt.
    pub assistant_instructions: Option<String>,
    pub temperature: Option<f32>,

    // Twilio SMS
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    /// Sender number for summary texts
    pub default_from_number: Option<String>,
    /// Summary recipient. When unset the summary is texted back to the caller.
    pub summary_notify_number: Option<String>,

    /// Where assistant audio recordings are written; disabled when `None`
    pub recording_dir: Option<PathBuf>,

    // Session deadlines
    pub hangup_drain_timeout_seconds: u64,
    pub summary_timeout_seconds: u64,
    pub notify_timeout_seconds: u64,
}

/// Zeroize secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut token) = self.twilio_auth_token {
            token.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// The `.env` file is loaded in `main.rs` at startup, so its values are already
    /// visible here as environment variables.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        validation::validate_openai_api_key(&self.openai_api_key)?;
        validation::validate_twilio_credentials(
            &self.twilio_account_sid,
            &self.twilio_auth_token,
            &self.default_from_number,
        )?;
        validation::validate_timeouts(&[
            (
                "HANGUP_DRAIN_TIMEOUT_SECONDS",
                self.hangup_drain_timeout_seconds,
            ),
            ("SUMMARY_TIMEOUT_SECONDS", self.summary_timeout_seconds),
            ("NOTIFY_TIMEOUT_SECONDS", self.notify_timeout_seconds),
        ])?;
        validation::validate_temperature(self.temperature)?;
        Ok(())
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether summaries can be sent by SMS.
    pub fn has_twilio_credentials(&self) -> bool {
        self.twilio_account_sid.is_some()
            && self.twilio_auth_token.is_some()
            && self.default_from_number.is_some()
    }

    /// Connection parameters for a new dialogue client.
    ///
    /// # Returns
    /// * `Result<RealtimeConfig, String>` - The parameters, or an error message when
    ///   no API key is configured
    pub fn realtime_config(&self) -> Result<RealtimeConfig, String> {
        let api_key = self
            .openai_api_key
            .clone()
            .ok_or_else(|| "OpenAI API key not configured in server environment".to_string())?;

        Ok(RealtimeConfig {
            api_key,
            model: self.openai_realtime_model.clone(),
            url: self.openai_realtime_url.clone(),
        })
    }

    /// Options applied to every call session.
    pub fn session_options(&self) -> SessionOptions {
        let settings = SessionSettings {
            instructions: self
                .assistant_instructions
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            voice: self.openai_realtime_voice,
            input_audio_format: self.audio_format,
            output_audio_format: self.audio_format,
            temperature: self.temperature.or(SessionSettings::default().temperature),
            tools: vec![hang_up_tool()],
            ..Default::default()
        };

        SessionOptions {
            settings,
            timeouts: SessionTimeouts {
                hangup_drain: Duration::from_secs(self.hangup_drain_timeout_seconds),
                summary: Duration::from_secs(self.summary_timeout_seconds),
                notify: Duration::from_secs(self.notify_timeout_seconds),
            },
            recording_dir: self.recording_dir.clone(),
            ..Default::default()
        }
    }

    /// Twilio SMS settings, when credentials are configured.
    pub fn twilio_sms_config(&self) -> Option<TwilioSmsConfig> {
        if !self.has_twilio_credentials() {
            return None;
        }

        Some(TwilioSmsConfig {
            account_sid: self.twilio_account_sid.clone()?,
            auth_token: self.twilio_auth_token.clone()?,
            from_number: self.default_from_number.clone()?,
            notify_number: self.summary_notify_number.clone(),
            api_base_url: TWILIO_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(self.notify_timeout_seconds),
        })
    }
}
