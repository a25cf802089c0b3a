//! Environment variable loading.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::realtime::{OpenAIRealtimeAudioFormat, OpenAIRealtimeModel, OpenAIRealtimeVoice};

use super::ServerConfig;

pub(super) const DEFAULT_HOST: &str = "0.0.0.0";
pub(super) const DEFAULT_PORT: u16 = 3000;
pub(super) const DEFAULT_HANGUP_DRAIN_TIMEOUT_SECONDS: u64 = 15;
pub(super) const DEFAULT_SUMMARY_TIMEOUT_SECONDS: u64 = 20;
pub(super) const DEFAULT_NOTIFY_TIMEOUT_SECONDS: u64 = 10;

/// Read a variable, treating an empty value as unset.
fn env_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T>(key: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {key} value '{raw}': {e}").into()),
        None => Ok(None),
    }
}

/// Build a configuration from environment variables and defaults.
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    Ok(ServerConfig {
        host: env_var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: parse_env("PORT")?.unwrap_or(DEFAULT_PORT),

        openai_api_key: env_var("OPENAI_API_KEY"),
        openai_realtime_model: env_var("OPENAI_REALTIME_MODEL")
            .unwrap_or_else(|| OpenAIRealtimeModel::default().as_str().to_string()),
        openai_realtime_voice: env_var("OPENAI_REALTIME_VOICE")
            .map(|v| OpenAIRealtimeVoice::from_str_or_default(&v))
            .unwrap_or_default(),
        openai_realtime_url: env_var("OPENAI_REALTIME_URL"),
        audio_format: env_var("AUDIO_FORMAT")
            .map(|v| OpenAIRealtimeAudioFormat::from_str_or_default(&v))
            .unwrap_or_default(),
        assistant_instructions: env_var("ASSISTANT_INSTRUCTIONS"),
        temperature: parse_env("TEMPERATURE")?,

        twilio_account_sid: env_var("TWILIO_ACCOUNT_SID"),
        twilio_auth_token: env_var("TWILIO_AUTH_TOKEN"),
        default_from_number: env_var("DEFAULT_FROM_NUMBER"),
        summary_notify_number: env_var("SUMMARY_NOTIFY_NUMBER"),

        recording_dir: env_var("RECORDING_DIR").map(PathBuf::from),

        hangup_drain_timeout_seconds: parse_env("HANGUP_DRAIN_TIMEOUT_SECONDS")?
            .unwrap_or(DEFAULT_HANGUP_DRAIN_TIMEOUT_SECONDS),
        summary_timeout_seconds: parse_env("SUMMARY_TIMEOUT_SECONDS")?
            .unwrap_or(DEFAULT_SUMMARY_TIMEOUT_SECONDS),
        notify_timeout_seconds: parse_env("NOTIFY_TIMEOUT_SECONDS")?
            .unwrap_or(DEFAULT_NOTIFY_TIMEOUT_SECONDS),
    })
}
