//! Merging YAML overrides on top of the environment configuration.

use std::path::PathBuf;

use crate::core::realtime::{OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice};

use super::ServerConfig;
use super::env::load_from_env;
use super::yaml::YamlConfig;

/// Load the environment configuration and apply any YAML values over it.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
    }

    if let Some(openai) = yaml.openai {
        if openai.api_key.is_some() {
            config.openai_api_key = openai.api_key;
        }
        if let Some(model) = openai.model {
            config.openai_realtime_model = model;
        }
        if let Some(voice) = openai.voice {
            config.openai_realtime_voice = OpenAIRealtimeVoice::from_str_or_default(&voice);
        }
        if openai.url.is_some() {
            config.openai_realtime_url = openai.url;
        }
        if let Some(format) = openai.audio_format {
            config.audio_format = OpenAIRealtimeAudioFormat::from_str_or_default(&format);
        }
        if openai.instructions.is_some() {
            config.assistant_instructions = openai.instructions;
        }
        if openai.temperature.is_some() {
            config.temperature = openai.temperature;
        }
    }

    if let Some(twilio) = yaml.twilio {
        if twilio.account_sid.is_some() {
            config.twilio_account_sid = twilio.account_sid;
        }
        if twilio.auth_token.is_some() {
            config.twilio_auth_token = twilio.auth_token;
        }
        if twilio.from_number.is_some() {
            config.default_from_number = twilio.from_number;
        }
        if twilio.summary_notify_number.is_some() {
            config.summary_notify_number = twilio.summary_notify_number;
        }
    }

    if let Some(session) = yaml.session {
        if let Some(seconds) = session.hangup_drain_timeout_seconds {
            config.hangup_drain_timeout_seconds = seconds;
        }
        if let Some(seconds) = session.summary_timeout_seconds {
            config.summary_timeout_seconds = seconds;
        }
        if let Some(seconds) = session.notify_timeout_seconds {
            config.notify_timeout_seconds = seconds;
        }
    }

    if let Some(dir) = yaml.recording.and_then(|recording| recording.dir) {
        config.recording_dir = Some(PathBuf::from(dir));
    }

    Ok(config)
}
