use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in the
/// file override the ones loaded from the environment.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3000
///
/// openai:
///   api_key: "sk-..."
///   model: "gpt-4o-realtime-preview-2024-10-01"
///   voice: "alloy"
///   audio_format: "g711_ulaw"
///   temperature: 0.8
///   instructions: "You are a helpful receptionist."
///
/// twilio:
///   account_sid: "AC..."
///   auth_token: "your-auth-token"
///   from_number: "+15550001111"
///   summary_notify_number: "+15552223333"
///
/// session:
///   hangup_drain_timeout_seconds: 15
///   summary_timeout_seconds: 20
///   notify_timeout_seconds: 10
///
/// recording:
///   dir: "/var/lib/call-bridge/recordings"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub openai: Option<OpenAIYaml>,
    pub twilio: Option<TwilioYaml>,
    pub session: Option<SessionYaml>,
    pub recording: Option<RecordingYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Dialogue service settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAIYaml {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    /// Endpoint override, mostly useful against a local mock
    pub url: Option<String>,
    /// "g711_ulaw", "g711_alaw" or "pcm16"
    pub audio_format: Option<String>,
    pub instructions: Option<String>,
    pub temperature: Option<f32>,
}

/// Twilio credentials and numbers from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TwilioYaml {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub summary_notify_number: Option<String>,
}

/// Call session deadlines from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub hangup_drain_timeout_seconds: Option<u64>,
    pub summary_timeout_seconds: Option<u64>,
    pub notify_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RecordingYaml {
    pub dir: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
