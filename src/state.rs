use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::session::{LogNotifier, SummaryNotifier, TwilioSmsNotifier};
use crate::errors::AppResult;

/// Shared state for all handlers.
pub struct AppState {
    pub config: ServerConfig,
    /// Receives the summary of every finished call
    pub notifier: Arc<dyn SummaryNotifier>,
}

impl AppState {
    /// Build the state, choosing the Twilio SMS notifier when credentials are configured.
    pub fn new(config: ServerConfig) -> AppResult<Arc<Self>> {
        let notifier: Arc<dyn SummaryNotifier> = match config.twilio_sms_config() {
            Some(sms_config) => {
                info!(
                    from = %sms_config.from_number,
                    "Call summaries will be sent by SMS"
                );
                Arc::new(TwilioSmsNotifier::new(sms_config)?)
            }
            None => {
                warn!("Twilio credentials not configured, call summaries will only be logged");
                Arc::new(LogNotifier)
            }
        };

        Ok(Arc::new(Self { config, notifier }))
    }

    /// Build the state with an explicit notifier.
    pub fn with_notifier(config: ServerConfig, notifier: Arc<dyn SummaryNotifier>) -> Arc<Self> {
        Arc::new(Self { config, notifier })
    }
}
