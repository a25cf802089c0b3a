pub mod audio;
pub mod realtime;
pub mod session;
pub mod telephony;

// Re-export commonly used types for convenience
pub use audio::{AudioAccumulator, WAV_HEADER_SIZE, create_header, ulaw_to_pcm16};

pub use realtime::{
    BoxedDialogueClient, ConnectionState, DialogueClient, DialogueEvent, DialogueEventCallback,
    Modality, OpenAIRealtime, RealtimeConfig, RealtimeError, RealtimeResult, SessionSettings,
    ToolDefinition, ToolInvocation, create_dialogue_client,
};

pub use session::{
    CallOutcome, CallSession, CallSessionHandle, CallState, LogNotifier, NotifyError,
    SessionInput, SessionOptions, SessionTimeouts, SummaryNotifier, TelephonyRoute,
    TwilioSmsNotifier,
};

pub use telephony::{CallMetadata, InboundFrame, OutboundFrame, TelephonyError};
