//! Call session controller.
//!
//! One [`CallSession`] runs per phone call. It owns the dialogue client and
//! the outbound half of the telephony socket, and processes every input
//! (telephony frames, telephony close, dialogue events) from a single
//! channel so that state transitions never race.
//!
//! Bounded waits (farewell playback, summary arrival) are a deadline branch
//! in the event loop; when a deadline passes the session forces the next
//! transition and logs a fault.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::prelude::*;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, trace, warn};

use super::notifier::SummaryNotifier;
use super::prompts::{GREETING_PROMPT, SUMMARY_PROMPT};
use super::state::{CallState, DrainReason};
use crate::core::audio::{AudioAccumulator, ulaw_to_pcm16};
use crate::core::realtime::{
    BoxedDialogueClient, DialogueEvent, Modality, OpenAIRealtimeAudioFormat, RealtimeResult,
    SessionSettings, ToolInvocation,
};
use crate::core::telephony::{CallMetadata, InboundFrame, OutboundFrame, encode_frame};

/// Everything a call session reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Telephony(InboundFrame),
    /// The telephony socket closed or errored.
    TelephonyClosed,
    Dialogue(DialogueEvent),
}

/// Messages for the telephony socket writer.
#[derive(Debug, Clone, PartialEq)]
pub enum TelephonyRoute {
    /// A serialized media stream frame
    Outgoing(String),
    Close,
}

/// Deadlines for the bounded waits.
#[derive(Debug, Clone, Copy)]
pub struct SessionTimeouts {
    /// How long to wait for the farewell to finish playing after a hang-up
    pub hangup_drain: Duration,
    /// How long to wait for the summary text
    pub summary: Duration,
    /// Upper bound on the notification call
    pub notify: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            hangup_drain: Duration::from_secs(15),
            summary: Duration::from_secs(20),
            notify: Duration::from_secs(10),
        }
    }
}

/// Per-session configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub settings: SessionSettings,
    pub greeting_prompt: String,
    pub summary_prompt: String,
    pub timeouts: SessionTimeouts,
    /// Directory for the assistant audio recording; disabled when `None`.
    pub recording_dir: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            settings: SessionSettings::default(),
            greeting_prompt: GREETING_PROMPT.to_string(),
            summary_prompt: SUMMARY_PROMPT.to_string(),
            timeouts: SessionTimeouts::default(),
            recording_dir: None,
        }
    }
}

/// What a finished session leaves behind.
#[derive(Debug, Clone, Default)]
pub struct CallOutcome {
    pub metadata: Option<CallMetadata>,
    pub summary: Option<String>,
    pub recording: Option<PathBuf>,
    /// Number of forced transitions caused by an expired deadline.
    pub faults: u32,
}

/// Handle to a spawned call session.
///
/// Inputs are queued without bound, so neither the telephony reader nor the
/// dialogue connection ever waits on the session. The session itself only
/// performs bounded waits, which keeps the queue draining.
pub struct CallSessionHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
    task: JoinHandle<CallOutcome>,
}

impl CallSessionHandle {
    /// Sender for telephony inputs.
    pub fn inputs(&self) -> mpsc::UnboundedSender<SessionInput> {
        self.inputs.clone()
    }

    /// Wait for the session to finish.
    pub async fn join(self) -> Result<CallOutcome, tokio::task::JoinError> {
        drop(self.inputs);
        self.task.await
    }
}

/// State of one phone call.
pub struct CallSession {
    dialogue: BoxedDialogueClient,
    telephony: mpsc::Sender<TelephonyRoute>,
    notifier: Arc<dyn SummaryNotifier>,
    options: SessionOptions,

    state: CallState,
    metadata: Option<CallMetadata>,
    ai_speaking: bool,
    /// Marks sent to telephony and not yet echoed back
    pending_marks: usize,
    /// Audio forwarded since the last mark
    unmarked_audio: bool,
    awaiting_summary: bool,
    dialogue_opened: bool,
    dialogue_closed: bool,
    telephony_closed: bool,
    deadline: Option<Instant>,
    recording: Option<AudioAccumulator>,
    outcome: CallOutcome,
}

impl CallSession {
    pub fn new(
        dialogue: BoxedDialogueClient,
        telephony: mpsc::Sender<TelephonyRoute>,
        notifier: Arc<dyn SummaryNotifier>,
        options: SessionOptions,
    ) -> Self {
        let recording = options.recording_dir.as_ref().map(|_| AudioAccumulator::new());
        Self {
            dialogue,
            telephony,
            notifier,
            options,
            state: CallState::Connecting,
            metadata: None,
            ai_speaking: false,
            pending_marks: 0,
            unmarked_audio: false,
            awaiting_summary: false,
            dialogue_opened: false,
            dialogue_closed: false,
            telephony_closed: false,
            deadline: None,
            recording,
            outcome: CallOutcome::default(),
        }
    }

    /// Wire the dialogue client into a fresh input channel and run the
    /// session on its own task. The dialogue connection starts opening
    /// immediately.
    pub fn spawn(mut self) -> CallSessionHandle {
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();

        let dialogue_tx = inputs_tx.clone();
        let registered = self.dialogue.on_event(Arc::new(move |event: DialogueEvent| {
            let tx = dialogue_tx.clone();
            Box::pin(async move {
                let _ = tx.send(SessionInput::Dialogue(event));
            })
        }));
        if let Err(e) = registered {
            error!("Failed to register dialogue callback: {}", e);
        }

        let task = tokio::spawn(self.run(inputs_rx));
        CallSessionHandle {
            inputs: inputs_tx,
            task,
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// Run the event loop until the session is closed.
    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<SessionInput>) -> CallOutcome {
        if let Err(e) = self.dialogue.connect().await {
            error!("Failed to start dialogue connection: {}", e);
            self.fail().await;
        }

        while !self.state.is_closed() {
            let deadline = self.deadline;
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(input) => self.handle_input(input).await,
                    None => {
                        debug!("Session inputs exhausted");
                        self.finish().await;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_deadline().await;
                }
            }
        }

        info!(
            stream_sid = self.stream_sid().unwrap_or("-"),
            faults = self.outcome.faults,
            "Call session ended"
        );
        self.outcome.metadata = self.metadata.take();
        self.outcome
    }

    async fn handle_input(&mut self, input: SessionInput) {
        match input {
            SessionInput::Telephony(frame) => self.on_telephony_frame(frame).await,
            SessionInput::TelephonyClosed => self.on_telephony_closed().await,
            SessionInput::Dialogue(event) => self.on_dialogue_event(event).await,
        }
    }

    // -------------------------------------------------------------------------
    // Telephony side
    // -------------------------------------------------------------------------

    async fn on_telephony_frame(&mut self, frame: InboundFrame) {
        match frame {
            InboundFrame::Start(metadata) => {
                if let Some(existing) = &self.metadata {
                    warn!(
                        stream_sid = %existing.stream_sid,
                        "Ignoring repeated stream start"
                    );
                    return;
                }
                info!(
                    stream_sid = %metadata.stream_sid,
                    call_sid = %metadata.call_sid,
                    caller = metadata.caller.as_deref().unwrap_or("-"),
                    "Incoming stream has started"
                );
                self.metadata = Some(metadata);
            }
            InboundFrame::Media { payload } => {
                if !self.state.forwards_caller_audio() {
                    trace!(state = %self.state, "Dropping caller audio");
                    return;
                }
                if let Err(e) = self.dialogue.append_audio(&payload).await {
                    warn!("Failed to forward caller audio: {}", e);
                }
            }
            InboundFrame::Mark { name } => {
                debug!(mark = %name, "Assistant audio finished playing");
                self.pending_marks = self.pending_marks.saturating_sub(1);
                self.ai_speaking = self.pending_marks > 0 || self.unmarked_audio;
                if !self.ai_speaking && self.state == CallState::Draining(DrainReason::Hangup) {
                    self.complete_hangup().await;
                }
            }
            InboundFrame::Stop => {
                info!("Media stream stopped");
                self.on_telephony_closed().await;
            }
        }
    }

    async fn on_telephony_closed(&mut self) {
        if self.telephony_closed {
            return;
        }
        self.telephony_closed = true;
        info!(state = %self.state, "Telephony connection closed");

        match self.state {
            CallState::Connecting => self.finish().await,
            CallState::Active | CallState::Draining(DrainReason::Hangup) => {
                self.begin_summary().await;
            }
            CallState::Draining(DrainReason::Summary) | CallState::Closed => {}
        }
    }

    async fn send_telephony(&mut self, frame: OutboundFrame) -> bool {
        if self.telephony_closed {
            return false;
        }
        let stream_sid = self.metadata.as_ref().map(|m| m.stream_sid.as_str());
        let json = match encode_frame(stream_sid, frame) {
            Ok(json) => json,
            Err(e) => {
                warn!("Dropping outbound telephony frame: {}", e);
                return false;
            }
        };
        match self.telephony.try_send(TelephonyRoute::Outgoing(json)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Telephony writer backed up, dropping outbound frame");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Telephony writer gone");
                false
            }
        }
    }

    async fn close_telephony(&mut self) {
        if self.telephony_closed {
            return;
        }
        self.telephony_closed = true;
        // A full queue means the writer is stalled; it closes the socket
        // anyway once the session drops its sender.
        if self.telephony.try_send(TelephonyRoute::Close).is_err() {
            debug!("Telephony close not queued");
        }
    }

    // -------------------------------------------------------------------------
    // Dialogue side
    // -------------------------------------------------------------------------

    async fn on_dialogue_event(&mut self, event: DialogueEvent) {
        match event {
            DialogueEvent::Opened => self.on_dialogue_opened().await,
            DialogueEvent::AudioDelta { payload } => {
                self.record(&payload);
                if self.state.is_closed() {
                    return;
                }
                if self
                    .send_telephony(OutboundFrame::Media { payload })
                    .await
                {
                    self.ai_speaking = true;
                    self.unmarked_audio = true;
                }
            }
            DialogueEvent::AudioDone { item_id } => {
                self.unmarked_audio = false;
                if self
                    .send_telephony(OutboundFrame::Mark { name: item_id })
                    .await
                {
                    self.pending_marks += 1;
                }
                // Without a mark echo to wait for, nothing is left playing.
                self.ai_speaking = self.pending_marks > 0;
                if !self.ai_speaking && self.state == CallState::Draining(DrainReason::Hangup) {
                    self.complete_hangup().await;
                }
            }
            DialogueEvent::FunctionCallDone { name, call_id } => {
                match ToolInvocation::from_name(&name) {
                    Some(ToolInvocation::EndCall) => {
                        info!(%call_id, "Assistant requested hang up");
                        if self.state == CallState::Active {
                            self.begin_hangup().await;
                        }
                    }
                    None => warn!(%name, %call_id, "Ignoring unknown tool invocation"),
                }
            }
            DialogueEvent::TextDone { text } => {
                if self.awaiting_summary {
                    self.awaiting_summary = false;
                    self.deliver_summary(text).await;
                    self.finish().await;
                } else {
                    debug!(%text, "Assistant text turn completed");
                }
            }
            DialogueEvent::Error { message } => {
                error!(state = %self.state, %message, "Dialogue error");
                self.fail().await;
            }
            DialogueEvent::Closed => {
                self.dialogue_closed = true;
                if self.state.is_closed() {
                    return;
                }
                if self.awaiting_summary {
                    warn!("Dialogue closed before the summary arrived");
                    self.awaiting_summary = false;
                    self.finish().await;
                } else {
                    warn!(state = %self.state, "Dialogue connection closed unexpectedly");
                    self.fail().await;
                }
            }
        }
    }

    async fn on_dialogue_opened(&mut self) {
        self.dialogue_opened = true;
        if self.state != CallState::Connecting {
            return;
        }
        info!("Dialogue connection open");

        match self.start_conversation().await {
            Ok(()) => self.state = CallState::Active,
            Err(e) => {
                error!("Failed to start the conversation: {}", e);
                self.fail().await;
            }
        }
    }

    /// Configure the session, then have the assistant greet the caller.
    async fn start_conversation(&mut self) -> RealtimeResult<()> {
        self.dialogue
            .configure_session(&self.options.settings)
            .await?;
        self.dialogue
            .inject_user_message(&self.options.greeting_prompt)
            .await?;
        self.dialogue
            .request_response(&[Modality::Text, Modality::Audio])
            .await
    }

    // -------------------------------------------------------------------------
    // Drains
    // -------------------------------------------------------------------------

    async fn begin_hangup(&mut self) {
        self.state = CallState::Draining(DrainReason::Hangup);
        if self.ai_speaking {
            debug!("Waiting for the farewell to finish playing");
            self.deadline = Some(Instant::now() + self.options.timeouts.hangup_drain);
        } else {
            self.complete_hangup().await;
        }
    }

    async fn complete_hangup(&mut self) {
        self.deadline = None;
        info!("Hanging up");
        self.close_telephony().await;
        self.begin_summary().await;
    }

    async fn begin_summary(&mut self) {
        self.deadline = None;

        let has_recipient = self.notifier.has_recipient(self.caller());
        if !self.dialogue_opened || self.dialogue_closed || !has_recipient {
            debug!(
                dialogue_opened = self.dialogue_opened,
                has_recipient,
                "Skipping call summary"
            );
            self.finish().await;
            return;
        }

        self.state = CallState::Draining(DrainReason::Summary);
        if let Err(e) = self
            .dialogue
            .inject_user_message(&self.options.summary_prompt)
            .await
        {
            error!("Failed to request call summary: {}", e);
            self.finish().await;
            return;
        }
        self.awaiting_summary = true;
        if let Err(e) = self.dialogue.request_response(&[Modality::Text]).await {
            error!("Failed to request call summary: {}", e);
            self.awaiting_summary = false;
            self.finish().await;
            return;
        }
        self.deadline = Some(Instant::now() + self.options.timeouts.summary);
    }

    async fn on_deadline(&mut self) {
        self.deadline = None;
        self.outcome.faults += 1;
        match self.state {
            CallState::Draining(DrainReason::Hangup) => {
                error!(
                    timeout = ?self.options.timeouts.hangup_drain,
                    "Farewell playback not confirmed in time, forcing hang up"
                );
                self.ai_speaking = false;
                self.pending_marks = 0;
                self.complete_hangup().await;
            }
            CallState::Draining(DrainReason::Summary) => {
                error!(
                    timeout = ?self.options.timeouts.summary,
                    "Call summary not received in time"
                );
                self.awaiting_summary = false;
                self.finish().await;
            }
            state => debug!(%state, "Stale deadline"),
        }
    }

    async fn deliver_summary(&mut self, text: String) {
        let caller = self.caller().map(str::to_string);
        info!(caller = caller.as_deref().unwrap_or("-"), "Call summary received");

        let send = self.notifier.send_summary(caller.as_deref(), &text);
        match tokio::time::timeout(self.options.timeouts.notify, send).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to send call summary: {}", e),
            Err(_) => {
                self.outcome.faults += 1;
                error!(
                    timeout = ?self.options.timeouts.notify,
                    "Call summary notification timed out"
                );
            }
        }
        self.outcome.summary = Some(text);
    }

    /// Dialogue failure: drop the line without waiting for playback.
    async fn fail(&mut self) {
        self.close_telephony().await;
        self.finish().await;
    }

    async fn finish(&mut self) {
        if self.state.is_closed() {
            return;
        }
        self.state = CallState::Closed;
        self.deadline = None;
        self.awaiting_summary = false;

        if let Err(e) = self.dialogue.close().await {
            warn!("Failed to close dialogue connection: {}", e);
        }
        self.close_telephony().await;
        self.write_recording().await;
    }

    // -------------------------------------------------------------------------
    // Recording
    // -------------------------------------------------------------------------

    fn record(&mut self, payload: &str) {
        let Some(recording) = self.recording.as_mut() else {
            return;
        };
        match BASE64_STANDARD.decode(payload) {
            Ok(audio) => match self.options.settings.output_audio_format {
                OpenAIRealtimeAudioFormat::G711Ulaw => recording.append(ulaw_to_pcm16(&audio)),
                OpenAIRealtimeAudioFormat::Pcm16 => recording.append(audio),
                OpenAIRealtimeAudioFormat::G711Alaw => {
                    trace!("Recording is not supported for a-law output");
                }
            },
            Err(e) => warn!("Undecodable assistant audio: {}", e),
        }
    }

    async fn write_recording(&mut self) {
        let (Some(recording), Some(dir)) = (self.recording.take(), self.options.recording_dir.clone())
        else {
            return;
        };
        if recording.is_empty() {
            return;
        }

        let name = self
            .metadata
            .as_ref()
            .map(|m| m.stream_sid.clone())
            .filter(|sid| !sid.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let path = dir.join(format!("{name}.wav"));
        let sample_rate = self.options.settings.output_audio_format.sample_rate();
        let wav = recording.finalize(1, sample_rate, 16);

        match write_file(&dir, &path, &wav).await {
            Ok(()) => {
                info!(path = %path.display(), bytes = wav.len(), "Recording saved");
                self.outcome.recording = Some(path);
            }
            Err(e) => error!(path = %path.display(), "Failed to save recording: {}", e),
        }
    }

    fn caller(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.caller.as_deref())
    }

    fn stream_sid(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.stream_sid.as_str())
    }
}

async fn write_file(dir: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(path, contents).await
}
