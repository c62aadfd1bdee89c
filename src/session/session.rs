use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::driver::{AudioInputs, Driver, SessionCommand, SessionCue};
use super::machine::ConversationStateMachine;
use super::phase::{ClosingSubPhase, ConversationPhase};
use super::policy::SessionPolicy;
use super::stats::SessionStats;
use crate::client::{SessionSetup, StreamingSessionClient};
use crate::persona::{PersonaDescriptor, UserDescriptor};
use crate::stt::{SpeechRecognizer, SpeechToTextBridge};
use crate::transcript::TranscriptLog;

const COMMAND_CHANNEL_CAPACITY: usize = 16;
const CUE_CHANNEL_CAPACITY: usize = 4;

/// Configuration for one rehearsal session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Unique session identifier.
    pub session_id: String,
    pub policy: SessionPolicy,
    pub persona: PersonaDescriptor,
    pub user: UserDescriptor,
    /// The pre-composed system instruction handed to the transport.
    /// Composing it from persona and user text is a collaborator's job.
    pub system_instruction: String,
}

impl SessionConfig {
    pub fn new(
        persona: PersonaDescriptor,
        user: UserDescriptor,
        system_instruction: impl Into<String>,
    ) -> Self {
        Self {
            session_id: format!("sparring-{}", uuid::Uuid::new_v4()),
            policy: SessionPolicy::default(),
            persona,
            user,
            system_instruction: system_instruction.into(),
        }
    }

    fn setup(&self) -> SessionSetup {
        SessionSetup {
            voice: self.persona.voice.clone(),
            system_instruction: self.system_instruction.clone(),
        }
    }
}

/// A live rehearsal session: spawns the control task and exposes async
/// commands plus state snapshots. Dropping the handle (or `shutdown`)
/// tears the control task down.
pub struct SparringSession {
    config: SessionConfig,
    started_at: chrono::DateTime<chrono::Utc>,
    commands: mpsc::Sender<SessionCommand>,
    machine: Arc<Mutex<ConversationStateMachine>>,
    transcript: TranscriptLog,
    cues: Option<mpsc::Receiver<SessionCue>>,
    task: Option<JoinHandle<()>>,
}

impl SparringSession {
    /// Wire up and spawn the control task. The client and recognizer are
    /// external collaborators; the audio inputs come from a capture
    /// backend plus whatever renders the model's audio.
    pub fn spawn(
        config: SessionConfig,
        client: Box<dyn StreamingSessionClient>,
        recognizer: Box<dyn SpeechRecognizer>,
        inputs: AudioInputs,
    ) -> Self {
        info!("starting session {}", config.session_id);

        let transcript = TranscriptLog::new();
        let machine = Arc::new(Mutex::new(ConversationStateMachine::new(
            config.policy.clone(),
            config.persona.clone(),
            config.user.clone(),
            transcript.clone(),
        )));
        let bridge = SpeechToTextBridge::new(
            recognizer,
            transcript.clone(),
            config.user.speaker_label().to_string(),
        );

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (cue_tx, cue_rx) = mpsc::channel(CUE_CHANNEL_CAPACITY);

        let driver = Driver {
            machine: Arc::clone(&machine),
            client,
            setup: config.setup(),
            bridge,
            commands: command_rx,
            inputs,
            cues: cue_tx,
        };
        let task = tokio::spawn(driver.run());

        Self {
            config,
            started_at: Utc::now(),
            commands: command_tx,
            machine,
            transcript,
            cues: Some(cue_rx),
            task: Some(task),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    pub fn transcript(&self) -> TranscriptLog {
        self.transcript.clone()
    }

    /// Audible-cue receiver. Yields `Some` exactly once.
    pub fn take_cues(&mut self) -> Option<mpsc::Receiver<SessionCue>> {
        self.cues.take()
    }

    pub fn phase(&self) -> ConversationPhase {
        self.lock().phase()
    }

    pub fn sub_phase(&self) -> ClosingSubPhase {
        self.lock().sub_phase()
    }

    pub async fn start_onboarding(&self) -> Result<()> {
        self.send(SessionCommand::StartOnboarding).await
    }

    pub async fn start_warm_up(&self, topic: Option<String>) -> Result<()> {
        self.send(SessionCommand::StartWarmUp { topic }).await
    }

    pub async fn end_warm_up(&self) -> Result<()> {
        self.send(SessionCommand::EndWarmUp).await
    }

    pub async fn start_preparation(&self, topic: Option<String>) -> Result<()> {
        self.send(SessionCommand::StartPreparation { topic }).await
    }

    pub async fn start_debate(&self) -> Result<()> {
        self.send(SessionCommand::StartDebate).await
    }

    pub async fn end_debate(&self) -> Result<()> {
        self.send(SessionCommand::EndDebate).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.send(SessionCommand::Reset).await
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.send(SessionCommand::SetMuted(muted)).await
    }

    /// Current session statistics.
    pub fn stats(&self) -> SessionStats {
        let machine = self.lock();
        let duration = Utc::now().signed_duration_since(self.started_at);
        SessionStats {
            session_id: self.config.session_id.clone(),
            phase: machine.phase(),
            sub_phase: machine.sub_phase(),
            connected: machine.is_connected(),
            muted: machine.is_muted(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            transcript_items: self.transcript.len(),
            user_speaking_secs: machine.user_speaking_secs(),
            closing_timer_secs: machine.closing_timer_secs(),
        }
    }

    /// Stop the control task and tear down the session.
    pub async fn shutdown(&mut self) {
        let _ = self.commands.send(SessionCommand::Shutdown).await;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("control task panicked: {e}");
            }
        }
    }

    async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .context("session control task is gone")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ConversationStateMachine> {
        match self.machine.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for SparringSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
