//! The single control-thread task.
//!
//! Everything that mutates shared conversation state funnels through this
//! loop: commands from the session handle, inbound session events, volume
//! samples from both sides, outbound audio frames, and the timer pump. The
//! event queue is processed serially, so no two timer callbacks ever run
//! concurrently; the machine's directives are flushed after every step.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::machine::{ConversationStateMachine, Directive};
use crate::audio::AudioFrame;
use crate::client::{RealtimeAudio, SessionEvent, SessionSetup, StreamingSessionClient};
use crate::stt::SpeechToTextBridge;

const TIMER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Commands accepted by the control task.
#[derive(Debug)]
pub enum SessionCommand {
    StartOnboarding,
    StartWarmUp { topic: Option<String> },
    EndWarmUp,
    StartPreparation { topic: Option<String> },
    StartDebate,
    EndDebate,
    Reset,
    SetMuted(bool),
    Shutdown,
}

/// Cues surfaced to the embedding application (presentation is its
/// concern, timing is ours).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCue {
    Chime,
}

/// The capture-side streams feeding the control task. `ai_volume` carries
/// the playback amplitude of the model's synthesized audio, supplied by
/// whatever renders it.
pub struct AudioInputs {
    pub frames: mpsc::Receiver<AudioFrame>,
    pub user_volume: mpsc::Receiver<f32>,
    pub ai_volume: mpsc::Receiver<f32>,
}

pub(super) struct Driver {
    pub machine: Arc<Mutex<ConversationStateMachine>>,
    pub client: Box<dyn StreamingSessionClient>,
    pub setup: SessionSetup,
    pub bridge: SpeechToTextBridge,
    pub commands: mpsc::Receiver<SessionCommand>,
    pub inputs: AudioInputs,
    pub cues: mpsc::Sender<SessionCue>,
}

impl Driver {
    pub async fn run(mut self) {
        let mut events = self.client.take_events();
        let mut tick = tokio::time::interval(TIMER_POLL_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!("session control task started");

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(SessionCommand::Shutdown) | None => break,
                        Some(command) => self.handle_command(command).await,
                    }
                }
                Some(event) = recv_opt(&mut events) => {
                    self.handle_event(event);
                }
                Some(volume) = self.inputs.user_volume.recv() => {
                    self.lock().observe_user_volume(volume, Instant::now());
                }
                Some(volume) = self.inputs.ai_volume.recv() => {
                    self.lock().observe_ai_volume(volume, Instant::now());
                }
                Some(frame) = self.inputs.frames.recv() => {
                    self.forward_frame(frame).await;
                }
                _ = tick.tick() => {
                    self.lock().poll(Instant::now());
                }
            }

            self.flush_directives().await;
        }

        self.bridge.stop().await;
        self.client.disconnect().await;
        self.lock().set_connected(false);
        info!("session control task stopped");
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        let now = Instant::now();
        match command {
            SessionCommand::StartOnboarding => self.lock().start_onboarding(),
            SessionCommand::StartWarmUp { topic } => {
                self.lock().start_warm_up(topic.as_deref());
                self.connect().await;
            }
            SessionCommand::EndWarmUp => {
                self.lock().end_warm_up();
                self.client.disconnect().await;
                self.lock().set_connected(false);
            }
            SessionCommand::StartPreparation { topic } => {
                self.lock().start_preparation(topic.as_deref(), now);
            }
            SessionCommand::StartDebate => {
                self.lock().start_debate(now);
                self.connect().await;
            }
            SessionCommand::EndDebate => self.lock().end_debate(),
            SessionCommand::Reset => {
                self.lock().reset();
                self.client.disconnect().await;
                self.lock().set_connected(false);
            }
            SessionCommand::SetMuted(muted) => self.lock().set_muted(muted),
            SessionCommand::Shutdown => unreachable!("handled by the select loop"),
        }
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Content(content) => {
                self.lock().handle_content(&content, Instant::now());
            }
            SessionEvent::Closed => {
                info!("session closed by transport");
                self.lock().set_connected(false);
            }
            SessionEvent::Error(message) => {
                warn!("session error: {message}");
                self.lock().set_connected(false);
            }
        }
    }

    async fn connect(&mut self) {
        match self.client.connect(self.setup.clone()).await {
            Ok(()) => self.lock().set_connected(true),
            Err(e) => warn!("connect failed, session left disconnected: {e}"),
        }
    }

    async fn forward_frame(&mut self, frame: AudioFrame) {
        let live = {
            let machine = self.lock();
            machine.is_connected() && !machine.is_muted() && machine.phase().is_live()
        };
        if !live {
            return;
        }
        let entry = RealtimeAudio::from_frame(&frame);
        if let Err(e) = self.client.send_realtime(vec![entry]).await {
            warn!("realtime send failed: {e}");
            self.lock().set_connected(false);
        }
    }

    async fn flush_directives(&mut self) {
        let directives = self.lock().drain_directives();
        for directive in directives {
            match directive {
                Directive::Steer(message) => {
                    if let Err(e) = self.client.send(message).await {
                        warn!("steering send failed: {e}");
                        self.lock().set_connected(false);
                    }
                }
                Directive::PlayChime => {
                    // Best effort; a missing listener must not stall timing.
                    let _ = self.cues.try_send(SessionCue::Chime);
                }
                Directive::Disconnect => {
                    self.client.disconnect().await;
                    self.lock().set_connected(false);
                }
                Directive::StartRecognizer => self.bridge.start().await,
                Directive::StopRecognizer => self.bridge.stop().await,
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ConversationStateMachine> {
        match self.machine.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Recv that stays disabled once the client yields no event stream.
async fn recv_opt(events: &mut Option<mpsc::Receiver<SessionEvent>>) -> Option<SessionEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
