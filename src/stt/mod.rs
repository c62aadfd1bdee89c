//! Continuous speech-to-text capture of the human's audio, independent of
//! the realtime transport path. Final results append straight to the
//! transcript; the recognition backend is an external collaborator behind
//! the [`SpeechRecognizer`] trait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::SparringError;
use crate::transcript::TranscriptLog;

/// Events from a recognition stream. Final results only; interim results
/// are a backend concern this crate does not consume.
#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    /// A final transcription segment.
    Final(String),
    /// The backend terminated the stream on its own.
    Ended,
}

/// A continuous, final-results-only recognition stream.
#[async_trait::async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Whether the platform supports recognition at all.
    fn is_supported(&self) -> bool;

    /// Begin a recognition stream. The receiver closes when the stream
    /// stops for any reason.
    async fn start(&mut self) -> Result<mpsc::Receiver<RecognizerEvent>, SparringError>;

    /// Stop the current stream. Idempotent.
    async fn stop(&mut self);
}

/// Wraps a recognizer with restart-on-termination and a degraded mode for
/// unsupported platforms.
///
/// Runs only while the conversation is live and the user is unmuted; the
/// orchestrator calls `start`/`stop` at those boundaries. A backend
/// `Ended` while still active triggers an automatic restart; on an
/// unsupported platform exactly one system notice is posted and the bridge
/// stays disabled for the process lifetime.
pub struct SpeechToTextBridge {
    recognizer: Arc<Mutex<Box<dyn SpeechRecognizer>>>,
    transcript: TranscriptLog,
    speaker: String,
    active: Arc<AtomicBool>,
    disabled: bool,
    task: Option<JoinHandle<()>>,
}

impl SpeechToTextBridge {
    pub fn new(
        recognizer: Box<dyn SpeechRecognizer>,
        transcript: TranscriptLog,
        speaker: impl Into<String>,
    ) -> Self {
        Self {
            recognizer: Arc::new(Mutex::new(recognizer)),
            transcript,
            speaker: speaker.into(),
            active: Arc::new(AtomicBool::new(false)),
            disabled: false,
            task: None,
        }
    }

    /// Whether the bridge is permanently disabled (degraded mode).
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start transcribing. No-op while already running or disabled.
    pub async fn start(&mut self) {
        if self.disabled || self.active.load(Ordering::SeqCst) {
            return;
        }

        if !self.recognizer.lock().await.is_supported() {
            // Degraded but functional: one notice, then nothing for the
            // rest of the process lifetime.
            warn!("speech recognition not supported on this platform");
            self.transcript.append_system(
                "Speech-to-text is not available on this platform; your side of the \
                 conversation will not be transcribed.",
            );
            self.disabled = true;
            return;
        }

        self.active.store(true, Ordering::SeqCst);
        let recognizer = Arc::clone(&self.recognizer);
        let active = Arc::clone(&self.active);
        let transcript = self.transcript.clone();
        let speaker = self.speaker.clone();

        self.task = Some(tokio::spawn(async move {
            loop {
                let mut events = match recognizer.lock().await.start().await {
                    Ok(events) => events,
                    Err(e) => {
                        warn!("recognition stream failed to start: {e}");
                        active.store(false, Ordering::SeqCst);
                        break;
                    }
                };

                loop {
                    match events.recv().await {
                        Some(RecognizerEvent::Final(text)) => {
                            let text = text.trim().to_string();
                            if !text.is_empty() {
                                transcript.append(speaker.clone(), text, true);
                            }
                        }
                        Some(RecognizerEvent::Ended) | None => break,
                    }
                }

                // Restart only while the conversation is still live and the
                // user is unmuted at the moment of termination.
                if !active.load(Ordering::SeqCst) {
                    break;
                }
                info!("recognition backend ended; restarting");
            }
        }));
    }

    /// Stop transcribing. Idempotent; cancels any pending restart.
    pub async fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.recognizer.lock().await.stop().await;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("recognition task panicked: {e}");
            }
        }
    }
}
