//! Domain error types for the sparring core.
//!
//! These map the failure classes the orchestrator distinguishes between.
//! None of them is fatal to the host process: the worst outcome is a
//! session left disconnected until the caller reconnects explicitly.

use thiserror::Error;

/// Errors surfaced by the sparring core.
#[derive(Debug, Error)]
pub enum SparringError {
    /// Connect or send against the streaming session failed. The session is
    /// left disconnected; there is no automatic retry.
    #[error("session connection failed: {0}")]
    Connection(String),

    /// Microphone access was denied or no input device exists. Surfaced
    /// synchronously from `start()`; capture produces no further events.
    #[error("microphone permission denied: {0}")]
    Permission(String),

    /// The capture backend could not be (re)started: it is already
    /// running, or its audio graph failed during setup for a reason other
    /// than permissions.
    #[error("audio capture unavailable: {0}")]
    Capture(String),

    /// Model content text did not match the bracketed-speaker pattern.
    /// Recovered by falling back to the active persona name; never shown to
    /// the end user as a failure.
    #[error("content did not match speaker pattern: {0}")]
    Format(String),

    /// Speech recognition is unavailable on this platform. Recovered by
    /// disabling transcription for the process lifetime.
    #[error("speech recognition unavailable: {0}")]
    UnsupportedCapability(String),

    /// The recognition backend ended unexpectedly mid-session. Recovered by
    /// automatic restart while the conversation remains active and unmuted.
    #[error("recognition backend ended unexpectedly: {0}")]
    TransientRecognition(String),
}

impl SparringError {
    /// Whether the error is recovered internally without caller action.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SparringError::Format(_)
                | SparringError::UnsupportedCapability(_)
                | SparringError::TransientRecognition(_)
        )
    }
}
