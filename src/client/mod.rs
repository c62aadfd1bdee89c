//! The contract the core depends on for a bidirectional conversation
//! session. The transport behind it (websocket, loopback, test double) is
//! an external collaborator; the core only ever sees this trait.

pub mod messages;

use tokio::sync::mpsc;

use crate::error::SparringError;
pub use messages::{
    ContentEvent, ContentPart, RealtimeAudio, SessionSetup, SteeringMessage, PCM_MIME_TYPE,
};

/// Connection lifecycle. At most one active session per conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events delivered by the session, in arrival order over one receiver.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Incremental model output; may be split across events.
    Content(ContentEvent),
    /// The session closed (either side).
    Closed,
    /// Transport-level error; the session is left disconnected.
    Error(String),
}

/// Bidirectional streaming conversation session.
///
/// Ordering guarantee is only "same or later delivery": the core never
/// assumes a content event corresponds to a specific prior send.
#[async_trait::async_trait]
pub trait StreamingSessionClient: Send {
    /// Open the session. Calling while already connecting or connected is a
    /// no-op; a failed connect leaves the session disconnected with no
    /// automatic retry.
    async fn connect(&mut self, setup: SessionSetup) -> Result<(), SparringError>;

    /// Send steering text, optionally closing the model's current turn.
    /// Fails with [`SparringError::Connection`] after disconnect.
    async fn send(&mut self, message: SteeringMessage) -> Result<(), SparringError>;

    /// Append audio frames to the current open turn without closing it.
    async fn send_realtime(&mut self, entries: Vec<RealtimeAudio>) -> Result<(), SparringError>;

    /// Tear down the session. Idempotent.
    async fn disconnect(&mut self);

    fn state(&self) -> ConnectionState;

    /// Hand over the event receiver. Yields `Some` exactly once.
    fn take_events(&mut self) -> Option<mpsc::Receiver<SessionEvent>>;
}
