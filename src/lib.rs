pub mod audio;
pub mod client;
pub mod config;
pub mod error;
pub mod persona;
pub mod session;
pub mod stt;
pub mod transcript;

pub use audio::{AudioBackend, AudioFrame, CaptureConfig, CaptureStreams, MicCapture};
pub use client::{
    ConnectionState, ContentEvent, ContentPart, RealtimeAudio, SessionEvent, SessionSetup,
    SteeringMessage, StreamingSessionClient,
};
pub use config::Config;
pub use error::SparringError;
pub use persona::{PersonaDescriptor, UserDescriptor};
pub use session::{
    AudioInputs, ClosingSubPhase, ConversationPhase, ConversationStateMachine, Directive,
    SessionConfig, SessionCue, SessionPolicy, SessionStats, SparringSession,
};
pub use stt::{RecognizerEvent, SpeechRecognizer, SpeechToTextBridge};
pub use transcript::{TranscriptItem, TranscriptLog};
