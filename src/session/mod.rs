//! Session orchestration.
//!
//! This module provides:
//! - The conversation-phase state machine and every timer it owns
//! - Hysteresis speaking detection for both participants
//! - Content-event interpretation (completion marker, closing cue,
//!   bracketed-speaker parsing)
//! - The control-thread driver task and the `SparringSession` handle

mod content;
mod driver;
mod machine;
mod phase;
mod policy;
mod session;
mod speaking;
mod stats;

pub use driver::{AudioInputs, SessionCommand, SessionCue};
pub use machine::{ConversationStateMachine, Directive};
pub use phase::{ClosingSubPhase, ConversationPhase};
pub use policy::SessionPolicy;
pub use session::{SessionConfig, SparringSession};
pub use speaking::SpeakingDetector;
pub use stats::SessionStats;
