use serde::{Deserialize, Serialize};

/// Top-level conversation phase. Exactly one value at a time, owned by the
/// state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversationPhase {
    Idle,
    Onboarding,
    Preparing,
    WarmingUp,
    Debating,
    Analyzing,
}

impl ConversationPhase {
    /// Phases in which the microphone and speech recognition are live.
    pub fn is_live(self) -> bool {
        matches!(self, ConversationPhase::WarmingUp | ConversationPhase::Debating)
    }
}

/// Closing-statement sub-phase, meaningful only while debating. Monotonic:
/// open -> user closing -> AI closing, never backward within one debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClosingSubPhase {
    Open,
    UserClosing,
    AiClosing,
}
