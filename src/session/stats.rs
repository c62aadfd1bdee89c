use chrono::{DateTime, Utc};
use serde::Serialize;

use super::phase::{ClosingSubPhase, ConversationPhase};

/// Point-in-time snapshot of a running session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub phase: ConversationPhase,
    pub sub_phase: ClosingSubPhase,
    pub connected: bool,
    pub muted: bool,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub transcript_items: usize,
    /// Seconds of detected user speech while live and unmuted.
    pub user_speaking_secs: u64,
    /// Current closing countdown value; negative is overtime.
    pub closing_timer_secs: i64,
}
