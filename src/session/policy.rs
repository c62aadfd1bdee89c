use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Numeric policy for session timing and speaking detection. Every value a
/// timer or threshold compares against lives here, never inline in logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    /// Seconds granted for each closing statement.
    pub closing_timer_start_secs: i64,

    /// Closing-timer value at which the user is forcibly interrupted. The
    /// timer counts down through zero into negative overtime, so -14 is
    /// reached on the 44th decrement: the interrupt fires after 44 seconds
    /// of detected closing-statement speech.
    pub overtime_cutoff_secs: i64,

    /// Wall-clock debate length before closing statements are solicited.
    pub debate_duration_secs: u64,

    /// Preparation countdown before the debate starts automatically.
    pub preparation_countdown_secs: u64,

    /// Continuous user silence before the nudge fires.
    pub inactivity_nudge_secs: u64,

    /// Output volume above which the AI counts as speaking. Kept separate
    /// from the user threshold; synthesized playback has a different noise
    /// floor than a microphone.
    pub ai_speaking_threshold: f32,

    /// Microphone volume above which the user counts as speaking.
    pub user_speaking_threshold: f32,

    /// Sustained silence required before a speaker flips back to silent.
    pub silence_hysteresis_ms: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            closing_timer_start_secs: 30,
            overtime_cutoff_secs: -14,
            debate_duration_secs: 300,
            preparation_countdown_secs: 120,
            inactivity_nudge_secs: 20,
            ai_speaking_threshold: 0.05,
            user_speaking_threshold: 0.02,
            silence_hysteresis_ms: 750,
        }
    }
}

impl SessionPolicy {
    pub fn silence_hysteresis(&self) -> Duration {
        Duration::from_millis(self.silence_hysteresis_ms)
    }

    pub fn debate_duration(&self) -> Duration {
        Duration::from_secs(self.debate_duration_secs)
    }

    pub fn preparation_countdown(&self) -> Duration {
        Duration::from_secs(self.preparation_countdown_secs)
    }

    pub fn inactivity_nudge_delay(&self) -> Duration {
        Duration::from_secs(self.inactivity_nudge_secs)
    }
}
