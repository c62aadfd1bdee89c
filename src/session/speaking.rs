use std::time::{Duration, Instant};

/// Hysteresis-based speaking detector.
///
/// Entering "speaking" requires a single volume sample above the threshold;
/// exiting requires a sustained silence window before flipping back. Brief
/// dips therefore do not flap the timers that key off this state.
#[derive(Debug)]
pub struct SpeakingDetector {
    threshold: f32,
    silence_window: Duration,
    speaking: bool,
    silent_since: Option<Instant>,
}

impl SpeakingDetector {
    pub fn new(threshold: f32, silence_window: Duration) -> Self {
        Self {
            threshold,
            silence_window,
            speaking: false,
            silent_since: None,
        }
    }

    /// Feed one volume sample; returns the (possibly updated) state.
    pub fn update(&mut self, volume: f32, now: Instant) -> bool {
        if volume > self.threshold {
            self.speaking = true;
            self.silent_since = None;
        } else if self.speaking {
            let since = *self.silent_since.get_or_insert(now);
            if now.duration_since(since) >= self.silence_window {
                self.speaking = false;
                self.silent_since = None;
            }
        }
        self.speaking
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Force silent immediately, e.g. on mute or teardown.
    pub fn reset(&mut self) {
        self.speaking = false;
        self.silent_since = None;
    }
}
