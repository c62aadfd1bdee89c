//! The conversation-phase state machine.
//!
//! Owns every timer in the system: the debate duration guard, the
//! closing-statement countdown, the inactivity watchdog, and the speaking
//! accounting tick. The machine is synchronous and clock-injected; the
//! driver task feeds it events and wall-clock `Instant`s and flushes the
//! directives it emits. Each timer is an `Option<Instant>` deadline owned
//! here, cleared on phase exit, mute, or teardown; arming an armed timer is
//! a no-op.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::content::{contains_closing_cue, parse_speaker_line, strip_completion_marker};
use super::phase::{ClosingSubPhase, ConversationPhase};
use super::policy::SessionPolicy;
use super::speaking::SpeakingDetector;
use crate::client::{ContentEvent, SteeringMessage};
use crate::persona::{PersonaDescriptor, UserDescriptor};
use crate::transcript::TranscriptLog;

/// Side effects the machine asks the driver to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Send a steering message over the session.
    Steer(SteeringMessage),
    /// One-shot audible cue at the end of a closing statement.
    PlayChime,
    /// Tear down the session connection.
    Disconnect,
    /// Start continuous speech recognition.
    StartRecognizer,
    /// Stop continuous speech recognition.
    StopRecognizer,
}

pub struct ConversationStateMachine {
    policy: SessionPolicy,
    persona: PersonaDescriptor,
    user: UserDescriptor,
    transcript: TranscriptLog,

    phase: ConversationPhase,
    sub_phase: ClosingSubPhase,
    muted: bool,
    connected: bool,

    user_detector: SpeakingDetector,
    ai_detector: SpeakingDetector,

    // Closing countdown. Signed: negative values are overtime.
    closing_timer_secs: i64,
    closing_tick_at: Option<Instant>,
    chime_played: bool,
    overtime_interrupt_sent: bool,
    handoff_sent: bool,

    duration_guard_at: Option<Instant>,
    duration_guard_fired: bool,

    preparation_ends_at: Option<Instant>,

    // Inactivity watchdog; armed only by an AI speaking -> silent edge.
    nudge_at: Option<Instant>,

    user_speaking_secs: u64,
    speak_tick_at: Option<Instant>,

    kickoff_sent: bool,
    recognizer_running: bool,
    format_fallbacks: u64,

    directives: VecDeque<Directive>,
}

impl ConversationStateMachine {
    pub fn new(
        policy: SessionPolicy,
        persona: PersonaDescriptor,
        user: UserDescriptor,
        transcript: TranscriptLog,
    ) -> Self {
        let user_detector =
            SpeakingDetector::new(policy.user_speaking_threshold, policy.silence_hysteresis());
        let ai_detector =
            SpeakingDetector::new(policy.ai_speaking_threshold, policy.silence_hysteresis());
        let closing_timer_secs = policy.closing_timer_start_secs;
        Self {
            policy,
            persona,
            user,
            transcript,
            phase: ConversationPhase::Idle,
            sub_phase: ClosingSubPhase::Open,
            muted: true,
            connected: false,
            user_detector,
            ai_detector,
            closing_timer_secs,
            closing_tick_at: None,
            chime_played: false,
            overtime_interrupt_sent: false,
            handoff_sent: false,
            duration_guard_at: None,
            duration_guard_fired: false,
            preparation_ends_at: None,
            nudge_at: None,
            user_speaking_secs: 0,
            speak_tick_at: None,
            kickoff_sent: false,
            recognizer_running: false,
            format_fallbacks: 0,
            directives: VecDeque::new(),
        }
    }

    // --- Accessors -------------------------------------------------------

    pub fn phase(&self) -> ConversationPhase {
        self.phase
    }

    pub fn sub_phase(&self) -> ClosingSubPhase {
        self.sub_phase
    }

    pub fn closing_timer_secs(&self) -> i64 {
        self.closing_timer_secs
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn user_speaking_secs(&self) -> u64 {
        self.user_speaking_secs
    }

    /// Count of content events that fell back to the persona speaker.
    pub fn format_fallbacks(&self) -> u64 {
        self.format_fallbacks
    }

    /// Drain pending side effects. Draining twice without new input yields
    /// nothing.
    pub fn drain_directives(&mut self) -> Vec<Directive> {
        self.directives.drain(..).collect()
    }

    // --- Phase transitions ----------------------------------------------

    pub fn start_onboarding(&mut self) {
        if self.phase != ConversationPhase::Idle {
            warn!(phase = ?self.phase, "ignoring start_onboarding");
            return;
        }
        self.set_phase(ConversationPhase::Onboarding);
    }

    pub fn start_warm_up(&mut self, topic: Option<&str>) {
        if self.phase != ConversationPhase::Onboarding {
            warn!(phase = ?self.phase, "ignoring start_warm_up");
            return;
        }
        if let Some(topic) = topic {
            self.transcript.append_system(format!("Warm-Up Topic: {topic}"));
        }
        self.transcript
            .append_system("This is a low-stakes vibe check. Unmute to talk.");
        self.muted = true;
        self.set_phase(ConversationPhase::WarmingUp);
    }

    pub fn end_warm_up(&mut self) {
        if self.phase != ConversationPhase::WarmingUp {
            warn!(phase = ?self.phase, "ignoring end_warm_up");
            return;
        }
        self.clear_live_state();
        self.set_phase(ConversationPhase::Onboarding);
    }

    pub fn start_preparation(&mut self, topic: Option<&str>, now: Instant) {
        if self.phase != ConversationPhase::Onboarding {
            warn!(phase = ?self.phase, "ignoring start_preparation");
            return;
        }
        if let Some(topic) = topic {
            self.transcript.append_system(format!("Topic: {topic}"));
        }
        self.preparation_ends_at = Some(now + self.policy.preparation_countdown());
        self.set_phase(ConversationPhase::Preparing);
    }

    /// Enter the debate, manually or via the preparation countdown.
    pub fn start_debate(&mut self, now: Instant) {
        if self.phase != ConversationPhase::Preparing {
            warn!(phase = ?self.phase, "ignoring start_debate");
            return;
        }
        self.preparation_ends_at = None;
        self.muted = true;
        self.sub_phase = ClosingSubPhase::Open;
        self.closing_timer_secs = self.policy.closing_timer_start_secs;
        self.closing_tick_at = None;
        self.chime_played = false;
        self.overtime_interrupt_sent = false;
        self.handoff_sent = false;
        self.duration_guard_at = Some(now + self.policy.debate_duration());
        self.duration_guard_fired = false;
        self.kickoff_sent = false;
        self.set_phase(ConversationPhase::Debating);
        if self.connected {
            self.send_kickoff();
        }
    }

    /// Manual end; the completion marker uses the same path plus a system
    /// note.
    pub fn end_debate(&mut self) {
        if self.phase != ConversationPhase::Debating {
            warn!(phase = ?self.phase, "ignoring end_debate");
            return;
        }
        self.clear_live_state();
        self.directives.push_back(Directive::Disconnect);
        self.set_phase(ConversationPhase::Analyzing);
    }

    /// Back to idle, ready for a fresh session. The transcript log itself
    /// is owned by the caller and stays append-only.
    pub fn reset(&mut self) {
        self.clear_live_state();
        self.sub_phase = ClosingSubPhase::Open;
        self.closing_timer_secs = self.policy.closing_timer_start_secs;
        self.duration_guard_at = None;
        self.duration_guard_fired = false;
        self.preparation_ends_at = None;
        self.kickoff_sent = false;
        self.muted = true;
        self.set_phase(ConversationPhase::Idle);
    }

    // --- External observations ------------------------------------------

    pub fn set_connected(&mut self, connected: bool) {
        if self.connected == connected {
            return;
        }
        self.connected = connected;
        if connected {
            if self.phase == ConversationPhase::Debating && !self.kickoff_sent {
                self.send_kickoff();
            }
        } else {
            // A dead session cannot nudge anyone.
            self.nudge_at = None;
            self.ai_detector.reset();
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        if self.muted == muted {
            return;
        }
        self.muted = muted;
        if muted {
            self.nudge_at = None;
            self.speak_tick_at = None;
            self.user_speaking_secs = 0;
            let was_speaking = self.user_detector.is_speaking();
            self.user_detector.reset();
            if was_speaking {
                self.on_user_speaking_changed(false);
            }
        }
        self.sync_recognizer();
    }

    /// Microphone volume sample. Ignored while muted; muting suspends
    /// speaking detection along with capture.
    pub fn observe_user_volume(&mut self, volume: f32, now: Instant) {
        if self.muted {
            return;
        }
        let was = self.user_detector.is_speaking();
        let is = self.user_detector.update(volume, now);
        if was == is {
            return;
        }
        if is {
            // The nudge only fires if the user stays silent.
            self.nudge_at = None;
            if self.phase.is_live() && self.speak_tick_at.is_none() {
                self.speak_tick_at = Some(now + Duration::from_secs(1));
            }
        } else {
            self.speak_tick_at = None;
        }
        self.on_user_speaking_changed(is);
        if is && self.sub_phase == ClosingSubPhase::UserClosing && !self.closing_halted() {
            self.arm_closing_tick(now);
        }
    }

    /// AI output volume sample (playback amplitude, fed by the caller).
    pub fn observe_ai_volume(&mut self, volume: f32, now: Instant) {
        let was = self.ai_detector.is_speaking();
        let is = self.ai_detector.update(volume, now);
        if was == is {
            return;
        }
        if is {
            self.nudge_at = None;
            if self.sub_phase == ClosingSubPhase::UserClosing
                && self.phase == ConversationPhase::Debating
            {
                self.enter_ai_closing(now);
            }
            if self.sub_phase == ClosingSubPhase::AiClosing {
                self.arm_closing_tick(now);
            }
        } else {
            if self.sub_phase == ClosingSubPhase::AiClosing {
                self.closing_tick_at = None;
            }
            // Speaking -> silent is the only edge that arms the watchdog.
            if self.connected && !self.muted {
                self.nudge_at = Some(now + self.policy.inactivity_nudge_delay());
            }
        }
    }

    /// Interpret one inbound content event.
    pub fn handle_content(&mut self, event: &ContentEvent, now: Instant) {
        let raw = event.text();
        let raw = raw.trim();
        if raw.is_empty() {
            return;
        }

        let (display_text, complete) = strip_completion_marker(raw);

        if !display_text.is_empty() {
            if self.phase == ConversationPhase::Debating
                && self.sub_phase == ClosingSubPhase::Open
                && contains_closing_cue(&display_text)
            {
                self.enter_user_closing(now);
            }

            match parse_speaker_line(&display_text) {
                Ok((speaker, message)) => {
                    self.transcript.append(speaker, message, false);
                }
                Err(e) => {
                    // Non-fatal: fall back to the active persona's name.
                    warn!("content fell back to persona speaker: {e}");
                    self.format_fallbacks += 1;
                    self.transcript
                        .append(self.persona.name.clone(), display_text, false);
                }
            }
        }

        if complete {
            self.complete_debate();
        }
    }

    // --- Timer pump ------------------------------------------------------

    /// Advance every due timer. Called from the control thread at a coarse
    /// cadence; handlers are deadline-guarded so coincident firings and
    /// repeated polls are safe.
    pub fn poll(&mut self, now: Instant) {
        if let Some(ends) = self.preparation_ends_at {
            if now >= ends && self.phase == ConversationPhase::Preparing {
                info!("preparation countdown elapsed; starting debate");
                self.start_debate(now);
            }
        }

        if let Some(at) = self.duration_guard_at {
            if now >= at {
                // Single-fire, whatever the sub-phase turns out to be.
                self.duration_guard_at = None;
                if !self.duration_guard_fired {
                    self.duration_guard_fired = true;
                    if self.phase == ConversationPhase::Debating
                        && self.sub_phase == ClosingSubPhase::Open
                    {
                        self.steer(duration_guard_text(), true);
                    }
                }
            }
        }

        if let Some(at) = self.closing_tick_at {
            if now >= at {
                self.closing_tick(now);
            }
        }

        if let Some(at) = self.speak_tick_at {
            if now >= at && self.user_detector.is_speaking() && !self.muted {
                self.user_speaking_secs += 1;
                self.speak_tick_at = Some(at + Duration::from_secs(1));
            }
        }

        if let Some(at) = self.nudge_at {
            if now >= at {
                self.nudge_at = None;
                if self.connected && !self.muted && !self.user_detector.is_speaking() {
                    info!("user inactive; sending nudge");
                    self.steer(nudge_text(self.user.display_name()), true);
                }
            }
        }
    }

    // --- Internals -------------------------------------------------------

    fn closing_tick(&mut self, now: Instant) {
        let party_speaking = match self.sub_phase {
            ClosingSubPhase::UserClosing => self.user_detector.is_speaking() && !self.muted,
            ClosingSubPhase::AiClosing => self.ai_detector.is_speaking(),
            ClosingSubPhase::Open => false,
        };
        if !party_speaking || self.closing_halted() {
            self.closing_tick_at = None;
            return;
        }

        self.closing_timer_secs -= 1;
        debug!(secs = self.closing_timer_secs, sub_phase = ?self.sub_phase, "closing tick");

        if self.closing_timer_secs == 0 && !self.chime_played {
            self.chime_played = true;
            self.directives.push_back(Directive::PlayChime);
        }

        if self.sub_phase == ClosingSubPhase::UserClosing
            && self.closing_timer_secs <= self.policy.overtime_cutoff_secs
            && !self.overtime_interrupt_sent
        {
            // Exactly one interrupt per closing statement; the decrement
            // halts so deeper overtime never re-triggers it.
            self.overtime_interrupt_sent = true;
            self.closing_tick_at = None;
            self.steer(overtime_interrupt_text(), false);
            return;
        }

        self.closing_tick_at = Some(now + Duration::from_secs(1));
    }

    fn closing_halted(&self) -> bool {
        self.sub_phase == ClosingSubPhase::UserClosing && self.overtime_interrupt_sent
    }

    fn on_user_speaking_changed(&mut self, speaking: bool) {
        if speaking || self.sub_phase != ClosingSubPhase::UserClosing {
            return;
        }
        // The user finished (or abandoned) their closing statement: stop the
        // countdown and hand the floor to the AI exactly once.
        let was_counting = self.closing_tick_at.take().is_some();
        if was_counting && !self.overtime_interrupt_sent && !self.handoff_sent {
            self.handoff_sent = true;
            self.steer(closing_handoff_text(), true);
        }
    }

    fn enter_user_closing(&mut self, now: Instant) {
        if self.sub_phase != ClosingSubPhase::Open {
            return;
        }
        info!("closing cue detected; user closing statement begins");
        self.sub_phase = ClosingSubPhase::UserClosing;
        self.closing_timer_secs = self.policy.closing_timer_start_secs;
        self.chime_played = false;
        self.overtime_interrupt_sent = false;
        self.handoff_sent = false;
        // The countdown starts immediately when the user is already talking.
        self.closing_tick_at = if self.user_detector.is_speaking() && !self.muted {
            Some(now + Duration::from_secs(1))
        } else {
            None
        };
    }

    fn enter_ai_closing(&mut self, now: Instant) {
        if self.sub_phase != ClosingSubPhase::UserClosing {
            return;
        }
        info!("AI closing statement begins");
        self.sub_phase = ClosingSubPhase::AiClosing;
        self.closing_timer_secs = self.policy.closing_timer_start_secs;
        self.chime_played = false;
        self.closing_tick_at = if self.ai_detector.is_speaking() {
            Some(now + Duration::from_secs(1))
        } else {
            None
        };
    }

    fn arm_closing_tick(&mut self, now: Instant) {
        if self.closing_tick_at.is_none() {
            self.closing_tick_at = Some(now + Duration::from_secs(1));
        }
    }

    fn complete_debate(&mut self) {
        // Exactly once, even if the marker appears in multiple events.
        if self.phase != ConversationPhase::Debating {
            return;
        }
        info!("completion marker observed; moving to analysis");
        self.transcript
            .append_system("Debate complete. Moving to analysis.");
        self.clear_live_state();
        self.directives.push_back(Directive::Disconnect);
        self.set_phase(ConversationPhase::Analyzing);
    }

    fn send_kickoff(&mut self) {
        self.kickoff_sent = true;
        self.steer(kickoff_text(), true);
    }

    fn steer(&mut self, text: String, end_of_turn: bool) {
        self.directives
            .push_back(Directive::Steer(SteeringMessage::new(text, end_of_turn)));
    }

    /// Clear every timer and detector tied to a live conversation.
    fn clear_live_state(&mut self) {
        self.closing_tick_at = None;
        self.duration_guard_at = None;
        self.nudge_at = None;
        self.speak_tick_at = None;
        self.user_speaking_secs = 0;
        self.user_detector.reset();
        self.ai_detector.reset();
    }

    fn set_phase(&mut self, phase: ConversationPhase) {
        info!(from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
        self.sync_recognizer();
    }

    fn sync_recognizer(&mut self) {
        let desired = self.phase.is_live() && !self.muted;
        if desired == self.recognizer_running {
            return;
        }
        self.recognizer_running = desired;
        self.directives.push_back(if desired {
            Directive::StartRecognizer
        } else {
            Directive::StopRecognizer
        });
    }
}

// Steering texts. The model is told the application owns all timing.

fn kickoff_text() -> String {
    "The user is ready. Please begin the debate now by greeting the user and stating your \
     initial position on the topic."
        .to_string()
}

fn duration_guard_text() -> String {
    "The time limit has been reached. Please ask me for my 30-second closing statement, then \
     provide your own, and then say \"DEBATE_COMPLETE\" and nothing else."
        .to_string()
}

fn closing_handoff_text() -> String {
    "(The user has finished their closing statement. Please provide your 30-second closing \
     statement and then say DEBATE_COMPLETE.)"
        .to_string()
}

fn overtime_interrupt_text() -> String {
    "(The user has gone significantly over time. Interrupt them politely, ask them to wrap \
     up, then give your closing statement.)"
        .to_string()
}

fn nudge_text(name: &str) -> String {
    format!("(The user seems unresponsive, prompt them by saying \"What are your thoughts on this, {name}?\")")
}
