// End-to-end tests for the session handle and its control task, driven
// through a mock transport and a mock recognizer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use sparring::client::{
    ConnectionState, ContentEvent, RealtimeAudio, SessionEvent, SessionSetup, SteeringMessage,
    StreamingSessionClient, PCM_MIME_TYPE,
};
use sparring::error::SparringError;
use sparring::persona::{PersonaDescriptor, UserDescriptor};
use sparring::session::{AudioInputs, ConversationPhase, SessionConfig, SparringSession};
use sparring::stt::{RecognizerEvent, SpeechRecognizer};
use sparring::transcript::SYSTEM_SPEAKER;
use sparring::AudioFrame;

// --- Mock transport -----------------------------------------------------

#[derive(Default)]
struct ClientLog {
    sent: Vec<SteeringMessage>,
    realtime: Vec<RealtimeAudio>,
    connects: usize,
    disconnects: usize,
}

struct MockClient {
    log: Arc<Mutex<ClientLog>>,
    state: ConnectionState,
    events: Option<mpsc::Receiver<SessionEvent>>,
}

impl MockClient {
    fn new() -> (Self, Arc<Mutex<ClientLog>>, mpsc::Sender<SessionEvent>) {
        let log = Arc::new(Mutex::new(ClientLog::default()));
        let (event_tx, event_rx) = mpsc::channel(16);
        let client = Self {
            log: Arc::clone(&log),
            state: ConnectionState::Disconnected,
            events: Some(event_rx),
        };
        (client, log, event_tx)
    }
}

#[async_trait::async_trait]
impl StreamingSessionClient for MockClient {
    async fn connect(&mut self, _setup: SessionSetup) -> Result<(), SparringError> {
        if self.state != ConnectionState::Connected {
            self.state = ConnectionState::Connected;
            self.log.lock().unwrap().connects += 1;
        }
        Ok(())
    }

    async fn send(&mut self, message: SteeringMessage) -> Result<(), SparringError> {
        if self.state != ConnectionState::Connected {
            return Err(SparringError::Connection("not connected".into()));
        }
        self.log.lock().unwrap().sent.push(message);
        Ok(())
    }

    async fn send_realtime(&mut self, entries: Vec<RealtimeAudio>) -> Result<(), SparringError> {
        if self.state != ConnectionState::Connected {
            return Err(SparringError::Connection("not connected".into()));
        }
        self.log.lock().unwrap().realtime.extend(entries);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.state == ConnectionState::Connected {
            self.log.lock().unwrap().disconnects += 1;
        }
        self.state = ConnectionState::Disconnected;
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn take_events(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.events.take()
    }
}

// --- Mock recognizer ----------------------------------------------------

#[derive(Default)]
struct RecognizerState {
    sender: Option<mpsc::Sender<RecognizerEvent>>,
    starts: usize,
}

struct MockRecognizer {
    supported: bool,
    state: Arc<Mutex<RecognizerState>>,
}

impl MockRecognizer {
    fn new(supported: bool) -> (Self, Arc<Mutex<RecognizerState>>) {
        let state = Arc::new(Mutex::new(RecognizerState::default()));
        (
            Self {
                supported,
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for MockRecognizer {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<RecognizerEvent>, SparringError> {
        let (tx, rx) = mpsc::channel(16);
        let mut state = self.state.lock().unwrap();
        state.sender = Some(tx);
        state.starts += 1;
        Ok(rx)
    }

    async fn stop(&mut self) {
        // Dropping the sender closes the event stream.
        self.state.lock().unwrap().sender = None;
    }
}

fn emit_final(state: &Arc<Mutex<RecognizerState>>, text: &str) {
    let sender = state.lock().unwrap().sender.clone().expect("stream running");
    sender.try_send(RecognizerEvent::Final(text.into())).expect("send final");
}

// --- Harness ------------------------------------------------------------

struct Harness {
    session: SparringSession,
    client: Arc<Mutex<ClientLog>>,
    events: mpsc::Sender<SessionEvent>,
    recognizer: Arc<Mutex<RecognizerState>>,
    frames: mpsc::Sender<AudioFrame>,
    #[allow(dead_code)]
    user_volume: mpsc::Sender<f32>,
    #[allow(dead_code)]
    ai_volume: mpsc::Sender<f32>,
}

fn harness(recognizer_supported: bool) -> Harness {
    let persona = PersonaDescriptor {
        name: "Rival".into(),
        personality: "relentless".into(),
        rules: "no concessions".into(),
        voice: "Aoede".into(),
    };
    let user = UserDescriptor {
        name: Some("Priya".into()),
        college: None,
        state: None,
    };
    let config = SessionConfig::new(persona, user, "You are a debate opponent.");

    let (client, client_log, event_tx) = MockClient::new();
    let (recognizer, recognizer_state) = MockRecognizer::new(recognizer_supported);

    let (frame_tx, frame_rx) = mpsc::channel(32);
    let (user_tx, user_rx) = mpsc::channel(32);
    let (ai_tx, ai_rx) = mpsc::channel(32);
    let inputs = AudioInputs {
        frames: frame_rx,
        user_volume: user_rx,
        ai_volume: ai_rx,
    };

    let session = SparringSession::spawn(config, Box::new(client), Box::new(recognizer), inputs);
    Harness {
        session,
        client: client_log,
        events: event_tx,
        recognizer: recognizer_state,
        frames: frame_tx,
        user_volume: user_tx,
        ai_volume: ai_tx,
    }
}

impl Harness {
    /// Drive the session into a connected, unmuted debate.
    async fn into_debate(&self) {
        self.session.start_onboarding().await.expect("command");
        self.session.start_preparation(None).await.expect("command");
        self.session.start_debate().await.expect("command");
        self.session.set_muted(false).await.expect("command");
        wait_for(|| self.session.phase() == ConversationPhase::Debating).await;
    }

    fn notice_count(&self, needle: &str) -> usize {
        self.session
            .transcript()
            .snapshot()
            .iter()
            .filter(|i| i.speaker == SYSTEM_SPEAKER && i.text.contains(needle))
            .count()
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}

// --- Tests --------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn commands_drive_the_phases() {
    let h = harness(true);
    assert_eq!(h.session.phase(), ConversationPhase::Idle);

    h.session.start_onboarding().await.expect("command");
    wait_for(|| h.session.phase() == ConversationPhase::Onboarding).await;

    h.session
        .start_preparation(Some("pineapple on pizza".into()))
        .await
        .expect("command");
    wait_for(|| h.session.phase() == ConversationPhase::Preparing).await;

    h.session.start_debate().await.expect("command");
    wait_for(|| h.session.phase() == ConversationPhase::Debating).await;

    // Entering the debate connects the transport and sends the kickoff.
    wait_for(|| !h.client.lock().unwrap().sent.is_empty()).await;
    let log = h.client.lock().unwrap();
    assert_eq!(log.connects, 1);
    assert!(log.sent[0].text.contains("begin the debate"));
    assert!(log.sent[0].end_of_turn);
}

#[tokio::test(flavor = "multi_thread")]
async fn completion_marker_moves_to_analysis_and_disconnects() {
    let h = harness(true);
    h.into_debate().await;

    h.events
        .send(SessionEvent::Content(ContentEvent::from_text(
            "[Rival]: Well argued. DEBATE_COMPLETE",
        )))
        .await
        .expect("inject event");

    wait_for(|| h.session.phase() == ConversationPhase::Analyzing).await;
    wait_for(|| h.client.lock().unwrap().disconnects >= 1).await;

    let items = h.session.transcript().snapshot();
    let spoken = items
        .iter()
        .find(|i| i.speaker == "Rival")
        .expect("parsed model line");
    assert_eq!(spoken.text, "Well argued.");
    assert_eq!(h.notice_count("Moving to analysis"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn transport_close_marks_the_session_disconnected() {
    let h = harness(true);
    h.into_debate().await;

    h.events.send(SessionEvent::Closed).await.expect("inject event");
    wait_for(|| !h.session.stats().connected).await;
    // The phase is unaffected; only the transport state changes.
    assert_eq!(h.session.phase(), ConversationPhase::Debating);
}

#[tokio::test(flavor = "multi_thread")]
async fn recognizer_finals_append_as_user_speech() {
    let h = harness(true);
    h.into_debate().await;

    // Unmuting in a live phase starts the recognition stream.
    wait_for(|| h.recognizer.lock().unwrap().starts == 1).await;
    emit_final(&h.recognizer, "I disagree entirely");

    wait_for(|| h.session.transcript().snapshot().iter().any(|i| i.is_user)).await;
    let items = h.session.transcript().snapshot();
    let line = items.iter().find(|i| i.is_user).expect("user line");
    assert_eq!(line.speaker, "Priya");
    assert_eq!(line.text, "I disagree entirely");
}

#[tokio::test(flavor = "multi_thread")]
async fn recognizer_restarts_after_backend_ends() {
    let h = harness(true);
    h.into_debate().await;
    wait_for(|| h.recognizer.lock().unwrap().starts == 1).await;

    // Simulate the backend terminating on its own.
    let sender = h.recognizer.lock().unwrap().sender.clone().expect("stream");
    sender.try_send(RecognizerEvent::Ended).expect("send ended");

    wait_for(|| h.recognizer.lock().unwrap().starts >= 2).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unsupported_recognizer_posts_exactly_one_notice() {
    let h = harness(false);
    h.into_debate().await;

    wait_for(|| h.notice_count("Speech-to-text is not available") == 1).await;
    assert_eq!(h.recognizer.lock().unwrap().starts, 0);

    // Toggling mute would restart recognition if it were available; the
    // degraded bridge must not post again.
    h.session.set_muted(true).await.expect("command");
    h.session.set_muted(false).await.expect("command");
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.notice_count("Speech-to-text is not available"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn frames_forward_only_while_live_and_unmuted() {
    let h = harness(true);
    let frame = AudioFrame {
        samples: vec![0i16; 2048],
        sample_rate: 16_000,
        timestamp_ms: 0,
    };

    // Idle and muted: the frame is consumed and dropped.
    h.frames.send(frame.clone()).await.expect("send frame");
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(h.client.lock().unwrap().realtime.is_empty());

    h.into_debate().await;
    h.frames.send(frame).await.expect("send frame");
    wait_for(|| !h.client.lock().unwrap().realtime.is_empty()).await;

    let log = h.client.lock().unwrap();
    assert_eq!(log.realtime.len(), 1);
    assert_eq!(log.realtime[0].mime_type, PCM_MIME_TYPE);
}

#[tokio::test(flavor = "multi_thread")]
async fn sustained_user_volume_accrues_speaking_time() {
    let h = harness(true);
    h.into_debate().await;

    h.user_volume.send(0.5).await.expect("send volume");
    wait_for_speaking_time(&h).await;
}

async fn wait_for_speaking_time(h: &Harness) {
    // The speaking tick is one second, so allow a little over that.
    for _ in 0..30 {
        if h.session.stats().user_speaking_secs >= 1 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("no speaking time accrued");
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_stops_the_control_task() {
    let mut h = harness(true);
    h.into_debate().await;

    h.session.shutdown().await;
    assert!(h.session.start_onboarding().await.is_err());
    // Teardown disconnects the transport.
    assert_eq!(h.client.lock().unwrap().disconnects, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn stats_reflect_machine_state() {
    let h = harness(true);
    h.into_debate().await;

    let stats = h.session.stats();
    assert_eq!(stats.phase, ConversationPhase::Debating);
    assert!(stats.connected);
    assert!(!stats.muted);
    assert!(stats.session_id.starts_with("sparring-"));
    assert_eq!(stats.closing_timer_secs, 30);
}
