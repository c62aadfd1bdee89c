use tokio::sync::mpsc;

use crate::error::SparringError;

/// PCM audio ready for the realtime transport (16-bit signed, mono).
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM).
    pub samples: Vec<i16>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Timestamp in milliseconds since capture started.
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Little-endian byte serialization for the wire.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Configuration for an audio capture backend.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per emitted frame.
    pub frame_samples: usize,
    /// RMS volume window in milliseconds.
    pub volume_window_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_samples: 2048,
            volume_window_ms: 32,
        }
    }
}

/// The two event streams a capture backend produces. Both channels close
/// when capture stops, including silent stops on device loss; the absence
/// of further frames is the stop signal.
pub struct CaptureStreams {
    /// Full frames ready for the transport.
    pub frames: mpsc::Receiver<AudioFrame>,
    /// Periodic amplitude samples in [0, 1].
    pub volume: mpsc::Receiver<f32>,
}

/// Audio capture backend trait.
///
/// The sample-to-frame conversion runs on the backend's own realtime
/// execution context; it communicates with the control thread exclusively
/// through the buffered channels in [`CaptureStreams`].
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing. Fails with [`SparringError::Permission`] when the
    /// microphone is unavailable and with [`SparringError::Capture`] when
    /// called while already running (the first caller holds the streams);
    /// a failed start produces no events.
    async fn start(&mut self) -> Result<CaptureStreams, SparringError>;

    /// Stop capturing and release the audio graph. Idempotent.
    async fn stop(&mut self);

    /// Whether the backend is currently capturing.
    fn is_capturing(&self) -> bool;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
