pub mod backend;
pub mod capture;
pub mod encoder;
pub mod level;

pub use backend::{AudioBackend, AudioFrame, CaptureConfig, CaptureStreams};
pub use capture::MicCapture;
pub use encoder::{encode_sample, FrameEncoder};
pub use level::VolumeMeter;
