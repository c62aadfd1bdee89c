use anyhow::Result;
use serde::Deserialize;

use crate::session::SessionPolicy;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub audio: AudioSettings,
    #[serde(default)]
    pub policy: SessionPolicy,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "sparring".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Capture sample rate in Hz. The realtime transport is fixed to 16 kHz
    /// PCM, so this is also the encode rate.
    pub sample_rate: u32,
    /// Samples per outbound frame. Frames flush exactly on this boundary.
    pub frame_samples: usize,
    /// RMS volume window in milliseconds.
    pub volume_window_ms: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_samples: 2048,
            volume_window_ms: 32,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
