/// Windowed RMS volume meter.
///
/// Aggregates samples over a fixed time window and yields one level per
/// window, independent of frame flush boundaries. Levels are clamped to
/// [0, 1] and are a best-effort amplitude metric, not a calibrated one.
pub struct VolumeMeter {
    window_samples: usize,
    sum_sq: f32,
    count: usize,
}

impl VolumeMeter {
    /// Window size adapts to the sample rate so the update cadence stays
    /// constant in wall-clock terms.
    pub fn new(sample_rate: u32, window_ms: u64) -> Self {
        let window_samples =
            ((sample_rate as u64 * window_ms / 1000) as usize).max(128);
        Self {
            window_samples,
            sum_sq: 0.0,
            count: 0,
        }
    }

    /// Push one sample; returns `Some(level)` when a window completes.
    pub fn push(&mut self, sample: f32) -> Option<f32> {
        self.sum_sq += sample * sample;
        self.count += 1;

        if self.count >= self.window_samples {
            let rms = (self.sum_sq / self.count as f32).sqrt();
            self.sum_sq = 0.0;
            self.count = 0;
            Some(rms.clamp(0.0, 1.0))
        } else {
            None
        }
    }
}
