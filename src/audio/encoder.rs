use super::backend::AudioFrame;

/// Convert one floating-point sample to 16-bit signed PCM.
///
/// Clamps to [-1.0, 1.0], then scales negative values by 32768 and
/// non-negative values by 32767, truncating toward zero. This matches the
/// asymmetric i16 range exactly: -1.0 maps to -32768 and 1.0 to 32767.
#[inline]
pub fn encode_sample(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Accumulates converted samples into fixed-capacity frames.
///
/// A frame is emitted the moment the buffer fills exactly; a partially
/// filled buffer is retained across calls and flushed on a later fill,
/// never discarded mid-session.
pub struct FrameEncoder {
    buffer: Vec<i16>,
    capacity: usize,
    sample_rate: u32,
    samples_emitted: u64,
}

impl FrameEncoder {
    pub fn new(capacity: usize, sample_rate: u32) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            sample_rate,
            samples_emitted: 0,
        }
    }

    /// Feed floating-point samples, invoking `emit` for every full frame.
    pub fn push<F>(&mut self, samples: &[f32], mut emit: F)
    where
        F: FnMut(AudioFrame),
    {
        for &sample in samples {
            self.buffer.push(encode_sample(sample));
            if self.buffer.len() >= self.capacity {
                let frame_samples = std::mem::replace(
                    &mut self.buffer,
                    Vec::with_capacity(self.capacity),
                );
                let timestamp_ms = self.samples_emitted * 1000 / u64::from(self.sample_rate);
                self.samples_emitted += frame_samples.len() as u64;
                emit(AudioFrame {
                    samples: frame_samples,
                    sample_rate: self.sample_rate,
                    timestamp_ms,
                });
            }
        }
    }

    /// Number of samples retained in the partial buffer.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_reference_samples() {
        assert_eq!(encode_sample(1.0), 32767);
        assert_eq!(encode_sample(-1.0), -32768);
        assert_eq!(encode_sample(0.0), 0);
        assert_eq!(encode_sample(1.5), 32767);
        assert_eq!(encode_sample(-2.0), -32768);
    }

    #[test]
    fn encodes_midrange_samples() {
        assert_eq!(encode_sample(0.5), 16383);
        assert_eq!(encode_sample(-0.5), -16384);
    }

    #[test]
    fn flushes_exactly_on_capacity() {
        let mut encoder = FrameEncoder::new(2048, 16_000);
        let mut frames = Vec::new();
        encoder.push(&vec![0.25; 2048], |f| frames.push(f));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples.len(), 2048);
        assert_eq!(encoder.pending(), 0);
    }

    #[test]
    fn retains_partial_buffer_across_calls() {
        let mut encoder = FrameEncoder::new(2048, 16_000);
        let mut frames = Vec::new();
        encoder.push(&vec![0.1; 2049], |f| frames.push(f));

        assert_eq!(frames.len(), 1);
        assert_eq!(encoder.pending(), 1);

        // The retained sample flushes with the next fill.
        encoder.push(&vec![0.1; 2047], |f| frames.push(f));
        assert_eq!(frames.len(), 2);
        assert_eq!(encoder.pending(), 0);
    }

    #[test]
    fn frame_timestamps_advance_by_frame_duration() {
        let mut encoder = FrameEncoder::new(2048, 16_000);
        let mut frames = Vec::new();
        encoder.push(&vec![0.0; 4096], |f| frames.push(f));

        assert_eq!(frames[0].timestamp_ms, 0);
        // 2048 samples at 16 kHz is 128 ms.
        assert_eq!(frames[1].timestamp_ms, 128);
    }
}
