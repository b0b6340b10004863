//! Planar in-memory audio exchanged between the mixing steps.

/// Multi-channel audio held as one `Vec<f32>` per channel, normalized to [-1.0, 1.0].
///
/// All channels have the same length. Lengths are counted in frames (samples per channel).
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Build a buffer from planar channels.
    ///
    /// Channels shorter than the longest one are right-padded with silence.
    pub fn new(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        for channel in &mut channels {
            channel.resize(frames, 0.0);
        }
        Self {
            channels,
            sample_rate,
        }
    }

    /// Single-channel buffer.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(vec![samples], sample_rate)
    }

    /// Silent buffer with the given layout.
    pub fn silent(channel_count: usize, frames: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; channel_count],
            sample_rate,
        }
    }

    /// Split interleaved samples `[L, R, L, R, ...]` into planar channels.
    ///
    /// A trailing partial frame is dropped.
    pub fn from_interleaved(samples: &[f32], channel_count: u16, sample_rate: u32) -> Self {
        let count = usize::from(channel_count.max(1));
        let frames = samples.len() / count;
        let mut channels = vec![Vec::with_capacity(frames); count];
        for frame in samples.chunks_exact(count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        Self {
            channels,
            sample_rate,
        }
    }

    /// Interleave planar channels back into `[L, R, L, R, ...]`.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let frames = self.len();
        let mut interleaved = Vec::with_capacity(frames * self.channels.len());
        for frame_idx in 0..frames {
            for channel in &self.channels {
                interleaved.push(channel[frame_idx]);
            }
        }
        interleaved
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Length in frames.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut [Vec<f32>] {
        &mut self.channels
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / f64::from(self.sample_rate)
    }

    /// Average of all channels, used for analysis (trimming, stretch alignment).
    pub fn mono_mix(&self) -> Vec<f32> {
        let count = self.channels.len();
        if count == 0 {
            return Vec::new();
        }
        if count == 1 {
            return self.channels[0].clone();
        }
        let scale = 1.0 / count as f32;
        (0..self.len())
            .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() * scale)
            .collect()
    }

    /// Copy a mono buffer into `channel_count` identical channels.
    ///
    /// Returns `None` unless the buffer is mono.
    pub fn broadcast(&self, channel_count: usize) -> Option<AudioBuffer> {
        if self.channels.len() != 1 {
            return None;
        }
        Some(Self {
            channels: vec![self.channels[0].clone(); channel_count],
            sample_rate: self.sample_rate,
        })
    }

    /// Keep frames `start..end` (clamped to the buffer).
    pub fn slice(&self, start: usize, end: usize) -> AudioBuffer {
        let end = end.min(self.len());
        let start = start.min(end);
        Self {
            channels: self
                .channels
                .iter()
                .map(|c| c[start..end].to_vec())
                .collect(),
            sample_rate: self.sample_rate,
        }
    }

    /// Right-pad with silence up to `frames`. No-op when already long enough.
    pub fn pad_to(&mut self, frames: usize) {
        if frames <= self.len() {
            return;
        }
        for channel in &mut self.channels {
            channel.resize(frames, 0.0);
        }
    }

    /// Cut down to at most `frames`.
    pub fn truncate(&mut self, frames: usize) {
        for channel in &mut self.channels {
            channel.truncate(frames);
        }
    }

    /// Largest absolute sample value across all channels.
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0_f32, |peak, s| peak.max(s.abs()))
    }

    /// Multiply every sample by `gain`.
    pub fn apply_gain(&mut self, gain: f32) {
        for sample in self.channels.iter_mut().flat_map(|c| c.iter_mut()) {
            *sample *= gain;
        }
    }

    /// Divide every sample by `divisor`.
    pub fn divide(&mut self, divisor: f32) {
        for sample in self.channels.iter_mut().flat_map(|c| c.iter_mut()) {
            *sample /= divisor;
        }
    }
}

/// Convert a frame count at `sample_rate` to milliseconds.
pub fn frames_to_ms(frames: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    frames as f64 / f64::from(sample_rate) * 1000.0
}
