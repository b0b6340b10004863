//! Leading/trailing silence removal.
//!
//! Frames are scored by RMS energy of the channel average. A frame is silent when it
//! sits more than `top_db` below the loudest frame. Everything before the first and
//! after the last non-silent frame is dropped.

use crate::audio::buffer::AudioBuffer;
use crate::defaults;
use crate::error::{RedubError, Result};

/// Frame layout for the trimmer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimConfig {
    pub top_db: f32,
    pub frame_length: usize,
    pub hop_length: usize,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            top_db: defaults::TRIM_TOP_DB,
            frame_length: defaults::TRIM_FRAME_LENGTH,
            hop_length: defaults::TRIM_HOP_LENGTH,
        }
    }
}

/// Return the non-silent span of `buffer`.
///
/// Fully silent input (all zeros) is returned unchanged: with no reference level
/// there is nothing to measure against.
pub fn trim_silence(buffer: &AudioBuffer, config: &TrimConfig) -> Result<AudioBuffer> {
    if !config.top_db.is_finite() || config.top_db <= 0.0 {
        return Err(RedubError::Trim {
            message: format!("top_db must be a positive number, got {}", config.top_db),
        });
    }
    if config.frame_length == 0 || config.hop_length == 0 {
        return Err(RedubError::Trim {
            message: "frame and hop length must be non-zero".to_string(),
        });
    }
    if buffer.channel_count() == 0 {
        return Err(RedubError::Trim {
            message: "buffer has no channels".to_string(),
        });
    }
    if buffer.is_empty() {
        return Ok(buffer.clone());
    }

    let (start, end) = match non_silent_span(&buffer.mono_mix(), config) {
        Some(span) => span,
        None => return Ok(buffer.clone()),
    };
    Ok(buffer.slice(start, end))
}

/// Sample range `start..end` covering every non-silent frame, or `None` when the
/// signal carries no energy at all.
fn non_silent_span(samples: &[f32], config: &TrimConfig) -> Option<(usize, usize)> {
    let len = samples.len();
    let powers: Vec<f32> = (0..len)
        .step_by(config.hop_length)
        .map(|start| {
            let frame = &samples[start..(start + config.frame_length).min(len)];
            frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32
        })
        .collect();

    let reference = powers.iter().copied().fold(0.0_f32, f32::max);
    if reference <= 0.0 {
        return None;
    }

    // power ratio in dB: 10 * log10(p / ref) > -top_db
    let threshold = reference * 10f32.powf(-config.top_db / 10.0);
    let first = powers.iter().position(|&p| p > threshold)?;
    let last = powers.iter().rposition(|&p| p > threshold)?;

    let start = first * config.hop_length;
    let end = (last * config.hop_length + config.frame_length).min(len);
    Some((start, end))
}
