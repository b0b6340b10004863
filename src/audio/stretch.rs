//! Pitch-preserving time-stretch (WSOLA).
//!
//! Waveform-similarity overlap-add: Hann-windowed frames are taken from the input at
//! `ratio` times the output hop, each nudged within a small tolerance so it lines up
//! with the natural continuation of the previous frame, then overlap-added at a fixed
//! hop. Alignment is computed once on the channel average and applied to every channel.

use crate::audio::buffer::AudioBuffer;
use crate::error::{RedubError, Result};
use std::f32::consts::PI;

/// Analysis window duration in seconds.
const FRAME_SECS: f64 = 0.040;

/// Smallest usable window, whatever the sample rate.
const MIN_FRAME: usize = 64;

/// Correlation is evaluated on roughly this many points per candidate.
const CORRELATION_POINTS: usize = 256;

/// Stretch `buffer` so that its length becomes `round(len / ratio)`.
///
/// `ratio > 1` shortens (speeds up) the audio, `ratio < 1` lengthens it. Input that is
/// too short to hold two analysis windows cannot be stretched and is reported as an
/// error so callers can fall back to another strategy.
pub fn time_stretch(buffer: &AudioBuffer, ratio: f64) -> Result<AudioBuffer> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(RedubError::Stretch {
            message: format!("ratio must be a positive number, got {}", ratio),
        });
    }

    let len = buffer.len();
    let output_len = (len as f64 / ratio).round() as usize;
    if (ratio - 1.0).abs() < f64::EPSILON {
        return Ok(buffer.clone());
    }

    let frame_len = frame_length(buffer.sample_rate());
    if len < frame_len * 2 {
        return Err(RedubError::Stretch {
            message: format!(
                "input of {} frames is shorter than two {}-frame windows",
                len, frame_len
            ),
        });
    }
    if output_len == 0 {
        return Err(RedubError::Stretch {
            message: format!("ratio {:.2} leaves no output", ratio),
        });
    }

    let hop = frame_len / 2;
    let tolerance = hop / 2;
    let stride = (frame_len / CORRELATION_POINTS).max(1);
    let max_start = len - frame_len;
    let window = hann(frame_len);
    let guide = buffer.mono_mix();

    let capacity = output_len + frame_len;
    let mut output = vec![vec![0.0_f32; capacity]; buffer.channel_count()];
    let mut norm = vec![0.0_f32; capacity];

    let mut previous = 0usize;
    let mut k = 0usize;
    while k * hop < output_len {
        let out_pos = k * hop;
        let nominal = ((k * hop) as f64 * ratio).round() as usize;

        let chosen = if k == 0 {
            0
        } else {
            let natural = (previous + hop).min(max_start);
            best_offset(&guide, natural, nominal, tolerance, max_start, frame_len, stride)
        };

        for (out_channel, in_channel) in output.iter_mut().zip(buffer.channels()) {
            let source = &in_channel[chosen..chosen + frame_len];
            for (i, (&s, &w)) in source.iter().zip(&window).enumerate() {
                out_channel[out_pos + i] += s * w;
            }
        }
        for (i, &w) in window.iter().enumerate() {
            norm[out_pos + i] += w;
        }

        previous = chosen;
        k += 1;
    }

    for channel in &mut output {
        for (sample, &n) in channel.iter_mut().zip(&norm) {
            if n > 1e-3 {
                *sample /= n;
            }
        }
        channel.truncate(output_len);
    }

    Ok(AudioBuffer::new(output, buffer.sample_rate()))
}

fn frame_length(sample_rate: u32) -> usize {
    let frame = (f64::from(sample_rate) * FRAME_SECS) as usize;
    // even, so the hop splits it exactly
    frame.max(MIN_FRAME) & !1
}

/// Periodic Hann window: overlapping at half its length sums to one.
fn hann(len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / len as f32).cos())
        .collect()
}

/// Start position within `nominal ± tolerance` whose frame best matches the frame
/// starting at `natural`.
fn best_offset(
    guide: &[f32],
    natural: usize,
    nominal: usize,
    tolerance: usize,
    max_start: usize,
    frame_len: usize,
    stride: usize,
) -> usize {
    let low = nominal.saturating_sub(tolerance).min(max_start);
    let high = (nominal + tolerance).min(max_start);
    let reference = &guide[natural..natural + frame_len];

    let mut best = low;
    let mut best_score = f32::NEG_INFINITY;
    for candidate in (low..=high).step_by(stride) {
        let segment = &guide[candidate..candidate + frame_len];
        let score: f32 = reference
            .iter()
            .zip(segment)
            .step_by(stride)
            .map(|(a, b)| a * b)
            .sum();
        if score > best_score {
            best_score = score;
            best = candidate;
        }
    }
    best
}
