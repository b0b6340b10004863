//! Sample rate conversion using rubato.

use crate::audio::buffer::AudioBuffer;
use crate::error::{RedubError, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Frames fed to rubato per call.
const CHUNK_FRAMES: usize = 1024;

/// Resample every channel of `buffer` to `target_rate`.
///
/// The result always holds exactly `ceil(len * target_rate / source_rate)` frames:
/// rubato's output delay is skipped and the tail is flushed, so no audio is shifted
/// or lost at either end.
pub fn resample(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    let source_rate = buffer.sample_rate();
    if source_rate == target_rate {
        debug!("Sample rate already at {}Hz, skipping resample", target_rate);
        return Ok(buffer.clone());
    }

    let fail = |message: String| RedubError::Resample {
        from: source_rate,
        to: target_rate,
        message,
    };
    if source_rate == 0 || target_rate == 0 {
        return Err(fail("sample rate must be positive".to_string()));
    }

    let channel_count = buffer.channel_count();
    let frames = buffer.len();
    if channel_count == 0 || frames == 0 {
        return Ok(AudioBuffer::silent(channel_count, 0, target_rate));
    }

    let ratio = f64::from(target_rate) / f64::from(source_rate);
    let expected = (frames as u64 * u64::from(target_rate)).div_ceil(u64::from(source_rate)) as usize;

    debug!(
        "Resampling {} frames from {}Hz to {}Hz ({} channels)",
        frames, source_rate, target_rate, channel_count
    );

    let mut resampler = FastFixedIn::<f32>::new(
        ratio,
        1.0,
        PolynomialDegree::Septic,
        CHUNK_FRAMES,
        channel_count,
    )
    .map_err(|e| fail(format!("Failed to create resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let wanted = expected + delay;
    let input = buffer.channels();
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(wanted); channel_count];

    let mut position = 0;
    while frames - position >= resampler.input_frames_next() {
        let next = resampler.input_frames_next();
        let chunk: Vec<&[f32]> = input.iter().map(|c| &c[position..position + next]).collect();
        let produced = resampler
            .process(&chunk, None)
            .map_err(|e| fail(e.to_string()))?;
        append(&mut output, produced);
        position += next;
    }

    if position < frames {
        let chunk: Vec<&[f32]> = input.iter().map(|c| &c[position..]).collect();
        let produced = resampler
            .process_partial(Some(chunk.as_slice()), None)
            .map_err(|e| fail(e.to_string()))?;
        append(&mut output, produced);
    }

    // Push silence through until the delayed tail has come out.
    while output[0].len() < wanted {
        let produced = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| fail(e.to_string()))?;
        if produced.first().is_none_or(|c| c.is_empty()) {
            break;
        }
        append(&mut output, produced);
    }

    for channel in &mut output {
        channel.drain(..delay.min(channel.len()));
        channel.resize(expected, 0.0);
    }

    Ok(AudioBuffer::new(output, target_rate))
}

fn append(output: &mut [Vec<f32>], produced: Vec<Vec<f32>>) {
    for (channel, block) in output.iter_mut().zip(produced) {
        channel.extend_from_slice(&block);
    }
}
