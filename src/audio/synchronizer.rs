//! Dub/background mixing engine.
//!
//! Combines a synthesized voice track with the separated background so that both share
//! one sample rate, one channel layout and the background's length, then sums them at
//! fixed gains with peak protection.

use crate::audio::buffer::{AudioBuffer, frames_to_ms};
use crate::audio::resample::resample;
use crate::audio::stretch::time_stretch;
use crate::audio::trim::{TrimConfig, trim_silence};
use crate::audio::wav::{read_wav, write_wav};
use crate::defaults;
use crate::error::{RedubError, Result};
use std::path::Path;
use tracing::{debug, info, warn};

/// Mixing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub foreground_gain: f32,
    pub background_gain: f32,
    /// Overrun (ms) a longer foreground may have before it is stretched.
    pub tolerance_ms: f64,
    /// Stretch ratios above this still apply, with a quality warning.
    pub stretch_warn_ratio: f64,
    pub trim: TrimConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            foreground_gain: defaults::FOREGROUND_GAIN,
            background_gain: defaults::BACKGROUND_GAIN,
            tolerance_ms: defaults::SYNC_TOLERANCE_MS,
            stretch_warn_ratio: defaults::STRETCH_WARN_RATIO,
            trim: TrimConfig::default(),
        }
    }
}

/// How the foreground length is reconciled with the target length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DurationPlan {
    /// Within tolerance (or nothing to measure against): leave as is.
    Keep,
    /// Foreground is shorter: append this many frames of silence.
    Pad { frames: usize },
    /// Foreground overruns beyond tolerance: compress by `ratio`.
    Stretch { ratio: f64 },
}

impl DurationPlan {
    /// Decide with the default 100 ms tolerance.
    pub fn decide(fg_len: usize, target_len: usize, sample_rate: u32) -> Self {
        Self::decide_with_tolerance(fg_len, target_len, sample_rate, defaults::SYNC_TOLERANCE_MS)
    }

    pub fn decide_with_tolerance(
        fg_len: usize,
        target_len: usize,
        sample_rate: u32,
        tolerance_ms: f64,
    ) -> Self {
        if target_len == 0 {
            return DurationPlan::Keep;
        }
        if fg_len < target_len {
            return DurationPlan::Pad {
                frames: target_len - fg_len,
            };
        }
        let delta_ms = frames_to_ms(fg_len - target_len, sample_rate);
        match stretch_ratio(fg_len, target_len) {
            Some(ratio) if delta_ms > tolerance_ms => DurationPlan::Stretch { ratio },
            _ => DurationPlan::Keep,
        }
    }
}

/// `fg_len / target_len`, or `None` for an empty target.
pub fn stretch_ratio(fg_len: usize, target_len: usize) -> Option<f64> {
    if target_len == 0 {
        return None;
    }
    Some(fg_len as f64 / target_len as f64)
}

/// What a mix did, for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct MixReport {
    pub sample_rate: u32,
    pub channels: usize,
    pub frames: usize,
    pub plan: DurationPlan,
    /// Stretch was planned but failed, so the foreground was truncated instead.
    pub stretch_fell_back: bool,
    /// Peak of the raw sum when it had to be scaled down to full scale.
    pub normalized_from: Option<f32>,
}

/// Stateless mixer; holds only its configuration.
#[derive(Debug, Clone, Default)]
pub struct AudioSynchronizer {
    config: SyncConfig,
}

impl AudioSynchronizer {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Mix two WAV files into `output`.
    ///
    /// Read, resample and write errors are returned; in that case nothing is left at
    /// `output`.
    pub fn mix_files(&self, foreground: &Path, background: &Path, output: &Path) -> Result<MixReport> {
        let fg = read_wav(foreground)?;
        let bg = read_wav(background)?;
        debug!(
            "Mixing {} ({} ch @ {}Hz, {} frames) over {} ({} ch @ {}Hz, {} frames)",
            foreground.display(),
            fg.channel_count(),
            fg.sample_rate(),
            fg.len(),
            background.display(),
            bg.channel_count(),
            bg.sample_rate(),
            bg.len()
        );

        let (mixed, report) = self.mix_buffers(fg, bg)?;
        write_wav(output, &mixed)?;
        info!(
            "Mixed {:.2}s at {}Hz into {}",
            mixed.duration_secs(),
            report.sample_rate,
            output.display()
        );
        Ok(report)
    }

    /// Mix in memory. The result has the background's length; a mono side is widened
    /// to the other side's channel count.
    pub fn mix_buffers(&self, fg: AudioBuffer, bg: AudioBuffer) -> Result<(AudioBuffer, MixReport)> {
        if bg.channel_count() == 0 || fg.channel_count() == 0 {
            return Err(RedubError::Mix {
                message: "both tracks need at least one channel".to_string(),
            });
        }

        // Only ever upsample toward the better rate.
        let target_rate = fg.sample_rate().max(bg.sample_rate());
        let fg = resample(&fg, target_rate)?;
        let bg = resample(&bg, target_rate)?;

        let fg = match trim_silence(&fg, &self.config.trim) {
            Ok(trimmed) => {
                if trimmed.len() != fg.len() {
                    debug!("Trimmed {} -> {} frames of dub", fg.len(), trimmed.len());
                }
                trimmed
            }
            Err(e) => {
                warn!("Silence trimming failed, keeping untrimmed dub: {}", e);
                fg
            }
        };

        let (mut fg, mut bg) = reconcile_channels(fg, bg);

        let target_len = bg.len();
        let plan = DurationPlan::decide_with_tolerance(
            fg.len(),
            target_len,
            target_rate,
            self.config.tolerance_ms,
        );
        let mut stretch_fell_back = false;
        match plan {
            DurationPlan::Stretch { ratio } => {
                if ratio > self.config.stretch_warn_ratio {
                    warn!(
                        "Dub is {:.0}% longer than the original; stretching by {:.2}x may sound unnatural",
                        (ratio - 1.0) * 100.0,
                        ratio
                    );
                } else {
                    info!("Stretching dub by {:.2}x to fit", ratio);
                }
                match time_stretch(&fg, ratio) {
                    Ok(stretched) => fg = stretched,
                    Err(e) => {
                        warn!("Time stretch failed, truncating dub instead: {}", e);
                        stretch_fell_back = true;
                    }
                }
            }
            DurationPlan::Pad { frames } => {
                debug!("Padding dub with {} frames of silence", frames);
                fg.pad_to(target_len);
            }
            DurationPlan::Keep => {}
        }

        // Stretch rounding can land a frame short.
        fg.pad_to(target_len);
        fg.truncate(target_len);
        bg.truncate(target_len);

        let mut mixed = bg;
        mixed.apply_gain(self.config.background_gain);
        for (out, voice) in mixed.channels_mut().iter_mut().zip(fg.channels()) {
            for (sample, &v) in out.iter_mut().zip(voice) {
                *sample += v * self.config.foreground_gain;
            }
        }

        let peak = mixed.peak();
        let normalized_from = if peak > 1.0 {
            debug!("Normalizing mix peak {:.3} to full scale", peak);
            mixed.divide(peak);
            Some(peak)
        } else {
            None
        };

        let report = MixReport {
            sample_rate: target_rate,
            channels: mixed.channel_count(),
            frames: mixed.len(),
            plan,
            stretch_fell_back,
            normalized_from,
        };
        Ok((mixed, report))
    }
}

/// Broadcast a mono side to the other side's layout; anything else passes through.
fn reconcile_channels(fg: AudioBuffer, bg: AudioBuffer) -> (AudioBuffer, AudioBuffer) {
    let (fg_count, bg_count) = (fg.channel_count(), bg.channel_count());
    if fg_count == bg_count {
        return (fg, bg);
    }
    if let Some(wide) = fg.broadcast(bg_count) {
        return (wide, bg);
    }
    if let Some(wide) = bg.broadcast(fg_count) {
        return (fg, wide);
    }
    warn!(
        "Unsupported channel layout mix ({} dub channels, {} background channels); mixing overlapping channels only",
        fg_count, bg_count
    );
    (fg, bg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(channels: usize, frames: usize, level: f32, rate: u32) -> AudioBuffer {
        AudioBuffer::new(vec![vec![level; frames]; channels], rate)
    }

    #[test]
    fn plan_tolerance_tie_break() {
        // 16 frames per ms at 16 kHz
        assert_eq!(DurationPlan::decide(16000 + 99 * 16, 16000, 16000), DurationPlan::Keep);
        assert!(matches!(
            DurationPlan::decide(16000 + 101 * 16, 16000, 16000),
            DurationPlan::Stretch { .. }
        ));
        assert_eq!(
            DurationPlan::decide(16000 - 16, 16000, 16000),
            DurationPlan::Pad { frames: 16 }
        );
        assert_eq!(
            DurationPlan::decide(1, 16000, 16000),
            DurationPlan::Pad { frames: 15999 }
        );
    }

    #[test]
    fn plan_for_empty_target_keeps() {
        assert_eq!(DurationPlan::decide(5000, 0, 16000), DurationPlan::Keep);
        assert_eq!(stretch_ratio(5000, 0), None);
    }

    #[test]
    fn stretch_ratio_is_fg_over_target() {
        assert_eq!(stretch_ratio(200, 100), Some(2.0));
        assert_eq!(stretch_ratio(150, 100), Some(1.5));
    }

    #[test]
    fn double_length_within_tolerance_is_truncated() {
        let sync = AudioSynchronizer::default();
        let (mixed, report) = sync
            .mix_buffers(constant(1, 200, 0.5, 16000), constant(1, 100, 0.1, 16000))
            .unwrap();

        assert_eq!(report.plan, DurationPlan::Keep);
        assert_eq!(mixed.len(), 100);
    }

    #[test]
    fn short_foreground_is_padded() {
        let sync = AudioSynchronizer::default();
        let (mixed, report) = sync
            .mix_buffers(constant(1, 50, 0.5, 16000), constant(1, 100, 0.25, 16000))
            .unwrap();

        assert_eq!(report.plan, DurationPlan::Pad { frames: 50 });
        assert_eq!(mixed.len(), 100);
        // padded region carries background only
        assert!((mixed.channels()[0][99] - 0.2).abs() < 1e-6);
        assert!((mixed.channels()[0][0] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn long_foreground_is_stretched_to_background_length() {
        let sync = AudioSynchronizer::default();
        let fg = AudioBuffer::mono(
            (0..24000).map(|i| 0.4 * (i as f32 * 0.05).sin()).collect(),
            16000,
        );
        let (mixed, report) = sync.mix_buffers(fg, constant(1, 16000, 0.1, 16000)).unwrap();

        assert!(matches!(report.plan, DurationPlan::Stretch { ratio } if (ratio - 1.5).abs() < 0.01));
        assert!(!report.stretch_fell_back);
        assert_eq!(mixed.len(), 16000);
    }

    #[test]
    fn unstretchable_foreground_falls_back_to_truncation() {
        // A 100-frame overrun at 8 kHz is 12.5 ms, over the 1 ms tolerance, but 200
        // frames is too short for the stretcher to frame.
        let config = SyncConfig {
            tolerance_ms: 1.0,
            ..SyncConfig::default()
        };
        let sync = AudioSynchronizer::new(config);
        let (mixed, report) = sync
            .mix_buffers(constant(1, 200, 0.5, 8000), constant(1, 100, 0.1, 8000))
            .unwrap();

        assert!(matches!(report.plan, DurationPlan::Stretch { .. }));
        assert!(report.stretch_fell_back);
        assert_eq!(mixed.len(), 100);
    }

    #[test]
    fn mono_dub_over_stereo_background() {
        let sync = AudioSynchronizer::default();
        let (mixed, _) = sync
            .mix_buffers(constant(1, 100, 0.5, 16000), constant(2, 100, 0.1, 16000))
            .unwrap();
        assert_eq!(mixed.channel_count(), 2);
    }

    #[test]
    fn stereo_dub_over_mono_background() {
        let sync = AudioSynchronizer::default();
        let (mixed, _) = sync
            .mix_buffers(constant(2, 100, 0.5, 16000), constant(1, 100, 0.1, 16000))
            .unwrap();
        assert_eq!(mixed.channel_count(), 2);
    }

    #[test]
    fn unsupported_layout_uses_background_channels() {
        let sync = AudioSynchronizer::default();
        let (mixed, _) = sync
            .mix_buffers(constant(2, 100, 0.5, 16000), constant(3, 100, 0.1, 16000))
            .unwrap();

        assert_eq!(mixed.channel_count(), 3);
        assert!((mixed.channels()[2][0] - 0.08).abs() < 1e-6);
    }

    #[test]
    fn hot_sum_is_normalized_to_full_scale() {
        let sync = AudioSynchronizer::default();
        let (mixed, report) = sync
            .mix_buffers(constant(1, 100, 0.9, 16000), constant(1, 100, 0.9, 16000))
            .unwrap();

        assert!((mixed.peak() - 1.0).abs() < 1e-6);
        assert!((report.normalized_from.unwrap() - 1.62).abs() < 1e-4);
    }

    #[test]
    fn quiet_sum_is_left_alone() {
        let sync = AudioSynchronizer::default();
        let (_, report) = sync
            .mix_buffers(constant(1, 100, 0.2, 16000), constant(1, 100, 0.2, 16000))
            .unwrap();
        assert_eq!(report.normalized_from, None);
    }

    #[test]
    fn lower_rate_is_upsampled() {
        let sync = AudioSynchronizer::default();
        let (mixed, report) = sync
            .mix_buffers(constant(1, 4000, 0.3, 16000), constant(1, 12000, 0.1, 48000))
            .unwrap();

        assert_eq!(report.sample_rate, 48000);
        assert_eq!(mixed.sample_rate(), 48000);
        assert_eq!(mixed.len(), 12000);
    }

    #[test]
    fn empty_background_yields_empty_mix() {
        let sync = AudioSynchronizer::default();
        let (mixed, report) = sync
            .mix_buffers(constant(1, 500, 0.3, 16000), constant(2, 0, 0.0, 16000))
            .unwrap();

        assert_eq!(report.plan, DurationPlan::Keep);
        assert!(mixed.is_empty());
        assert_eq!(mixed.channel_count(), 2);
    }

    #[test]
    fn channelless_track_is_a_mix_error() {
        let sync = AudioSynchronizer::default();
        let result = sync.mix_buffers(constant(0, 0, 0.0, 16000), constant(1, 10, 0.1, 16000));
        assert!(matches!(result, Err(RedubError::Mix { .. })));
    }
}
