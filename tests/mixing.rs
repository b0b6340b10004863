//! Mixing dubs over background stems through WAV files on disk.

use redub::audio::{AudioBuffer, AudioSynchronizer, DurationPlan, SyncConfig, read_wav, write_wav};
use std::f32::consts::TAU;
use std::path::PathBuf;
use tempfile::TempDir;

fn sine(seconds: f32, rate: u32, channels: usize, amplitude: f32) -> AudioBuffer {
    let frames = (seconds * rate as f32) as usize;
    let channel: Vec<f32> = (0..frames)
        .map(|i| amplitude * (TAU * 330.0 * i as f32 / rate as f32).sin())
        .collect();
    AudioBuffer::new(vec![channel; channels], rate)
}

struct Tracks {
    dir: TempDir,
}

impl Tracks {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn write(&self, name: &str, buffer: &AudioBuffer) -> PathBuf {
        let path = self.dir.path().join(name);
        write_wav(&path, buffer).unwrap();
        path
    }

    fn mix(&self, fg: &AudioBuffer, bg: &AudioBuffer) -> (AudioBuffer, redub::audio::MixReport) {
        let fg_path = self.write("dub.wav", fg);
        let bg_path = self.write("no_vocals.wav", bg);
        let out = self.dir.path().join("final.wav");
        let report = AudioSynchronizer::new(SyncConfig::default())
            .mix_files(&fg_path, &bg_path, &out)
            .unwrap();
        (read_wav(&out).unwrap(), report)
    }
}

#[test]
fn output_always_matches_background_length() {
    let tracks = Tracks::new();
    for dub_seconds in [0.5, 2.0, 2.6, 4.0] {
        let bg = sine(2.0, 22050, 2, 0.3);
        let (mixed, _) = tracks.mix(&sine(dub_seconds, 22050, 1, 0.5), &bg);
        assert_eq!(mixed.len(), bg.len(), "dub of {}s", dub_seconds);
        assert_eq!(mixed.channel_count(), 2);
    }
}

#[test]
fn short_dub_is_padded_not_stretched() {
    let tracks = Tracks::new();
    let (_, report) = tracks.mix(&sine(1.0, 16000, 1, 0.5), &sine(2.0, 16000, 1, 0.3));
    assert!(matches!(report.plan, DurationPlan::Pad { .. }));
}

#[test]
fn long_dub_is_stretched_to_fit() {
    let tracks = Tracks::new();
    let (mixed, report) = tracks.mix(&sine(3.0, 16000, 1, 0.5), &sine(2.0, 16000, 1, 0.3));
    match report.plan {
        DurationPlan::Stretch { ratio } => assert!((ratio - 1.5).abs() < 0.01),
        other => panic!("Expected Stretch, got {:?}", other),
    }
    assert_eq!(mixed.len(), 32000);
}

#[test]
fn higher_rate_wins() {
    let tracks = Tracks::new();
    let (mixed, report) = tracks.mix(&sine(1.0, 24000, 1, 0.5), &sine(1.0, 44100, 2, 0.3));
    assert_eq!(report.sample_rate, 44100);
    assert_eq!(mixed.sample_rate(), 44100);
    assert_eq!(mixed.len(), 44100);

    let (mixed, _) = tracks.mix(&sine(1.0, 48000, 1, 0.5), &sine(1.0, 16000, 1, 0.3));
    assert_eq!(mixed.sample_rate(), 48000);
    assert_eq!(mixed.len(), 48000);
}

#[test]
fn empty_background_gives_empty_output() {
    let tracks = Tracks::new();
    let (mixed, _) = tracks.mix(&sine(1.0, 16000, 1, 0.5), &AudioBuffer::silent(1, 0, 16000));
    assert_eq!(mixed.len(), 0);
}

#[test]
fn loud_tracks_never_clip() {
    let tracks = Tracks::new();
    let (mixed, report) = tracks.mix(&sine(1.0, 16000, 2, 1.0), &sine(1.0, 16000, 2, 1.0));
    assert!(mixed.peak() <= 1.0 + 1e-4);
    assert!(report.normalized_from.is_some());
}

#[test]
fn mono_background_is_widened_for_stereo_dub() {
    let tracks = Tracks::new();
    let (mixed, report) = tracks.mix(&sine(1.0, 16000, 2, 0.5), &sine(1.0, 16000, 1, 0.3));
    assert_eq!(mixed.channel_count(), 2);
    assert_eq!(report.channels, 2);
    assert_eq!(mixed.channels()[0], mixed.channels()[1]);
}

#[test]
fn missing_input_leaves_no_output() {
    let tracks = Tracks::new();
    let bg = tracks.write("no_vocals.wav", &sine(1.0, 16000, 1, 0.3));
    let out = tracks.dir.path().join("final.wav");
    let result = AudioSynchronizer::new(SyncConfig::default()).mix_files(
        &tracks.dir.path().join("absent.wav"),
        &bg,
        &out,
    );
    assert!(result.is_err());
    assert!(!out.exists());
}
