use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use redub::audio::buffer::AudioBuffer;
use redub::audio::resample::resample;
use redub::audio::stretch::time_stretch;
use redub::audio::synchronizer::{AudioSynchronizer, SyncConfig};
use std::f32::consts::TAU;
use std::hint::black_box;
use std::time::Duration;

/// Sine tone with a little silence at both ends, like a synthesized line.
fn speech_like(seconds: f32, sample_rate: u32, channels: usize) -> AudioBuffer {
    let frames = (seconds * sample_rate as f32) as usize;
    let pad = sample_rate as usize / 10;
    let channel: Vec<f32> = (0..frames)
        .map(|i| {
            if i < pad || i + pad >= frames {
                0.0
            } else {
                0.5 * (TAU * 220.0 * i as f32 / sample_rate as f32).sin()
            }
        })
        .collect();
    AudioBuffer::new(vec![channel; channels], sample_rate)
}

/// Mixing scenarios: matched, pad, stretch and upsample.
fn mix_benchmark(c: &mut Criterion) {
    let synchronizer = AudioSynchronizer::new(SyncConfig::default());
    let background = speech_like(10.0, 44100, 2);

    let scenarios = [
        ("matched", speech_like(10.0, 44100, 2)),
        ("pad_short_mono", speech_like(6.0, 44100, 1)),
        ("stretch_long", speech_like(13.0, 44100, 2)),
        ("upsample_24k", speech_like(10.0, 24000, 1)),
    ];

    let mut group = c.benchmark_group("mix_buffers");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));

    for (name, foreground) in &scenarios {
        group.bench_with_input(BenchmarkId::from_parameter(name), foreground, |b, fg| {
            b.iter(|| {
                synchronizer
                    .mix_buffers(black_box(fg.clone()), black_box(background.clone()))
                    .expect("mix failed")
            });
        });
    }
    group.finish();
}

fn stages_benchmark(c: &mut Criterion) {
    let voice = speech_like(5.0, 24000, 1);

    c.bench_function("resample_24k_to_48k", |b| {
        b.iter(|| resample(black_box(&voice), 48000).expect("resample failed"))
    });
    c.bench_function("time_stretch_1_3", |b| {
        b.iter(|| time_stretch(black_box(&voice), 1.3).expect("stretch failed"))
    });
}

criterion_group!(benches, mix_benchmark, stages_benchmark);
criterion_main!(benches);
