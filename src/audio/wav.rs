//! WAV file reading and writing.
//!
//! Any PCM integer depth hound understands (8/16/24/32-bit) and 32-bit float input
//! is normalized to f32 in [-1.0, 1.0]. Output is always 16-bit PCM.

use crate::audio::buffer::AudioBuffer;
use crate::error::{RedubError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

/// Read a WAV file into a planar buffer.
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let file = File::open(path).map_err(|e| RedubError::WavRead {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    decode(BufReader::new(file)).map_err(|message| RedubError::WavRead {
        path: path.display().to_string(),
        message,
    })
}

/// Decode WAV data from any reader.
pub fn read_wav_from<R: Read>(reader: R) -> Result<AudioBuffer> {
    decode(reader).map_err(|message| RedubError::WavRead {
        path: "<reader>".to_string(),
        message,
    })
}

fn decode<R: Read>(reader: R) -> std::result::Result<AudioBuffer, String> {
    let mut wav_reader =
        hound::WavReader::new(reader).map_err(|e| format!("Failed to parse WAV file: {}", e))?;

    let spec = wav_reader.spec();
    if spec.channels == 0 {
        return Err("WAV header declares zero channels".to_string());
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => wav_reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| format!("Failed to read WAV samples: {}", e))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            wav_reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| format!("Failed to read WAV samples: {}", e))?
        }
    };

    Ok(AudioBuffer::from_interleaved(
        &samples,
        spec.channels,
        spec.sample_rate,
    ))
}

/// Duration in seconds, from the header only.
pub fn wav_duration_secs(path: &Path) -> Result<f64> {
    let reader = hound::WavReader::open(path).map_err(|e| RedubError::WavRead {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Ok(0.0);
    }
    Ok(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}

/// Write a buffer as 16-bit PCM WAV.
///
/// Data goes to a temporary file next to `path` that replaces `path` only once the
/// WAV is complete, so a failed write never leaves a partial file behind.
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<()> {
    let write_err = |message: String| RedubError::WavWrite {
        path: path.display().to_string(),
        message,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let channel_count = u16::try_from(buffer.channel_count())
        .map_err(|_| write_err(format!("too many channels: {}", buffer.channel_count())))?;
    if channel_count == 0 {
        return Err(write_err("buffer has no channels".to_string()));
    }

    let spec = hound::WavSpec {
        channels: channel_count,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let staging = tempfile::NamedTempFile::new_in(parent).map_err(|e| write_err(e.to_string()))?;
    {
        let mut writer = hound::WavWriter::new(BufWriter::new(staging.as_file()), spec)
            .map_err(|e| write_err(e.to_string()))?;
        for sample in buffer.to_interleaved() {
            writer
                .write_sample(to_i16(sample))
                .map_err(|e| write_err(e.to_string()))?;
        }
        writer.finalize().map_err(|e| write_err(e.to_string()))?;
    }
    staging
        .persist(path)
        .map_err(|e| write_err(e.error.to_string()))?;
    Ok(())
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn read_16bit_mono_normalizes() {
        let wav = make_wav_data(16000, 1, &[0, 16384, -32768]);
        let buffer = read_wav_from(Cursor::new(wav)).unwrap();

        assert_eq!(buffer.sample_rate(), 16000);
        assert_eq!(buffer.channel_count(), 1);
        assert_eq!(buffer.channels()[0], vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn read_stereo_keeps_channels_separate() {
        let wav = make_wav_data(44100, 2, &[16384, 0, 0, -16384]);
        let buffer = read_wav_from(Cursor::new(wav)).unwrap();

        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.channels()[0], vec![0.5, 0.0]);
        assert_eq!(buffer.channels()[1], vec![0.0, -0.5]);
    }

    #[test]
    fn read_float_wav() {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 24000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        writer.write_sample(0.25_f32).unwrap();
        writer.write_sample(-0.75_f32).unwrap();
        writer.finalize().unwrap();

        let buffer = read_wav_from(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(buffer.channels()[0], vec![0.25, -0.75]);
    }

    #[test]
    fn invalid_wav_data_returns_error() {
        let result = read_wav_from(Cursor::new(vec![0u8, 1, 2, 3, 4, 5]));
        match result {
            Err(RedubError::WavRead { message, .. }) => {
                assert!(message.contains("Failed to parse WAV file"));
            }
            other => panic!("Expected WavRead error, got {:?}", other),
        }
    }

    #[test]
    fn missing_file_returns_wav_read_error() {
        let result = read_wav(Path::new("/nonexistent/redub/input.wav"));
        assert!(matches!(result, Err(RedubError::WavRead { .. })));
    }

    #[test]
    fn write_then_read_preserves_layout_and_rate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.wav");
        let buffer = AudioBuffer::new(vec![vec![0.5, -0.5, 0.0], vec![0.25, 0.0, -0.25]], 48000);

        write_wav(&path, &buffer).unwrap();
        let back = read_wav(&path).unwrap();

        assert_eq!(back.sample_rate(), 48000);
        assert_eq!(back.channel_count(), 2);
        assert_eq!(back.len(), 3);
        assert!((back.channels()[0][0] - 0.5).abs() < 1e-3);
        assert!((back.channels()[1][2] + 0.25).abs() < 1e-3);
    }

    #[test]
    fn write_clamps_out_of_range_samples() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hot.wav");
        write_wav(&path, &AudioBuffer::mono(vec![1.7, -3.0], 16000)).unwrap();

        let back = read_wav(&path).unwrap();
        assert!(back.peak() <= 1.0);
    }

    #[test]
    fn write_empty_buffer_produces_valid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, &AudioBuffer::silent(2, 0, 16000)).unwrap();

        let back = read_wav(&path).unwrap();
        assert!(back.is_empty());
        assert_eq!(back.sample_rate(), 16000);
    }

    #[test]
    fn failed_write_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("never.wav");
        let result = write_wav(&path, &AudioBuffer::silent(0, 10, 16000));

        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn duration_from_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("one_second.wav");
        write_wav(&path, &AudioBuffer::silent(2, 8000, 8000)).unwrap();

        let secs = wav_duration_secs(&path).unwrap();
        assert!((secs - 1.0).abs() < 1e-9);
    }
}
