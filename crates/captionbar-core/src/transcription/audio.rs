//! WAV sample loading for the whisper engine.

use std::path::Path;

use super::{TranscriptionError, TranscriptionResult};

/// Sample rate whisper models are trained on
pub const WHISPER_SAMPLE_RATE: u32 = 16000;

/// Loads a 16kHz mono WAV file as f32 samples normalized to [-1.0, 1.0].
pub fn load_audio_samples(wav_path: &Path) -> TranscriptionResult<Vec<f32>> {
    if !wav_path.exists() {
        return Err(TranscriptionError::AudioNotFound(
            wav_path.to_string_lossy().to_string(),
        ));
    }

    let reader = hound::WavReader::open(wav_path).map_err(|e| {
        TranscriptionError::AudioReadError(format!("Failed to open WAV file: {}", e))
    })?;

    let spec = reader.spec();
    if spec.sample_rate != WHISPER_SAMPLE_RATE {
        return Err(TranscriptionError::AudioReadError(format!(
            "Expected {}Hz sample rate, got {} Hz",
            WHISPER_SAMPLE_RATE, spec.sample_rate
        )));
    }
    if spec.channels != 1 {
        return Err(TranscriptionError::AudioReadError(format!(
            "Expected mono audio, got {} channels",
            spec.channels
        )));
    }

    let decoded: Result<Vec<f32>, hound::Error> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .map(|s| s.map(|s| s as f32 / 32768.0))
            .collect(),
        (hound::SampleFormat::Int, 32) => reader
            .into_samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 2147483648.0))
            .collect(),
        (hound::SampleFormat::Float, 32) => reader.into_samples::<f32>().collect(),
        (format, bits) => {
            return Err(TranscriptionError::AudioReadError(format!(
                "Unsupported sample format: {:?} {} bit",
                format, bits
            )));
        }
    };

    // A dropped sample would shift every later timestamp.
    let samples = decoded.map_err(|e| {
        TranscriptionError::AudioReadError(format!("Failed to decode WAV samples: {}", e))
    })?;

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_normalized_samples() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("audio.wav");
        write_wav(&path, 16000, 1, &[0, 16384, -32768]);

        let samples = load_audio_samples(&path).unwrap();
        assert_eq!(samples, vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn test_rejects_wrong_layout() {
        let dir = tempfile::TempDir::new().unwrap();

        let stereo = dir.path().join("stereo.wav");
        write_wav(&stereo, 16000, 2, &[0, 0]);
        assert!(matches!(
            load_audio_samples(&stereo),
            Err(TranscriptionError::AudioReadError(_))
        ));

        let hifi = dir.path().join("hifi.wav");
        write_wav(&hifi, 44100, 1, &[0]);
        assert!(matches!(
            load_audio_samples(&hifi),
            Err(TranscriptionError::AudioReadError(_))
        ));
    }

    #[test]
    fn test_truncated_samples_are_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("truncated.wav");
        write_wav(&path, 16000, 1, &[1, 2, 3, 4]);

        let len = std::fs::metadata(&path).unwrap().len();
        std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(len - 1)
            .unwrap();

        assert!(matches!(
            load_audio_samples(&path),
            Err(TranscriptionError::AudioReadError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_audio_samples(Path::new("/nonexistent/audio.wav")),
            Err(TranscriptionError::AudioNotFound(_))
        ));
    }
}
