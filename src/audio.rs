//! Fixed-format audio clips for transcription
//!
//! The decode pipeline accepts exactly one input format: 16 kHz mono f32
//! samples, at most 30 seconds. Shorter clips are zero-padded to the full
//! window before feature extraction. No resampling is performed; clips at
//! other rates are rejected by validation.

use hound::WavReader;
use std::path::Path;
use tracing::info;

use crate::error::{DecodeError, Result};

/// Required sample rate for transcription input.
pub const SAMPLE_RATE: u32 = 16000;

/// Maximum clip length in seconds.
pub const MAX_CLIP_SECONDS: usize = 30;

/// Samples in a full transcription window.
pub const MAX_SAMPLES: usize = MAX_CLIP_SECONDS * SAMPLE_RATE as usize;

/// A mono audio clip with a known sample rate.
#[derive(Debug, Clone)]
pub struct AudioClip {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Load a WAV file, converting to f32 and mixing down to mono.
    ///
    /// The clip keeps the file's native sample rate; a non-16 kHz file is
    /// rejected later by validation rather than resampled.
    pub fn from_wav_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = WavReader::open(path.as_ref())
            .map_err(|e| DecodeError::audio_validation(format!("Failed to open WAV: {}", e)))?;

        let spec = reader.spec();
        info!(
            "Loaded WAV: {} Hz, {} channels, {} bits",
            spec.sample_rate, spec.channels, spec.bits_per_sample
        );

        let samples: Vec<f32> = if spec.bits_per_sample == 16 {
            reader
                .samples::<i16>()
                .map(|s| s.map(|sample| sample as f32 / 32768.0))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| {
                    DecodeError::audio_validation(format!("Failed to read samples: {}", e))
                })?
        } else if spec.bits_per_sample == 32 {
            reader
                .samples::<i32>()
                .map(|s| s.map(|sample| sample as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| {
                    DecodeError::audio_validation(format!("Failed to read samples: {}", e))
                })?
        } else {
            return Err(DecodeError::audio_validation(format!(
                "Unsupported bit depth: {}",
                spec.bits_per_sample
            )));
        };

        let mono_samples = if spec.channels == 1 {
            samples
        } else {
            samples
                .chunks(spec.channels as usize)
                .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
                .collect()
        };

        Ok(Self::new(mono_samples, spec.sample_rate))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Validate the clip format and zero-pad to the full 30-second window.
    pub(crate) fn into_padded_samples(self) -> Result<Vec<f32>> {
        if self.sample_rate != SAMPLE_RATE {
            return Err(DecodeError::audio_validation(format!(
                "Audio must be {} Hz, got {} Hz",
                SAMPLE_RATE, self.sample_rate
            )));
        }

        if self.samples.len() > MAX_SAMPLES {
            return Err(DecodeError::audio_validation(format!(
                "Audio too long: {:.1} seconds (maximum {} seconds)",
                self.duration_secs(),
                MAX_CLIP_SECONDS
            )));
        }

        let mut samples = self.samples;
        samples.resize(MAX_SAMPLES, 0.0);
        Ok(samples)
    }
}
