//! Incremental greedy token decoding for Whisper-style speech-to-text models
//!
//! Model execution (mel-spectrogram extraction, audio encoding, per-step
//! decoding) lives behind the [`InferenceBackend`] trait; this crate owns the
//! decode loop itself: greedy token selection, the vocabulary and byte-shift
//! tables, audio-buffer validation, and per-step text accumulation.
//!
//! ## Features
//!
//! - One decode step per tick, at whatever rate the host calls [`Transcriber::advance`]
//! - Byte-level vocabulary remapping (the tokenizer's printable substitution alphabet)
//! - Timestamp-token rendering, end-of-text and capacity stop conditions
//! - Cooperative cancellation and single-run-in-flight semantics
//!
//! ## Quick Start
//!
//! ```no_run
//! use whisper_decode::{AudioClip, TickOutcome, Transcriber, Vocabulary};
//! # struct MyBackend;
//! # impl whisper_decode::InferenceBackend for MyBackend {
//! #     type Features = Vec<f32>;
//! #     type EncodedAudio = Vec<f32>;
//! #     fn extract_features(&mut self, _: &[f32]) -> anyhow::Result<Vec<f32>> { Ok(vec![]) }
//! #     fn encode(&mut self, f: Vec<f32>) -> anyhow::Result<Vec<f32>> { Ok(f) }
//! #     fn decode_step(&mut self, _: &Vec<f32>, _: &[i64]) -> anyhow::Result<Vec<f32>> { Ok(vec![]) }
//! # }
//! # let backend = MyBackend;
//! let vocab = Vocabulary::from_json_file("vocab.json")?;
//! let mut transcriber = Transcriber::new(backend, vocab);
//! transcriber.set_text_sink(|text| println!("{text}"));
//!
//! transcriber.transcribe(AudioClip::from_wav_file("clip.wav")?)?;
//! while let TickOutcome::Decoded = transcriber.advance()? {}
//! println!("{}", transcriber.transcript());
//! # Ok::<(), whisper_decode::DecodeError>(())
//! ```

pub mod audio;
pub mod backend;
pub mod error;
pub mod transcriber;
pub mod vocab;

pub use audio::{AudioClip, MAX_CLIP_SECONDS, MAX_SAMPLES, SAMPLE_RATE};
pub use backend::InferenceBackend;
pub use error::{DecodeError, Result};
pub use transcriber::{StopReason, TickOutcome, TranscribeOptions, Transcriber, MAX_TOKENS};
pub use vocab::{
    Vocabulary, END_OF_TEXT, ENGLISH, START_OF_TRANSCRIPT, START_TIME, TRANSCRIBE,
};
