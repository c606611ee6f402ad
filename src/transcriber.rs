//! Incremental greedy transcription
//!
//! The decode loop advances by exactly one token per [`Transcriber::advance`]
//! call. The host owns the tick rate: call it once per frame, in a tight
//! loop, or anywhere in between. There is at most one run in flight; a new
//! request while a run is active is rejected.

use tracing::{debug, info, warn};

use crate::audio::AudioClip;
use crate::backend::InferenceBackend;
use crate::error::{DecodeError, Result};
use crate::vocab::{Vocabulary, END_OF_TEXT, ENGLISH, START_OF_TRANSCRIPT, START_TIME, TRANSCRIBE};

/// Default cap on the token sequence, including the four seed tokens.
pub const MAX_TOKENS: usize = 100;

/// Control tokens seeded at the start of every run.
const SEED_TOKENS: usize = 4;

/// Seconds per timestamp-token increment.
const TIME_PER_TOKEN: f32 = 0.02;

/// Per-run decoding options.
#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    /// Language tag token seeded at position 1.
    pub language: i64,
    /// Task tag token seeded at position 2.
    pub task: i64,
    /// Hard cap on the token sequence length.
    pub max_tokens: usize,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            language: ENGLISH,
            task: TRANSCRIBE,
            max_tokens: MAX_TOKENS,
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The decoder produced the end-of-text token.
    EndOfText,
    /// The token sequence hit its capacity cap.
    CapacityReached,
    /// The host cancelled the run.
    Cancelled,
}

/// Result of one [`Transcriber::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No active run; nothing was done.
    Idle,
    /// One token was decoded; the run continues.
    Decoded,
    /// The run just finished.
    Finished(StopReason),
}

struct RunState<E> {
    /// Encoded audio, computed once at priming and reused every step.
    /// Dropped with the run state, releasing the backend handle.
    encoded: E,
    tokens: Vec<i64>,
    capacity: usize,
    cancel_requested: bool,
}

/// Tick-driven transcriber over an external inference backend.
pub struct Transcriber<B: InferenceBackend> {
    backend: B,
    vocab: Vocabulary,
    run: Option<RunState<B::EncodedAudio>>,
    transcript: String,
    finished: Option<StopReason>,
    text_sink: Option<Box<dyn FnMut(&str)>>,
}

impl<B: InferenceBackend> Transcriber<B> {
    pub fn new(backend: B, vocab: Vocabulary) -> Self {
        Self {
            backend,
            vocab,
            run: None,
            transcript: String::new(),
            finished: None,
            text_sink: None,
        }
    }

    /// Install a sink that receives the full accumulated text (not the
    /// delta) once per decode step.
    pub fn set_text_sink<F>(&mut self, sink: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.text_sink = Some(Box::new(sink));
    }

    /// Start a transcription run with default options.
    pub fn transcribe(&mut self, clip: AudioClip) -> Result<()> {
        self.transcribe_with(clip, TranscribeOptions::default())
    }

    /// Start a transcription run.
    ///
    /// Validates the clip, runs the one-time feature-extraction and encoding
    /// pass, and seeds the token sequence. Returns `Busy` if a run is already
    /// active (the active run is untouched) and `AudioValidation` if the clip
    /// has the wrong sample rate or exceeds the 30-second window; in both
    /// cases no decode state is created.
    pub fn transcribe_with(&mut self, clip: AudioClip, options: TranscribeOptions) -> Result<()> {
        if self.run.is_some() {
            warn!("Transcription requested while a run is active; rejecting");
            return Err(DecodeError::busy("a transcription run is already active"));
        }

        if options.max_tokens <= SEED_TOKENS {
            return Err(DecodeError::config(format!(
                "max_tokens must exceed the {} seed tokens, got {}",
                SEED_TOKENS, options.max_tokens
            )));
        }

        let samples = match clip.into_padded_samples() {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Rejecting transcription request: {}", e);
                return Err(e);
            }
        };

        // Priming: one feature + encoder pass, then straight to decoding.
        let features = self
            .backend
            .extract_features(&samples)
            .map_err(|e| DecodeError::inference(format!("Feature extraction failed: {}", e)))?;
        let encoded = self
            .backend
            .encode(features)
            .map_err(|e| DecodeError::inference(format!("Audio encoding failed: {}", e)))?;

        let mut tokens = Vec::with_capacity(options.max_tokens);
        tokens.extend_from_slice(&[
            START_OF_TRANSCRIPT,
            options.language,
            options.task,
            START_TIME,
        ]);

        self.transcript.clear();
        self.finished = None;
        self.run = Some(RunState {
            encoded,
            tokens,
            capacity: options.max_tokens,
            cancel_requested: false,
        });

        info!(
            "Transcription run started (capacity {} tokens)",
            options.max_tokens
        );
        Ok(())
    }

    /// Advance the active run by exactly one decode step.
    ///
    /// Returns `Idle` when there is no active run. A backend failure or a
    /// short logit vector aborts the run and surfaces the error.
    pub fn advance(&mut self) -> Result<TickOutcome> {
        let Some(run) = self.run.as_mut() else {
            return Ok(TickOutcome::Idle);
        };

        if run.cancel_requested {
            let decoded = run.tokens.len() - SEED_TOKENS;
            info!("Run cancelled after {} decoded tokens", decoded);
            self.finish(StopReason::Cancelled);
            return Ok(TickOutcome::Finished(StopReason::Cancelled));
        }

        let logits = match self.backend.decode_step(&run.encoded, &run.tokens) {
            Ok(logits) => logits,
            Err(e) => {
                self.run = None;
                return Err(DecodeError::inference(format!("Decoder step failed: {}", e)));
            }
        };

        let vocab_len = self.vocab.len();
        if logits.len() < vocab_len {
            self.run = None;
            return Err(DecodeError::inference(format!(
                "Decoder returned {} logits for a vocabulary of {} tokens",
                logits.len(),
                vocab_len
            )));
        }

        let id = argmax(&logits) as i64;
        run.tokens.push(id);
        debug!("Step {}: token {}", run.tokens.len() - SEED_TOKENS, id);

        if id == END_OF_TEXT {
            // The stop token carries no text.
        } else if id >= vocab_len as i64 {
            let seconds = (id - START_TIME) as f32 * TIME_PER_TOKEN;
            self.transcript.push_str(&format!("(time={})", seconds));
        } else {
            let fragment = match self.vocab.decode_token(id) {
                Ok(fragment) => fragment,
                Err(e) => {
                    self.run = None;
                    return Err(e);
                }
            };
            self.transcript.push_str(&fragment);
        }

        if let Some(sink) = self.text_sink.as_mut() {
            sink(&self.transcript);
        }

        if id == END_OF_TEXT {
            self.finish(StopReason::EndOfText);
            return Ok(TickOutcome::Finished(StopReason::EndOfText));
        }

        if run.tokens.len() >= run.capacity {
            self.finish(StopReason::CapacityReached);
            return Ok(TickOutcome::Finished(StopReason::CapacityReached));
        }

        Ok(TickOutcome::Decoded)
    }

    /// Drive the active run to completion and return the final transcript.
    pub fn run_to_completion(&mut self) -> Result<&str> {
        loop {
            match self.advance()? {
                TickOutcome::Decoded => continue,
                TickOutcome::Idle | TickOutcome::Finished(_) => return Ok(self.transcript()),
            }
        }
    }

    /// Request cooperative cancellation; takes effect on the next `advance`.
    pub fn cancel(&mut self) {
        if let Some(run) = self.run.as_mut() {
            run.cancel_requested = true;
        }
    }

    /// Accumulated transcript. Remains readable after a run finishes and is
    /// cleared when the next run starts.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Token sequence of the active run (empty when idle or done).
    pub fn tokens(&self) -> &[i64] {
        self.run.as_ref().map_or(&[], |run| run.tokens.as_slice())
    }

    pub fn is_active(&self) -> bool {
        self.run.is_some()
    }

    /// Stop reason of the most recently finished run, if any.
    pub fn finished(&self) -> Option<StopReason> {
        self.finished
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn finish(&mut self, reason: StopReason) {
        // Dropping the run state releases the encoded-audio handle.
        self.run = None;
        self.finished = Some(reason);
        info!(
            "Transcription finished: {:?} ({} chars)",
            reason,
            self.transcript.len()
        );
    }
}

/// First-occurrence arg-max: ties break to the lowest index.
fn argmax(logits: &[f32]) -> usize {
    let mut max_idx = 0;
    let mut max_val = f32::NEG_INFINITY;

    for (idx, &val) in logits.iter().enumerate() {
        if val > max_val {
            max_val = val;
            max_idx = idx;
        }
    }

    max_idx
}
