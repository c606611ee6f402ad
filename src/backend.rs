//! Inference backend abstraction
//!
//! Model execution is an external concern. A backend turns a padded sample
//! window into a feature tensor, the feature tensor into an encoded-audio
//! handle (once per run), and produces one next-token logit vector per decode
//! step. The handle types are opaque to the decode loop and are released by
//! dropping the run state, so backends with scoped native resources get
//! deterministic teardown on every exit path.

/// External model executor for a Whisper-style three-stage pipeline.
///
/// Calls are treated as synchronous, blocking operations; the decode loop
/// never overlaps them. Errors abort the current run and are surfaced to the
/// caller, never defaulted to a token.
pub trait InferenceBackend {
    /// Feature tensor handle (e.g. a log-mel spectrogram).
    type Features;

    /// Encoded-audio handle, computed once per run and reused across steps.
    type EncodedAudio;

    /// Turn a full 30-second window of 16 kHz samples into a feature tensor.
    fn extract_features(&mut self, samples: &[f32]) -> anyhow::Result<Self::Features>;

    /// Run the audio encoder once over the extracted features.
    fn encode(&mut self, features: Self::Features) -> anyhow::Result<Self::EncodedAudio>;

    /// Produce the next-token logit vector given the token sequence so far.
    ///
    /// The returned vector must cover at least the full vocabulary; shorter
    /// vectors are rejected by the decode loop.
    fn decode_step(
        &mut self,
        encoded: &Self::EncodedAudio,
        tokens: &[i64],
    ) -> anyhow::Result<Vec<f32>>;
}
