//! End-to-end decode loop tests driven by a scripted inference backend.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use whisper_decode::{
    AudioClip, DecodeError, InferenceBackend, StopReason, TickOutcome, TranscribeOptions,
    Transcriber, Vocabulary, END_OF_TEXT, ENGLISH, MAX_SAMPLES, MAX_TOKENS, SAMPLE_RATE,
    START_OF_TRANSCRIPT, START_TIME, TRANSCRIBE,
};

const VOCAB_SIZE: usize = 50257;

/// Logit vector length covering vocabulary, special and timestamp tokens.
const LOGIT_LEN: usize = 51865;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Full-size vocabulary where token N decodes to "tokN", except ID 100 which
/// uses the substitution alphabet and decodes to " hi".
fn test_vocab() -> Vocabulary {
    let map: HashMap<String, u32> = (0..VOCAB_SIZE as u32)
        .map(|id| {
            if id == 100 {
                ("\u{120}hi".to_string(), id)
            } else {
                (format!("tok{id}"), id)
            }
        })
        .collect();
    Vocabulary::from_token_map(map).unwrap()
}

fn clip() -> AudioClip {
    AudioClip::new(vec![0.0; SAMPLE_RATE as usize], SAMPLE_RATE)
}

/// Backend that returns logit vectors peaking at a scripted token per step,
/// falling back to a fixed token once the script runs out.
struct ScriptedBackend {
    steps: Vec<i64>,
    fallback: i64,
    cursor: usize,
    extract_calls: usize,
    encode_calls: usize,
    decode_calls: usize,
    first_tokens: Option<Vec<i64>>,
}

impl ScriptedBackend {
    fn new(steps: Vec<i64>) -> Self {
        Self {
            steps,
            fallback: END_OF_TEXT,
            cursor: 0,
            extract_calls: 0,
            encode_calls: 0,
            decode_calls: 0,
            first_tokens: None,
        }
    }

    fn repeating(token: i64) -> Self {
        let mut backend = Self::new(Vec::new());
        backend.fallback = token;
        backend
    }
}

impl InferenceBackend for ScriptedBackend {
    type Features = Vec<f32>;
    type EncodedAudio = Vec<f32>;

    fn extract_features(&mut self, samples: &[f32]) -> anyhow::Result<Vec<f32>> {
        self.extract_calls += 1;
        assert_eq!(samples.len(), MAX_SAMPLES, "samples must be padded to the full window");
        Ok(Vec::new())
    }

    fn encode(&mut self, features: Vec<f32>) -> anyhow::Result<Vec<f32>> {
        self.encode_calls += 1;
        Ok(features)
    }

    fn decode_step(&mut self, _encoded: &Vec<f32>, tokens: &[i64]) -> anyhow::Result<Vec<f32>> {
        self.decode_calls += 1;
        if self.first_tokens.is_none() {
            self.first_tokens = Some(tokens.to_vec());
        }

        let target = self.steps.get(self.cursor).copied().unwrap_or(self.fallback);
        self.cursor += 1;

        let mut logits = vec![0.0f32; LOGIT_LEN];
        logits[target as usize] = 1.0;
        Ok(logits)
    }
}

fn emissions() -> (Rc<RefCell<Vec<String>>>, impl FnMut(&str)) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink_log = Rc::clone(&log);
    (log, move |text: &str| sink_log.borrow_mut().push(text.to_string()))
}

#[test]
fn eot_on_first_step_ends_run_with_empty_transcript() {
    init_tracing();
    let mut transcriber = Transcriber::new(ScriptedBackend::new(vec![END_OF_TEXT]), test_vocab());
    let (log, sink) = emissions();
    transcriber.set_text_sink(sink);

    transcriber.transcribe(clip()).unwrap();
    assert!(transcriber.is_active());

    assert_eq!(
        transcriber.advance().unwrap(),
        TickOutcome::Finished(StopReason::EndOfText)
    );
    assert_eq!(transcriber.transcript(), "");
    assert_eq!(transcriber.finished(), Some(StopReason::EndOfText));
    assert!(!transcriber.is_active());

    // One emission per decode step, including the end-of-text step.
    assert_eq!(*log.borrow(), vec!["".to_string()]);
    assert_eq!(transcriber.backend().decode_calls, 1);
}

#[test]
fn timestamp_token_renders_time_marker() {
    init_tracing();
    let mut transcriber =
        Transcriber::new(ScriptedBackend::new(vec![START_TIME + 50, END_OF_TEXT]), test_vocab());
    let (log, sink) = emissions();
    transcriber.set_text_sink(sink);

    transcriber.transcribe(clip()).unwrap();
    assert_eq!(transcriber.advance().unwrap(), TickOutcome::Decoded);
    assert_eq!(
        transcriber.advance().unwrap(),
        TickOutcome::Finished(StopReason::EndOfText)
    );

    assert_eq!(transcriber.transcript(), "(time=1)");
    assert_eq!(
        *log.borrow(),
        vec!["(time=1)".to_string(), "(time=1)".to_string()]
    );
}

#[test]
fn ordinary_tokens_accumulate_remapped_text() {
    let mut transcriber =
        Transcriber::new(ScriptedBackend::new(vec![100, 5, END_OF_TEXT]), test_vocab());

    transcriber.transcribe(clip()).unwrap();
    assert_eq!(transcriber.run_to_completion().unwrap(), " hitok5");
    assert_eq!(transcriber.finished(), Some(StopReason::EndOfText));
}

#[test]
fn run_seeds_the_four_control_tokens() {
    let mut transcriber = Transcriber::new(ScriptedBackend::new(vec![END_OF_TEXT]), test_vocab());
    transcriber.transcribe(clip()).unwrap();
    transcriber.advance().unwrap();

    assert_eq!(
        transcriber.backend().first_tokens.as_deref(),
        Some(&[START_OF_TRANSCRIPT, ENGLISH, TRANSCRIBE, START_TIME][..])
    );
}

#[test]
fn custom_options_replace_language_and_task_tokens() {
    let mut transcriber = Transcriber::new(ScriptedBackend::new(vec![END_OF_TEXT]), test_vocab());
    let options = TranscribeOptions {
        language: 50272,
        task: 50358,
        ..TranscribeOptions::default()
    };

    transcriber.transcribe_with(clip(), options).unwrap();
    transcriber.advance().unwrap();

    assert_eq!(
        transcriber.backend().first_tokens.as_deref(),
        Some(&[START_OF_TRANSCRIPT, 50272, 50358, START_TIME][..])
    );
}

#[test]
fn capacity_cap_stops_a_run_that_never_produces_eot() {
    init_tracing();
    let mut transcriber = Transcriber::new(ScriptedBackend::repeating(5), test_vocab());

    transcriber.transcribe(clip()).unwrap();
    let text = transcriber.run_to_completion().unwrap().to_string();

    assert_eq!(transcriber.finished(), Some(StopReason::CapacityReached));
    assert_eq!(transcriber.backend().decode_calls, MAX_TOKENS - 4);
    assert_eq!(text, "tok5".repeat(MAX_TOKENS - 4));
}

#[test]
fn small_capacity_is_honored() {
    let mut transcriber = Transcriber::new(ScriptedBackend::repeating(5), test_vocab());
    let options = TranscribeOptions {
        max_tokens: 10,
        ..TranscribeOptions::default()
    };

    transcriber.transcribe_with(clip(), options).unwrap();
    transcriber.run_to_completion().unwrap();

    assert_eq!(transcriber.finished(), Some(StopReason::CapacityReached));
    assert_eq!(transcriber.backend().decode_calls, 6);
}

#[test]
fn capacity_must_exceed_seed_tokens() {
    let mut transcriber = Transcriber::new(ScriptedBackend::repeating(5), test_vocab());
    let options = TranscribeOptions {
        max_tokens: 4,
        ..TranscribeOptions::default()
    };

    let err = transcriber.transcribe_with(clip(), options).unwrap_err();
    assert!(matches!(err, DecodeError::Config(_)));
    assert!(!transcriber.is_active());
}

#[test]
fn invalid_audio_never_primes_and_emits_nothing() {
    init_tracing();
    let mut transcriber = Transcriber::new(ScriptedBackend::repeating(5), test_vocab());
    let (log, sink) = emissions();
    transcriber.set_text_sink(sink);

    let wrong_rate = AudioClip::new(vec![0.0; 1000], 44100);
    let err = transcriber.transcribe(wrong_rate).unwrap_err();
    assert!(matches!(err, DecodeError::AudioValidation(_)));

    let too_long = AudioClip::new(vec![0.0; MAX_SAMPLES + 1], SAMPLE_RATE);
    let err = transcriber.transcribe(too_long).unwrap_err();
    assert!(matches!(err, DecodeError::AudioValidation(_)));

    assert!(!transcriber.is_active());
    assert_eq!(transcriber.backend().extract_calls, 0);
    assert_eq!(transcriber.advance().unwrap(), TickOutcome::Idle);
    assert!(log.borrow().is_empty());
}

#[test]
fn second_request_while_active_is_rejected() {
    let mut transcriber = Transcriber::new(ScriptedBackend::repeating(5), test_vocab());

    transcriber.transcribe(clip()).unwrap();
    let err = transcriber.transcribe(clip()).unwrap_err();
    assert!(matches!(err, DecodeError::Busy(_)));

    // The active run is untouched.
    assert!(transcriber.is_active());
    assert_eq!(transcriber.tokens().len(), 4);
}

#[test]
fn cancel_finishes_before_the_next_decoder_call() {
    init_tracing();
    let mut transcriber = Transcriber::new(ScriptedBackend::repeating(5), test_vocab());

    transcriber.transcribe(clip()).unwrap();
    assert_eq!(transcriber.advance().unwrap(), TickOutcome::Decoded);

    transcriber.cancel();
    assert_eq!(
        transcriber.advance().unwrap(),
        TickOutcome::Finished(StopReason::Cancelled)
    );
    assert_eq!(transcriber.finished(), Some(StopReason::Cancelled));
    assert_eq!(transcriber.backend().decode_calls, 1);

    // Partial transcript stays readable after cancellation.
    assert_eq!(transcriber.transcript(), "tok5");
}

struct FailingBackend;

impl InferenceBackend for FailingBackend {
    type Features = ();
    type EncodedAudio = ();

    fn extract_features(&mut self, _samples: &[f32]) -> anyhow::Result<()> {
        Ok(())
    }

    fn encode(&mut self, _features: ()) -> anyhow::Result<()> {
        Ok(())
    }

    fn decode_step(&mut self, _encoded: &(), _tokens: &[i64]) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("decoder exploded")
    }
}

#[test]
fn decoder_failure_aborts_the_run() {
    let mut transcriber = Transcriber::new(FailingBackend, test_vocab());

    transcriber.transcribe(clip()).unwrap();
    let err = transcriber.advance().unwrap_err();
    assert!(matches!(err, DecodeError::Inference(_)));
    assert!(err.to_string().contains("decoder exploded"));

    assert!(!transcriber.is_active());
    assert_eq!(transcriber.advance().unwrap(), TickOutcome::Idle);
}

struct ShortLogitsBackend;

impl InferenceBackend for ShortLogitsBackend {
    type Features = ();
    type EncodedAudio = ();

    fn extract_features(&mut self, _samples: &[f32]) -> anyhow::Result<()> {
        Ok(())
    }

    fn encode(&mut self, _features: ()) -> anyhow::Result<()> {
        Ok(())
    }

    fn decode_step(&mut self, _encoded: &(), _tokens: &[i64]) -> anyhow::Result<Vec<f32>> {
        Ok(vec![0.0; 10])
    }
}

#[test]
fn short_logit_vector_is_an_error_not_token_zero() {
    let mut transcriber = Transcriber::new(ShortLogitsBackend, test_vocab());

    transcriber.transcribe(clip()).unwrap();
    let err = transcriber.advance().unwrap_err();
    assert!(matches!(err, DecodeError::Inference(_)));
    assert!(!transcriber.is_active());
    assert_eq!(transcriber.transcript(), "");
}
