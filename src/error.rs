//! Error types for transcription and decoding

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DecodeError>;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio validation error: {0}")]
    AudioValidation(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Text encoding error: {0}")]
    TextEncoding(String),

    #[error("Transcriber busy: {0}")]
    Busy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn audio_validation<S: Into<String>>(msg: S) -> Self {
        Self::AudioValidation(msg.into())
    }

    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    pub fn text_encoding<S: Into<String>>(msg: S) -> Self {
        Self::TextEncoding(msg.into())
    }

    pub fn busy<S: Into<String>>(msg: S) -> Self {
        Self::Busy(msg.into())
    }
}
