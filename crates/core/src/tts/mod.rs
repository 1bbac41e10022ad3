mod actor;
pub mod hub;
pub mod manifest;
mod piper;
pub mod text;
pub mod wav;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use actor::VoiceActor;
pub use hub::ModelHub;
pub use manifest::{ModelEntry, ModelManifest};
pub use piper::PiperEngine;

/// Fallback when neither the manifest nor the voice config states a rate.
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 16_000;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TtsAudio {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub pcm_i16: Vec<i16>,
}

/// A voice whose model files are on local disk and ready for inference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalVoice {
    pub name: String,
    pub model_path: PathBuf,
    pub config_path: Option<PathBuf>,
    pub sample_rate_hz: u32,
}

#[derive(thiserror::Error, Debug)]
pub enum TtsError {
    #[error("nothing to say: text is empty")]
    EmptyText,

    #[error("no voices for language '{0}' in the model manifest")]
    UnknownLanguage(String),

    #[error("no voice for language '{language}' matches '{filter}'")]
    NoVoice { language: String, filter: String },

    #[error("invalid voice filter: {0}")]
    InvalidFilter(#[from] regex::Error),

    #[error("invalid model manifest: {0}")]
    Manifest(String),

    #[error("invalid model location '{0}'")]
    InvalidLocation(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http error {0}: {1}")]
    HttpStatus(u16, String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tts engine failed: {0}")]
    Engine(String),

    #[error("failed to write wav: {0}")]
    Wav(#[from] hound::Error),
}

impl TtsError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpStatus(status, _) => crate::util::is_http_retryable(*status),
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Runs inference for one unit of text with an already fetched voice.
pub trait TtsEngine: Send + Sync {
    fn render<'a>(
        &'a self,
        voice: &'a LocalVoice,
        text: String,
    ) -> BoxFuture<'a, Result<TtsAudio, TtsError>>;
}

/// Turns text into an ordered list of WAV files on disk.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: String) -> BoxFuture<'_, Result<Vec<PathBuf>, TtsError>>;
}
