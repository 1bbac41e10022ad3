//! Catalogue of downloadable voices, keyed by language and speaker.
//!
//! ```yaml
//! tts_models:
//!   ru:
//!     ruslan_16khz:
//!       latest:
//!         model: https://example.org/ru_RU-ruslan-x_low.onnx
//!         config: https://example.org/ru_RU-ruslan-x_low.onnx.json
//!         sample_rate: 16000
//! ```

use crate::tts::TtsError;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const LATEST_VERSION: &str = "latest";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ModelEntry {
    #[serde(alias = "package")]
    pub model: String,
    #[serde(default)]
    pub config: Option<String>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub example: Option<String>,
}

type Versions = BTreeMap<String, ModelEntry>;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ModelManifest {
    #[serde(default)]
    pub tts_models: BTreeMap<String, BTreeMap<String, Versions>>,
}

impl ModelManifest {
    pub fn parse(raw: &str) -> Result<Self, TtsError> {
        serde_yml::from_str(raw).map_err(|e| TtsError::Manifest(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, TtsError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| TtsError::Manifest(format!("{}: {e}", path.display())))?;
        Self::parse(&raw)
    }

    pub fn languages(&self) -> Vec<&str> {
        self.tts_models.keys().map(String::as_str).collect()
    }

    pub fn speakers(&self, language: &str) -> Result<Vec<&str>, TtsError> {
        self.tts_models
            .get(language)
            .map(|speakers| speakers.keys().map(String::as_str).collect())
            .ok_or_else(|| TtsError::UnknownLanguage(language.to_owned()))
    }

    /// Speakers of `language` whose name matches `filter` and that have a usable entry.
    pub fn matching_speakers(&self, language: &str, filter: &Regex) -> Result<Vec<&str>, TtsError> {
        let matching: Vec<&str> = self
            .speakers(language)?
            .into_iter()
            .filter(|s| filter.is_match(s))
            .filter(|s| self.entry(language, s).is_some())
            .collect();
        if matching.is_empty() {
            return Err(TtsError::NoVoice {
                language: language.to_owned(),
                filter: filter.as_str().to_owned(),
            });
        }
        Ok(matching)
    }

    /// The `latest` entry, or the greatest version key when `latest` is absent.
    pub fn entry(&self, language: &str, speaker: &str) -> Option<&ModelEntry> {
        let versions = self.tts_models.get(language)?.get(speaker)?;
        versions
            .get(LATEST_VERSION)
            .or_else(|| versions.values().next_back())
    }
}
