use crate::config::{Language, SynthConfig};
use crate::tts::text::split_units;
use crate::tts::wav::{clip_file_name, new_clip_id, write_wav};
use crate::tts::{ModelEntry, ModelHub, ModelManifest, SpeechSynthesizer, TtsEngine, TtsError};
use futures::future::BoxFuture;
use futures::FutureExt;
use rand::seq::IndexedRandom;
use rand::Rng;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;

const LOG_TARGET: &str = "tts::actor";

/// Speaks text with a random voice of one language, one WAV file per sentence-like unit.
pub struct VoiceActor<E> {
    manifest: Arc<ModelManifest>,
    hub: ModelHub,
    engine: E,
    language: Language,
    voice_filter: Regex,
    output_dir: PathBuf,
}

impl<E: TtsEngine> VoiceActor<E> {
    pub fn new(
        manifest: Arc<ModelManifest>,
        hub: ModelHub,
        engine: E,
        config: &SynthConfig,
    ) -> Result<Self, TtsError> {
        let voice_filter = Regex::new(&config.voice_filter)?;
        // fail at startup rather than on the first highlight
        manifest.matching_speakers(config.language.as_str(), &voice_filter)?;
        Ok(Self {
            manifest,
            hub,
            engine,
            language: config.language.clone(),
            voice_filter,
            output_dir: config.output_dir.clone(),
        })
    }

    pub fn pick_voice<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<(String, ModelEntry), TtsError> {
        let language = self.language.as_str();
        let speakers = self.manifest.matching_speakers(language, &self.voice_filter)?;
        let speaker = speakers.choose(rng).ok_or_else(|| TtsError::NoVoice {
            language: language.to_owned(),
            filter: self.voice_filter.as_str().to_owned(),
        })?;
        let entry = self
            .manifest
            .entry(language, speaker)
            .cloned()
            .ok_or_else(|| TtsError::Manifest(format!("speaker '{speaker}' has no versions")))?;
        Ok(((*speaker).to_owned(), entry))
    }

    async fn render_all(&self, text: String) -> Result<Vec<PathBuf>, TtsError> {
        let units = split_units(&text);
        if units.is_empty() {
            return Err(TtsError::EmptyText);
        }

        let (speaker, entry) = self.pick_voice(&mut rand::rng())?;
        tracing::info!(
            target: LOG_TARGET,
            language = %self.language.as_str(),
            %speaker,
            units = units.len(),
            "synthesizing"
        );
        let voice = self.hub.fetch_voice(&speaker, &entry).await?;

        let clip_id = new_clip_id();
        let mut files = Vec::with_capacity(units.len());
        for (index, unit) in units.into_iter().enumerate() {
            let written = async {
                let audio = self.engine.render(&voice, unit).await?;
                let path = self.output_dir.join(clip_file_name(&clip_id, index));
                write_wav(&path, &audio)?;
                Ok::<_, TtsError>(path)
            }
            .await;

            match written {
                Ok(path) => files.push(path),
                Err(e) => {
                    remove_all(&files).await;
                    return Err(e);
                }
            }
        }
        Ok(files)
    }
}

impl<E: TtsEngine> SpeechSynthesizer for VoiceActor<E> {
    fn synthesize(&self, text: String) -> BoxFuture<'_, Result<Vec<PathBuf>, TtsError>> {
        self.render_all(text).boxed()
    }
}

async fn remove_all(files: &[PathBuf]) {
    for path in files {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(target: LOG_TARGET, path = %path.display(), error = %e, "failed to remove clip");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::{LocalVoice, TtsAudio};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<(String, String)>>,
        fail_on: Option<usize>,
    }

    impl TtsEngine for RecordingEngine {
        fn render<'a>(
            &'a self,
            voice: &'a LocalVoice,
            text: String,
        ) -> BoxFuture<'a, Result<TtsAudio, TtsError>> {
            async move {
                let index = {
                    let mut calls = self.calls.lock().unwrap();
                    calls.push((voice.name.clone(), text.clone()));
                    calls.len() - 1
                };
                if self.fail_on == Some(index) {
                    return Err(TtsError::Engine("boom".into()));
                }
                Ok(TtsAudio {
                    sample_rate_hz: voice.sample_rate_hz,
                    channels: 1,
                    pcm_i16: vec![100; text.len()],
                })
            }
            .boxed()
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        manifest: Arc<ModelManifest>,
        config: SynthConfig,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.onnx");
        std::fs::write(&model, b"onnx").unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        let raw = format!(
            "tts_models:\n  ru:\n    aidar_16khz:\n      latest:\n        model: {m}\n        sample_rate: 16000\n    baya_16khz:\n      latest:\n        model: {m}\n        sample_rate: 16000\n    baya_8khz:\n      latest:\n        model: {m}\n",
            m = model.display()
        );
        let manifest = Arc::new(ModelManifest::parse(&raw).unwrap());
        let config = SynthConfig {
            language: Language::new("ru").unwrap(),
            voice_filter: "^.*_16khz$".to_owned(),
            manifest_path: PathBuf::from("unused.yml"),
            piper_binary: PathBuf::from("piper"),
            model_cache: dir.path().join("cache"),
            output_dir: out,
        };
        Fixture {
            _dir: dir,
            manifest,
            config,
        }
    }

    fn actor(f: &Fixture, engine: RecordingEngine) -> VoiceActor<RecordingEngine> {
        let hub = ModelHub::new(f.config.model_cache.clone()).unwrap();
        VoiceActor::new(f.manifest.clone(), hub, engine, &f.config).unwrap()
    }

    #[test]
    fn picks_only_filtered_voices() {
        let f = fixture();
        let actor = actor(&f, RecordingEngine::default());
        let mut rng = rand::rng();
        for _ in 0..32 {
            let (speaker, _) = actor.pick_voice(&mut rng).unwrap();
            assert!(speaker.ends_with("_16khz"), "{speaker}");
        }
    }

    #[test]
    fn construction_fails_when_nothing_matches() {
        let mut f = fixture();
        f.config.voice_filter = "^nobody$".to_owned();
        let hub = ModelHub::new(f.config.model_cache.clone()).unwrap();
        let err = VoiceActor::new(f.manifest.clone(), hub, RecordingEngine::default(), &f.config)
            .err()
            .expect("no matching voice");
        assert!(matches!(err, TtsError::NoVoice { .. }));
    }

    #[tokio::test]
    async fn writes_one_wav_per_unit_in_order() {
        let f = fixture();
        let actor = actor(&f, RecordingEngine::default());

        let files = actor
            .synthesize("Раз. Два! Три?".to_owned())
            .await
            .unwrap();
        assert_eq!(files.len(), 3);

        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let id = &names[0][..32];
        assert_eq!(
            names,
            vec![
                format!("{id}_00.wav"),
                format!("{id}_01.wav"),
                format!("{id}_02.wav")
            ]
        );
        for p in &files {
            assert!(p.starts_with(&f.config.output_dir));
            let reader = hound::WavReader::open(p).unwrap();
            assert_eq!(reader.spec().sample_rate, 16_000);
            assert_eq!(reader.spec().bits_per_sample, 16);
        }

        let calls = actor.engine.calls.lock().unwrap();
        let texts: Vec<&str> = calls.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["Раз.", "Два!", "Три?"]);
        // one voice for the whole request
        assert!(calls.iter().all(|(v, _)| v == &calls[0].0));
    }

    #[tokio::test]
    async fn empty_text_writes_nothing() {
        let f = fixture();
        let actor = actor(&f, RecordingEngine::default());
        let err = actor.synthesize("  ".to_owned()).await.unwrap_err();
        assert!(matches!(err, TtsError::EmptyText));
        assert_eq!(std::fs::read_dir(&f.config.output_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failed_unit_removes_files_already_written() {
        let f = fixture();
        let engine = RecordingEngine {
            fail_on: Some(1),
            ..Default::default()
        };
        let actor = actor(&f, engine);
        let err = actor.synthesize("One. Two. Three.".to_owned()).await.unwrap_err();
        assert!(matches!(err, TtsError::Engine(_)));
        assert_eq!(std::fs::read_dir(&f.config.output_dir).unwrap().count(), 0);
    }
}
