use crate::tts::{LocalVoice, TtsAudio, TtsEngine, TtsError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const PIPER_CHANNELS: u16 = 1;
const WAV_HEADER_BYTES: usize = 44;

/// Runs the `piper` CLI once per unit of text, reading raw s16le mono from stdout.
#[derive(Clone, Debug)]
pub struct PiperEngine {
    piper_binary: PathBuf,
}

impl PiperEngine {
    #[must_use]
    pub fn new(piper_binary: PathBuf) -> Self {
        Self { piper_binary }
    }
}

impl TtsEngine for PiperEngine {
    fn render<'a>(
        &'a self,
        voice: &'a LocalVoice,
        text: String,
    ) -> BoxFuture<'a, Result<TtsAudio, TtsError>> {
        async move {
            let mut command = Command::new(&self.piper_binary);
            command.arg("--model").arg(&voice.model_path);
            if let Some(config) = &voice.config_path {
                command.arg("--config").arg(config);
            }
            let mut child = command
                .arg("--output_raw")
                .stdin(std::process::Stdio::piped())
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| {
                    let path = self.piper_binary.display();
                    TtsError::Engine(format!("failed to spawn piper at {path}: {e}"))
                })?;

            {
                let stdin = child
                    .stdin
                    .as_mut()
                    .ok_or_else(|| TtsError::Engine("failed to open piper stdin".into()))?;
                stdin
                    .write_all(text.as_bytes())
                    .await
                    .map_err(|e| TtsError::Engine(format!("piper stdin write failed: {e}")))?;
            }
            child.stdin.take();

            let output = child
                .wait_with_output()
                .await
                .map_err(|e| TtsError::Engine(format!("piper process failed: {e}")))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let status = output.status;
                return Err(TtsError::Engine(format!(
                    "piper exited with {status}: {stderr}"
                )));
            }

            let pcm_i16 = decode_raw_output(&output.stdout)?;
            tracing::debug!(
                voice = %voice.name,
                samples = pcm_i16.len(),
                "piper rendered unit"
            );

            Ok(TtsAudio {
                sample_rate_hz: voice.sample_rate_hz,
                channels: PIPER_CHANNELS,
                pcm_i16,
            })
        }
        .boxed()
    }
}

fn decode_raw_output(raw_pcm: &[u8]) -> Result<Vec<i16>, TtsError> {
    if raw_pcm.is_empty() {
        return Err(TtsError::Engine("piper produced no audio output".into()));
    }

    let pcm_bytes = if raw_pcm.len() > WAV_HEADER_BYTES && &raw_pcm[..4] == b"RIFF" {
        &raw_pcm[WAV_HEADER_BYTES..]
    } else {
        raw_pcm
    };

    let pcm_i16: Vec<i16> = pcm_bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect();

    if pcm_i16.is_empty() {
        return Err(TtsError::Engine("piper produced empty PCM data".into()));
    }
    Ok(pcm_i16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_output_is_little_endian_i16() {
        let raw = [0x01, 0x00, 0xff, 0xff, 0x00, 0x80];
        assert_eq!(decode_raw_output(&raw).unwrap(), vec![1, -1, i16::MIN]);
    }

    #[test]
    fn riff_header_is_skipped() {
        let mut raw = b"RIFF".to_vec();
        raw.resize(WAV_HEADER_BYTES, 0);
        raw.extend_from_slice(&[0x02, 0x00]);
        assert_eq!(decode_raw_output(&raw).unwrap(), vec![2]);
    }

    #[test]
    fn empty_output_is_an_error() {
        assert!(matches!(decode_raw_output(&[]), Err(TtsError::Engine(_))));
        assert!(matches!(decode_raw_output(&[7]), Err(TtsError::Engine(_))));
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let engine = PiperEngine::new(PathBuf::from("/nonexistent/piper-for-tests"));
        let voice = LocalVoice {
            name: "v".into(),
            model_path: PathBuf::from("/nonexistent/model.onnx"),
            config_path: None,
            sample_rate_hz: 16_000,
        };
        let err = engine.render(&voice, "hi".into()).await.unwrap_err();
        assert!(err.to_string().contains("failed to spawn piper"));
    }
}
