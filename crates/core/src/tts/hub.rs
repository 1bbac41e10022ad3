use crate::tts::{LocalVoice, ModelEntry, TtsError, DEFAULT_SAMPLE_RATE_HZ};
use crate::util::{retry_with_backoff, RetryConfig};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const LOG_TARGET: &str = "tts::hub";

/// Resolves manifest entries to model files on disk, downloading remote ones once.
#[derive(Clone, Debug)]
pub struct ModelHub {
    client: Client,
    cache_dir: PathBuf,
    retry: RetryConfig,
}

enum Location {
    Remote(Url),
    Local(PathBuf),
}

impl ModelHub {
    pub fn new(cache_dir: PathBuf) -> Result<Self, TtsError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            cache_dir,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub async fn fetch_voice(&self, name: &str, entry: &ModelEntry) -> Result<LocalVoice, TtsError> {
        let model_path = self.resolve(&entry.model).await?;
        let config_path = match &entry.config {
            Some(config) => Some(self.resolve(config).await?),
            None => None,
        };

        let sample_rate_hz = match entry.sample_rate {
            Some(rate) => rate,
            None => match &config_path {
                Some(path) => sample_rate_from_config(path).await?,
                None => DEFAULT_SAMPLE_RATE_HZ,
            },
        };

        Ok(LocalVoice {
            name: name.to_owned(),
            model_path,
            config_path,
            sample_rate_hz,
        })
    }

    async fn resolve(&self, location: &str) -> Result<PathBuf, TtsError> {
        match parse_location(location)? {
            Location::Local(path) => {
                if !tokio::fs::try_exists(&path).await? {
                    return Err(TtsError::InvalidLocation(format!(
                        "{location}: no such file"
                    )));
                }
                Ok(path)
            }
            Location::Remote(url) => {
                let dest = self.cache_path(&url)?;
                if tokio::fs::try_exists(&dest).await? {
                    tracing::debug!(target: LOG_TARGET, path = %dest.display(), "model cache hit");
                    return Ok(dest);
                }
                tokio::fs::create_dir_all(&self.cache_dir).await?;
                retry_with_backoff(
                    &self.retry,
                    || self.download(&url, &dest),
                    TtsError::is_retryable,
                )
                .await?;
                Ok(dest)
            }
        }
    }

    fn cache_path(&self, url: &Url) -> Result<PathBuf, TtsError> {
        let file_name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| TtsError::InvalidLocation(url.to_string()))?;
        Ok(self.cache_dir.join(file_name))
    }

    async fn download(&self, url: &Url, dest: &Path) -> Result<(), TtsError> {
        tracing::info!(target: LOG_TARGET, %url, "downloading voice model");
        let response = self.client.get(url.as_str()).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TtsError::HttpStatus(status.as_u16(), error_text));
        }

        let body = response.bytes().await?;
        // a partial download must never be mistaken for a cache hit
        let partial = partial_path(dest);
        let stored = async {
            tokio::fs::write(&partial, &body).await?;
            tokio::fs::rename(&partial, dest).await
        }
        .await;
        if let Err(e) = stored {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        tracing::info!(
            target: LOG_TARGET,
            path = %dest.display(),
            bytes = body.len(),
            "voice model cached"
        );
        Ok(())
    }
}

/// A per-download temp name next to `dest`, so concurrent fetches of one model never share it.
fn partial_path(dest: &Path) -> PathBuf {
    let mut partial = dest.as_os_str().to_owned();
    partial.push(format!(".{:032x}.part", rand::random::<u128>()));
    PathBuf::from(partial)
}

fn parse_location(location: &str) -> Result<Location, TtsError> {
    match Url::parse(location) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Location::Remote(url)),
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map(Location::Local)
            .map_err(|()| TtsError::InvalidLocation(location.to_owned())),
        Ok(url) if url.scheme().len() > 1 => {
            Err(TtsError::InvalidLocation(location.to_owned()))
        }
        // relative paths, and drive letters which parse as one-letter schemes
        _ => Ok(Location::Local(PathBuf::from(location))),
    }
}

async fn sample_rate_from_config(path: &Path) -> Result<u32, TtsError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let config: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| TtsError::Manifest(format!("{}: {e}", path.display())))?;
    Ok(config["audio"]["sample_rate"]
        .as_u64()
        .and_then(|rate| u32::try_from(rate).ok())
        .unwrap_or(DEFAULT_SAMPLE_RATE_HZ))
}
