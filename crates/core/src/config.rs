use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, path::PathBuf};

pub const DEFAULT_LANGUAGE: &str = "ru";
pub const DEFAULT_VOICE_FILTER: &str = "^.*_16khz$";
pub const DEFAULT_TOKENS_PATH: &str = "tokens.yaml";
pub const DEFAULT_MANIFEST_PATH: &str = "latest_voice_models.yml";
pub const DEFAULT_COMMAND_PREFIX: &str = "!";
pub const DEFAULT_TWITCH_NICK: &str = "iam0verit";
pub const DEFAULT_PIPER_BINARY: &str = "piper";
pub const DEFAULT_VOLUME: f32 = 1.0;
pub const ENV_DISCORD_TOKEN: &str = "DISCORD_TOKEN";
pub const ENV_TWITCH_OAUTH_TOKEN: &str = "TWITCH_OAUTH_TOKEN";
pub const ENV_TWITCH_NICK: &str = "TWITCH_NICK";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Language(pub String);

impl Language {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        if v.trim().is_empty() {
            return Err(ConfigError::EmptyLanguage);
        }
        Ok(Self(v))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Language {
    fn default() -> Self {
        Self(DEFAULT_LANGUAGE.to_owned())
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        if v.trim().is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        Ok(Self(v))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(**redacted**)")
    }
}

/// Linear gain applied to every track, `1.0` leaves samples untouched.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Volume(f32);

impl Volume {
    pub fn new(value: f32) -> Result<Self, ConfigError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidVolume(value));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self(DEFAULT_VOLUME)
    }
}

/// Secrets file, `twitch` and `discord` keys at the top level.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TokensFile {
    #[serde(default)]
    pub twitch: Option<String>,
    #[serde(default)]
    pub discord: Option<String>,
}

impl fmt::Debug for TokensFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokensFile")
            .field("twitch", &self.twitch.as_ref().map(|_| "**redacted**"))
            .field("discord", &self.discord.as_ref().map(|_| "**redacted**"))
            .finish()
    }
}

impl TokensFile {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        serde_yml::from_str(raw).map_err(|e| ConfigError::TokensFile(e.to_string()))
    }

    /// A missing file is not an error: tokens may come from the CLI or environment.
    pub fn load_optional(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "tokens file not found");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::TokensFile(format!("{}: {e}", path.display()))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TwitchConfig {
    pub nick: String,
    pub oauth_token: Secret,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SynthConfig {
    pub language: Language,
    pub voice_filter: String,
    pub manifest_path: PathBuf,
    pub piper_binary: PathBuf,
    pub model_cache: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlayerConfig {
    pub ffmpeg_binary: Option<PathBuf>,
    pub auto_download: bool,
    pub volume: Volume,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BotConfig {
    pub discord_token: Secret,
    pub twitch: TwitchConfig,
    pub synth: SynthConfig,
    pub player: PlayerConfig,
    pub command_prefix: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("language must not be empty")]
    EmptyLanguage,
    #[error("secret must not be empty")]
    EmptySecret,
    #[error("{0} token is missing (pass it on the command line, set it in the environment or the tokens file)")]
    MissingSecret(&'static str),
    #[error("volume must be a finite, non-negative number, got {0}")]
    InvalidVolume(f32),
    #[error("invalid tokens file: {0}")]
    TokensFile(String),
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// CLI value first, then the environment, then the tokens file.
pub fn resolve_secret(
    name: &'static str,
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    file_value: Option<String>,
) -> Result<Secret, ConfigError> {
    let raw = cli_value
        .or_else(|| env.var(env_key))
        .or(file_value)
        .ok_or(ConfigError::MissingSecret(name))?;
    Secret::new(raw)
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    match cli_value {
        Some(v) => v,
        None => env.var(env_key).unwrap_or_else(|| default.to_owned()),
    }
}

pub fn default_model_cache() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("voice-actor")
        .join("models")
}
