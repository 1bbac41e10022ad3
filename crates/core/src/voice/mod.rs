use crate::player::PlayerError;
use futures::future::BoxFuture;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::oneshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GuildKey(pub u64);

impl fmt::Display for GuildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoiceChannelKey(pub u64);

impl fmt::Display for VoiceChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum VoiceError {
    #[error("Not connected to a voice channel.")]
    NotConnected,

    #[error("failed to join voice channel: {0}")]
    Join(String),

    #[error("failed to leave voice channel: {0}")]
    Leave(String),

    #[error(transparent)]
    Player(#[from] PlayerError),

    #[error("failed to read clip: {0}")]
    Io(#[from] std::io::Error),
}

/// Fires once when a track stops, carrying the player error if it failed.
pub struct Completion(oneshot::Receiver<Result<(), String>>);

pub struct CompletionSender(Mutex<Option<oneshot::Sender<Result<(), String>>>>);

impl Completion {
    pub fn channel() -> (CompletionSender, Completion) {
        let (tx, rx) = oneshot::channel();
        (CompletionSender(Mutex::new(Some(tx))), Completion(rx))
    }

    /// A track dropped without reporting (call torn down mid-clip) counts as an error.
    pub async fn wait(self) -> Result<(), String> {
        self.0
            .await
            .unwrap_or_else(|_| Err("playback ended without a completion event".to_owned()))
    }
}

impl CompletionSender {
    /// Only the first outcome is delivered; later calls are ignored.
    pub fn complete(&self, outcome: Result<(), String>) {
        let tx = match self.0.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(tx) = tx {
            let _ = tx.send(outcome);
        }
    }
}

/// A voice-call backend, one call per guild.
pub trait VoiceGateway: Send + Sync {
    /// Connects, or moves an existing call to `channel`.
    fn connect(
        &self,
        guild: GuildKey,
        channel: VoiceChannelKey,
    ) -> BoxFuture<'_, Result<(), VoiceError>>;

    fn disconnect(&self, guild: GuildKey) -> BoxFuture<'_, Result<(), VoiceError>>;

    fn is_connected(&self, guild: GuildKey) -> BoxFuture<'_, bool>;

    /// Stops whatever is playing in the guild's call.
    fn stop_playback(&self, guild: GuildKey) -> BoxFuture<'_, ()>;

    /// Starts playing `clip` and returns as soon as playback has begun.
    fn play(&self, guild: GuildKey, clip: PathBuf) -> BoxFuture<'_, Result<Completion, VoiceError>>;
}
