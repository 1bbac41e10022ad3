//! Command semantics shared by the Discord handler and the Twitch listener.

use crate::chat::{ChatClient, ChatError, ChatMessage};
use crate::playback::play_sequentially;
use crate::registry::{normalize_channel, SessionRegistry};
use crate::tts::{SpeechSynthesizer, TtsError};
use crate::voice::{GuildKey, VoiceChannelKey, VoiceError, VoiceGateway};
use std::sync::Arc;
use tokio::sync::mpsc;

const LOG_TARGET: &str = "bridge";

/// Sent to the Twitch chat after joining it.
pub const GREETING: &str = "Hi there from discord!";
/// Reply to the `test` command.
pub const TEST_REPLY: &str = "Hai there! discord";

#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    #[error("You are not connected to a voice channel.")]
    AuthorNotInVoice,

    #[error("Not connected to a voice channel.")]
    NotConnected,

    #[error(transparent)]
    Voice(VoiceError),

    #[error(transparent)]
    Tts(#[from] TtsError),

    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl From<VoiceError> for BridgeError {
    fn from(e: VoiceError) -> Self {
        match e {
            VoiceError::NotConnected => Self::NotConnected,
            other => Self::Voice(other),
        }
    }
}

/// Ties a guild's voice session to a Twitch channel and speaks highlighted messages into it.
pub struct Bridge<S, V, C> {
    registry: SessionRegistry,
    synth: S,
    voice: V,
    chat: C,
}

impl<S, V, C> Bridge<S, V, C>
where
    S: SpeechSynthesizer,
    V: VoiceGateway,
    C: ChatClient,
{
    pub fn new(registry: SessionRegistry, synth: S, voice: V, chat: C) -> Self {
        Self {
            registry,
            synth,
            voice,
            chat,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn voice(&self) -> &V {
        &self.voice
    }

    /// Connects to the author's voice channel (or interrupts current playback when
    /// already connected), mirrors `twitch_channel` and greets its chat.
    ///
    /// Returns the normalized channel login.
    pub async fn join(
        &self,
        guild: GuildKey,
        author_voice: Option<VoiceChannelKey>,
        twitch_channel: &str,
    ) -> Result<String, BridgeError> {
        let channel = normalize_channel(twitch_channel);
        if channel.is_empty() {
            return Err(ChatError::InvalidChannel {
                channel: twitch_channel.to_owned(),
                reason: "empty channel name".to_owned(),
            }
            .into());
        }

        let connect_to = if self.voice.is_connected(guild).await {
            None
        } else {
            Some(author_voice.ok_or(BridgeError::AuthorNotInVoice)?)
        };

        // Nothing is changed until the chat server has accepted the channel.
        self.chat.join(&channel)?;
        match connect_to {
            None => self.voice.stop_playback(guild).await,
            Some(target) => {
                if let Err(e) = self.voice.connect(guild, target).await {
                    if !self.registry.is_mirrored(&channel) {
                        self.chat.part(&channel);
                    }
                    return Err(e.into());
                }
            }
        }

        if let Some(previous) = self.registry.register(guild, &channel) {
            if previous != channel && !self.registry.is_mirrored(&previous) {
                self.chat.part(&previous);
            }
        }
        tracing::info!(target: LOG_TARGET, %guild, %channel, "mirroring twitch channel");

        if let Err(e) = self.chat.say(&channel, GREETING).await {
            tracing::warn!(target: LOG_TARGET, %channel, error = %e, "failed to greet twitch chat");
        }
        Ok(channel)
    }

    /// Moves the guild's voice session to `channel`, connecting if there is none.
    pub async fn move_to(&self, guild: GuildKey, channel: VoiceChannelKey) -> Result<(), BridgeError> {
        self.voice.connect(guild, channel).await?;
        tracing::info!(target: LOG_TARGET, %guild, %channel, "moved voice session");
        Ok(())
    }

    /// Forgets the guild's mapping and leaves its voice channel.
    pub async fn stop(&self, guild: GuildKey) -> Result<(), BridgeError> {
        if let Some(channel) = self.registry.unregister(guild) {
            if !self.registry.is_mirrored(&channel) {
                self.chat.part(&channel);
            }
            tracing::info!(target: LOG_TARGET, %guild, %channel, "stopped mirroring");
        }
        self.voice.disconnect(guild).await?;
        Ok(())
    }

    pub async fn ensure_connected(&self, guild: GuildKey) -> Result<(), BridgeError> {
        if self.voice.is_connected(guild).await {
            Ok(())
        } else {
            Err(BridgeError::NotConnected)
        }
    }

    /// Synthesizes `text` and plays the clips into the guild's call.
    ///
    /// Nothing is synthesized when the guild has no voice session.
    pub async fn speak(&self, guild: GuildKey, text: String) -> Result<usize, BridgeError> {
        self.ensure_connected(guild).await?;
        let clips = self.synth.synthesize(text).await?;
        Ok(play_sequentially(&self.voice, guild, clips).await?)
    }

    pub fn test(&self) -> &'static str {
        TEST_REPLY
    }

    /// Speaks a highlighted message into every guild mirroring its channel.
    ///
    /// Returns how many guilds it was played into.
    pub async fn on_chat_message(&self, message: &ChatMessage) -> usize {
        if !message.is_highlighted() {
            return 0;
        }

        let mut played = 0;
        for guild in self.registry.guilds_for(&message.channel) {
            tracing::info!(
                target: LOG_TARGET,
                %guild,
                channel = %message.channel,
                sender = %message.sender,
                "highlighted message"
            );
            match self.speak(guild, message.text.clone()).await {
                Ok(_) => played += 1,
                Err(BridgeError::NotConnected) => {
                    tracing::warn!(target: LOG_TARGET, %guild, "highlight dropped, no voice session");
                }
                Err(e) => {
                    tracing::error!(target: LOG_TARGET, %guild, error = %e, "highlight playback failed");
                }
            }
        }
        played
    }
}

impl<S, V, C> Bridge<S, V, C>
where
    S: SpeechSynthesizer + 'static,
    V: VoiceGateway + 'static,
    C: ChatClient + 'static,
{
    /// Handles each highlighted chat message on its own task until `rx` closes.
    pub async fn serve_chat(self: Arc<Self>, mut rx: mpsc::Receiver<ChatMessage>) {
        while let Some(message) = rx.recv().await {
            if !message.is_highlighted() {
                continue;
            }
            let bridge = Arc::clone(&self);
            tokio::spawn(async move {
                bridge.on_chat_message(&message).await;
            });
        }
        tracing::info!(target: LOG_TARGET, "chat stream ended");
    }
}
