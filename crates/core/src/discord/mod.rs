pub mod command;
mod voice;

pub use command::{Command, ParseError};
pub use voice::SongbirdVoice;

use crate::bridge::{Bridge, BridgeError};
use crate::chat::ChatClient;
use crate::config::Secret;
use crate::tts::SpeechSynthesizer;
use crate::voice::{GuildKey, VoiceChannelKey};
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::{GatewayIntents, Ready};
use serenity::prelude::{Client, Context, EventHandler};
use songbird::SerenityInit;
use std::sync::Arc;

const LOG_TARGET: &str = "discord";

#[derive(thiserror::Error, Debug)]
pub enum DiscordError {
    #[error("discord client error: {0}")]
    Client(#[from] serenity::Error),
}

/// Routes guild text commands to the bridge.
pub struct DiscordHandler<S, C> {
    bridge: Arc<Bridge<S, SongbirdVoice, C>>,
    prefix: String,
}

impl<S, C> DiscordHandler<S, C>
where
    S: SpeechSynthesizer + 'static,
    C: ChatClient + 'static,
{
    pub fn new(bridge: Arc<Bridge<S, SongbirdVoice, C>>, prefix: String) -> Self {
        Self { bridge, prefix }
    }

    /// `!` style prefix plus both mention forms of the bot.
    fn prefixes(&self, ctx: &Context) -> [String; 3] {
        let id = ctx.cache.current_user().id;
        [self.prefix.clone(), format!("<@{id}>"), format!("<@!{id}>")]
    }

    async fn execute(
        &self,
        ctx: &Context,
        msg: &Message,
        guild: GuildKey,
        command: Command,
    ) -> Result<Option<String>, BridgeError> {
        match command {
            Command::Join { channel } => {
                let author_voice = author_voice_channel(ctx, msg);
                let channel = self.bridge.join(guild, author_voice, &channel).await?;
                Ok(Some(format!("Joined to: {channel}")))
            }
            Command::Move { channel } => {
                self.bridge.move_to(guild, channel).await?;
                Ok(None)
            }
            Command::Stop => {
                self.bridge.stop(guild).await?;
                Ok(None)
            }
            Command::Read { text } => {
                self.bridge.ensure_connected(guild).await?;
                reply(ctx, msg, &format!("Now playing: {text}")).await;
                self.bridge.speak(guild, text).await?;
                Ok(None)
            }
            Command::Test => Ok(Some(self.bridge.test().to_owned())),
        }
    }
}

#[async_trait]
impl<S, C> EventHandler for DiscordHandler<S, C>
where
    S: SpeechSynthesizer + 'static,
    C: ChatClient + 'static,
{
    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!(
            target: LOG_TARGET,
            user = %ready.user.name,
            id = %ready.user.id,
            guilds = ready.guilds.len(),
            "Logged in"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(parsed) = Command::parse(&msg.content, &self.prefixes(&ctx)) else {
            return;
        };
        tracing::debug!(target: LOG_TARGET, author = %msg.author.name, content = %msg.content, "command");

        let Some(guild_id) = msg.guild_id else {
            reply(&ctx, &msg, "This command only works in a server.").await;
            return;
        };
        let guild = GuildKey(guild_id.get());

        let outcome = match parsed {
            Ok(command) => self.execute(&ctx, &msg, guild, command).await,
            Err(e) => Ok(Some(e.to_string())),
        };
        match outcome {
            Ok(Some(text)) => reply(&ctx, &msg, &text).await,
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, %guild, error = %e, "command failed");
                reply(&ctx, &msg, &e.to_string()).await;
            }
        }
    }
}

/// The voice channel the message author currently sits in, from the gateway cache.
fn author_voice_channel(ctx: &Context, msg: &Message) -> Option<VoiceChannelKey> {
    let guild = msg.guild(&ctx.cache)?;
    guild
        .voice_states
        .get(&msg.author.id)
        .and_then(|state| state.channel_id)
        .map(|channel| VoiceChannelKey(channel.get()))
}

async fn reply(ctx: &Context, msg: &Message, text: &str) {
    if let Err(e) = msg.channel_id.say(&ctx.http, text).await {
        tracing::warn!(target: LOG_TARGET, channel = %msg.channel_id, error = %e, "failed to send reply");
    }
}

/// Connects to the Discord gateway and serves commands until the connection ends.
pub async fn run<S, C>(
    token: &Secret,
    bridge: Arc<Bridge<S, SongbirdVoice, C>>,
    prefix: String,
) -> Result<(), DiscordError>
where
    S: SpeechSynthesizer + 'static,
    C: ChatClient + 'static,
{
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_VOICE_STATES;
    let manager = bridge.voice().manager();

    let mut client = Client::builder(token.expose(), intents)
        .event_handler(DiscordHandler::new(bridge, prefix))
        .register_songbird_with(manager)
        .await?;
    client.start().await?;
    Ok(())
}
