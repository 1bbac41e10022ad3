use crate::config::Volume;
use crate::player::{FfmpegOptions, FfmpegPcmSource, CHANNELS, SAMPLE_RATE};
use crate::voice::{
    Completion, CompletionSender, GuildKey, VoiceChannelKey, VoiceError, VoiceGateway,
};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use serenity::model::id::{ChannelId, GuildId};
use songbird::input::RawAdapter;
use songbird::tracks::PlayMode;
use songbird::{Event, EventContext, EventHandler as SongbirdEventHandler, Songbird, TrackEvent};
use std::path::PathBuf;
use std::sync::Arc;

const LOG_TARGET: &str = "discord::voice";

/// Songbird-backed voice calls. Clips go through ffmpeg and reach the driver as raw f32 PCM.
#[derive(Clone)]
pub struct SongbirdVoice {
    manager: Arc<Songbird>,
    ffmpeg: FfmpegOptions,
    volume: Volume,
}

impl SongbirdVoice {
    pub fn new(ffmpeg: FfmpegOptions, volume: Volume) -> Self {
        Self {
            manager: Songbird::serenity(),
            ffmpeg,
            volume,
        }
    }

    /// The manager to register with the gateway client.
    pub fn manager(&self) -> Arc<Songbird> {
        Arc::clone(&self.manager)
    }
}

fn guild_id(guild: GuildKey) -> GuildId {
    GuildId::new(guild.0)
}

impl VoiceGateway for SongbirdVoice {
    fn connect(
        &self,
        guild: GuildKey,
        channel: VoiceChannelKey,
    ) -> BoxFuture<'_, Result<(), VoiceError>> {
        async move {
            self.manager
                .join(guild_id(guild), ChannelId::new(channel.0))
                .await
                .map_err(|e| VoiceError::Join(e.to_string()))?;
            tracing::info!(target: LOG_TARGET, %guild, %channel, "joined voice channel");
            Ok(())
        }
        .boxed()
    }

    fn disconnect(&self, guild: GuildKey) -> BoxFuture<'_, Result<(), VoiceError>> {
        async move {
            if self.manager.get(guild_id(guild)).is_none() {
                return Err(VoiceError::NotConnected);
            }
            self.manager
                .remove(guild_id(guild))
                .await
                .map_err(|e| VoiceError::Leave(e.to_string()))?;
            tracing::info!(target: LOG_TARGET, %guild, "left voice channel");
            Ok(())
        }
        .boxed()
    }

    fn is_connected(&self, guild: GuildKey) -> BoxFuture<'_, bool> {
        async move {
            match self.manager.get(guild_id(guild)) {
                Some(call) => call.lock().await.current_connection().is_some(),
                None => false,
            }
        }
        .boxed()
    }

    fn stop_playback(&self, guild: GuildKey) -> BoxFuture<'_, ()> {
        async move {
            if let Some(call) = self.manager.get(guild_id(guild)) {
                call.lock().await.stop();
            }
        }
        .boxed()
    }

    fn play(&self, guild: GuildKey, clip: PathBuf) -> BoxFuture<'_, Result<Completion, VoiceError>> {
        async move {
            let call = self
                .manager
                .get(guild_id(guild))
                .ok_or(VoiceError::NotConnected)?;

            let bytes = Bytes::from(tokio::fs::read(&clip).await?);
            let source = FfmpegPcmSource::spawn(bytes, &self.ffmpeg)?;
            let input = RawAdapter::new(source, SAMPLE_RATE, u32::from(CHANNELS)).into();

            let (tx, completion) = Completion::channel();
            let tx = Arc::new(tx);
            let handle = call.lock().await.play_input(input);

            // These only fail once the track is gone, and then it has already finished.
            let registered = handle
                .set_volume(self.volume.get())
                .and_then(|()| {
                    handle.add_event(Event::Track(TrackEvent::End), TrackDone(Arc::clone(&tx)))
                })
                .and_then(|()| {
                    handle.add_event(Event::Track(TrackEvent::Error), TrackDone(Arc::clone(&tx)))
                });
            if let Err(e) = registered {
                tracing::debug!(target: LOG_TARGET, %guild, error = %e, "track ended before events were registered");
                tx.complete(Ok(()));
            }
            Ok(completion)
        }
        .boxed()
    }
}

/// Reports a track's end, or its error, to the waiting sequencer.
struct TrackDone(Arc<CompletionSender>);

#[async_trait::async_trait]
impl SongbirdEventHandler for TrackDone {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            let outcome = tracks
                .iter()
                .find_map(|(state, _)| match &state.playing {
                    PlayMode::Errored(e) => Some(Err(format!("{e:?}"))),
                    _ => None,
                })
                .unwrap_or(Ok(()));
            self.0.complete(outcome);
        }
        None
    }
}
