use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use voice_actor_core::bridge::Bridge;
use voice_actor_core::chat::TwitchChat;
use voice_actor_core::config::{
    default_model_cache, resolve_secret, resolve_string_with_default, BotConfig, Env, Language,
    PlayerConfig, StdEnv, SynthConfig, TokensFile, TwitchConfig, Volume, DEFAULT_COMMAND_PREFIX,
    DEFAULT_LANGUAGE, DEFAULT_MANIFEST_PATH, DEFAULT_PIPER_BINARY, DEFAULT_TOKENS_PATH,
    DEFAULT_TWITCH_NICK, DEFAULT_VOICE_FILTER, DEFAULT_VOLUME, ENV_DISCORD_TOKEN,
    ENV_TWITCH_NICK, ENV_TWITCH_OAUTH_TOKEN,
};
use voice_actor_core::discord::{self, SongbirdVoice};
use voice_actor_core::player::{ensure_ffmpeg_available, FfmpegOptions};
use voice_actor_core::registry::SessionRegistry;
use voice_actor_core::tts::{ModelHub, ModelManifest, PiperEngine, VoiceActor};

/// Buffered Twitch messages waiting for the bridge.
const CHAT_BUFFER: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "voice-actor")]
#[command(about = "Reads highlighted Twitch messages aloud in a Discord voice channel")]
struct Args {
    /// YAML file with `twitch` and `discord` tokens.
    #[arg(long, default_value = DEFAULT_TOKENS_PATH)]
    tokens: PathBuf,

    #[arg(long)]
    discord_token: Option<String>,

    #[arg(long)]
    twitch_token: Option<String>,

    #[arg(long)]
    twitch_nick: Option<String>,

    /// Voice model manifest.
    #[arg(long, default_value = DEFAULT_MANIFEST_PATH)]
    manifest: PathBuf,

    #[arg(long, default_value = DEFAULT_LANGUAGE)]
    language: String,

    /// Only voices whose name matches this regex are used.
    #[arg(long, default_value = DEFAULT_VOICE_FILTER)]
    voice_filter: String,

    #[arg(long, default_value = DEFAULT_PIPER_BINARY)]
    piper_bin: PathBuf,

    #[arg(long)]
    ffmpeg_bin: Option<PathBuf>,

    /// Download a static ffmpeg build if none is installed.
    #[arg(long, default_value_t = false)]
    ffmpeg_auto_download: bool,

    /// Where synthesized clips are written before playback.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    #[arg(long)]
    model_cache: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_COMMAND_PREFIX)]
    prefix: String,

    #[arg(long, default_value_t = DEFAULT_VOLUME)]
    volume: f32,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let cfg = build_config(args, &env)?;

    tracing::info!(
        language = %cfg.synth.language.as_str(),
        voice_filter = %cfg.synth.voice_filter,
        twitch_nick = %cfg.twitch.nick,
        "config loaded"
    );

    tokio::select! {
        res = run(cfg) => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}

async fn run(cfg: BotConfig) -> anyhow::Result<()> {
    if cfg.player.auto_download {
        tokio::task::spawn_blocking(ensure_ffmpeg_available)
            .await
            .context("ffmpeg download task failed")?
            .context("failed to download ffmpeg")?;
    }
    let mut ffmpeg = FfmpegOptions::default();
    if let Some(exe) = cfg.player.ffmpeg_binary.clone() {
        ffmpeg = ffmpeg.with_executable(exe);
    }

    let manifest = ModelManifest::load(&cfg.synth.manifest_path).with_context(|| {
        format!("failed to load voice manifest {}", cfg.synth.manifest_path.display())
    })?;
    let hub = ModelHub::new(cfg.synth.model_cache.clone())?;
    let actor = VoiceActor::new(
        Arc::new(manifest),
        hub,
        PiperEngine::new(cfg.synth.piper_binary.clone()),
        &cfg.synth,
    )?;
    tokio::fs::create_dir_all(&cfg.synth.output_dir)
        .await
        .with_context(|| format!("failed to create {}", cfg.synth.output_dir.display()))?;

    let (chat, incoming) = TwitchChat::connect(&cfg.twitch);
    let voice = SongbirdVoice::new(ffmpeg, cfg.player.volume);
    let bridge = Arc::new(Bridge::new(SessionRegistry::new(), actor, voice, chat));

    let (tx, rx) = mpsc::channel(CHAT_BUFFER);
    tokio::spawn(async move {
        if let Err(e) = TwitchChat::listen(incoming, tx).await {
            tracing::error!(error = %e, "twitch listener stopped");
        }
    });
    tokio::spawn(Arc::clone(&bridge).serve_chat(rx));

    discord::run(&cfg.discord_token, bridge, cfg.command_prefix).await?;
    Ok(())
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn build_config(args: Args, env: &impl Env) -> anyhow::Result<BotConfig> {
    let tokens = TokensFile::load_optional(&args.tokens)?;

    let discord_token = resolve_secret(
        "discord",
        args.discord_token,
        ENV_DISCORD_TOKEN,
        env,
        tokens.discord,
    )?;
    let oauth_token = resolve_secret(
        "twitch",
        args.twitch_token,
        ENV_TWITCH_OAUTH_TOKEN,
        env,
        tokens.twitch,
    )?;
    let twitch = TwitchConfig {
        nick: resolve_string_with_default(args.twitch_nick, ENV_TWITCH_NICK, env, DEFAULT_TWITCH_NICK),
        oauth_token,
    };

    let synth = SynthConfig {
        language: Language::new(args.language)?,
        voice_filter: args.voice_filter,
        manifest_path: args.manifest,
        piper_binary: args.piper_bin,
        model_cache: args.model_cache.unwrap_or_else(default_model_cache),
        output_dir: args.output_dir,
    };

    let player = PlayerConfig {
        ffmpeg_binary: args.ffmpeg_bin,
        auto_download: args.ffmpeg_auto_download,
        volume: Volume::new(args.volume)?,
    };

    Ok(BotConfig {
        discord_token,
        twitch,
        synth,
        player,
        command_prefix: args.prefix,
    })
}
