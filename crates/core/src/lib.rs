pub mod bridge;
pub mod chat;
pub mod config;
pub mod discord;
pub mod playback;
pub mod player;
pub mod registry;
pub mod tts;
pub mod util;
pub mod voice;
