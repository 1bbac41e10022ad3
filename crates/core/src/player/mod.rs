mod ffmpeg;

use std::path::PathBuf;

pub use ffmpeg::{read_frame_from, split_options, FfmpegPcmSource};

/// Sample rate the voice driver mixes at.
pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: u16 = 2;
/// 20 ms of interleaved s16le stereo at 48 kHz: 960 samples * 2 channels * 2 bytes.
pub const FRAME_SIZE: usize = 3840;

#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    #[error("{0} was not found.")]
    ExecutableNotFound(String),

    #[error("Popen failed: {0}")]
    SpawnFailed(String),

    #[error("ffmpeg unavailable: {0}")]
    FfmpegUnavailable(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FfmpegOptions {
    pub executable: PathBuf,
    /// Passed before `-i`.
    pub before_options: Option<String>,
    /// Passed after the output format flags.
    pub options: Option<String>,
}

impl Default for FfmpegOptions {
    fn default() -> Self {
        Self {
            executable: default_ffmpeg_executable(),
            before_options: None,
            options: Some("-vn".to_owned()),
        }
    }
}

impl FfmpegOptions {
    pub fn with_executable(mut self, executable: PathBuf) -> Self {
        self.executable = executable;
        self
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(before) = &self.before_options {
            args.extend(split_options(before));
        }
        args.extend(
            [
                "-i",
                "-",
                "-f",
                "s16le",
                "-ar",
                "48000",
                "-ac",
                "2",
                "-loglevel",
                "warning",
            ]
            .map(str::to_owned),
        );
        if let Some(options) = &self.options {
            args.extend(split_options(options));
        }
        args.push("pipe:1".to_owned());
        args
    }
}

#[cfg(feature = "ffmpeg-sidecar")]
pub fn default_ffmpeg_executable() -> PathBuf {
    ffmpeg_sidecar::paths::ffmpeg_path()
}

#[cfg(not(feature = "ffmpeg-sidecar"))]
pub fn default_ffmpeg_executable() -> PathBuf {
    PathBuf::from("ffmpeg")
}

/// Fetches a static ffmpeg build next to the executable when none is installed.
#[cfg(feature = "ffmpeg-sidecar")]
pub fn ensure_ffmpeg_available() -> Result<(), PlayerError> {
    ffmpeg_sidecar::download::auto_download()
        .map_err(|e| PlayerError::FfmpegUnavailable(e.to_string()))
}

#[cfg(not(feature = "ffmpeg-sidecar"))]
pub fn ensure_ffmpeg_available() -> Result<(), PlayerError> {
    Err(PlayerError::FfmpegUnavailable(
        "built without the ffmpeg-sidecar feature".to_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_select_raw_pcm_output() {
        let opts = FfmpegOptions {
            executable: PathBuf::from("ffmpeg"),
            before_options: Some("-nostdin".to_owned()),
            options: Some("-vn".to_owned()),
        };
        assert_eq!(
            opts.args(),
            vec![
                "-nostdin", "-i", "-", "-f", "s16le", "-ar", "48000", "-ac", "2", "-loglevel",
                "warning", "-vn", "pipe:1"
            ]
        );
    }

    #[test]
    fn frame_is_twenty_milliseconds() {
        let bytes_per_second = SAMPLE_RATE as usize * usize::from(CHANNELS) * 2;
        assert_eq!(FRAME_SIZE * 50, bytes_per_second);
    }
}
