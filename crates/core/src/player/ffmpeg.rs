use crate::player::{FfmpegOptions, PlayerError, FRAME_SIZE};
use bytes::Bytes;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;
use symphonia::core::io::MediaSource;

/// Streams PCM out of an ffmpeg process fed from an in-memory buffer.
///
/// The buffer is written to ffmpeg's stdin on a helper thread and stdin is
/// closed afterwards, so ffmpeg sees a complete input. Output is consumed in
/// [`FRAME_SIZE`] blocks of s16le stereo; the [`Read`] impl hands the same
/// frames on as interleaved f32le, which is what the voice driver's raw
/// adapter expects.
pub struct FfmpegPcmSource {
    child: Child,
    stdout: ChildStdout,
    writer: Option<JoinHandle<io::Result<()>>>,
    pending: Vec<u8>,
    pending_pos: usize,
}

impl FfmpegPcmSource {
    pub fn spawn(source: Bytes, options: &FfmpegOptions) -> Result<Self, PlayerError> {
        let executable = options.executable.display().to_string();
        let mut child = Command::new(&options.executable)
            .args(options.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => PlayerError::ExecutableNotFound(executable.clone()),
                _ => PlayerError::SpawnFailed(format!("{:?}: {e}", e.kind())),
            })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PlayerError::SpawnFailed(
                    "ffmpeg pipes unavailable (pipe not created)".to_owned(),
                ));
            }
        };

        let writer = std::thread::Builder::new()
            .name("ffmpeg-stdin".to_owned())
            .spawn(move || {
                let mut stdin = stdin;
                stdin.write_all(&source)?;
                stdin.flush()
                // stdin dropped here, closing the pipe
            })
            .map_err(|e| PlayerError::SpawnFailed(e.to_string()))?;

        tracing::debug!(pid = child.id(), %executable, "spawned ffmpeg transcoder");

        Ok(Self {
            child,
            stdout,
            writer: Some(writer),
            pending: Vec::new(),
            pending_pos: 0,
        })
    }

    /// One [`FRAME_SIZE`] block of s16le stereo, or an empty block at end of stream.
    pub fn read_frame(&mut self) -> io::Result<Vec<u8>> {
        read_frame_from(&mut self.stdout)
    }

    pub fn is_opus(&self) -> bool {
        false
    }

    fn refill(&mut self) -> io::Result<bool> {
        let frame = self.read_frame()?;
        if frame.is_empty() {
            return Ok(false);
        }
        self.pending.clear();
        self.pending_pos = 0;
        for sample in frame.chunks_exact(2) {
            let s = i16::from_le_bytes([sample[0], sample[1]]);
            self.pending
                .extend_from_slice(&(f32::from(s) / 32768.0).to_le_bytes());
        }
        Ok(true)
    }
}

/// Reads exactly one frame; a short read (the stream ended mid-frame) counts as end of stream.
pub fn read_frame_from<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut frame = vec![0u8; FRAME_SIZE];
    let mut filled = 0;
    while filled < FRAME_SIZE {
        match reader.read(&mut frame[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    if filled != FRAME_SIZE {
        return Ok(Vec::new());
    }
    Ok(frame)
}

impl Read for FfmpegPcmSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending_pos >= self.pending.len() && !self.refill()? {
            return Ok(0);
        }
        let available = &self.pending[self.pending_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pending_pos += n;
        Ok(n)
    }
}

impl Seek for FfmpegPcmSource {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "ffmpeg output is not seekable",
        ))
    }
}

impl MediaSource for FfmpegPcmSource {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

impl Drop for FfmpegPcmSource {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            tracing::trace!(error = %e, "ffmpeg already exited");
        }
        if let Err(e) = self.child.wait() {
            tracing::warn!(error = %e, "failed to reap ffmpeg");
        }
        if let Some(writer) = self.writer.take() {
            match writer.join() {
                Ok(Ok(())) => {}
                // ffmpeg may exit before reading everything (killed above, or bad input)
                Ok(Err(e)) => tracing::debug!(error = %e, "ffmpeg stdin writer stopped early"),
                Err(_) => tracing::warn!("ffmpeg stdin writer panicked"),
            }
        }
    }
}

/// Splits an option string the way a POSIX shell would split words, minus expansions.
pub fn split_options(raw: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in raw.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}
