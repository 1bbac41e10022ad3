use crate::tts::{TtsAudio, TtsError};
use std::path::Path;

pub const BITS_PER_SAMPLE: u16 = 16;

/// Random 32 hex digit prefix shared by all clips of one synthesis request.
pub fn new_clip_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

pub fn clip_file_name(clip_id: &str, index: usize) -> String {
    format!("{clip_id}_{index:02}.wav")
}

pub fn write_wav(path: &Path, audio: &TtsAudio) -> Result<(), TtsError> {
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate_hz,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in &audio.pcm_i16 {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    tracing::debug!(
        path = %path.display(),
        samples = audio.pcm_i16.len(),
        sample_rate_hz = audio.sample_rate_hz,
        "wrote wav"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_names_are_zero_padded() {
        assert_eq!(clip_file_name("abc", 0), "abc_00.wav");
        assert_eq!(clip_file_name("abc", 12), "abc_12.wav");
    }

    #[test]
    fn clip_ids_are_32_hex_digits_and_differ() {
        let a = new_clip_id();
        let b = new_clip_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn written_wav_reads_back_as_16_bit_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let audio = TtsAudio {
            sample_rate_hz: 16_000,
            channels: 1,
            pcm_i16: vec![0, 1000, -1000, i16::MAX, i16::MIN],
        };
        write_wav(&path, &audio).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, audio.pcm_i16);
    }
}
