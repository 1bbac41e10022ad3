use crate::voice::{GuildKey, VoiceError, VoiceGateway};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "playback";

/// Plays `clips` one after another into the guild's call.
///
/// Each clip is deleted once its completion has fired, and only then does
/// the next one start. Player errors reported through the completion are
/// logged and the sequence goes on. If a clip cannot be started at all the
/// sequence stops and the clips not yet played are deleted.
///
/// Ordering holds within one call of this function only; two concurrent
/// sequences on the same guild are mixed by the voice driver.
pub async fn play_sequentially<V>(
    voice: &V,
    guild: GuildKey,
    clips: Vec<PathBuf>,
) -> Result<usize, VoiceError>
where
    V: VoiceGateway + ?Sized,
{
    if !voice.is_connected(guild).await {
        remove_clips(&clips).await;
        return Err(VoiceError::NotConnected);
    }

    let mut played = 0;
    let mut queue = clips.into_iter();
    while let Some(clip) = queue.next() {
        tracing::debug!(target: LOG_TARGET, %guild, clip = %clip.display(), "playing clip");
        let completion = match voice.play(guild, clip.clone()).await {
            Ok(completion) => completion,
            Err(e) => {
                remove_clip(&clip).await;
                remove_clips(&queue.collect::<Vec<_>>()).await;
                return Err(e);
            }
        };

        if let Err(e) = completion.wait().await {
            tracing::error!(target: LOG_TARGET, %guild, clip = %clip.display(), "Player error: {e}");
        }
        remove_clip(&clip).await;
        played += 1;
    }
    Ok(played)
}

async fn remove_clip(clip: &Path) {
    if let Err(e) = tokio::fs::remove_file(clip).await {
        tracing::warn!(target: LOG_TARGET, clip = %clip.display(), error = %e, "failed to delete clip");
    }
}

async fn remove_clips(clips: &[PathBuf]) {
    for clip in clips {
        remove_clip(clip).await;
    }
}


#[cfg(test)]
mod tests {
    use super::fake::{Call, FakeVoice};
    use super::*;
    use crate::voice::VoiceChannelKey;
    use std::sync::Arc;
    use std::time::Duration;

    const GUILD: GuildKey = GuildKey(1);
    const CHANNEL: VoiceChannelKey = VoiceChannelKey(10);

    fn clips(dir: &Path, n: usize) -> Vec<PathBuf> {
        (0..n)
            .map(|i| {
                let p = dir.join(format!("clip_{i:02}.wav"));
                std::fs::write(&p, b"RIFF").unwrap();
                p
            })
            .collect()
    }

    #[tokio::test]
    async fn plays_in_order_and_deletes_each_after_completion() {
        let dir = tempfile::tempdir().unwrap();
        let files = clips(dir.path(), 3);
        let voice = FakeVoice::connected_to(GUILD, CHANNEL);

        let played = play_sequentially(&voice, GUILD, files.clone()).await.unwrap();
        assert_eq!(played, 3);

        let calls = voice.calls();
        let played_order: Vec<&PathBuf> = calls
            .iter()
            .filter_map(|c| match c {
                Call::Play(_, p, existed) => {
                    assert!(existed, "clip deleted before it was played");
                    Some(p)
                }
                _ => None,
            })
            .collect();
        assert_eq!(played_order, files.iter().collect::<Vec<_>>());

        // when clip N finishes, it is still on disk and earlier clips are gone
        for (i, call) in calls
            .iter()
            .filter(|c| matches!(c, Call::Finished(..)))
            .enumerate()
        {
            let Call::Finished(clip, on_disk) = call else {
                unreachable!()
            };
            assert_eq!(clip, &files[i]);
            assert_eq!(on_disk, &vec![files[i].clone()]);
        }
        assert!(files.iter().all(|p| !p.exists()));
    }

    async fn wait_for_plays(voice: &FakeVoice, n: usize) {
        for _ in 0..500 {
            if voice.play_count() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("expected {n} plays, saw {}", voice.play_count());
    }

    #[tokio::test]
    async fn clip_survives_until_its_completion_fires() {
        let dir = tempfile::tempdir().unwrap();
        let files = clips(dir.path(), 2);
        let voice = Arc::new(FakeVoice::connected_to(GUILD, CHANNEL).holding_completions());

        let sequence = tokio::spawn({
            let voice = Arc::clone(&voice);
            let files = files.clone();
            async move { play_sequentially(&*voice, GUILD, files).await }
        });

        wait_for_plays(&voice, 1).await;
        // give a broken sequencer time to run ahead
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(files[0].exists(), "clip deleted while still playing");
        assert_eq!(voice.play_count(), 1, "next clip started before completion");

        assert!(voice.finish_next());
        wait_for_plays(&voice, 2).await;
        assert!(!files[0].exists());
        assert!(files[1].exists());
        assert!(matches!(
            voice.calls().last(),
            Some(Call::Play(_, clip, true)) if *clip == files[1]
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(files[1].exists());
        assert!(voice.finish_next());
        assert_eq!(sequence.await.unwrap().unwrap(), 2);
        assert!(!files[1].exists());
        assert!(!voice.finish_next());
    }

    #[tokio::test]
    async fn player_error_is_logged_and_sequence_continues() {
        let dir = tempfile::tempdir().unwrap();
        let files = clips(dir.path(), 3);
        let voice = FakeVoice::connected_to(GUILD, CHANNEL).player_error_at(1);

        let played = play_sequentially(&voice, GUILD, files.clone()).await.unwrap();
        assert_eq!(played, 3);
        assert!(files.iter().all(|p| !p.exists()));
    }

    #[tokio::test]
    async fn start_failure_stops_and_cleans_up_remaining_clips() {
        let dir = tempfile::tempdir().unwrap();
        let files = clips(dir.path(), 4);
        let voice = FakeVoice::connected_to(GUILD, CHANNEL).failing_play_at(1);

        let err = play_sequentially(&voice, GUILD, files.clone()).await.unwrap_err();
        assert!(matches!(err, VoiceError::Join(_)));
        let plays = voice
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Play(..)))
            .count();
        assert_eq!(plays, 2);
        assert!(files.iter().all(|p| !p.exists()));
    }

    #[tokio::test]
    async fn not_connected_plays_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let files = clips(dir.path(), 2);
        let voice = FakeVoice::default();

        let err = play_sequentially(&voice, GUILD, files.clone()).await.unwrap_err();
        assert!(matches!(err, VoiceError::NotConnected));
        assert_eq!(err.to_string(), "Not connected to a voice channel.");
        assert!(voice.calls().is_empty());
        assert!(files.iter().all(|p| !p.exists()));
    }
}
