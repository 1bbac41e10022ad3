use crate::voice::GuildKey;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Which Twitch channel each guild's voice session mirrors.
///
/// Cloning is cheap and every clone sees the same map.
#[derive(Clone, Debug, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<GuildKey, String>>>,
}

/// Lowercases a channel login and strips a leading `#`.
pub fn normalize_channel(channel: &str) -> String {
    channel.trim().trim_start_matches('#').to_lowercase()
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `guild` to `channel`, returning the channel it mirrored before.
    pub fn register(&self, guild: GuildKey, channel: &str) -> Option<String> {
        self.write().insert(guild, normalize_channel(channel))
    }

    pub fn unregister(&self, guild: GuildKey) -> Option<String> {
        self.write().remove(&guild)
    }

    pub fn channel_for(&self, guild: GuildKey) -> Option<String> {
        self.read().get(&guild).cloned()
    }

    /// Guilds mirroring `channel`, in ascending id order.
    pub fn guilds_for(&self, channel: &str) -> Vec<GuildKey> {
        let channel = normalize_channel(channel);
        let mut guilds: Vec<GuildKey> = self
            .read()
            .iter()
            .filter(|(_, c)| **c == channel)
            .map(|(g, _)| *g)
            .collect();
        guilds.sort();
        guilds
    }

    /// True while at least one guild mirrors `channel`.
    pub fn is_mirrored(&self, channel: &str) -> bool {
        let channel = normalize_channel(channel);
        self.read().values().any(|c| *c == channel)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave the map half-updated.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<GuildKey, String>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<GuildKey, String>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_unregister() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty());

        assert_eq!(registry.register(GuildKey(1), "SomeStreamer"), None);
        assert_eq!(registry.channel_for(GuildKey(1)).as_deref(), Some("somestreamer"));
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.unregister(GuildKey(1)).as_deref(), Some("somestreamer"));
        assert_eq!(registry.channel_for(GuildKey(1)), None);
        assert!(registry.is_empty());
        assert_eq!(registry.unregister(GuildKey(1)), None);
    }

    #[test]
    fn rejoin_overwrites_previous_channel() {
        let registry = SessionRegistry::new();
        registry.register(GuildKey(7), "first");
        assert_eq!(registry.register(GuildKey(7), "#second").as_deref(), Some("first"));
        assert_eq!(registry.channel_for(GuildKey(7)).as_deref(), Some("second"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn entries_are_keyed_by_guild() {
        let registry = SessionRegistry::new();
        registry.register(GuildKey(3), "shared");
        registry.register(GuildKey(1), "#Shared");
        registry.register(GuildKey(2), "other");

        assert_eq!(registry.guilds_for("SHARED"), vec![GuildKey(1), GuildKey(3)]);
        assert!(registry.is_mirrored("other"));

        registry.unregister(GuildKey(2));
        assert!(!registry.is_mirrored("other"));
        assert_eq!(registry.guilds_for("shared").len(), 2);
    }

    #[test]
    fn clones_share_state() {
        let registry = SessionRegistry::new();
        let clone = registry.clone();
        clone.register(GuildKey(9), "chan");
        assert_eq!(registry.channel_for(GuildKey(9)).as_deref(), Some("chan"));
    }

    #[test]
    fn normalizes_channel_names() {
        assert_eq!(normalize_channel("  #Foo_Bar "), "foo_bar");
        assert_eq!(normalize_channel("plain"), "plain");
    }
}
