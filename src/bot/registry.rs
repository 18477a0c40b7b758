//! The set of text channels whose messages are spoken.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::bot::event::ChannelId;
use crate::bot::platform::ChatPlatform;

/// Owns `listeningChannels` and the presence line derived from it.
///
/// Mutations are synchronous and visible to the next read. Publishing the
/// new presence is a separate async step so callers can run it off the
/// dispatch loop.
pub struct ListeningChannelRegistry {
    channels: Mutex<HashSet<ChannelId>>,
    platform: Arc<dyn ChatPlatform>,
    presence_url: Option<String>,
}

impl ListeningChannelRegistry {
    pub fn new(platform: Arc<dyn ChatPlatform>, presence_url: Option<String>) -> Self {
        Self {
            channels: Mutex::new(HashSet::new()),
            platform,
            presence_url,
        }
    }

    /// Replace the whole set (startup restore).
    pub fn restore(&self, channels: HashSet<ChannelId>) {
        *self.lock() = channels;
    }

    /// Returns `false` if the channel was already present.
    pub fn add(&self, channel: ChannelId) -> bool {
        let added = self.lock().insert(channel);
        if added {
            info!("👂 Listening to channel {}", channel);
        }
        added
    }

    /// Returns `false` if the channel was not present.
    pub fn remove(&self, channel: ChannelId) -> bool {
        let removed = self.lock().remove(&channel);
        if removed {
            info!("🙉 Stopped listening to channel {}", channel);
        }
        removed
    }

    pub fn contains(&self, channel: ChannelId) -> bool {
        self.lock().contains(&channel)
    }

    /// Listened channels in ascending id order.
    pub fn list(&self) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = self.lock().iter().copied().collect();
        channels.sort();
        channels
    }

    pub fn snapshot(&self) -> HashSet<ChannelId> {
        self.lock().clone()
    }

    pub fn presence_text(&self) -> String {
        presence_for(self.lock().len())
    }

    /// Push the current presence line to the platform. Failures are logged only.
    pub async fn publish_presence(&self) {
        let text = self.presence_text();
        if let Err(e) = self.platform.set_presence(&text, self.presence_url.as_deref()).await {
            warn!("Failed to set presence \"{}\": {}", text, e);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<ChannelId>> {
        self.channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub fn presence_for(count: usize) -> String {
    if count == 0 {
        "Run !listen".to_string()
    } else {
        format!("{} channel(s)", count)
    }
}
