//! Voice session lifecycle: at most one live connection at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use crate::bot::event::{ChannelId, GuildId, UserId, VoiceStateChange};
use crate::bot::platform::{ChatPlatform, VoiceCall};

/// One active connection to one voice channel.
#[derive(Clone)]
pub struct VoiceSession {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    call: Arc<dyn VoiceCall>,
}

impl VoiceSession {
    /// Tear the connection down. Errors are logged.
    pub async fn disconnect(self) {
        match self.call.leave().await {
            Ok(()) => info!("👋 Left voice channel {} (guild {})", self.channel_id, self.guild_id),
            Err(e) => warn!("Failed to leave voice channel {}: {}", self.channel_id, e),
        }
    }
}

impl std::fmt::Debug for VoiceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceSession")
            .field("guild_id", &self.guild_id)
            .field("channel_id", &self.channel_id)
            .finish_non_exhaustive()
    }
}

/// Owns the optional voice session.
///
/// Nothing else holds the call handle; playback and teardown go through here.
/// The slot is only touched synchronously, so every await happens with the
/// lock released.
pub struct VoiceSessionManager {
    session: Mutex<Option<VoiceSession>>,
    platform: Arc<dyn ChatPlatform>,
    /// Set by [`VoiceSessionManager::close`]; later joins are torn down on arrival.
    closed: AtomicBool,
}

impl VoiceSessionManager {
    pub fn new(platform: Arc<dyn ChatPlatform>) -> Self {
        Self {
            session: Mutex::new(None),
            platform,
            closed: AtomicBool::new(false),
        }
    }

    /// Guild and channel of the current session.
    pub fn current(&self) -> Option<(GuildId, ChannelId)> {
        self.lock().as_ref().map(|s| (s.guild_id, s.channel_id))
    }

    /// Connect to `channel` and make it the sole session.
    ///
    /// Concurrent joins are not serialized: whichever completes last owns the
    /// slot. A replaced session in another guild is disconnected; in the same
    /// guild the platform reuses the connection.
    pub async fn join(&self, guild: GuildId, channel: ChannelId) -> Result<(), String> {
        info!("🔊 Joining voice channel {} (guild {})", channel, guild);
        let call = self.platform.join_voice(guild, channel).await?;

        let session = VoiceSession { guild_id: guild, channel_id: channel, call };

        // Checked under the slot lock so it cannot interleave with close()
        let previous = {
            let mut slot = self.lock();
            if self.closed.load(Ordering::SeqCst) {
                None
            } else {
                Some(slot.replace(session.clone()))
            }
        };
        let Some(previous) = previous else {
            warn!("Voice closed while joining channel {}, disconnecting", channel);
            session.disconnect().await;
            return Err("voice sessions are closed".to_string());
        };

        info!("Joined voice channel {} (guild {})", channel, guild);
        if let Some(previous) = previous
            && previous.guild_id != guild
        {
            previous.disconnect().await;
        }
        Ok(())
    }

    /// Remove the session if it lives in `guild`, handing it back for teardown.
    pub fn detach_in_guild(&self, guild: GuildId) -> Option<VoiceSession> {
        let mut slot = self.lock();
        match slot.as_ref() {
            Some(session) if session.guild_id == guild => slot.take(),
            _ => None,
        }
    }

    /// Remove the session if it is connected to `channel`.
    pub fn detach_channel(&self, channel: ChannelId) -> Option<VoiceSession> {
        let mut slot = self.lock();
        match slot.as_ref() {
            Some(session) if session.channel_id == channel => slot.take(),
            _ => None,
        }
    }

    /// Leave `channel` if the session is connected there. No-op otherwise.
    pub async fn leave(&self, channel: ChannelId) {
        if let Some(session) = self.detach_channel(channel) {
            session.disconnect().await;
        }
    }

    /// Leave whatever session exists.
    pub async fn leave_any(&self) {
        let session = self.lock().take();
        if let Some(session) = session {
            session.disconnect().await;
        }
    }

    /// Leave and refuse any join that completes afterwards.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.leave_any().await;
    }

    /// Detach the session when `change` touches its channel and the bot is
    /// the only member left there.
    pub fn detach_if_alone(&self, change: &VoiceStateChange) -> Option<VoiceSession> {
        let (guild, channel) = self.current()?;
        if change.old_channel != Some(channel) && change.new_channel != Some(channel) {
            return None;
        }
        let members = self.platform.voice_channel_members(guild, channel)?;
        if members > 1 {
            return None;
        }
        info!("Alone in voice channel {} ({} member(s)), leaving", channel, members);
        self.detach_channel(channel)
    }

    /// Track the bot's own voice state so the session never points at a
    /// connection the platform already dropped.
    pub fn observe_self_state(&self, self_id: UserId, change: &VoiceStateChange) {
        if change.user_id != self_id {
            return;
        }
        let mut slot = self.lock();
        let Some(session) = slot.as_mut() else {
            return;
        };
        if change.guild_id.is_some_and(|g| g != session.guild_id) {
            return;
        }
        match change.new_channel {
            None => {
                warn!("Disconnected from voice channel {} by the platform", session.channel_id);
                *slot = None;
            }
            Some(channel) if channel != session.channel_id => {
                info!("Moved from voice channel {} to {}", session.channel_id, channel);
                session.channel_id = channel;
            }
            Some(_) => {}
        }
    }

    /// Play audio into the current session. Logs and returns if there is none.
    pub async fn speak(&self, audio: Vec<u8>) {
        let call = self.lock().as_ref().map(|s| (s.channel_id, s.call.clone()));
        let Some((channel, call)) = call else {
            error!("Cannot speak: no active voice session");
            return;
        };
        if let Err(e) = call.play(audio).await {
            error!("Failed to play audio in voice channel {}: {}", channel, e);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<VoiceSession>> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
