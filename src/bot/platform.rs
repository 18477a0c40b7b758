//! Collaborator seams: the chat/voice platform and the speech synthesizer.
//!
//! The Discord implementation lives in `discord.rs` and the synthesizer in
//! `tts.rs`; tests substitute in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::bot::event::{ChannelId, GuildId, IncomingMessage};

/// Chat and voice operations the bot needs from the platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Reply to a message in its channel.
    async fn reply(&self, message: &IncomingMessage, text: &str) -> Result<(), String>;

    /// Publish the bot's presence line.
    async fn set_presence(&self, text: &str, url: Option<&str>) -> Result<(), String>;

    /// Human-readable channel name, if it can be resolved.
    async fn channel_name(&self, channel: ChannelId) -> Option<String>;

    /// Number of members (the bot included) connected to a voice channel.
    ///
    /// `None` when the platform has no view of the guild.
    fn voice_channel_members(&self, guild: GuildId, channel: ChannelId) -> Option<usize>;

    /// Connect to a voice channel.
    async fn join_voice(&self, guild: GuildId, channel: ChannelId) -> Result<Arc<dyn VoiceCall>, String>;
}

/// A live voice connection.
#[async_trait]
pub trait VoiceCall: Send + Sync {
    /// Queue encoded audio for playback.
    async fn play(&self, audio: Vec<u8>) -> Result<(), String>;

    /// Disconnect.
    async fn leave(&self) -> Result<(), String>;
}

/// Text-to-speech service. Language and volume are fixed per instance.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, rate: f32) -> Result<Vec<u8>, String>;
}
