//! Bot module - speaks muted members' messages into a voice channel.

pub mod command;
pub mod discord;
pub mod engine;
pub mod event;
pub mod persistence;
pub mod platform;
pub mod registry;
pub mod sanitize;
pub mod tts;
pub mod voice;


pub use engine::{BotState, Engine, EngineConfig};
pub use event::{BotEvent, ChannelId, GuildId, IncomingMessage, MemberVoice, MessageId, UserId, VoiceStateChange};
pub use platform::{ChatPlatform, Synthesizer, VoiceCall};
