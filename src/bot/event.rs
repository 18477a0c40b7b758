//! Platform-neutral identifiers and the typed events the dispatch loop consumes.

use std::fmt;

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake!(
    /// A user account (members and the bot itself).
    UserId
);
snowflake!(
    /// A text or voice channel.
    ChannelId
);
snowflake!(
    /// A server.
    GuildId
);
snowflake!(MessageId);

/// Where a member currently sits in voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberVoice {
    pub channel_id: ChannelId,
    /// Self-muted or server-muted.
    pub muted: bool,
}

/// A chat message as seen by the bot.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: MessageId,
    /// `None` for direct messages.
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    /// Users mentioned structurally (not by plain-text name).
    pub mentions: Vec<UserId>,
    /// Message text with mentions rendered as plain names.
    pub content: String,
    /// The author's voice presence at the time the message arrived.
    pub author_voice: Option<MemberVoice>,
}

impl IncomingMessage {
    pub fn mentions_user(&self, user: UserId) -> bool {
        self.mentions.contains(&user)
    }
}

/// A member's voice presence changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceStateChange {
    pub guild_id: Option<GuildId>,
    pub user_id: UserId,
    pub old_channel: Option<ChannelId>,
    pub new_channel: Option<ChannelId>,
}

/// Everything the platform can tell the bot about.
#[derive(Debug, Clone)]
pub enum BotEvent {
    /// Session is up; carries the bot's own identity.
    Ready { self_id: UserId, tag: String },
    Message(IncomingMessage),
    VoiceStateUpdate(VoiceStateChange),
    Error(String),
}
