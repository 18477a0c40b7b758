//! Discord adapter using serenity for the gateway and songbird for voice.
//!
//! Gateway callbacks are converted into [`BotEvent`]s and pushed onto the
//! dispatch channel; [`DiscordPlatform`] implements the outbound calls.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serenity::all::{
    ActivityData, Cache, ChannelId as DiscordChannelId, Context, CreateMessage, EventHandler,
    GuildId as DiscordGuildId, Http, Message, MessageId as DiscordMessageId, Ready, UserId as DiscordUserId,
    VoiceState,
};
use songbird::input::Input;
use songbird::{Call, CoreEvent, Event, EventContext, Songbird, TrackEvent};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::bot::event::{
    BotEvent, ChannelId, GuildId, IncomingMessage, MemberVoice, MessageId, UserId, VoiceStateChange,
};
use crate::bot::platform::{ChatPlatform, VoiceCall};

/// Slot for the gateway context, filled on ready. Presence updates go through the shard in it.
pub type ContextSlot = Arc<RwLock<Option<Context>>>;

/// serenity event handler: forwards everything to the dispatch loop.
pub struct Handler {
    events: mpsc::UnboundedSender<BotEvent>,
    context: ContextSlot,
}

impl Handler {
    pub fn new(events: mpsc::UnboundedSender<BotEvent>, context: ContextSlot) -> Self {
        Self { events, context }
    }

    fn forward(&self, event: BotEvent) {
        if self.events.send(event).is_err() {
            warn!("Dispatch loop closed, event dropped");
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        if let Ok(mut slot) = self.context.write() {
            *slot = Some(ctx);
        }
        self.forward(BotEvent::Ready {
            self_id: UserId(ready.user.id.get()),
            tag: ready.user.tag(),
        });
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let incoming = to_incoming_message(&ctx.cache, &msg);
        self.forward(BotEvent::Message(incoming));
    }

    async fn voice_state_update(&self, _ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        self.forward(BotEvent::VoiceStateUpdate(VoiceStateChange {
            guild_id: new.guild_id.map(|g| GuildId(g.get())),
            user_id: UserId(new.user_id.get()),
            old_channel: old.and_then(|s| s.channel_id).map(|c| ChannelId(c.get())),
            new_channel: new.channel_id.map(|c| ChannelId(c.get())),
        }));
    }
}

fn to_incoming_message(cache: &Arc<Cache>, msg: &Message) -> IncomingMessage {
    IncomingMessage {
        id: MessageId(msg.id.get()),
        guild_id: msg.guild_id.map(|g| GuildId(g.get())),
        channel_id: ChannelId(msg.channel_id.get()),
        author_id: UserId(msg.author.id.get()),
        mentions: msg.mentions.iter().map(|u| UserId(u.id.get())).collect(),
        content: msg.content_safe(cache),
        author_voice: msg.guild_id.and_then(|g| member_voice(cache, g, msg.author.id)),
    }
}

fn member_voice(cache: &Cache, guild: DiscordGuildId, user: DiscordUserId) -> Option<MemberVoice> {
    let guild = cache.guild(guild)?;
    author_voice(&guild.voice_states, user)
}

fn author_voice(voice_states: &HashMap<DiscordUserId, VoiceState>, user: DiscordUserId) -> Option<MemberVoice> {
    voice_states.get(&user).and_then(voice_presence)
}

/// Muted counts both the member's own mute and a server mute.
fn voice_presence(state: &VoiceState) -> Option<MemberVoice> {
    let channel = state.channel_id?;
    Some(MemberVoice {
        channel_id: ChannelId(channel.get()),
        muted: state.self_mute || state.mute,
    })
}

/// Outbound Discord calls.
pub struct DiscordPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
    songbird: Arc<Songbird>,
    context: ContextSlot,
    events: mpsc::UnboundedSender<BotEvent>,
}

impl DiscordPlatform {
    pub fn new(
        http: Arc<Http>,
        cache: Arc<Cache>,
        songbird: Arc<Songbird>,
        context: ContextSlot,
        events: mpsc::UnboundedSender<BotEvent>,
    ) -> Self {
        Self { http, cache, songbird, context, events }
    }
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    async fn reply(&self, message: &IncomingMessage, text: &str) -> Result<(), String> {
        let channel = DiscordChannelId::new(message.channel_id.0);
        let reference = (channel, DiscordMessageId::new(message.id.0));
        channel
            .send_message(&self.http, CreateMessage::new().content(text).reference_message(reference))
            .await
            .map(|_| ())
            .map_err(|e| format!("Failed to send: {e}"))
    }

    async fn set_presence(&self, text: &str, url: Option<&str>) -> Result<(), String> {
        let ctx = self
            .context
            .read()
            .ok()
            .and_then(|slot| slot.clone())
            .ok_or_else(|| "gateway not ready".to_string())?;

        let activity = match url {
            Some(url) => ActivityData::streaming(text, url).map_err(|e| format!("Invalid presence URL: {e}"))?,
            None => ActivityData::playing(text),
        };
        ctx.set_activity(Some(activity));
        info!("Presence: {}", text);
        Ok(())
    }

    async fn channel_name(&self, channel: ChannelId) -> Option<String> {
        DiscordChannelId::new(channel.0)
            .name((&self.cache, self.http.as_ref()))
            .await
            .ok()
    }

    fn voice_channel_members(&self, guild: GuildId, channel: ChannelId) -> Option<usize> {
        let guild = self.cache.guild(DiscordGuildId::new(guild.0))?;
        let channel = DiscordChannelId::new(channel.0);
        Some(
            guild
                .voice_states
                .values()
                .filter(|s| s.channel_id == Some(channel))
                .count(),
        )
    }

    async fn join_voice(&self, guild: GuildId, channel: ChannelId) -> Result<Arc<dyn VoiceCall>, String> {
        let guild_id = DiscordGuildId::new(guild.0);
        let call = self
            .songbird
            .join(guild_id, DiscordChannelId::new(channel.0))
            .await
            .map_err(|e| format!("Failed to join voice channel: {e}"))?;

        {
            let mut handler = call.lock().await;
            handler.remove_all_global_events();
            let reporter = VoiceErrorReporter { events: self.events.clone(), channel };
            handler.add_global_event(Event::Core(CoreEvent::DriverDisconnect), reporter.clone());
            handler.add_global_event(Event::Track(TrackEvent::Error), reporter);
        }

        Ok(Arc::new(SongbirdCall {
            songbird: self.songbird.clone(),
            guild_id,
            call,
        }))
    }
}

/// A songbird call for one guild.
struct SongbirdCall {
    songbird: Arc<Songbird>,
    guild_id: DiscordGuildId,
    call: Arc<Mutex<Call>>,
}

#[async_trait]
impl VoiceCall for SongbirdCall {
    async fn play(&self, audio: Vec<u8>) -> Result<(), String> {
        let mut handler = self.call.lock().await;
        if handler.current_channel().is_none() {
            return Err("voice connection is closed".to_string());
        }
        handler.enqueue_input(Input::from(audio)).await;
        Ok(())
    }

    async fn leave(&self) -> Result<(), String> {
        self.songbird
            .remove(self.guild_id)
            .await
            .map_err(|e| format!("Failed to leave voice channel: {e}"))
    }
}

/// Forwards voice driver disconnects and track errors to the dispatch loop.
#[derive(Clone)]
struct VoiceErrorReporter {
    events: mpsc::UnboundedSender<BotEvent>,
    channel: ChannelId,
}

#[async_trait]
impl songbird::EventHandler for VoiceErrorReporter {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let report = match ctx {
            EventContext::DriverDisconnect(data) => {
                format!("voice connection to channel {} dropped: {:?}", self.channel, data.reason)
            }
            EventContext::Track(tracks) => {
                format!("{} track(s) failed in voice channel {}", tracks.len(), self.channel)
            }
            _ => return None,
        };
        let _ = self.events.send(BotEvent::Error(report));
        None
    }
}
