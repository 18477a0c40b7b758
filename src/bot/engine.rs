//! Bot engine - routes platform events to commands, voice, and speech.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bot::command::{self, Command, Parsed};
use crate::bot::event::{BotEvent, IncomingMessage, UserId, VoiceStateChange};
use crate::bot::persistence::{PersistError, SnapshotStore};
use crate::bot::platform::{ChatPlatform, Synthesizer};
use crate::bot::registry::ListeningChannelRegistry;
use crate::bot::sanitize::TextSanitizer;
use crate::bot::voice::VoiceSessionManager;

/// Speech rate before anyone runs `!speed`.
pub const DEFAULT_SPEECH_RATE: f32 = 1.0;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Synthesis language, e.g. "en-US" or "ja-JP".
    pub language_code: String,
    /// Link attached to the presence line.
    pub presence_url: Option<String>,
    /// Where the listening channels are persisted.
    pub snapshot_path: PathBuf,
}

/// Process-wide bot state, shared by every handler.
pub struct BotState {
    /// Set once by the first ready event.
    self_id: OnceLock<UserId>,
    pub registry: ListeningChannelRegistry,
    pub voice: VoiceSessionManager,
    speech_rate: Mutex<f32>,
}

impl BotState {
    pub fn self_id(&self) -> Option<UserId> {
        self.self_id.get().copied()
    }

    pub fn speech_rate(&self) -> f32 {
        *self.speech_rate.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_speech_rate(&self, rate: f32) {
        *self.speech_rate.lock().unwrap_or_else(|p| p.into_inner()) = rate;
    }
}

/// The bot engine.
///
/// Each event is handled in two phases. The synchronous phase reads and
/// mutates [`BotState`] in event order. Anything that has to wait on the
/// network (replies, presence, voice, synthesis) runs in a spawned tail so
/// the next event is never blocked behind it.
pub struct Engine {
    pub state: BotState,
    platform: Arc<dyn ChatPlatform>,
    synthesizer: Arc<dyn Synthesizer>,
    sanitizer: TextSanitizer,
    snapshots: SnapshotStore,
    /// Once set, events are ignored so nothing changes after the snapshot.
    shutting_down: AtomicBool,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        platform: Arc<dyn ChatPlatform>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        let state = BotState {
            self_id: OnceLock::new(),
            registry: ListeningChannelRegistry::new(platform.clone(), config.presence_url.clone()),
            voice: VoiceSessionManager::new(platform.clone()),
            speech_rate: Mutex::new(DEFAULT_SPEECH_RATE),
        };

        Self {
            state,
            platform,
            synthesizer,
            sanitizer: TextSanitizer::new(&config.language_code),
            snapshots: SnapshotStore::new(config.snapshot_path),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Merge the persisted snapshot into the state. A malformed snapshot is an error.
    pub fn restore(&self) -> Result<(), PersistError> {
        if let Some(snapshot) = self.snapshots.load()? {
            self.state.registry.restore(snapshot.listening_channels);
        }
        Ok(())
    }

    /// Stop handling events, leave voice, then persist. Called once on the way out.
    pub async fn shutdown(&self) -> Result<(), PersistError> {
        info!("Shutting down: leaving voice and saving state");
        self.shutting_down.store(true, Ordering::SeqCst);
        self.state.voice.close().await;
        self.snapshots.save(&self.state.registry.snapshot())
    }

    /// Consume events until the sender side closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<BotEvent>) {
        info!("Dispatch loop started");
        while let Some(event) = events.recv().await {
            // Tails are detached; their failures are logged where they happen
            let _ = self.handle_event(event);
        }
        info!("Dispatch loop stopped");
    }

    /// Handle one event. Returns the spawned async tail, if any.
    pub fn handle_event(self: &Arc<Self>, event: BotEvent) -> Option<JoinHandle<()>> {
        if self.shutting_down.load(Ordering::SeqCst) {
            debug!("Shutting down, ignoring {:?}", event);
            return None;
        }
        match event {
            BotEvent::Ready { self_id, tag } => self.on_ready(self_id, &tag),
            BotEvent::Message(msg) => self.on_message(msg),
            BotEvent::VoiceStateUpdate(change) => self.on_voice_state(change),
            BotEvent::Error(e) => {
                error!("Platform error: {}", e);
                None
            }
        }
    }

    fn on_ready(self: &Arc<Self>, self_id: UserId, tag: &str) -> Option<JoinHandle<()>> {
        info!("Logged in as {}!", tag);
        if self.state.self_id.set(self_id).is_err() && self.state.self_id() != Some(self_id) {
            warn!("Ignoring changed bot id {} (keeping {:?})", self_id, self.state.self_id());
        }

        let engine = self.clone();
        Some(tokio::spawn(async move {
            engine.state.registry.publish_presence().await;
        }))
    }

    fn on_message(self: &Arc<Self>, msg: IncomingMessage) -> Option<JoinHandle<()>> {
        let Some(self_id) = self.state.self_id() else {
            warn!("Message {} arrived before ready, dropping", msg.id);
            return None;
        };
        if msg.author_id == self_id {
            return None;
        }

        if msg.mentions_user(self_id) {
            self.route_command(msg)
        } else {
            self.speak_message(msg)
        }
    }

    fn route_command(self: &Arc<Self>, msg: IncomingMessage) -> Option<JoinHandle<()>> {
        let command = match command::parse(&msg.content) {
            Parsed::Command(command) => command,
            Parsed::Missing => {
                let text = format!("No command specified. Available commands: {}", command::available_commands());
                return Some(self.spawn_reply(msg, text));
            }
            Parsed::Unknown(token) => {
                info!("Unknown command !{} from {}", token, msg.author_id);
                let text = format!("Invalid command. Available commands: {}", command::available_commands());
                return Some(self.spawn_reply(msg, text));
            }
        };

        info!("⚙️ !{} from {} in channel {}", command.name(), msg.author_id, msg.channel_id);
        match command {
            Command::Join => self.cmd_join(msg),
            Command::Kick => self.cmd_kick(msg),
            Command::Listen => self.cmd_listen(msg),
            Command::Unlisten => self.cmd_unlisten(msg),
            Command::List => self.cmd_list(msg),
            Command::Speed => self.cmd_speed(msg),
        }
    }

    fn cmd_join(self: &Arc<Self>, msg: IncomingMessage) -> Option<JoinHandle<()>> {
        let target = match (msg.guild_id, msg.author_voice) {
            (Some(guild), Some(voice)) => Some((guild, voice.channel_id)),
            _ => None,
        };
        let Some((guild, channel)) = target else {
            return Some(self.spawn_reply(msg, "You need to join a voice channel first.".to_string()));
        };

        let engine = self.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = engine.state.voice.join(guild, channel).await {
                error!("Failed to join voice channel {}: {}", channel, e);
            }
        }))
    }

    fn cmd_kick(self: &Arc<Self>, msg: IncomingMessage) -> Option<JoinHandle<()>> {
        let session = self.state.voice.detach_in_guild(msg.guild_id?)?;
        Some(tokio::spawn(session.disconnect()))
    }

    fn cmd_listen(self: &Arc<Self>, msg: IncomingMessage) -> Option<JoinHandle<()>> {
        if !self.state.registry.add(msg.channel_id) {
            return Some(self.spawn_reply(msg, "Already listening to this channel.".to_string()));
        }

        let engine = self.clone();
        Some(tokio::spawn(async move {
            engine.reply(&msg, "Listening to this channel. Muted members' messages will be spoken.").await;
            engine.state.registry.publish_presence().await;
        }))
    }

    fn cmd_unlisten(self: &Arc<Self>, msg: IncomingMessage) -> Option<JoinHandle<()>> {
        if !self.state.registry.remove(msg.channel_id) {
            return None;
        }

        let engine = self.clone();
        Some(tokio::spawn(async move {
            engine.reply(&msg, "Stopped listening to this channel.").await;
            engine.state.registry.publish_presence().await;
        }))
    }

    fn cmd_list(self: &Arc<Self>, msg: IncomingMessage) -> Option<JoinHandle<()>> {
        let channels = self.state.registry.list();

        let engine = self.clone();
        Some(tokio::spawn(async move {
            let mut names = Vec::with_capacity(channels.len());
            for channel in &channels {
                let name = engine.platform.channel_name(*channel).await;
                names.push(format!("#{}", name.unwrap_or_else(|| channel.to_string())));
            }
            let text = if names.is_empty() {
                "Listening to 0 channel(s).".to_string()
            } else {
                format!("Listening to {} channel(s): {}", names.len(), names.join(", "))
            };
            engine.reply(&msg, &text).await;
        }))
    }

    fn cmd_speed(self: &Arc<Self>, msg: IncomingMessage) -> Option<JoinHandle<()>> {
        let rate = command::parse_speed(&msg.content)?;
        self.state.set_speech_rate(rate);
        info!("Speech rate set to {}", rate);
        Some(self.spawn_reply(msg, format!("Speech rate set to {}.", rate)))
    }

    /// The non-command path: speak muted members' messages in listening channels.
    fn speak_message(self: &Arc<Self>, msg: IncomingMessage) -> Option<JoinHandle<()>> {
        if !self.state.registry.contains(msg.channel_id) {
            return None;
        }
        if !msg.author_voice.is_some_and(|v| v.muted) {
            return None;
        }

        let text = self.sanitizer.clean(&msg.content);
        if text.is_empty() {
            debug!("Nothing to say for message {} after cleaning", msg.id);
            return None;
        }
        let rate = self.state.speech_rate();

        let engine = self.clone();
        Some(tokio::spawn(async move {
            let preview: String = text.chars().take(50).collect();
            info!("🗣️ {} ({}x): \"{}\"", msg.author_id, rate, preview);
            match engine.synthesizer.synthesize(&text, rate).await {
                Ok(audio) => engine.state.voice.speak(audio).await,
                Err(e) => error!("Synthesis failed for message {}: {}", msg.id, e),
            }
        }))
    }

    fn on_voice_state(self: &Arc<Self>, change: VoiceStateChange) -> Option<JoinHandle<()>> {
        if let Some(self_id) = self.state.self_id() {
            self.state.voice.observe_self_state(self_id, &change);
        }
        let session = self.state.voice.detach_if_alone(&change)?;
        Some(tokio::spawn(session.disconnect()))
    }

    fn spawn_reply(self: &Arc<Self>, msg: IncomingMessage, text: String) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            engine.reply(&msg, &text).await;
        })
    }

    async fn reply(&self, msg: &IncomingMessage, text: &str) {
        if let Err(e) = self.platform.reply(msg, text).await {
            warn!("Failed to reply in channel {}: {}", msg.channel_id, e);
        }
    }
}
