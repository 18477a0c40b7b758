//! Restart scenario through the public API with in-memory collaborators.
//!
//! Empty registry -> `!listen` in A -> shutdown -> fresh engine restores {A}
//! -> a muted member's message in A is synthesized at the current rate.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use t2sbot::bot::{
    BotEvent, ChannelId, ChatPlatform, Engine, EngineConfig, GuildId, IncomingMessage, MemberVoice, MessageId,
    Synthesizer, UserId, VoiceCall,
};

const BOT: UserId = UserId(1);
const MEMBER: UserId = UserId(2);
const GUILD: GuildId = GuildId(3);
const CHANNEL_A: ChannelId = ChannelId(4);
const VOICE: ChannelId = ChannelId(5);

#[derive(Default)]
struct Recorder {
    presences: Mutex<Vec<String>>,
    played: Arc<Mutex<Vec<Vec<u8>>>>,
    synthesized: Mutex<Vec<(String, f32)>>,
}

struct RecordingCall {
    played: Arc<Mutex<Vec<Vec<u8>>>>,
}

#[async_trait]
impl VoiceCall for RecordingCall {
    async fn play(&self, audio: Vec<u8>) -> Result<(), String> {
        self.played.lock().unwrap().push(audio);
        Ok(())
    }

    async fn leave(&self) -> Result<(), String> {
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for Recorder {
    async fn reply(&self, _message: &IncomingMessage, _text: &str) -> Result<(), String> {
        Ok(())
    }

    async fn set_presence(&self, text: &str, _url: Option<&str>) -> Result<(), String> {
        self.presences.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn channel_name(&self, _channel: ChannelId) -> Option<String> {
        None
    }

    fn voice_channel_members(&self, _guild: GuildId, _channel: ChannelId) -> Option<usize> {
        Some(2)
    }

    async fn join_voice(&self, _guild: GuildId, _channel: ChannelId) -> Result<Arc<dyn VoiceCall>, String> {
        Ok(Arc::new(RecordingCall { played: self.played.clone() }))
    }
}

#[async_trait]
impl Synthesizer for Recorder {
    async fn synthesize(&self, text: &str, rate: f32) -> Result<Vec<u8>, String> {
        self.synthesized.lock().unwrap().push((text.to_string(), rate));
        Ok(vec![0xff, 0xfb])
    }
}

fn engine(dir: &Path, recorder: &Arc<Recorder>) -> Arc<Engine> {
    Arc::new(Engine::new(
        EngineConfig {
            language_code: "en-US".to_string(),
            presence_url: None,
            snapshot_path: dir.join("data.json"),
        },
        recorder.clone(),
        recorder.clone(),
    ))
}

fn mention(text: &str, voice: Option<MemberVoice>) -> BotEvent {
    BotEvent::Message(IncomingMessage {
        id: MessageId(1),
        guild_id: Some(GUILD),
        channel_id: CHANNEL_A,
        author_id: MEMBER,
        mentions: vec![BOT],
        content: format!("@t2sbot {text}"),
        author_voice: voice,
    })
}

async fn deliver(engine: &Arc<Engine>, event: BotEvent) {
    if let Some(tail) = engine.handle_event(event) {
        tail.await.unwrap();
    }
}

#[tokio::test]
async fn test_listening_channels_survive_restart() {
    let dir = TempDir::new().unwrap();

    let first = Arc::new(Recorder::default());
    let before = engine(dir.path(), &first);
    before.restore().unwrap();
    deliver(&before, BotEvent::Ready { self_id: BOT, tag: "t2sbot#1".to_string() }).await;
    deliver(&before, mention("!listen", None)).await;

    assert_eq!(before.state.registry.list(), vec![CHANNEL_A]);
    assert_eq!(first.presences.lock().unwrap().last().map(String::as_str), Some("1 channel(s)"));
    before.shutdown().await.unwrap();

    let second = Arc::new(Recorder::default());
    let after = engine(dir.path(), &second);
    after.restore().unwrap();
    assert_eq!(after.state.registry.list(), vec![CHANNEL_A]);

    deliver(&after, BotEvent::Ready { self_id: BOT, tag: "t2sbot#1".to_string() }).await;
    assert_eq!(second.presences.lock().unwrap().last().map(String::as_str), Some("1 channel(s)"));

    let seat = Some(MemberVoice { channel_id: VOICE, muted: true });
    deliver(&after, mention("!join", seat)).await;
    deliver(&after, mention("!speed 0.8", None)).await;
    deliver(
        &after,
        BotEvent::Message(IncomingMessage {
            id: MessageId(2),
            guild_id: Some(GUILD),
            channel_id: CHANNEL_A,
            author_id: MEMBER,
            mentions: vec![],
            content: "see https://example.com/a   for   details".to_string(),
            author_voice: seat,
        }),
    )
    .await;

    assert_eq!(*second.synthesized.lock().unwrap(), vec![("see for details".to_string(), 0.8)]);
    assert_eq!(second.played.lock().unwrap().len(), 1);
}
