//! Text-to-speech using Google Cloud Text-to-Speech.
//!
//! Calls the REST `text:synthesize` endpoint and returns MP3 audio,
//! which the voice driver decodes for playback.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, info};

use crate::bot::platform::Synthesizer;

/// Public Cloud Text-to-Speech endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://texttospeech.googleapis.com";

/// Response from /v1/text:synthesize.
#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    #[serde(rename = "audioContent")]
    audio_content: String,
}

/// TTS client for the Cloud Text-to-Speech API.
pub struct GoogleTts {
    endpoint: String,
    api_key: String,
    language_code: String,
    volume_gain_db: f64,
    client: reqwest::Client,
}

impl GoogleTts {
    /// Create a new TTS client.
    ///
    /// `endpoint` is the API base URL, normally [`DEFAULT_ENDPOINT`].
    pub fn new(endpoint: String, api_key: String, language_code: String, volume_gain_db: f64) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            language_code,
            volume_gain_db,
            client: reqwest::Client::new(),
        }
    }

    fn request_body(&self, text: &str, rate: f32) -> serde_json::Value {
        serde_json::json!({
            "input": { "text": text },
            "voice": { "languageCode": self.language_code },
            "audioConfig": {
                "audioEncoding": "MP3",
                "volumeGainDb": self.volume_gain_db,
                "speakingRate": rate,
            }
        })
    }
}

#[async_trait]
impl Synthesizer for GoogleTts {
    async fn synthesize(&self, text: &str, rate: f32) -> Result<Vec<u8>, String> {
        let preview: String = text.chars().take(50).collect();
        info!("TTS: \"{}\"", preview);

        let response = self
            .client
            .post(format!("{}/v1/text:synthesize", self.endpoint))
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request_body(text, rate))
            .send()
            .await
            .map_err(|e| format!("TTS request failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("TTS error {}: {}", status, body));
        }

        let body: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to read TTS response: {e}"))?;

        let audio = decode_audio(&body.audio_content)?;
        debug!("Got {} bytes of MP3 audio", audio.len());
        Ok(audio)
    }
}

fn decode_audio(encoded: &str) -> Result<Vec<u8>, String> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| format!("Invalid audioContent: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tts_client_creation() {
        let client = GoogleTts::new("https://example.test/".to_string(), "k".to_string(), "ja-JP".to_string(), 0.0);
        assert_eq!(client.endpoint, "https://example.test");
    }

    #[test]
    fn test_request_body() {
        let client = GoogleTts::new(DEFAULT_ENDPOINT.to_string(), "k".to_string(), "en-US".to_string(), -3.5);
        let body = client.request_body("hello", 1.5);

        assert_eq!(body["input"]["text"], "hello");
        assert_eq!(body["voice"]["languageCode"], "en-US");
        assert_eq!(body["audioConfig"]["audioEncoding"], "MP3");
        assert_eq!(body["audioConfig"]["volumeGainDb"], -3.5);
        assert_eq!(body["audioConfig"]["speakingRate"], 1.5);
    }

    #[test]
    fn test_decode_response() {
        let body: SynthesizeResponse = serde_json::from_str(r#"{"audioContent":"SUQz"}"#).unwrap();
        assert_eq!(decode_audio(&body.audio_content).unwrap(), b"ID3".to_vec());
        assert!(decode_audio("not base64!").is_err());
    }
}
