use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::audio::AudioFrame;

/// The single media format this crate speaks. No negotiation.
pub const PCM_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// Session setup handed to `connect`: the persona voice id and one
/// pre-composed system-instruction string. Composing the instruction is the
/// caller's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSetup {
    pub voice: String,
    pub system_instruction: String,
}

/// Free-form steering text. `end_of_turn` closes the model's current turn
/// after processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SteeringMessage {
    pub text: String,
    pub end_of_turn: bool,
}

impl SteeringMessage {
    pub fn new(text: impl Into<String>, end_of_turn: bool) -> Self {
        Self {
            text: text.into(),
            end_of_turn,
        }
    }
}

/// One realtime audio entry appended to the current open turn without
/// closing it. The payload is base64 so it survives any text transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeAudio {
    pub mime_type: String,
    pub data: String,
}

impl RealtimeAudio {
    pub fn from_frame(frame: &AudioFrame) -> Self {
        Self {
            mime_type: PCM_MIME_TYPE.to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(frame.to_le_bytes()),
        }
    }
}

/// One part of an inbound content event. Parts may lack text entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Incremental model output. A single logical response can arrive split
/// across multiple events, each with one or more parts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentEvent {
    pub parts: Vec<ContentPart>,
}

impl ContentEvent {
    /// Concatenate all text parts into one string.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect()
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ContentPart {
                text: Some(text.into()),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_text_joins_parts_and_skips_empty() {
        let event = ContentEvent {
            parts: vec![
                ContentPart {
                    text: Some("[Chaos".into()),
                },
                ContentPart { text: None },
                ContentPart {
                    text: Some(" Chad]: hello".into()),
                },
            ],
        };
        assert_eq!(event.text(), "[Chaos Chad]: hello");
    }

    #[test]
    fn steering_message_serializes_camel_case() {
        let value = serde_json::to_value(SteeringMessage::new("wrap up", false))
            .expect("serialize");
        assert_eq!(value["text"], "wrap up");
        assert_eq!(value["endOfTurn"], false);
    }

    #[test]
    fn content_event_deserializes_with_textless_parts() {
        let event: ContentEvent =
            serde_json::from_str(r#"{"parts":[{"text":"[Rival]: hi"},{}]}"#)
                .expect("deserialize");
        assert_eq!(event.parts.len(), 2);
        assert_eq!(event.text(), "[Rival]: hi");
    }

    #[test]
    fn realtime_audio_serializes_camel_case() {
        let frame = AudioFrame {
            samples: vec![0],
            sample_rate: 16_000,
            timestamp_ms: 0,
        };
        let value = serde_json::to_value(RealtimeAudio::from_frame(&frame)).expect("serialize");
        assert_eq!(value["mimeType"], PCM_MIME_TYPE);
    }

    #[test]
    fn realtime_audio_encodes_little_endian_pcm() {
        let frame = AudioFrame {
            samples: vec![1, -2],
            sample_rate: 16_000,
            timestamp_ms: 0,
        };
        let entry = RealtimeAudio::from_frame(&frame);
        assert_eq!(entry.mime_type, PCM_MIME_TYPE);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&entry.data)
            .expect("valid base64");
        assert_eq!(bytes, vec![0x01, 0x00, 0xFE, 0xFF]);
    }
}
