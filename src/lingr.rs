//! Lingr bot webhook payloads.
//!
//! Lingr POSTs a status object to the bot's endpoint for every batch of room
//! activity. Only message events matter here; presence and other events
//! arrive without a `message` and are skipped.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Status {
    pub status: String,
    pub counter: i64,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Event {
    pub event_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Message {
    pub id: String,
    pub room: String,
    pub public_session_id: String,
    pub icon_url: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub speaker_id: String,
    pub nickname: String,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub local_id: Option<String>,
}

impl Status {
    pub fn decode(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Message events in delivery order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.events.iter().filter_map(|e| e.message.as_ref())
    }
}
