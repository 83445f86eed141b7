//! The wire contract of the real-time channel.
//!
//! One typed contract shared by the server and every client; the divergent
//! per-client payload shapes of earlier frontends are collapsed here.

use crate::error::ApiError;
use crate::models::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client -> server `"message"` event.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SendEvent {
    pub receiver: String,
    pub message: String,
    pub sender: String,
}

impl SendEvent {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.sender.trim().is_empty() || self.receiver.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "sender and receiver are required".into(),
            ));
        }
        if self.message.trim().is_empty() {
            return Err(ApiError::InvalidRequest("message text is empty".into()));
        }
        Ok(())
    }
}

/// Server -> client `"message"` event, pushed to every open connection of
/// the addressed receiver.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DeliveryEvent {
    pub sender: String,
    pub message: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl DeliveryEvent {
    pub fn from_message(message: &Message) -> Self {
        DeliveryEvent {
            sender: message.sender.clone(),
            message: message.content.clone(),
            timestamp: message.timestamp,
        }
    }
}

/// Success envelope of the history endpoint.
#[derive(Serialize, Deserialize, Debug)]
pub struct HistoryResponse {
    pub message: String,
    #[serde(rename = "chatHistory")]
    pub chat_history: Vec<Message>,
}
