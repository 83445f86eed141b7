use crate::error::ApiError;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// One unit of chat content. Immutable once written; there is no edit or
/// delete operation.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Message {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    /// Assigned from the server clock at creation, never taken from the
    /// client. Serialized as integer milliseconds in both JSON and BSON so
    /// the store can sort on it natively.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: &str, receiver: &str, content: &str) -> Self {
        Message {
            id: None,
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// The unordered pair of user identifiers naming a conversation. Derived at
/// query time; never persisted.
#[derive(Debug, Clone)]
pub struct ConversationKey {
    user1: String,
    user2: String,
}

impl ConversationKey {
    /// Both identifiers must be non-empty after trimming.
    pub fn new(user1: &str, user2: &str) -> Result<Self, ApiError> {
        let user1 = user1.trim();
        let user2 = user2.trim();
        if user1.is_empty() || user2.is_empty() {
            return Err(ApiError::InvalidRequest(
                "both user identifiers are required".into(),
            ));
        }
        Ok(ConversationKey {
            user1: user1.to_string(),
            user2: user2.to_string(),
        })
    }

    pub fn user1(&self) -> &str {
        &self.user1
    }

    pub fn user2(&self) -> &str {
        &self.user2
    }

    pub fn contains(&self, user: &str) -> bool {
        self.user1 == user || self.user2 == user
    }

    /// True when the message was exchanged between the two users of this
    /// key, in either direction.
    pub fn matches(&self, message: &Message) -> bool {
        (message.sender == self.user1 && message.receiver == self.user2)
            || (message.sender == self.user2 && message.receiver == self.user1)
    }
}

/// Pagination for history queries.
///
/// Absent parameters take the defaults; malformed or zero values are
/// rejected; limits above [`MAX_LIMIT`] are clamped, not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub skip: u64,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            limit: DEFAULT_LIMIT,
            skip: 0,
        }
    }
}

impl Page {
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, ApiError> {
        let limit = match query.get("limit") {
            Some(raw) => {
                let parsed: i64 = raw
                    .parse()
                    .map_err(|_| ApiError::InvalidRequest(format!("invalid limit: {}", raw)))?;
                if parsed <= 0 {
                    return Err(ApiError::InvalidRequest(format!(
                        "limit must be positive, got {}",
                        parsed
                    )));
                }
                parsed.min(MAX_LIMIT)
            }
            None => DEFAULT_LIMIT,
        };

        let skip = match query.get("skip") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| ApiError::InvalidRequest(format!("invalid skip: {}", raw)))?,
            None => 0,
        };

        Ok(Page { limit, skip })
    }
}
