use crate::error::ApiError;
use crate::models::message::{ConversationKey, Message, Page};
use async_trait::async_trait;
use futures_util::stream::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::{bson::doc, options::FindOptions, Collection, Database};

/// Durable, append-only record of every chat message.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append one message. Messages are never mutated after this.
    async fn insert(&self, message: &Message) -> Result<(), ApiError>;

    /// Messages exchanged between the two users of `key`, in either
    /// direction, most recent first, sliced by `page`. An empty conversation
    /// yields an empty vec, not an error.
    async fn history(&self, key: &ConversationKey, page: Page) -> Result<Vec<Message>, ApiError>;
}

pub struct MongoMessageStore {
    collection: Collection<Message>,
}

impl MongoMessageStore {
    pub fn new(db: &Database) -> Self {
        MongoMessageStore {
            collection: db.collection("messages"),
        }
    }
}

#[async_trait]
impl MessageStore for MongoMessageStore {
    async fn insert(&self, message: &Message) -> Result<(), ApiError> {
        self.collection
            .insert_one(message, None)
            .await
            .map_err(|e| ApiError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn history(&self, key: &ConversationKey, page: Page) -> Result<Vec<Message>, ApiError> {
        let filter = doc! {
            "$or": [
                { "sender": key.user1(), "receiver": key.user2() },
                { "sender": key.user2(), "receiver": key.user1() },
            ]
        };
        // Descending timestamp with _id as the tie-breaker: ObjectIds are
        // monotonic per process, so same-millisecond messages keep their
        // insertion order.
        let options = FindOptions::builder()
            .sort(doc! { "timestamp": -1, "_id": -1 })
            .skip(page.skip)
            .limit(page.limit)
            .build();

        let mut cursor = self
            .collection
            .find(filter, options)
            .await
            .map_err(|e| ApiError::StoreUnavailable(e.to_string()))?;

        let mut messages = Vec::new();
        while let Some(message) = cursor
            .try_next()
            .await
            .map_err(|e| ApiError::StoreUnavailable(e.to_string()))?
        {
            messages.push(message);
        }

        Ok(messages)
    }
}

/// In-memory store keeping messages in insertion order. Used by tests in
/// place of MongoDB.
#[derive(Default)]
pub struct MemoryMessageStore {
    messages: tokio::sync::Mutex<Vec<Message>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn insert(&self, message: &Message) -> Result<(), ApiError> {
        let mut stored = message.clone();
        stored.id = Some(ObjectId::new());
        self.messages.lock().await.push(stored);
        Ok(())
    }

    async fn history(&self, key: &ConversationKey, page: Page) -> Result<Vec<Message>, ApiError> {
        let messages = self.messages.lock().await;
        Ok(messages
            .iter()
            .rev()
            .filter(|m| key.matches(m))
            .skip(page.skip as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(limit: i64, skip: u64) -> Page {
        Page { limit, skip }
    }

    #[tokio::test]
    async fn history_returns_only_the_queried_pair() {
        let store = MemoryMessageStore::new();
        store.insert(&Message::new("alice", "bob", "one")).await.unwrap();
        store.insert(&Message::new("bob", "alice", "two")).await.unwrap();
        store.insert(&Message::new("alice", "carol", "three")).await.unwrap();

        let key = ConversationKey::new("alice", "bob").unwrap();
        let history = store.history(&key, Page::default()).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|m| key.matches(m)));
    }

    #[tokio::test]
    async fn history_is_newest_first_and_stable() {
        let store = MemoryMessageStore::new();
        for text in ["first", "second", "third"] {
            store.insert(&Message::new("alice", "bob", text)).await.unwrap();
        }

        let key = ConversationKey::new("bob", "alice").unwrap();
        let history = store.history(&key, Page::default()).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["third", "second", "first"]);

        // Same query, same order.
        let again = store.history(&key, Page::default()).await.unwrap();
        let contents_again: Vec<&str> = again.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, contents_again);
    }

    #[tokio::test]
    async fn pagination_slices_and_never_errors() {
        let store = MemoryMessageStore::new();
        for i in 0..5 {
            store
                .insert(&Message::new("alice", "bob", &format!("m{}", i)))
                .await
                .unwrap();
        }
        let key = ConversationKey::new("alice", "bob").unwrap();

        let first_page = store.history(&key, page(2, 0)).await.unwrap();
        assert_eq!(first_page.len(), 2);
        assert_eq!(first_page[0].content, "m4");

        let second_page = store.history(&key, page(2, 2)).await.unwrap();
        assert_eq!(second_page[0].content, "m2");

        // Skip beyond the available count is an empty result, not an error.
        let past_the_end = store.history(&key, page(20, 100)).await.unwrap();
        assert!(past_the_end.is_empty());
    }

    #[tokio::test]
    async fn empty_conversation_is_ok() {
        let store = MemoryMessageStore::new();
        let key = ConversationKey::new("alice", "bob").unwrap();
        let history = store.history(&key, Page::default()).await.unwrap();
        assert!(history.is_empty());
    }
}
