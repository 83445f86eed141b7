//! The real-time delivery channel and the history facade.
//!
//! Each connected client holds one WebSocket. Inbound send events are
//! persisted to the message store first and only then routed to the
//! receiver's open connections, so an offline receiver loses nothing: the
//! message is already durable and turns up in the next history fetch.

use crate::auth::validate_jwt;
use crate::db::message::MessageStore;
use crate::error::{self, ApiError};
use crate::models::events::{DeliveryEvent, HistoryResponse, SendEvent};
use crate::models::message::{ConversationKey, Message, Page};

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use uuid::Uuid;
use warp::ws::{self, WebSocket};
use warp::{Rejection, Reply};

/// Bound on a single history read; expiry surfaces as `StoreUnavailable`.
const HISTORY_TIMEOUT: Duration = Duration::from_secs(5);

type Tx = mpsc::UnboundedSender<ws::Message>;

/// Registry of live WebSocket connections, keyed by user id.
///
/// Injected into everything that needs to push events; constructed once at
/// startup and torn down with the process. A user may hold several
/// connections (several tabs); each gets its own id so disconnects remove
/// exactly one entry.
#[derive(Default)]
pub struct ConnectionManager {
    connections: Mutex<HashMap<String, Vec<(Uuid, Tx)>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, user: &str, tx: Tx) -> Uuid {
        let id = Uuid::new_v4();
        self.connections
            .lock()
            .await
            .entry(user.to_string())
            .or_default()
            .push((id, tx));
        id
    }

    pub async fn unregister(&self, user: &str, id: Uuid) {
        let mut connections = self.connections.lock().await;
        if let Some(list) = connections.get_mut(user) {
            list.retain(|(conn_id, _)| *conn_id != id);
            if list.is_empty() {
                connections.remove(user);
            }
        }
    }

    /// Push `event` to every open connection of `user`; returns how many
    /// connections accepted it. Zero is not an error: the message is already
    /// durable and reachable through history.
    pub async fn send_to(&self, user: &str, event: &DeliveryEvent) -> usize {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                warn!("failed to serialize delivery event: {}", e);
                return 0;
            }
        };

        let mut connections = self.connections.lock().await;
        let mut delivered = 0;
        if let Some(list) = connections.get_mut(user) {
            // A failed send means the reader half is gone; drop the entry.
            list.retain(|(_, tx)| match tx.send(ws::Message::text(text.clone())) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            });
            if list.is_empty() {
                connections.remove(user);
            }
        }
        delivered
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.values().map(Vec::len).sum()
    }
}

/// Runs one authenticated WebSocket session to its end.
pub async fn chat_session(
    socket: WebSocket,
    clients: Arc<ConnectionManager>,
    store: Arc<dyn MessageStore>,
    username: String,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (client_tx, mut client_rx) = mpsc::unbounded_channel();

    let connection_id = clients.register(&username, client_tx).await;
    info!(
        "user {} connected ({} connection(s) open)",
        username,
        clients.connection_count().await
    );

    // Outbound pump: registry -> socket.
    let writer = tokio::spawn(async move {
        while let Some(message) = client_rx.recv().await {
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
    });

    // Inbound events are handled on this task, one at a time, so messages
    // from a single sender are persisted and routed in arrival order.
    while let Some(result) = ws_rx.next().await {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                warn!("websocket error for {}: {}", username, e);
                break;
            }
        };
        let text = match message.to_str() {
            Ok(text) => text,
            Err(_) => continue, // ping/pong/close frames
        };
        if let Err(e) = handle_send_event(text, &username, &clients, store.as_ref()).await {
            warn!("dropping event from {}: {}", username, e);
        }
    }

    clients.unregister(&username, connection_id).await;
    writer.abort();
    info!("user {} disconnected", username);
}

async fn handle_send_event(
    text: &str,
    authenticated_user: &str,
    clients: &ConnectionManager,
    store: &dyn MessageStore,
) -> Result<(), ApiError> {
    let event: SendEvent = serde_json::from_str(text)
        .map_err(|e| ApiError::InvalidRequest(format!("malformed message event: {}", e)))?;
    event.validate()?;

    if event.sender != authenticated_user {
        return Err(ApiError::Unauthorized(format!(
            "sender {} does not match authenticated user {}",
            event.sender, authenticated_user
        )));
    }

    // Durability first: a message that failed to persist is never delivered.
    let message = Message::new(&event.sender, &event.receiver, &event.message);
    store.insert(&message).await?;

    let delivered = clients
        .send_to(&event.receiver, &DeliveryEvent::from_message(&message))
        .await;
    debug!(
        "message {} -> {} pushed to {} connection(s)",
        message.sender, message.receiver, delivered
    );
    Ok(())
}

/// `GET /chat/chat-history/{user1}/{user2}?limit=&skip=`
///
/// The caller must be one of the two participants. Results are most recent
/// first; the same query returns the same order until new messages arrive.
pub async fn chat_history_handler(
    user1: String,
    user2: String,
    query: HashMap<String, String>,
    authorization: String,
    store: Arc<dyn MessageStore>,
) -> Result<impl Reply, Rejection> {
    let claims = validate_jwt(&authorization).map_err(error::reject)?;

    let key = ConversationKey::new(&user1, &user2).map_err(error::reject)?;
    if !key.contains(&claims.sub) {
        return Err(error::reject(ApiError::Unauthorized(
            "not a participant of this conversation".into(),
        )));
    }

    let page = Page::from_query(&query).map_err(error::reject)?;

    let history = timeout(HISTORY_TIMEOUT, store.history(&key, page))
        .await
        .map_err(|_| {
            error::reject(ApiError::StoreUnavailable("history query timed out".into()))
        })?
        .map_err(error::reject)?;

    Ok(warp::reply::json(&HistoryResponse {
        message: "Chat history fetched successfully".to_string(),
        chat_history: history,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::generate_jwt;
    use crate::db::message::MemoryMessageStore;
    use async_trait::async_trait;

    fn send_event(sender: &str, receiver: &str, text: &str) -> String {
        serde_json::json!({ "receiver": receiver, "message": text, "sender": sender }).to_string()
    }

    /// Store whose inserts always fail.
    struct FailingStore;

    #[async_trait]
    impl MessageStore for FailingStore {
        async fn insert(&self, _message: &Message) -> Result<(), ApiError> {
            Err(ApiError::StoreUnavailable("connection reset".into()))
        }

        async fn history(
            &self,
            _key: &ConversationKey,
            _page: Page,
        ) -> Result<Vec<Message>, ApiError> {
            Ok(Vec::new())
        }
    }

    /// Store whose reads never finish within the query bound.
    struct SlowStore;

    #[async_trait]
    impl MessageStore for SlowStore {
        async fn insert(&self, _message: &Message) -> Result<(), ApiError> {
            Ok(())
        }

        async fn history(
            &self,
            _key: &ConversationKey,
            _page: Page,
        ) -> Result<Vec<Message>, ApiError> {
            tokio::time::sleep(HISTORY_TIMEOUT * 10).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn routes_only_to_the_addressed_receiver() {
        let clients = ConnectionManager::new();
        let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
        let (carol_tx, mut carol_rx) = mpsc::unbounded_channel();
        clients.register("bob", bob_tx).await;
        clients.register("carol", carol_tx).await;

        let event = DeliveryEvent::from_message(&Message::new("alice", "bob", "hi"));
        assert_eq!(clients.send_to("bob", &event).await, 1);

        let pushed = bob_rx.recv().await.unwrap();
        assert!(pushed.to_str().unwrap().contains("\"hi\""));
        assert!(carol_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_removes_exactly_one_connection() {
        let clients = ConnectionManager::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let id1 = clients.register("bob", tx1).await;
        clients.register("bob", tx2).await;
        assert_eq!(clients.connection_count().await, 2);

        clients.unregister("bob", id1).await;
        assert_eq!(clients.connection_count().await, 1);

        let event = DeliveryEvent::from_message(&Message::new("alice", "bob", "hi"));
        assert_eq!(clients.send_to("bob", &event).await, 1);
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_connections_are_pruned_on_send() {
        let clients = ConnectionManager::new();
        let (tx, rx) = mpsc::unbounded_channel();
        clients.register("bob", tx).await;
        drop(rx);

        let event = DeliveryEvent::from_message(&Message::new("alice", "bob", "hi"));
        assert_eq!(clients.send_to("bob", &event).await, 0);
        assert_eq!(clients.connection_count().await, 0);
    }

    #[tokio::test]
    async fn send_persists_even_when_receiver_is_offline() {
        let clients = ConnectionManager::new();
        let store = MemoryMessageStore::new();

        handle_send_event(&send_event("alice", "bob", "hi"), "alice", &clients, &store)
            .await
            .unwrap();

        let key = ConversationKey::new("alice", "bob").unwrap();
        let history = store.history(&key, Page::default()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "hi");
    }

    #[tokio::test]
    async fn rapid_sends_keep_their_order_in_history() {
        let clients = ConnectionManager::new();
        let store = MemoryMessageStore::new();

        for text in ["one", "two"] {
            handle_send_event(&send_event("alice", "bob", text), "alice", &clients, &store)
                .await
                .unwrap();
        }

        let key = ConversationKey::new("alice", "bob").unwrap();
        let history = store.history(&key, Page::default()).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["two", "one"]);
    }

    #[tokio::test]
    async fn spoofed_sender_is_rejected_and_not_persisted() {
        let clients = ConnectionManager::new();
        let store = MemoryMessageStore::new();

        let err = handle_send_event(&send_event("mallory", "bob", "hi"), "alice", &clients, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let key = ConversationKey::new("mallory", "bob").unwrap();
        assert!(store.history(&key, Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_insert_suppresses_delivery() {
        let clients = ConnectionManager::new();
        let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
        clients.register("bob", bob_tx).await;

        let err = handle_send_event(
            &send_event("alice", "bob", "hi"),
            "alice",
            &clients,
            &FailingStore,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::StoreUnavailable(_)));

        // Nothing reached bob: an unpersisted message is never delivered.
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn history_query_timeout_surfaces_as_store_unavailable() {
        std::env::set_var("JWT_SECRET", "test-secret");
        let token = generate_jwt("alice").unwrap();

        let rejection = chat_history_handler(
            "alice".into(),
            "bob".into(),
            HashMap::new(),
            token,
            Arc::new(SlowStore),
        )
        .await
        .map(|_| ())
        .unwrap_err();

        let err = rejection.find::<ApiError>().expect("api error rejection");
        assert!(matches!(err, ApiError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn malformed_and_empty_events_are_rejected() {
        let clients = ConnectionManager::new();
        let store = MemoryMessageStore::new();

        let err = handle_send_event("not json", "alice", &clients, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));

        let err = handle_send_event(&send_event("alice", "bob", "  "), "alice", &clients, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }
}
