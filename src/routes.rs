//! Route assembly for the API facade.
//!
//! Kept separate from the binary so integration tests can drive the same
//! composed filters.

use crate::auth::validate_jwt;
use crate::db::message::MessageStore;
use crate::error::{self, ApiError};
use crate::handlers::auth::{login_handler, register_handler};
use crate::handlers::chat::{chat_history_handler, chat_session, ConnectionManager};
use mongodb::Database;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

fn with<T: Clone + Send>(value: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone {
    warp::any().map(move || value.clone())
}

/// `POST /register` and `POST /login`.
pub fn auth_routes(
    db: Arc<Database>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let register = warp::path!("register")
        .and(warp::post())
        .and(warp::body::json())
        .and(with(db.clone()))
        .and_then(register_handler);

    let login = warp::path!("login")
        .and(warp::post())
        .and(warp::body::json())
        .and(with(db))
        .and_then(login_handler);

    register.or(login)
}

/// The chat facade: `GET /chat?token=` (WebSocket upgrade) and
/// `GET /chat/chat-history/{user1}/{user2}?limit=&skip=`.
pub fn chat_routes(
    store: Arc<dyn MessageStore>,
    clients: Arc<ConnectionManager>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    // The token is checked before the upgrade; an unauthenticated upgrade
    // attempt never reaches the session handler.
    let channel = warp::path!("chat")
        .and(warp::ws())
        .and(warp::query::<HashMap<String, String>>())
        .and(with(clients))
        .and(with(store.clone()))
        .and_then(
            |ws: warp::ws::Ws,
             query: HashMap<String, String>,
             clients: Arc<ConnectionManager>,
             store: Arc<dyn MessageStore>| async move {
                let token = query
                    .get("token")
                    .ok_or_else(|| error::reject(ApiError::Unauthorized("missing token".into())))?;
                let claims = validate_jwt(token).map_err(error::reject)?;
                Ok::<_, Rejection>(ws.on_upgrade(move |socket| {
                    chat_session(socket, clients, store, claims.sub)
                }))
            },
        );

    let history = warp::path!("chat" / "chat-history" / String / String)
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(warp::header::<String>("authorization"))
        .and(with(store))
        .and_then(chat_history_handler);

    channel.or(history)
}

/// Everything the server exposes, before rejection recovery and CORS are
/// layered on by the binary.
pub fn api(
    db: Arc<Database>,
    store: Arc<dyn MessageStore>,
    clients: Arc<ConnectionManager>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    auth_routes(db).or(chat_routes(store, clients))
}
