//! Chat backend for the VibeShare social app.
//!
//! Messages are append-only records in MongoDB; clients read conversation
//! history through a paginated REST endpoint and receive new messages live
//! over a per-client WebSocket. Every message is persisted before it is
//! pushed to a connected receiver, so a receiver that is offline picks the
//! message up from history on its next fetch.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod reconnect;
pub mod routes;
