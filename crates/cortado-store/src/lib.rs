//! # cortado-store
//!
//! Durable storage for the Cortado matchmaking relay, backed by SQLite.
//!
//! This crate is the source of truth: requests, chats, the per-chat message
//! ledger, and the append-only chat history all live here and survive process
//! restarts. The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model; async callers are expected to put the handle behind their own lock.

pub mod chats;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod requests;
pub mod stats;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
