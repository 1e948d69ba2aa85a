//! Rota: rotating assignment scheduler with an HTTP API.
//!
//! A small group takes turns at something (the original use case: a
//! group of colleagues buying weekly treats). The service keeps an
//! ordered roster of (user, date) pairs, assigns dates at a fixed
//! interval from a configured start weekday, and exposes CRUD-style
//! endpoints plus a Dialogflow fulfillment webhook.
//!
//! # Architecture
//!
//! - [`roster`] — the pure core: ordered entries and their operations
//! - [`schedule`] / [`period`] — date arithmetic and lookup windows
//! - [`store`] — read-whole/write-whole blob backends (local file, GCS)
//!   with version tokens for conflict detection
//! - [`server`] — axum routes wiring load → operate → persist

pub mod config;
pub mod dialogflow;
pub mod error;
pub mod period;
pub mod roster;
pub mod schedule;
pub mod server;
pub mod store;

pub use config::{Config, StorageConfig};
pub use error::{Result, RotaError};
pub use roster::{DelayTarget, Entry, Roster};
pub use schedule::Schedule;
pub use server::RotaServer;
