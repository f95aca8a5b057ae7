//! State Persistence Module
//!
//! Hydrates application state from a durable cache at creation and writes a
//! filtered snapshot back after every mutation.

mod config;
mod store;

pub use config::{PersistConfig, PERSIST_KEY_PREFIX};
pub use store::{PersistedStore, PersistencePlugin};
