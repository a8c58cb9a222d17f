//! Domain model for Muse sessions: per-track history, reference state,
//! backend and sandbox seams, and configuration types.

pub mod artifact;
pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod notice;
pub mod response;
pub mod sandbox;
pub mod store;
pub mod track;

// Re-export common types
pub use error::{ErrorCategory, MuseError, Result};
pub use track::Track;
