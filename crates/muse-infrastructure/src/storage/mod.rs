//! Storage layer for configuration files.

mod atomic_toml;
pub mod secret_storage;

pub use atomic_toml::{AtomicTomlError, AtomicTomlFile};
pub use secret_storage::{SecretStorage, SecretStorageError};
