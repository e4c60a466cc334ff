//! The KV store collaborator: persistently holds the device key pair,
//! the pending-deployment record, and any add-on state.

mod file_backed;
mod keys;
mod kv_client;
mod memory;
mod traits;

pub use file_backed::FileStorage;
pub use keys::StorageKeys;
pub use kv_client::KvClient;
pub use memory::MemoryStorage;
pub use traits::SecureStorage;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
