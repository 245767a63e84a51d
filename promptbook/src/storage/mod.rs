//! Key-value storage used for caching.
//!
//! Storages are keyed by arbitrary strings and hold serializable values.
//! Writes are last-write-wins; there is no cross-process locking.

mod file_cache;
mod key_path;
mod memory;

pub use file_cache::{is_ignorable_write_error, FileCacheOptions, FileCacheStorage};
pub use key_path::{key_to_relative_path, normalize_key, MAX_FILENAME_PREFIX_LENGTH};
pub use memory::MemoryStorage;

use crate::errors::PromptbookError;
use async_trait::async_trait;

/// A string-keyed store of `T` values.
#[async_trait]
pub trait PromptbookStorage<T>: Send + Sync
where
    T: Send + Sync,
{
    /// Returns the stored value, if any.
    async fn get_item(&self, key: &str) -> Result<Option<T>, PromptbookError>;

    /// Stores a value, replacing any previous one.
    async fn set_item(&self, key: &str, value: T) -> Result<(), PromptbookError>;

    /// Removes a value. Removing a missing key is not an error.
    async fn remove_item(&self, key: &str) -> Result<(), PromptbookError>;
}
