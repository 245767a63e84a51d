//! In-memory storage.

use super::PromptbookStorage;
use crate::errors::PromptbookError;
use async_trait::async_trait;
use dashmap::DashMap;

/// Storage that lives as long as the value itself.
#[derive(Debug)]
pub struct MemoryStorage<T> {
    entries: DashMap<String, T>,
}

impl<T> Default for MemoryStorage<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T> MemoryStorage<T> {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes everything.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl<T> PromptbookStorage<T> for MemoryStorage<T>
where
    T: Clone + Send + Sync,
{
    async fn get_item(&self, key: &str) -> Result<Option<T>, PromptbookError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set_item(&self, key: &str, value: T) -> Result<(), PromptbookError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), PromptbookError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("k").await.unwrap(), None);

        storage.set_item("k", 1).await.unwrap();
        storage.set_item("k", 2).await.unwrap();
        assert_eq!(storage.get_item("k").await.unwrap(), Some(2));
        assert_eq!(storage.len(), 1);

        storage.remove_item("k").await.unwrap();
        storage.remove_item("k").await.unwrap();
        assert!(storage.is_empty());
    }
}
