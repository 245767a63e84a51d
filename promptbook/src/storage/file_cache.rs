//! Storage backed by JSON files on disk.

use super::key_path::key_to_relative_path;
use super::PromptbookStorage;
use crate::errors::PromptbookError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Options of a [`FileCacheStorage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCacheOptions {
    /// Directory holding the cache files.
    pub root_folder_path: PathBuf,
}

impl FileCacheOptions {
    /// Creates options for a cache rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root_folder_path: root.into(),
        }
    }
}

/// Returns true for write errors that leave the cache merely colder.
///
/// A cache on a read-only or foreign-owned filesystem still works; it just
/// never remembers anything.
#[must_use]
pub fn is_ignorable_write_error(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem
    )
}

/// Maps the outcome of a cache write to the result of `set_item`.
fn settle_write(path: &Path, outcome: io::Result<()>) -> Result<(), PromptbookError> {
    match outcome {
        Ok(()) => {
            debug!(path = %path.display(), "Cache item written");
            Ok(())
        }
        Err(e) if is_ignorable_write_error(&e) => {
            warn!(path = %path.display(), error = %e, "Cache is not writable, item not stored");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Stores each value as a pretty-printed JSON file under a root folder.
///
/// Values are written to a temporary file and renamed into place, so readers
/// never see a partial file.
#[derive(Debug)]
pub struct FileCacheStorage<T> {
    options: FileCacheOptions,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FileCacheStorage<T> {
    /// Creates a storage. Nothing is touched on disk until the first write.
    #[must_use]
    pub fn new(options: FileCacheOptions) -> Self {
        Self {
            options,
            _marker: PhantomData,
        }
    }

    /// The root folder.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.options.root_folder_path
    }

    /// Absolute path of the file holding `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.options.root_folder_path.join(key_to_relative_path(key))
    }

    async fn write_file(path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temporary = path.with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&temporary, contents).await?;
        if let Err(e) = tokio::fs::rename(&temporary, path).await {
            let _ = tokio::fs::remove_file(&temporary).await;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl<T> PromptbookStorage<T> for FileCacheStorage<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn get_item(&self, key: &str) -> Result<Option<T>, PromptbookError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_item(&self, key: &str, value: T) -> Result<(), PromptbookError> {
        let path = self.path_for(key);
        let contents = serde_json::to_string_pretty(&value)?;

        settle_write(&path, Self::write_file(&path, &contents).await)
    }

    async fn remove_item(&self, key: &str) -> Result<(), PromptbookError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) if is_ignorable_write_error(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
