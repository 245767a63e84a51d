//! Collections loaded from a directory of pipeline files.
//!
//! Recognized files, loaded in this order:
//! 1. `*.bookc` archives
//! 2. `*.book.json` compiled pipelines
//! 3. `*.book.md` and `*.book` sources, compiled with the compiler from
//!    [`ExecutionTools`]
//!
//! Within a kind files are loaded in path order, so a compiled pipeline wins
//! over the identical source it was compiled from.

use super::{LazyPipelineCollection, SimplePipelineCollection};
use crate::archive::{load_archive, ARCHIVE_EXTENSION};
use crate::errors::{
    EnvironmentMismatchError, NotFoundError, PipelineUrlError, PromptbookError, UnexpectedError,
};
use crate::execution::{ExecutionTools, PipelineCompiler};
use crate::pipeline::{pipeline_from_json_str, PipelineJson};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Options of [`create_collection_from_directory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectoryCollectionOptions {
    /// Log every loaded pipeline at info level.
    pub is_verbose: bool,
    /// Descend into subdirectories.
    pub is_recursive: bool,
    /// Defer loading until the first query.
    pub is_lazy_loaded: bool,
    /// Fail on the first bad file instead of logging and skipping it.
    pub is_crashed_on_error: bool,
    /// Every pipeline URL must live under this URL; pipelines without a URL
    /// get one derived from their file path.
    pub root_url: Option<String>,
}

impl Default for DirectoryCollectionOptions {
    fn default() -> Self {
        Self {
            is_verbose: false,
            is_recursive: true,
            is_lazy_loaded: false,
            is_crashed_on_error: true,
            root_url: None,
        }
    }
}

impl DirectoryCollectionOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets verbose logging.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.is_verbose = verbose;
        self
    }

    /// Sets recursion into subdirectories.
    #[must_use]
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.is_recursive = recursive;
        self
    }

    /// Sets lazy loading.
    #[must_use]
    pub fn with_lazy_loading(mut self, lazy: bool) -> Self {
        self.is_lazy_loaded = lazy;
        self
    }

    /// Sets whether a bad file aborts loading.
    #[must_use]
    pub fn with_crash_on_error(mut self, crash: bool) -> Self {
        self.is_crashed_on_error = crash;
        self
    }

    /// Sets the root URL.
    #[must_use]
    pub fn with_root_url(mut self, root_url: impl Into<String>) -> Self {
        self.root_url = Some(root_url.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SourceKind {
    Archive,
    Compiled,
    Source,
}

fn classify(path: &Path) -> Option<SourceKind> {
    let name = path.file_name()?.to_str()?;
    if name.ends_with(ARCHIVE_EXTENSION) {
        Some(SourceKind::Archive)
    } else if name.ends_with(".book.json") {
        Some(SourceKind::Compiled)
    } else if name.ends_with(".book.md") || name.ends_with(".book") {
        Some(SourceKind::Source)
    } else {
        None
    }
}

/// Builds a collection from the pipeline files under `path`.
///
/// Unless `options.is_lazy_loaded` is set, the directory is loaded before
/// this function returns.
///
/// # Errors
///
/// With eager loading, returns the first loading error (see
/// [`DirectoryCollectionOptions::is_crashed_on_error`]). A missing directory
/// is a [`NotFoundError`].
pub async fn create_collection_from_directory(
    path: impl Into<PathBuf>,
    tools: &ExecutionTools,
    options: DirectoryCollectionOptions,
) -> Result<LazyPipelineCollection, PromptbookError> {
    let root = path.into();
    let compiler = tools.compiler().cloned();
    let is_lazy_loaded = options.is_lazy_loaded;

    let collection = LazyPipelineCollection::from_source(move || {
        load_directory(root.clone(), compiler.clone(), options.clone())
    });

    if !is_lazy_loaded {
        collection.load().await?;
    }
    Ok(collection)
}

async fn load_directory(
    root: PathBuf,
    compiler: Option<Arc<dyn PipelineCompiler>>,
    options: DirectoryCollectionOptions,
) -> Result<Vec<PipelineJson>, PromptbookError> {
    let files = list_pipeline_files(root.clone(), options.is_recursive).await?;
    let mut collection = SimplePipelineCollection::new();

    for (kind, path) in files {
        let source_file = relative_source_file(&root, &path);
        let loaded = load_file(kind, &path, &source_file, compiler.as_deref(), &options, &mut collection).await;

        if let Err(e) = loaded {
            if options.is_crashed_on_error {
                return Err(e);
            }
            error!(file = %source_file, error = %e, "Pipeline file skipped");
        }
    }

    debug!(root = %root.display(), pipelines = collection.len(), "Directory loaded");
    Ok(collection.pipelines().cloned().collect())
}

async fn list_pipeline_files(
    root: PathBuf,
    recursive: bool,
) -> Result<Vec<(SourceKind, PathBuf)>, PromptbookError> {
    tokio::task::spawn_blocking(move || {
        if !root.is_dir() {
            return Err(NotFoundError::new(format!(
                "Directory \"{}\" does not exist or is not readable",
                root.display()
            ))
            .into());
        }

        let mut walker = WalkDir::new(&root).follow_links(true);
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(kind) = classify(entry.path()) {
                files.push((kind, entry.into_path()));
            }
        }

        files.sort();
        Ok(files)
    })
    .await
    .map_err(|e| PromptbookError::from(UnexpectedError::new(format!("Directory listing did not complete: {e}"))))?
}

fn relative_source_file(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("./{}", parts.join("/"))
}

async fn load_file(
    kind: SourceKind,
    path: &Path,
    source_file: &str,
    compiler: Option<&dyn PipelineCompiler>,
    options: &DirectoryCollectionOptions,
    collection: &mut SimplePipelineCollection,
) -> Result<(), PromptbookError> {
    let pipelines = match kind {
        SourceKind::Archive => load_archive(path).await?,
        SourceKind::Compiled => {
            let text = tokio::fs::read_to_string(path).await?;
            vec![pipeline_from_json_str(&text)?]
        }
        SourceKind::Source => {
            let Some(compiler) = compiler else {
                return Err(EnvironmentMismatchError::new(format!(
                    "Can not compile {source_file} because no pipeline compiler is available"
                ))
                .into());
            };
            let text = tokio::fs::read_to_string(path).await?;
            vec![compiler.compile(&text, source_file).await?]
        }
    };

    for mut pipeline in pipelines {
        pipeline.source_file = Some(source_file.to_string());
        let pipeline = apply_root_url(pipeline, source_file, options.root_url.as_deref())?;

        let Some(url) = pipeline.pipeline_url.clone() else {
            warn!(file = %source_file, "Pipeline has no URL and is not added to the collection");
            continue;
        };

        if collection.insert(pipeline)? {
            if options.is_verbose {
                info!(file = %source_file, url = %url, "Pipeline loaded");
            } else {
                debug!(file = %source_file, url = %url, "Pipeline loaded");
            }
        }
    }

    Ok(())
}

fn apply_root_url(
    mut pipeline: PipelineJson,
    source_file: &str,
    root_url: Option<&str>,
) -> Result<PipelineJson, PromptbookError> {
    let Some(root_url) = root_url else {
        return Ok(pipeline);
    };
    let root_url = root_url.trim_end_matches('/');

    match &pipeline.pipeline_url {
        None => {
            let relative = source_file.trim_start_matches("./");
            pipeline.pipeline_url = Some(format!("{root_url}/{relative}"));
        }
        Some(url) if url == root_url || url.starts_with(&format!("{root_url}/")) => {}
        Some(url) => {
            return Err(PipelineUrlError::new(format!(
                "Pipeline with URL \"{url}\" from {source_file} is not a child of the root URL \"{root_url}/\""
            ))
            .into());
        }
    }

    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify() {
        assert_eq!(classify(Path::new("a/lib.bookc")), Some(SourceKind::Archive));
        assert_eq!(classify(Path::new("hello.book.json")), Some(SourceKind::Compiled));
        assert_eq!(classify(Path::new("hello.book.md")), Some(SourceKind::Source));
        assert_eq!(classify(Path::new("hello.book")), Some(SourceKind::Source));
        assert_eq!(classify(Path::new("hello.json")), None);
        assert_eq!(classify(Path::new("README.md")), None);
    }

    #[test]
    fn test_relative_source_file() {
        let root = Path::new("/books");
        assert_eq!(relative_source_file(root, Path::new("/books/a/b.book.json")), "./a/b.book.json");
    }

    #[test]
    fn test_root_url_is_derived() {
        let pipeline = apply_root_url(PipelineJson::new("x"), "./a/b.book.json", Some("https://example.com/books/")).unwrap();
        assert_eq!(pipeline.pipeline_url.as_deref(), Some("https://example.com/books/a/b.book.json"));
    }

    #[test]
    fn test_root_url_is_enforced() {
        let inside = PipelineJson::new("x").with_url("https://example.com/books/a.book.md");
        assert!(apply_root_url(inside, "./a", Some("https://example.com/books")).is_ok());

        let sibling = PipelineJson::new("x").with_url("https://example.com/bookshelf/a.book.md");
        let err = apply_root_url(sibling, "./a", Some("https://example.com/books")).unwrap_err();
        assert_eq!(err.name(), "PipelineUrlError");
    }
}
