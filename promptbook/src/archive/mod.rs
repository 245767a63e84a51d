//! Pipeline archives (`.bookc`).
//!
//! An archive is a zip file with a single entry, `index.book.json`, holding a
//! JSON array of pipelines. Every pipeline is validated on the way in and on
//! the way out.

use crate::errors::{ParseError, PromptbookError, UnexpectedError};
use crate::pipeline::{pipeline_from_json_value, PipelineJson};
use crate::validation::validate_pipeline;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// File extension of pipeline archives.
pub const ARCHIVE_EXTENSION: &str = ".bookc";

/// Name of the only entry of an archive.
pub const ARCHIVE_INDEX_ENTRY: &str = "index.book.json";

fn ensure_archive_path(path: &Path) -> Result<(), PromptbookError> {
    let is_archive = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(ARCHIVE_EXTENSION));

    if is_archive {
        Ok(())
    } else {
        Err(UnexpectedError::new(format!(
            "Archive path \"{}\" must end with {ARCHIVE_EXTENSION}",
            path.display()
        ))
        .into())
    }
}

/// Encodes pipelines into archive bytes.
///
/// # Errors
///
/// Returns the validation error of the first invalid pipeline, or an error
/// from the zip encoder.
pub fn encode_archive(pipelines: &[PipelineJson]) -> Result<Vec<u8>, PromptbookError> {
    for pipeline in pipelines {
        validate_pipeline(pipeline)?;
    }

    let index = serde_json::to_string_pretty(pipelines)?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(ARCHIVE_INDEX_ENTRY, options)?;
    writer.write_all(index.as_bytes())?;

    Ok(writer.finish()?.into_inner())
}

/// Decodes archive bytes into pipelines.
///
/// # Errors
///
/// Returns a [`ParseError`] if the bytes are not an archive with a single
/// `index.book.json` entry holding an array of pipelines, and the validation
/// error of the first invalid pipeline.
pub fn decode_archive(bytes: &[u8]) -> Result<Vec<PipelineJson>, PromptbookError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    if archive.len() != 1 {
        return Err(ParseError::new(format!(
            "Archive must contain exactly one entry ({ARCHIVE_INDEX_ENTRY}) but it contains {}",
            archive.len()
        ))
        .into());
    }

    let mut index = String::new();
    match archive.by_name(ARCHIVE_INDEX_ENTRY) {
        Ok(mut entry) => {
            entry.read_to_string(&mut index)?;
        }
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ParseError::new(format!("Archive does not contain {ARCHIVE_INDEX_ENTRY}")).into());
        }
        Err(e) => return Err(e.into()),
    }

    let value: serde_json::Value = serde_json::from_str(&index)?;
    let serde_json::Value::Array(items) = value else {
        return Err(ParseError::new(format!("{ARCHIVE_INDEX_ENTRY} must contain an array of pipelines")).into());
    };

    items
        .into_iter()
        .map(|item| {
            let pipeline = pipeline_from_json_value(item)?;
            validate_pipeline(&pipeline)?;
            Ok(pipeline)
        })
        .collect()
}

/// Writes pipelines to an archive file.
///
/// # Errors
///
/// Returns an [`UnexpectedError`] if `path` does not end with `.bookc`, and
/// otherwise the errors of [`encode_archive`] or of the filesystem.
pub async fn save_archive(path: impl AsRef<Path>, pipelines: &[PipelineJson]) -> Result<(), PromptbookError> {
    let path = path.as_ref();
    ensure_archive_path(path)?;

    let bytes = encode_archive(pipelines)?;
    tokio::fs::write(path, &bytes).await?;

    debug!(path = %path.display(), pipelines = pipelines.len(), "Archive saved");
    Ok(())
}

/// Reads pipelines from an archive file.
///
/// # Errors
///
/// Returns an [`UnexpectedError`] if `path` does not end with `.bookc`, and
/// otherwise the errors of [`decode_archive`] or of the filesystem.
pub async fn load_archive(path: impl AsRef<Path>) -> Result<Vec<PipelineJson>, PromptbookError> {
    let path = path.as_ref();
    ensure_archive_path(path)?;

    let bytes = tokio::fs::read(path).await?;
    let pipelines = decode_archive(&bytes)?;

    debug!(path = %path.display(), pipelines = pipelines.len(), "Archive loaded");
    Ok(pipelines)
}
