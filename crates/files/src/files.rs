//! Content-addressed file storage service implementation
//!
//! [`FilesService`] owns a single root directory and stores every uploaded file under the
//! SHA-256 of its content. The relative path it returns is what the record store keeps as
//! `path_on_disk`; the service resolves it back to an absolute path for downloads.
//!
//! # Write ordering
//!
//! `save` writes into a uniquely named temporary file next to the destination, syncs it and
//! only then renames it into place. A crash before the rename leaves a stray temporary file;
//! a crash after it leaves a complete file nobody references yet. Neither produces a record
//! that points at missing bytes.

use crate::FilesError;
use chrono::{DateTime, Utc};
use medhelp_types::NonEmptyText;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Name of the directory that holds SHA-256 addressed blobs.
pub const HASH_DIR_NAME: &str = "sha256";

const MAX_EXTENSION_LEN: usize = 10;
const FALLBACK_FILENAME: &str = "upload";

/// Metadata for a stored file
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FileMetadata {
    /// Hexadecimal SHA-256 digest of the file content
    pub hash: String,

    /// Path relative to the files root where the bytes live
    pub relative_path: NonEmptyText,

    /// Size of the file in bytes
    pub size_bytes: u64,

    /// Detected media type (MIME type), if available
    ///
    /// Best-effort detection from magic bytes; `None` for plain text and unknown formats.
    pub media_type: Option<NonEmptyText>,

    /// Filename as supplied by the uploader, stripped of any directory components
    pub original_filename: NonEmptyText,

    /// UTC timestamp when the file was stored
    pub stored_at: DateTime<Utc>,
}

/// Service for storing and reading uploaded files
#[derive(Debug, Clone)]
pub struct FilesService {
    root_directory: PathBuf,
}

impl FilesService {
    /// Creates a new `FilesService` rooted at `root_directory`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidRootDirectory` if the root does not exist, is not a
    /// directory, or cannot be canonicalised.
    pub fn new(root_directory: &Path) -> Result<Self, FilesError> {
        if !root_directory.exists() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                root_directory.display()
            )));
        }

        if !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self { root_directory })
    }

    /// Stores `bytes` and returns their metadata.
    ///
    /// Identical content is stored once: if a blob with the same hash and extension already
    /// exists, nothing is written and the existing path is returned.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::Io` if the shard directory cannot be created or the bytes cannot
    /// be written, synced or moved into place.
    pub fn save(&self, original_filename: &str, bytes: &[u8]) -> Result<FileMetadata, FilesError> {
        let hash = hex::encode(Sha256::digest(bytes));
        let original_filename = sanitise_filename(original_filename)?;
        let extension = safe_extension(original_filename.as_str());

        let relative_path = compute_relative_path(&hash, extension.as_deref())?;
        let storage_path = self.root_directory.join(relative_path.as_str());

        if !storage_path.is_file() {
            let parent = storage_path.parent().ok_or_else(|| {
                FilesError::InvalidPath(format!("no parent for {}", storage_path.display()))
            })?;
            fs::create_dir_all(parent).map_err(|e| {
                FilesError::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create storage directory {}: {}",
                        parent.display(),
                        e
                    ),
                ))
            })?;

            let temp_path = parent.join(format!(".tmp-{}", uuid::Uuid::new_v4().simple()));
            if let Err(e) = write_synced(&temp_path, bytes)
                .and_then(|()| fs::rename(&temp_path, &storage_path))
            {
                let _ = fs::remove_file(&temp_path);
                return Err(FilesError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to write file to {}: {}", storage_path.display(), e),
                )));
            }
        }

        let media_type =
            infer::get(bytes).and_then(|kind| NonEmptyText::new(kind.mime_type()).ok());

        Ok(FileMetadata {
            hash,
            relative_path,
            size_bytes: bytes.len() as u64,
            media_type,
            original_filename,
            stored_at: Utc::now(),
        })
    }

    /// Reads a stored file back by its relative path.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidPath` for paths escaping the root, `FilesError::NotFound`
    /// if nothing is stored there and `FilesError::Io` if the read fails.
    pub fn read(&self, relative_path: &str) -> Result<Vec<u8>, FilesError> {
        let storage_path = self.resolve(relative_path)?;

        if !storage_path.is_file() {
            return Err(FilesError::NotFound(relative_path.to_owned()));
        }

        fs::read(&storage_path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read file from {}: {}", storage_path.display(), e),
            ))
        })
    }

    /// Resolves a relative path produced by [`FilesService::save`] to an absolute path.
    ///
    /// Only plain path components under the hash directory are accepted.
    pub fn resolve(&self, relative_path: &str) -> Result<PathBuf, FilesError> {
        let path = Path::new(relative_path);

        let mut components = path.components();
        let under_hash_dir = matches!(
            components.next(),
            Some(Component::Normal(first)) if first == HASH_DIR_NAME
        );
        let all_normal = path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

        if !under_hash_dir || !all_normal {
            return Err(FilesError::InvalidPath(relative_path.to_owned()));
        }

        Ok(self.root_directory.join(path))
    }

    /// Returns the canonicalised root directory.
    #[must_use]
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Relative path in the format `sha256/<shard1>/<shard2>/<hash>[.<ext>]`.
fn compute_relative_path(
    hash_hex: &str,
    extension: Option<&str>,
) -> Result<NonEmptyText, FilesError> {
    let shard1 = &hash_hex[0..2];
    let shard2 = &hash_hex[2..4];
    let leaf = match extension {
        Some(ext) => format!("{hash_hex}.{ext}"),
        None => hash_hex.to_owned(),
    };
    NonEmptyText::new(format!("{HASH_DIR_NAME}/{shard1}/{shard2}/{leaf}"))
        .map_err(|e| FilesError::InvalidPath(e.to_string()))
}

fn sanitise_filename(original: &str) -> Result<NonEmptyText, FilesError> {
    // Browsers on Windows may send the full client path.
    let leaf = original
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or(FALLBACK_FILENAME);

    NonEmptyText::new(leaf).map_err(|e| FilesError::InvalidPath(e.to_string()))
}

fn safe_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?;
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
