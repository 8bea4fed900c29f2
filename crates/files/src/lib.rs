//! MedHelp File Storage
//!
//! Byte storage for analysis result files uploaded by registrars and patients.
//!
//! ## Design Principles
//!
//! - Bytes and records are separated: this crate only stores bytes, the record store keeps
//!   the reference from an analysis to a stored file
//! - Files are content-addressed and immutable; uploading identical content twice yields the
//!   same stored file
//! - A file is fully written and synced before its path is handed back, so a caller never
//!   records a reference to bytes that are not on disk
//!
//! ## Storage Layout
//!
//! ```text
//! <files_root>/
//! └── sha256/
//!     └── ab/
//!         └── cd/
//!             └── abcd3f9e….pdf
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use medhelp_files::FilesService;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = FilesService::new(Path::new("medhelp_data/files"))?;
//! let metadata = service.save("blood-panel.pdf", b"%PDF-1.7 ...")?;
//! let bytes = service.read(metadata.relative_path.as_str())?;
//! # Ok(())
//! # }
//! ```

mod files;

pub use files::{FileMetadata, FilesService, HASH_DIR_NAME};

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Path validation failed (absolute path or directory traversal)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// No stored file at the requested path
    #[error("File not found: {0}")]
    NotFound(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
