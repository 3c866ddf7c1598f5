//! Error types for image store operations.
//!
//! Every variant is recoverable at the request boundary; callers surface
//! the `Display` text to the user and pick a status via [`Error::http_status`].

use std::io;

/// Failure modes of the image store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No file name or no content was supplied.
    #[error("No file provided")]
    MissingFile,

    /// The file extension is not in the allow-list.
    #[error("Unsupported file type: {0}")]
    UnsupportedExtension(String),

    /// The upload exceeds the configured size limit.
    #[error("File exceeds the maximum size of {limit} bytes")]
    FileTooLarge {
        /// Configured limit in bytes.
        limit: u64,
    },

    /// A stored filename was rejected before touching the filesystem.
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    /// Writing a new image to disk failed.
    #[error("Upload failed for {filename}: {source}")]
    WriteFailure {
        /// The generated filename that was being written.
        filename: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// No stored image has the given filename.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Any other filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Map this error to the HTTP status an API handler should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::MissingFile => 400,
            Error::UnsupportedExtension(_) => 400,
            Error::FileTooLarge { .. } => 413,
            Error::InvalidFilename(_) => 400,
            Error::WriteFailure { .. } => 500,
            Error::NotFound(_) => 404,
            Error::Io(_) => 500,
        }
    }

    /// Whether the error was caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }
}

/// Result alias using the store [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
