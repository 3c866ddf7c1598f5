//! The filesystem-backed image store.
//!
//! The storage directory is the only record store: a file whose extension
//! is allowed is a listable image, and its filename is its identity.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::digest;
use crate::error::{Error, Result};
use crate::naming::{self, AllowedExtensions};

/// Default upload size limit (5 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// How many generated names to try before giving up on a collision streak.
const MAX_NAME_ATTEMPTS: usize = 8;

/// A listed image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredImage {
    pub filename: String,
    /// Path under which the image is served, e.g. `/images/<filename>`.
    pub url: String,
    /// Size in bytes.
    pub size: u64,
    /// Creation time, or modification time where the platform lacks it.
    pub created: DateTime<Local>,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadOutcome {
    pub filename: String,
    pub url: String,
    /// Lowercase hex MD5 of the stored bytes.
    pub hash: String,
    pub size: u64,
}

/// Serving path for a stored filename.
pub fn image_url(filename: &str) -> String {
    format!("/images/{filename}")
}

/// Filesystem manager for uploaded images.
#[derive(Debug)]
pub struct ImageStore {
    root: PathBuf,
    allowed: AllowedExtensions,
    max_file_size: u64,
}

impl ImageStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(
        root: impl Into<PathBuf>,
        allowed: AllowedExtensions,
        max_file_size: u64,
    ) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)?;
            tracing::info!("Created upload directory {}", root.display());
        }
        Ok(Self {
            root,
            allowed,
            max_file_size,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn allowed_extensions(&self) -> &AllowedExtensions {
        &self.allowed
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// List all stored images, newest first.
    pub fn list(&self) -> Result<Vec<StoredImage>> {
        let mut images = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            if !self.allowed.is_allowed(&filename) {
                continue;
            }

            let metadata = entry.metadata()?;
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);

            images.push(StoredImage {
                url: image_url(&filename),
                filename,
                size: metadata.len(),
                created: DateTime::<Local>::from(created),
            });
        }

        images.sort_by(|a, b| {
            b.created
                .cmp(&a.created)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        Ok(images)
    }

    /// Store `data` under a freshly generated name derived from `original_name`.
    ///
    /// Identical content uploaded twice is stored twice.
    pub fn upload(&self, data: &[u8], original_name: &str) -> Result<UploadOutcome> {
        let name = naming::base_name(original_name);
        if name.is_empty() || data.is_empty() {
            return Err(Error::MissingFile);
        }

        let ext = naming::extension_of(name)
            .ok_or_else(|| Error::UnsupportedExtension(name.to_string()))?;
        if !self.allowed.contains(&ext) {
            tracing::debug!("Rejected upload {name:?}: extension {ext:?} not allowed");
            return Err(Error::UnsupportedExtension(ext));
        }

        let size = data.len() as u64;
        if size > self.max_file_size {
            tracing::debug!(
                "Rejected upload {name:?}: {size} bytes exceeds limit {}",
                self.max_file_size
            );
            return Err(Error::FileTooLarge {
                limit: self.max_file_size,
            });
        }

        let (filename, mut file) = self.create_unique(&ext)?;
        let path = self.root.join(&filename);

        let written = file.write_all(data).and_then(|()| file.sync_all());
        drop(file);
        if let Err(source) = written {
            discard_partial(&path);
            return Err(Error::WriteFailure { filename, source });
        }

        let hash = match digest::digest_file(&path) {
            Ok(hash) => hash,
            Err(source) => {
                discard_partial(&path);
                return Err(Error::WriteFailure { filename, source });
            }
        };

        tracing::info!("Stored {filename} ({size} bytes, md5 {hash})");

        Ok(UploadOutcome {
            url: image_url(&filename),
            filename,
            hash,
            size,
        })
    }

    /// Delete a stored image.
    pub fn delete(&self, filename: &str) -> Result<()> {
        naming::validate_stored_name(filename, &self.allowed)?;
        let path = self.root.join(filename);

        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Deleted {filename}");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::NotFound(filename.to_string()))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Absolute path of an existing stored image.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        naming::validate_stored_name(filename, &self.allowed)?;
        let path = self.root.join(filename);
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::NotFound(filename.to_string()))
        }
    }

    /// Recompute the digest of a stored image.
    pub fn digest(&self, filename: &str) -> Result<String> {
        let path = self.resolve(filename)?;
        Ok(digest::digest_file(&path)?)
    }

    /// Create a new empty file under a generated name that did not exist before.
    fn create_unique(&self, ext: &str) -> Result<(String, File)> {
        self.create_unique_with(|| naming::generate_filename(ext, Local::now()))
    }

    fn create_unique_with(&self, mut next_name: impl FnMut() -> String) -> Result<(String, File)> {
        let mut last_err = None;

        for _ in 0..MAX_NAME_ATTEMPTS {
            let filename = next_name();
            let path = self.root.join(&filename);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((filename, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::debug!("Generated name {filename} already taken, retrying");
                    last_err = Some((filename, e));
                }
                Err(source) => return Err(Error::WriteFailure { filename, source }),
            }
        }

        let (filename, source) = last_err.unwrap_or_else(|| {
            (
                String::new(),
                io::Error::new(io::ErrorKind::AlreadyExists, "no unique filename available"),
            )
        });
        Err(Error::WriteFailure { filename, source })
    }
}

fn discard_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!("Failed to remove partial upload {}: {e}", path.display());
    }
}
