//! Extension allow-lists and filename handling.
//!
//! Generated names follow `<YYYYmmdd_HHMMSS>_<8 hex>.<ext>`. Names coming
//! back from clients (delete, serve, download) are validated here before
//! they are joined onto the storage root.

use std::collections::BTreeSet;

use chrono::{DateTime, Local};
use rand::Rng;

use crate::error::{Error, Result};

/// Extensions accepted when no explicit list is configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Case-insensitive set of allowed file extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedExtensions(BTreeSet<String>);

impl AllowedExtensions {
    /// Build a set, normalising entries to lowercase without a leading dot.
    /// Blank entries are dropped.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self(set)
    }

    /// Whether `ext` (any case, no dot) is allowed.
    pub fn contains(&self, ext: &str) -> bool {
        self.0.contains(&ext.to_ascii_lowercase())
    }

    /// Whether the extension of `filename` is allowed.
    pub fn is_allowed(&self, filename: &str) -> bool {
        extension_of(filename).is_some_and(|ext| self.0.contains(&ext))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for AllowedExtensions {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }
}

/// Lowercased extension after the last dot, if any.
pub fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Reduce a client-supplied name to its final path component.
///
/// Browsers on Windows may send full paths, so both `/` and `\` separate.
pub fn base_name(original: &str) -> &str {
    original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original)
        .trim()
}

/// Generate a fresh storage name for the given (already lowercased) extension.
pub fn generate_filename(ext: &str, now: DateTime<Local>) -> String {
    format!("{}_{}.{}", now.format("%Y%m%d_%H%M%S"), random_suffix(), ext)
}

fn random_suffix() -> String {
    let bytes: [u8; 4] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Validate a stored filename received from a client.
///
/// Rejects anything that could resolve outside the storage root and
/// anything the listing would not show.
pub fn validate_stored_name(name: &str, allowed: &AllowedExtensions) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(Error::InvalidFilename(name.to_string()));
    }
    if !allowed.is_allowed(name) {
        return Err(Error::InvalidFilename(name.to_string()));
    }
    Ok(())
}
