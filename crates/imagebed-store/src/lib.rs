//! imagebed-store: filesystem-backed storage for uploaded images.
//!
//! This crate owns everything imagebed does on disk:
//!
//! - **Naming**: collision-resistant `<timestamp>_<hex>.<ext>` filenames
//! - **Validation**: case-insensitive extension allow-list, traversal-safe names
//! - **Digests**: MD5 over stored bytes, reported but never used for dedup
//! - **Listing and deletion** over the storage directory
//!
//! # Examples
//!
//! ```
//! use imagebed_store::{AllowedExtensions, ImageStore, DEFAULT_MAX_FILE_SIZE};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = ImageStore::open(dir.path(), AllowedExtensions::default(), DEFAULT_MAX_FILE_SIZE)
//!     .unwrap();
//!
//! let outcome = store.upload(b"GIF89a", "hello.gif").unwrap();
//! assert_eq!(store.list().unwrap()[0].filename, outcome.filename);
//! ```

pub mod digest;
pub mod error;
pub mod naming;
mod store;

pub use error::{Error, Result};
pub use naming::{AllowedExtensions, DEFAULT_EXTENSIONS};
pub use store::{image_url, ImageStore, StoredImage, UploadOutcome, DEFAULT_MAX_FILE_SIZE};
