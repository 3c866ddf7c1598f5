//! Content digests for stored images.
//!
//! The digest is the lowercase hex MD5 of the file bytes. It is shown
//! to the uploader for verification and is never used as a storage key.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::{Digest, Md5};

const CHUNK_SIZE: usize = 8192;

/// Digest an in-memory buffer.
pub fn digest_bytes(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Digest a file on disk, reading it in fixed-size chunks.
pub fn digest_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
