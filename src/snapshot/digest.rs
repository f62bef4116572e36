//! SHA-256 file digests.

use crate::traits::FileDigester;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// Hex-encoded SHA-256 of a file's contents, matching `openssl dgst -sha256`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Digester;

impl FileDigester for Sha256Digester {
    fn digest_file(&self, path: &Path) -> io::Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)?;
        Ok(hex::encode(hasher.finalize()))
    }
}
