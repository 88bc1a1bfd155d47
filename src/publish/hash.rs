use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::foundation::error::{PanoError, PanoResult};

/// Hex SHA-256 of `data`; the record identity shared by every derived artifact.
pub fn content_hash(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// [`content_hash`] of a file, read in chunks.
pub fn hash_file(path: &Path) -> PanoResult<String> {
    let mut file = std::fs::File::open(path).map_err(|e| {
        PanoError::input(format!("open '{}' for hashing: {e}", path.display()))
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| PanoError::Other(anyhow::anyhow!("read '{}': {e}", path.display())))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
