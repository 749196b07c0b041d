use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Hex SHA-256 of a file's raw bytes. This is the dataset fingerprint
/// handed to the external hash publisher.
pub fn file_sha256(path: impl AsRef<Path>) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub(crate) fn matrix_sha256(rows: usize, cols: usize, data: &[f64]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((rows as u64).to_le_bytes());
    hasher.update((cols as u64).to_le_bytes());
    for v in data {
        hasher.update(v.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_hash_matches_known_digest() {
        let path = std::env::temp_dir().join(format!("olapcube_digest_{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"abc").unwrap();
        let hash = file_sha256(&path).unwrap();
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(file_sha256("/definitely/not/here.csv").is_err());
    }
}
