//! Content hashing used to confirm a decryption reproduced the original.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::{CHUNK_SIZE, HASH_LEN};
use crate::error::Result;

/// Hashes everything `reader` yields with SHA-256.
pub fn hash_reader<R: Read>(mut reader: R) -> Result<[u8; HASH_LEN]> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize().into())
}

/// Streams the file at `path` through SHA-256.
pub fn hash_file(path: &Path) -> Result<[u8; HASH_LEN]> {
    hash_reader(File::open(path)?)
}

/// Returns `true` when both digests are identical.
pub fn validate(expected: &[u8], actual: &[u8]) -> bool {
    expected.ct_eq(actual).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn hash_matches_known_vector() {
        let digest = hash_reader(&b"abc"[..]).unwrap();
        assert_eq!(
            hex::encode(digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn file_hash_equals_reader_hash() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let data = vec![9u8; CHUNK_SIZE * 2 + 17];
        std::fs::write(&path, &data).unwrap();

        assert_eq!(hash_file(&path).unwrap(), hash_reader(&data[..]).unwrap());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let result = hash_file(&dir.path().join("missing"));
        assert!(matches!(result, Err(crate::CryptError::Io(_))));
    }

    #[test]
    fn validate_compares_digests() {
        let a = hash_reader(&b"one"[..]).unwrap();
        let b = hash_reader(&b"two"[..]).unwrap();

        assert!(validate(&a, &a));
        assert!(!validate(&a, &b));
        assert!(!validate(&a, &a[..16]));
    }
}
