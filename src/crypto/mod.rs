//! Cryptographic primitives for file cryption.
//!
//! Provides key derivation, cipher stages, content hashing and randomness.

pub mod cipher;
pub mod digest;
pub mod kdf;
pub mod random;

pub use cipher::{CryptStage, decryptor, encryptor};
pub use digest::{hash_file, validate};
pub use kdf::{DerivedKey, KdfParams, derive_from_password, recover};
pub use random::{generate_iv, generate_salt};

/// Length of the salt (16 bytes).
pub const SALT_LEN: usize = 16;
/// Length of the SHA-256 content hash (32 bytes).
pub const HASH_LEN: usize = 32;
/// Read buffer size used when streaming files (64 KiB).
pub const CHUNK_SIZE: usize = 64 * 1024;
