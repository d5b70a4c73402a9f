use thiserror::Error;

/// Errors returned by the cryption operations.
#[derive(Debug, Error)]
pub enum CryptError {
    /// The requested algorithm name is not registered.
    #[error("unknown algorithm '{0}'")]
    UnknownAlgorithm(String),

    /// The key file could not be decoded or has the wrong length.
    #[error("key file is corrupt: {0}")]
    KeyFileCorrupt(String),

    /// The container trailer is missing, truncated or malformed.
    #[error("corrupt container: {0}")]
    CorruptContainer(String),

    /// Decryption finished but the recovered plaintext does not match.
    #[error("Invalid password or corrupted data")]
    PasswordOrIntegrityFailure,

    /// The cipher itself rejected its input.
    #[error("cipher failure: {0}")]
    Cipher(String),

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("OS random generator unavailable")]
    Random,

    /// Decryption was requested with neither a password nor a key file.
    #[error("no password or key file provided")]
    MissingCredentials,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CryptError>;
