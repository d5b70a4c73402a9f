//! Supported cipher algorithms and their sizing.

use crate::error::{CryptError, Result};

/// How an algorithm turns plaintext into ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// AES in CBC mode with PKCS#7 padding.
    Cbc,
    /// AES in CTR mode with a 128-bit big-endian counter.
    Ctr,
    /// IETF ChaCha20 keystream.
    ChaCha20,
}

/// Sizing of a registered algorithm. All sizes are in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmSpec {
    name: &'static str,
    key_len: usize,
    block_size: usize,
    iv_size: usize,
    mode: Mode,
}

impl AlgorithmSpec {
    const fn new(
        name: &'static str,
        key_len: usize,
        block_size: usize,
        iv_size: usize,
        mode: Mode,
    ) -> Self {
        Self {
            name,
            key_len,
            block_size,
            iv_size,
            mode,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn iv_size(&self) -> usize {
        self.iv_size
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Key length in bytes.
    pub fn key_bytes(&self) -> usize {
        self.key_len / 8
    }

    /// IV length in bytes.
    pub fn iv_bytes(&self) -> usize {
        self.iv_size / 8
    }
}

const SYMMETRIC: &[AlgorithmSpec] = &[
    AlgorithmSpec::new("aes-128-cbc", 128, 128, 128, Mode::Cbc),
    AlgorithmSpec::new("aes-192-cbc", 192, 128, 128, Mode::Cbc),
    AlgorithmSpec::new("aes-256-cbc", 256, 128, 128, Mode::Cbc),
    AlgorithmSpec::new("aes-128-ctr", 128, 8, 128, Mode::Ctr),
    AlgorithmSpec::new("aes-192-ctr", 192, 8, 128, Mode::Ctr),
    AlgorithmSpec::new("aes-256-ctr", 256, 8, 128, Mode::Ctr),
    AlgorithmSpec::new("chacha20", 256, 8, 96, Mode::ChaCha20),
];

const ASYMMETRIC: &[&str] = &["rsa", "ec", "ed25519"];

/// Algorithm used when the caller does not pick one.
pub const DEFAULT_ALGORITHM: &str = "aes-256-ctr";

/// Immutable table of the algorithms this build can run.
///
/// Build it once and hand out references; it holds no interior state.
#[derive(Debug, Clone)]
pub struct Registry {
    symmetric: Vec<AlgorithmSpec>,
    asymmetric: Vec<&'static str>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Registry {
    /// Registry holding every algorithm compiled into this crate.
    pub fn builtin() -> Self {
        Self {
            symmetric: SYMMETRIC.to_vec(),
            asymmetric: ASYMMETRIC.to_vec(),
        }
    }

    /// Looks up an algorithm by its exact name.
    ///
    /// # Errors
    ///
    /// Returns [`CryptError::UnknownAlgorithm`] if `name` is not registered.
    pub fn lookup(&self, name: &str) -> Result<&AlgorithmSpec> {
        self.symmetric
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| CryptError::UnknownAlgorithm(name.to_string()))
    }

    pub fn symmetric(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.symmetric.iter().map(|spec| spec.name)
    }

    /// Asymmetric names, listed for display only.
    pub fn asymmetric(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.asymmetric.iter().copied()
    }
}
