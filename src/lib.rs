//! Password-based streaming file encryption.
//!
//! [`Cryptor::encrypt`] turns one file into a self-describing container:
//! the ciphertext followed by a trailer naming the algorithm, salt, IV and
//! a SHA-256 of the plaintext. [`Cryptor::decrypt`] reverses it from either
//! the password or a raw key file, and rejects the result if the recovered
//! plaintext does not hash to the stored value.

pub mod crypto;
mod error;
pub mod format;
pub mod keyfile;
pub mod pipeline;
pub mod progress;
pub mod registry;

pub use crate::crypto::KdfParams;
pub use crate::error::{CryptError, Result};
pub use crate::format::ContainerConfig;
pub use crate::keyfile::{KeyFile, read_key_file, write_key_file};
pub use crate::progress::Progress;
pub use crate::registry::{AlgorithmSpec, DEFAULT_ALGORITHM, Registry};

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::format::ContainerWriter;
use crate::progress::ProgressReader;

/// Runs encryptions and decryptions against a shared algorithm registry.
#[derive(Debug, Clone, Copy)]
pub struct Cryptor<'r> {
    registry: &'r Registry,
    kdf: KdfParams,
}

impl<'r> Cryptor<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            kdf: KdfParams::default(),
        }
    }

    /// Uses `kdf` for keys derived by [`Cryptor::encrypt`].
    ///
    /// Decryption always uses the parameters recorded in the container.
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Encrypts `file_path` into a container at `output_path`.
    ///
    /// The key is derived from `password` under a fresh salt and, when
    /// `key_file_path` is given, also written there as hex. `on_progress`
    /// receives the cumulative number of plaintext bytes consumed.
    ///
    /// Returns once the container is flushed and synced to disk. A failed
    /// run leaves whatever was written in place.
    ///
    /// # Errors
    ///
    /// [`CryptError::UnknownAlgorithm`] for an unregistered `algorithm`;
    /// an `InvalidInput` I/O error if `output_path` is `file_path`; other
    /// I/O failures propagate unchanged.
    pub fn encrypt(
        &self,
        file_path: &Path,
        password: &str,
        algorithm: &str,
        output_path: &Path,
        key_file_path: Option<&Path>,
        on_progress: Option<Progress<'_>>,
    ) -> Result<()> {
        let spec = self.registry.lookup(algorithm)?;
        refuse_overwrite(file_path, output_path)?;
        debug!(algorithm = spec.name(), input = %file_path.display(), "encrypting");

        let derived = crypto::derive_from_password(password, spec, self.kdf)?;
        if let Some(path) = key_file_path {
            write_key_file(derived.key(), path)?;
            debug!(key_file = %path.display(), "key file written");
        }

        let content_hash = crypto::hash_file(file_path)?;
        let iv = crypto::generate_iv(spec.iv_bytes())?;
        let mut stage = crypto::encryptor(spec, derived.key(), &iv)?;

        let config = ContainerConfig::new(
            spec.name(),
            derived.salt().to_vec(),
            iv,
            content_hash.to_vec(),
            self.kdf,
        );

        let source = ProgressReader::new(BufReader::new(File::open(file_path)?), on_progress);
        let mut sink = ContainerWriter::new(BufWriter::new(File::create(output_path)?));
        let written = pipeline::run(source, stage.as_mut(), &mut sink)?;

        let out = sink.finish(&config)?;
        out.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        info!(
            algorithm = spec.name(),
            ciphertext_bytes = written,
            output = %output_path.display(),
            "encryption complete"
        );
        Ok(())
    }

    /// Decrypts the container at `file_path` into `output_path`.
    ///
    /// The key comes from `key_file_path` when given, otherwise from
    /// `password` and the salt stored in the container. `on_progress`
    /// receives the cumulative number of ciphertext bytes consumed.
    ///
    /// # Errors
    ///
    /// - [`CryptError::CorruptContainer`] if the trailer cannot be read.
    /// - [`CryptError::KeyFileCorrupt`] for an unusable key file.
    /// - [`CryptError::MissingCredentials`] if neither password nor key file
    ///   is supplied.
    /// - [`CryptError::PasswordOrIntegrityFailure`] if the recovered
    ///   plaintext does not match the stored hash: a wrong password and
    ///   tampered data look the same.
    pub fn decrypt(
        &self,
        file_path: &Path,
        password: Option<&str>,
        key_file_path: Option<&Path>,
        output_path: &Path,
        on_progress: Option<Progress<'_>>,
    ) -> Result<()> {
        refuse_overwrite(file_path, output_path)?;
        let config = format::read_config(file_path)?;
        let spec = self.registry.lookup(config.algorithm())?;
        config.check(spec)?;
        debug!(algorithm = spec.name(), input = %file_path.display(), "decrypting");

        let key = match (key_file_path, password) {
            (Some(path), _) => read_key_file(path, spec.key_bytes())?,
            (None, Some(password)) => {
                crypto::recover(password, spec, config.salt(), config.kdf())?
            }
            (None, None) => return Err(CryptError::MissingCredentials),
        };

        let mut stage = crypto::decryptor(spec, &key, config.iv())?;
        let source = ProgressReader::new(format::open_ciphertext(file_path)?, on_progress);
        let mut sink = BufWriter::new(File::create(output_path)?);
        let written = pipeline::run(source, stage.as_mut(), &mut sink)?;
        sink.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        let actual = crypto::hash_file(output_path)?;
        if !crypto::validate(config.content_hash(), &actual) {
            warn!(output = %output_path.display(), "content hash mismatch after decryption");
            return Err(CryptError::PasswordOrIntegrityFailure);
        }

        info!(
            algorithm = spec.name(),
            plaintext_bytes = written,
            output = %output_path.display(),
            "decryption complete"
        );
        Ok(())
    }
}

// Creating the output truncates it, so it must not be the file being read.
fn refuse_overwrite(input: &Path, output: &Path) -> Result<()> {
    let same = match (input.canonicalize(), output.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => input == output,
    };
    if same {
        return Err(CryptError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("output {} is the input file", output.display()),
        )));
    }
    Ok(())
}
