//! Raw key side files.
//!
//! A key file holds the derived key as lowercase hex followed by a newline.
//! It lets a container be decrypted without the password.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use getrandom::fill;
use zeroize::Zeroizing;

use crate::error::{CryptError, Result};

/// A key file on disk.
#[derive(Clone, Debug)]
pub struct KeyFile {
    path: PathBuf,
}

impl KeyFile {
    /// Creates a new KeyFile handle for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads and decodes the key, which must be `expected_len` bytes long.
    ///
    /// # Errors
    ///
    /// I/O failures propagate as [`CryptError::Io`]; content that is not hex
    /// or has the wrong length is [`CryptError::KeyFileCorrupt`].
    pub fn load(&self, expected_len: usize) -> Result<Zeroizing<Vec<u8>>> {
        let raw = Zeroizing::new(fs::read(&self.path)?);
        let text = std::str::from_utf8(&raw)
            .map_err(|_| CryptError::KeyFileCorrupt("not valid text".into()))?;

        let key = Zeroizing::new(
            hex::decode(text.trim())
                .map_err(|e| CryptError::KeyFileCorrupt(format!("invalid hex: {e}")))?,
        );

        if key.len() != expected_len {
            return Err(CryptError::KeyFileCorrupt(format!(
                "expected a {expected_len}-byte key, found {} bytes",
                key.len()
            )));
        }

        Ok(key)
    }

    /// Writes `key` atomically, replacing any existing file.
    ///
    /// The encoded key goes to a temporary sibling which is synced and then
    /// renamed over the target, so readers never see a half-written key.
    /// On unix the parent directory is synced afterwards so the rename
    /// survives a crash. Creates parent directories if they don't exist.
    pub fn save(&self, key: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut encoded = Zeroizing::new(hex::encode(key));
        encoded.push('\n');

        let tmp_path = self.random_tmp_path()?;
        let mut tmp_file = create_private(&tmp_path)?;
        let written = tmp_file
            .write_all(encoded.as_bytes())
            .and_then(|()| tmp_file.sync_all());
        drop(tmp_file);

        if let Err(e) = written.and_then(|()| fs::rename(&tmp_path, &self.path)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        #[cfg(unix)]
        sync_parent(&self.path)?;

        Ok(())
    }

    /// Generates a unique temporary file path in the same directory.
    ///
    /// Format: `filename.tmp.<randomhex>`
    fn random_tmp_path(&self) -> Result<PathBuf> {
        let mut buf = [0u8; 8]; // 64 bit entropy
        fill(&mut buf).map_err(|_| CryptError::Random)?;

        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| CryptError::Io(std::io::ErrorKind::InvalidInput.into()))?
            .to_string_lossy();

        let tmp_name = format!("{}.tmp.{}", file_name, hex::encode(buf));
        Ok(self.path.with_file_name(tmp_name))
    }
}

// securely create temp file (fail if exists), owner-only on unix
fn create_private(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()
}

/// Writes `key` to `path` as hex, overwriting any existing file.
pub fn write_key_file(key: &[u8], path: &Path) -> Result<()> {
    KeyFile::new(path).save(key)
}

/// Reads a key of `expected_len` bytes from `path`.
pub fn read_key_file(path: &Path, expected_len: usize) -> Result<Zeroizing<Vec<u8>>> {
    KeyFile::new(path).load(expected_len)
}
