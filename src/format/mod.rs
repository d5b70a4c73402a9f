//! Container file handling.
//!
//! A container is the ciphertext followed by a trailer describing how to
//! decrypt it. The trailer ends in a fixed footer so it can be found from
//! the end of the file without knowing how long the ciphertext is.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::KdfParams;
use crate::crypto::{HASH_LEN, SALT_LEN};
use crate::error::{CryptError, Result};
use crate::registry::AlgorithmSpec;

pub mod v1;

/// Magic bytes closing every container ("FCRY").
pub const MAGIC: &[u8; 4] = b"FCRY";
/// Length of magic bytes.
pub const MAGIC_LEN: usize = 4;
/// Length of version field.
pub const VER_LEN: usize = 1;
/// Latest format version
pub const CURRENT_VERSION: u8 = v1::VERSION_V1;
/// Upper bound on the serialized record, to reject absurd length markers.
pub const MAX_RECORD_LEN: usize = 64 * 1024;

/// Everything needed to decrypt and verify one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    algorithm: String,
    #[serde(with = "hex::serde")]
    salt: Vec<u8>,
    #[serde(with = "hex::serde")]
    iv: Vec<u8>,
    #[serde(with = "hex::serde")]
    content_hash: Vec<u8>,
    kdf: KdfParams,
}

impl ContainerConfig {
    pub fn new(
        algorithm: impl Into<String>,
        salt: Vec<u8>,
        iv: Vec<u8>,
        content_hash: Vec<u8>,
        kdf: KdfParams,
    ) -> Self {
        Self {
            algorithm: algorithm.into(),
            salt,
            iv,
            content_hash,
            kdf,
        }
    }

    /// Returns the name of the algorithm the ciphertext was produced with.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Returns the salt used for key derivation.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Returns the IV used for encryption.
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Returns the SHA-256 digest of the original plaintext.
    pub fn content_hash(&self) -> &[u8] {
        &self.content_hash
    }

    /// Returns the KDF parameters used for key derivation.
    pub fn kdf(&self) -> KdfParams {
        self.kdf
    }

    /// Checks field sizes against the sizing of `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptError::CorruptContainer`] on any mismatch.
    pub fn check(&self, spec: &AlgorithmSpec) -> Result<()> {
        if self.algorithm != spec.name() {
            return Err(corrupt("record names a different algorithm"));
        }
        if self.iv.len() != spec.iv_bytes() {
            return Err(corrupt("iv length does not match algorithm"));
        }
        if self.salt.len() != SALT_LEN {
            return Err(corrupt("invalid salt length"));
        }
        if self.content_hash.len() != HASH_LEN {
            return Err(corrupt("invalid content hash length"));
        }
        self.kdf
            .validate()
            .map_err(|e| corrupt(&format!("invalid kdf parameters: {e}")))
    }
}

pub(crate) fn corrupt(msg: &str) -> CryptError {
    CryptError::CorruptContainer(msg.to_string())
}

/// Where the regions of a container lie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    ciphertext_len: u64,
    record_len: usize,
}

/// Reads the version tag at the very end of the file and parses the footer.
fn locate(file: &mut File) -> Result<Layout> {
    let file_len = file.metadata()?.len();
    let tag_len = (VER_LEN + MAGIC_LEN) as u64;
    if file_len < tag_len {
        return Err(corrupt("file too short"));
    }

    let mut tag = [0u8; VER_LEN + MAGIC_LEN];
    file.seek(SeekFrom::End(-(tag_len as i64)))?;
    file.read_exact(&mut tag)?;

    if &tag[VER_LEN..] != MAGIC {
        return Err(corrupt("invalid magic"));
    }

    let footer_len = match tag[0] {
        v1::VERSION_V1 => v1::FOOTER_LEN,
        version => return Err(corrupt(&format!("unsupported version: {version}"))),
    };
    if file_len < footer_len as u64 {
        return Err(corrupt("file too short for footer"));
    }

    let mut footer = vec![0u8; footer_len];
    file.seek(SeekFrom::End(-(footer_len as i64)))?;
    file.read_exact(&mut footer)?;
    let footer = v1::parse_footer(&footer)?;

    let record_len = footer.record_len as usize;
    if record_len > MAX_RECORD_LEN {
        return Err(corrupt("record length out of range"));
    }
    let trailer_len = (footer_len + record_len) as u64;
    if trailer_len > file_len {
        return Err(corrupt("record length exceeds file size"));
    }
    if file_len - trailer_len != footer.ciphertext_len {
        return Err(corrupt("ciphertext length does not match file size"));
    }

    Ok(Layout {
        ciphertext_len: footer.ciphertext_len,
        record_len,
    })
}

/// Reads the decryption record stored at the end of the container.
///
/// # Errors
///
/// Returns [`CryptError::CorruptContainer`] if the trailer cannot be
/// located or parsed.
pub fn read_config(path: &Path) -> Result<ContainerConfig> {
    let mut file = File::open(path)?;
    let layout = locate(&mut file)?;

    let mut record = vec![0u8; layout.record_len];
    file.seek(SeekFrom::Start(layout.ciphertext_len))?;
    file.read_exact(&mut record)?;

    v1::parse_record(&record)
}

/// Ciphertext region of a container.
pub type Ciphertext = io::Take<BufReader<File>>;

/// Opens the container and yields exactly its ciphertext bytes.
pub fn open_ciphertext(path: &Path) -> Result<Ciphertext> {
    let mut file = File::open(path)?;
    let layout = locate(&mut file)?;
    file.seek(SeekFrom::Start(0))?;

    Ok(BufReader::new(file).take(layout.ciphertext_len))
}

/// Writes ciphertext straight through, then appends the trailer.
pub struct ContainerWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> ContainerWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Ciphertext bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Appends the trailer for `config` and hands back the inner writer.
    pub fn finish(mut self, config: &ContainerConfig) -> Result<W> {
        let trailer = v1::serialize_trailer(config, self.written)?;
        self.inner.write_all(&trailer)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for ContainerWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> ContainerConfig {
        ContainerConfig::new(
            "aes-256-ctr",
            vec![1u8; SALT_LEN],
            vec![2u8; 16],
            vec![3u8; HASH_LEN],
            KdfParams::new(64, 1, 1).unwrap(),
        )
    }

    fn write_container(path: &Path, ciphertext: &[u8], config: &ContainerConfig) {
        let mut writer = ContainerWriter::new(File::create(path).unwrap());
        writer.write_all(ciphertext).unwrap();
        assert_eq!(writer.written(), ciphertext.len() as u64);
        writer.finish(config).unwrap();
    }

    #[test]
    fn config_and_ciphertext_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.enc");
        let ciphertext: Vec<u8> = (0..5000u32).map(|i| (i * 7) as u8).collect();
        let config = sample();

        write_container(&path, &ciphertext, &config);

        assert_eq!(read_config(&path).unwrap(), config);

        let mut read_back = Vec::new();
        open_ciphertext(&path)
            .unwrap()
            .read_to_end(&mut read_back)
            .unwrap();
        assert_eq!(read_back, ciphertext);
    }

    #[test]
    fn empty_ciphertext_is_valid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.enc");
        write_container(&path, &[], &sample());

        assert_eq!(read_config(&path).unwrap(), sample());
        let mut read_back = Vec::new();
        open_ciphertext(&path)
            .unwrap()
            .read_to_end(&mut read_back)
            .unwrap();
        assert!(read_back.is_empty());
    }

    #[test]
    fn truncated_container_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.enc");
        write_container(&path, b"ciphertext", &sample());

        let data = std::fs::read(&path).unwrap();
        for keep in [0, 3, v1::FOOTER_LEN - 1, data.len() - 1] {
            std::fs::write(&path, &data[..keep]).unwrap();
            assert!(
                matches!(read_config(&path), Err(CryptError::CorruptContainer(_))),
                "keep={keep}"
            );
            assert!(matches!(
                open_ciphertext(&path),
                Err(CryptError::CorruptContainer(_))
            ));
        }
    }

    #[test]
    fn plain_file_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        std::fs::write(&path, b"definitely not a container").unwrap();

        assert!(matches!(
            read_config(&path),
            Err(CryptError::CorruptContainer(_))
        ));
    }

    #[test]
    fn unsupported_version_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.enc");
        write_container(&path, b"abc", &sample());

        let mut data = std::fs::read(&path).unwrap();
        let version_at = data.len() - MAGIC_LEN - VER_LEN;
        data[version_at] = 99;
        std::fs::write(&path, &data).unwrap();

        match read_config(&path) {
            Err(CryptError::CorruptContainer(msg)) => assert!(msg.contains("version")),
            other => panic!("expected CorruptContainer, got: {other:?}"),
        }
    }

    #[test]
    fn prepended_bytes_are_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.enc");
        write_container(&path, b"abc", &sample());

        let mut data = b"junk".to_vec();
        data.extend(std::fs::read(&path).unwrap());
        std::fs::write(&path, &data).unwrap();

        assert!(matches!(
            read_config(&path),
            Err(CryptError::CorruptContainer(_))
        ));
    }

    #[test]
    fn excessive_kdf_cost_in_record_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.enc");
        let ciphertext = b"ciphertext";

        let mut record = serde_json::to_value(sample()).unwrap();
        record["kdf"]["time_cost"] = 4_000_000_000u32.into();
        let record = serde_json::to_vec(&record).unwrap();

        let mut data = ciphertext.to_vec();
        data.extend_from_slice(&record);
        data.extend_from_slice(&(record.len() as u32).to_le_bytes());
        data.extend_from_slice(&(ciphertext.len() as u64).to_le_bytes());
        data.push(v1::VERSION_V1);
        data.extend_from_slice(MAGIC);
        std::fs::write(&path, &data).unwrap();

        match read_config(&path) {
            Err(CryptError::CorruptContainer(msg)) => assert!(msg.contains("time cost")),
            other => panic!("expected CorruptContainer, got: {other:?}"),
        }
    }

    #[test]
    fn check_rejects_wrong_sizes() {
        let registry = crate::Registry::builtin();
        let spec = registry.lookup("aes-256-ctr").unwrap();
        assert!(sample().check(spec).is_ok());

        let chacha = registry.lookup("chacha20").unwrap();
        assert!(sample().check(chacha).is_err());

        let short_iv = ContainerConfig::new(
            "aes-256-ctr",
            vec![1u8; SALT_LEN],
            vec![2u8; 8],
            vec![3u8; HASH_LEN],
            KdfParams::default(),
        );
        assert!(matches!(
            short_iv.check(spec),
            Err(CryptError::CorruptContainer(_))
        ));
    }
}
