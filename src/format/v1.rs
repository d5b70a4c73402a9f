//! Container format v1.
//!
//! V1 Container Layout:
//! ```text
//! CIPHERTEXT | RECORD (JSON) | RECORD_LEN (4, LE) | CIPHERTEXT_LEN (8, LE) | VERSION (1) | MAGIC (4)
//! ```
//!
//! RECORD is a JSON object holding the algorithm name, hex-encoded salt,
//! IV and plaintext SHA-256, and the Argon2 parameters.

use super::{
    CURRENT_VERSION, ContainerConfig, MAGIC, MAGIC_LEN, MAX_RECORD_LEN, VER_LEN, corrupt,
};
use crate::error::Result;

/// Current container format version.
pub const VERSION_V1: u8 = 1;

const RECORD_LEN_LEN: usize = 4;
const CT_LEN_LEN: usize = 8;

/// Length of the fixed footer closing a v1 container.
pub const FOOTER_LEN: usize = RECORD_LEN_LEN + CT_LEN_LEN + VER_LEN + MAGIC_LEN;

/// Decoded v1 footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub record_len: u32,
    pub ciphertext_len: u64,
}

/// Parses the last [`FOOTER_LEN`] bytes of a container.
///
/// # Errors
///
/// Returns an error if the slice has the wrong size, the magic is wrong or
/// the version is not v1.
pub fn parse_footer(data: &[u8]) -> Result<Footer> {
    if data.len() != FOOTER_LEN {
        return Err(corrupt("footer has wrong size for v1"));
    }

    let mut offset = 0;
    let record_len = u32::from_le_bytes(
        data[offset..offset + RECORD_LEN_LEN]
            .try_into()
            .map_err(|_| corrupt("invalid record length"))?,
    );
    offset += RECORD_LEN_LEN;

    let ciphertext_len = u64::from_le_bytes(
        data[offset..offset + CT_LEN_LEN]
            .try_into()
            .map_err(|_| corrupt("invalid ciphertext length"))?,
    );
    offset += CT_LEN_LEN;

    if data[offset] != VERSION_V1 {
        return Err(corrupt("wrong version for v1 parser"));
    }
    offset += VER_LEN;

    if &data[offset..] != MAGIC {
        return Err(corrupt("invalid magic"));
    }

    Ok(Footer {
        record_len,
        ciphertext_len,
    })
}

/// Parses the JSON record preceding the footer.
///
/// The Argon2 parameters are validated here, before anything derives a key
/// with them.
pub fn parse_record(data: &[u8]) -> Result<ContainerConfig> {
    let config: ContainerConfig =
        serde_json::from_slice(data).map_err(|e| corrupt(&format!("malformed record: {e}")))?;
    config
        .kdf()
        .validate()
        .map_err(|e| corrupt(&format!("invalid kdf parameters: {e}")))?;
    Ok(config)
}

/// Serializes the record and footer that follow `ciphertext_len` bytes of
/// ciphertext.
///
/// # Errors
///
/// Returns an error if the record cannot be encoded or is too large.
pub fn serialize_trailer(config: &ContainerConfig, ciphertext_len: u64) -> Result<Vec<u8>> {
    let record =
        serde_json::to_vec(config).map_err(|e| corrupt(&format!("cannot encode record: {e}")))?;
    if record.len() > MAX_RECORD_LEN {
        return Err(corrupt("record too large"));
    }

    let mut buf = Vec::with_capacity(record.len() + FOOTER_LEN);
    buf.extend_from_slice(&record);
    buf.extend_from_slice(&(record.len() as u32).to_le_bytes());
    buf.extend_from_slice(&ciphertext_len.to_le_bytes());
    buf.push(CURRENT_VERSION);
    buf.extend_from_slice(MAGIC);

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KdfParams;

    fn config() -> ContainerConfig {
        ContainerConfig::new(
            "aes-128-cbc",
            vec![0xaa; 16],
            vec![0xbb; 16],
            vec![0xcc; 32],
            KdfParams::default(),
        )
    }

    #[test]
    fn trailer_roundtrip() {
        let trailer = serialize_trailer(&config(), 1234).unwrap();
        let split = trailer.len() - FOOTER_LEN;

        let footer = parse_footer(&trailer[split..]).unwrap();
        assert_eq!(footer.ciphertext_len, 1234);
        assert_eq!(footer.record_len as usize, split);
        assert_eq!(parse_record(&trailer[..split]).unwrap(), config());
    }

    #[test]
    fn record_is_readable_json() {
        let trailer = serialize_trailer(&config(), 0).unwrap();
        let split = trailer.len() - FOOTER_LEN;
        let value: serde_json::Value = serde_json::from_slice(&trailer[..split]).unwrap();

        assert_eq!(value["algorithm"], "aes-128-cbc");
        assert_eq!(value["iv"], "bb".repeat(16));
        assert_eq!(value["kdf"]["time_cost"], 3);
    }

    #[test]
    fn footer_invalid_magic_fails() {
        let mut data = serialize_trailer(&config(), 0).unwrap();
        let last = data.len() - 1;
        data[last] = b'X';
        assert!(parse_footer(&data[data.len() - FOOTER_LEN..]).is_err());
    }

    #[test]
    fn footer_wrong_size_fails() {
        assert!(parse_footer(&[0u8; FOOTER_LEN - 1]).is_err());
    }

    #[test]
    fn malformed_record_fails() {
        assert!(parse_record(b"{\"algorithm\": 5}").is_err());
        assert!(parse_record(b"{\"algorithm\":\"aes-128-cbc\",\"salt\":\"zz\"}").is_err());
    }

    #[test]
    fn out_of_range_kdf_record_fails() {
        let trailer = serialize_trailer(&config(), 0).unwrap();
        let split = trailer.len() - FOOTER_LEN;
        let mut value: serde_json::Value = serde_json::from_slice(&trailer[..split]).unwrap();
        value["kdf"]["time_cost"] = 4_000_000_000u32.into();
        let record = serde_json::to_vec(&value).unwrap();

        match parse_record(&record) {
            Err(crate::CryptError::CorruptContainer(msg)) => assert!(msg.contains("kdf")),
            other => panic!("expected CorruptContainer, got: {other:?}"),
        }
    }

    #[test]
    fn trailer_carries_current_version() {
        let trailer = serialize_trailer(&config(), 0).unwrap();
        assert_eq!(trailer[trailer.len() - MAGIC_LEN - VER_LEN], CURRENT_VERSION);
    }
}
