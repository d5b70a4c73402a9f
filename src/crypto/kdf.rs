use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::{SALT_LEN, generate_salt};
use crate::error::{CryptError, Result};
use crate::registry::AlgorithmSpec;

/// Largest accepted memory cost (4 GiB).
pub const MAX_MEM_COST_KIB: u32 = 4 * 1024 * 1024;
/// Largest accepted number of passes.
pub const MAX_TIME_COST: u32 = 64;
/// Largest accepted lane count.
pub const MAX_PARALLELISM: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    mem_cost_kib: u32,
    time_cost: u32,
    parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            // default memory cost
            mem_cost_kib: 64 * 1024, // 64 MiB
            // default number of iterations
            time_cost: 3,
            // default number of threads
            parallelism: 1,
        }
    }
}

impl KdfParams {
    pub fn new(mem_cost_kib: u32, time_cost: u32, parallelism: u32) -> Result<Self> {
        let params = Self {
            mem_cost_kib,
            time_cost,
            parallelism,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn mem_cost_kib(&self) -> u32 {
        self.mem_cost_kib
    }

    pub fn time_cost(&self) -> u32 {
        self.time_cost
    }

    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }

    /// Checks the parameters against Argon2's lower limits and our upper
    /// bounds. Parameters read from a container pass through here too, so
    /// the bounds cap the work a crafted trailer can request.
    pub fn validate(&self) -> Result<()> {
        if self.mem_cost_kib < 8 {
            return Err(CryptError::Kdf("argon2 memory cost too low".into()));
        }
        if self.time_cost < 1 {
            return Err(CryptError::Kdf("argon2 time cost must be >= 1".into()));
        }
        if self.parallelism < 1 {
            return Err(CryptError::Kdf("argon2 parallelism must be >= 1".into()));
        }
        if self.mem_cost_kib > MAX_MEM_COST_KIB {
            return Err(CryptError::Kdf(format!(
                "argon2 memory cost above {MAX_MEM_COST_KIB} KiB"
            )));
        }
        if self.time_cost > MAX_TIME_COST {
            return Err(CryptError::Kdf(format!(
                "argon2 time cost above {MAX_TIME_COST}"
            )));
        }
        if self.parallelism > MAX_PARALLELISM {
            return Err(CryptError::Kdf(format!(
                "argon2 parallelism above {MAX_PARALLELISM}"
            )));
        }
        if self.mem_cost_kib < 8 * self.parallelism {
            return Err(CryptError::Kdf(
                "argon2 memory cost must be at least 8 * parallelism".into(),
            ));
        }
        Ok(())
    }
}

/// A freshly derived key together with the salt it was derived with.
pub struct DerivedKey {
    key: Zeroizing<Vec<u8>>,
    salt: [u8; SALT_LEN],
}

impl DerivedKey {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }
}

/// Derives a key for `spec` from `password` under a new random salt.
///
/// Only meant for encryption; decryption goes through [`recover`] with the
/// salt stored in the container.
pub fn derive_from_password(
    password: &str,
    spec: &AlgorithmSpec,
    kdf: KdfParams,
) -> Result<DerivedKey> {
    let salt = generate_salt()?;
    let key = recover(password, spec, &salt, kdf)?;
    Ok(DerivedKey { key, salt })
}

/// Re-derives the key for `spec` from `password` and a known salt.
///
/// A wrong password yields a different key, not an error.
pub fn recover(
    password: &str,
    spec: &AlgorithmSpec,
    salt: &[u8],
    kdf: KdfParams,
) -> Result<Zeroizing<Vec<u8>>> {
    kdf.validate()?;

    let key_len = spec.key_bytes();
    let params = Params::new(
        kdf.mem_cost_kib,
        kdf.time_cost,
        kdf.parallelism,
        Some(key_len),
    )
    .map_err(|e| CryptError::Kdf(format!("failed to construct Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new(vec![0u8; key_len]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| CryptError::Kdf(format!("argon2 key derivation failed {e}")))?;

    Ok(key)
}
