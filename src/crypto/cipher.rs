//! Incremental cipher stages.
//!
//! Each stage consumes arbitrary-sized chunks and emits whatever output is
//! ready, so a file can be ciphered without holding it in memory. Block
//! modes buffer at most one block between calls.

use aes::{Aes128, Aes192, Aes256};
use cipher::block_padding::{Padding, Pkcs7};
use cipher::generic_array::GenericArray;
use cipher::{Block, BlockDecryptMut, BlockEncryptMut, KeyIvInit, StreamCipher};

use crate::error::{CryptError, Result};
use crate::registry::{AlgorithmSpec, Mode};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type Aes192Ctr = ctr::Ctr128BE<Aes192>;
type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// One step of a streaming cipher.
pub trait CryptStage {
    /// Processes `input` and appends any output that is ready to `out`.
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<()>;

    /// Flushes buffered state into `out`. Called once, after the last `update`.
    fn finish(&mut self, out: &mut Vec<u8>) -> Result<()>;
}

/// Builds the encrypting stage for `spec`.
pub fn encryptor(spec: &AlgorithmSpec, key: &[u8], iv: &[u8]) -> Result<Box<dyn CryptStage>> {
    check_sizes(spec, key, iv)?;
    let stage: Box<dyn CryptStage> = match (spec.mode(), spec.key_len()) {
        (Mode::Cbc, 128) => Box::new(CbcEncrypt::new(init::<cbc::Encryptor<Aes128>>(key, iv)?)),
        (Mode::Cbc, 192) => Box::new(CbcEncrypt::new(init::<cbc::Encryptor<Aes192>>(key, iv)?)),
        (Mode::Cbc, 256) => Box::new(CbcEncrypt::new(init::<cbc::Encryptor<Aes256>>(key, iv)?)),
        _ => keystream(spec, key, iv)?,
    };
    Ok(stage)
}

/// Builds the decrypting stage for `spec`.
pub fn decryptor(spec: &AlgorithmSpec, key: &[u8], iv: &[u8]) -> Result<Box<dyn CryptStage>> {
    check_sizes(spec, key, iv)?;
    let stage: Box<dyn CryptStage> = match (spec.mode(), spec.key_len()) {
        (Mode::Cbc, 128) => Box::new(CbcDecrypt::new(init::<cbc::Decryptor<Aes128>>(key, iv)?)),
        (Mode::Cbc, 192) => Box::new(CbcDecrypt::new(init::<cbc::Decryptor<Aes192>>(key, iv)?)),
        (Mode::Cbc, 256) => Box::new(CbcDecrypt::new(init::<cbc::Decryptor<Aes256>>(key, iv)?)),
        _ => keystream(spec, key, iv)?,
    };
    Ok(stage)
}

// Stream modes are their own inverse.
fn keystream(spec: &AlgorithmSpec, key: &[u8], iv: &[u8]) -> Result<Box<dyn CryptStage>> {
    let stage: Box<dyn CryptStage> = match (spec.mode(), spec.key_len()) {
        (Mode::Ctr, 128) => Box::new(Keystream(init::<Aes128Ctr>(key, iv)?)),
        (Mode::Ctr, 192) => Box::new(Keystream(init::<Aes192Ctr>(key, iv)?)),
        (Mode::Ctr, 256) => Box::new(Keystream(init::<Aes256Ctr>(key, iv)?)),
        (Mode::ChaCha20, 256) => Box::new(Keystream(init::<chacha20::ChaCha20>(key, iv)?)),
        (mode, bits) => {
            return Err(CryptError::Cipher(format!(
                "no {bits}-bit implementation for {mode:?} ({})",
                spec.name()
            )));
        }
    };
    Ok(stage)
}

fn check_sizes(spec: &AlgorithmSpec, key: &[u8], iv: &[u8]) -> Result<()> {
    if key.len() != spec.key_bytes() {
        return Err(CryptError::Cipher(format!(
            "{} needs a {}-byte key, got {}",
            spec.name(),
            spec.key_bytes(),
            key.len()
        )));
    }
    if iv.len() != spec.iv_bytes() {
        return Err(CryptError::Cipher(format!(
            "{} needs a {}-byte iv, got {}",
            spec.name(),
            spec.iv_bytes(),
            iv.len()
        )));
    }
    Ok(())
}

fn init<C: KeyIvInit>(key: &[u8], iv: &[u8]) -> Result<C> {
    C::new_from_slices(key, iv).map_err(|_| CryptError::Cipher("invalid key or iv length".into()))
}

struct Keystream<C>(C);

impl<C: StreamCipher> CryptStage for Keystream<C> {
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let start = out.len();
        out.extend_from_slice(input);
        self.0
            .try_apply_keystream(&mut out[start..])
            .map_err(|_| CryptError::Cipher("keystream exhausted".into()))
    }

    fn finish(&mut self, _out: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }
}

struct CbcEncrypt<C> {
    cipher: C,
    pending: Vec<u8>,
}

impl<C: BlockEncryptMut> CbcEncrypt<C> {
    fn new(cipher: C) -> Self {
        Self {
            cipher,
            pending: Vec::with_capacity(C::block_size()),
        }
    }
}

impl<C: BlockEncryptMut> CryptStage for CbcEncrypt<C> {
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let bs = C::block_size();
        self.pending.extend_from_slice(input);

        let ready = self.pending.len() - self.pending.len() % bs;
        for block in self.pending[..ready].chunks_exact_mut(bs) {
            self.cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        out.extend(self.pending.drain(..ready));
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let mut block: Block<C> = Default::default();
        let pos = self.pending.len();
        block[..pos].copy_from_slice(&self.pending);
        Pkcs7::pad(&mut block, pos);
        self.pending.clear();

        self.cipher.encrypt_block_mut(&mut block);
        out.extend_from_slice(&block);
        Ok(())
    }
}

struct CbcDecrypt<C> {
    cipher: C,
    pending: Vec<u8>,
}

impl<C: BlockDecryptMut> CbcDecrypt<C> {
    fn new(cipher: C) -> Self {
        Self {
            cipher,
            pending: Vec::with_capacity(2 * C::block_size()),
        }
    }
}

impl<C: BlockDecryptMut> CryptStage for CbcDecrypt<C> {
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let bs = C::block_size();
        self.pending.extend_from_slice(input);

        // the last full block carries the padding and waits for finish()
        let held = match self.pending.len() % bs {
            0 => bs,
            rem => rem,
        };
        let ready = self.pending.len().saturating_sub(held);
        for block in self.pending[..ready].chunks_exact_mut(bs) {
            self.cipher.decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        out.extend(self.pending.drain(..ready));
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let bs = C::block_size();
        if self.pending.len() != bs {
            return Err(CryptError::Cipher(
                "ciphertext is not a whole number of blocks".into(),
            ));
        }

        let mut block: Block<C> = GenericArray::clone_from_slice(&self.pending);
        self.pending.clear();
        self.cipher.decrypt_block_mut(&mut block);

        let plain = Pkcs7::unpad(&block).map_err(|_| CryptError::PasswordOrIntegrityFailure)?;
        out.extend_from_slice(plain);
        Ok(())
    }
}
