//! Phase search and XOR decryption with a recovered register.
//!
//! The recovered window sits at some fixed distance from the position where
//! the ciphertext's keystream began. Every offset in `[0, span)` is tried by
//! advancing a copy of the register, decrypting, and looking for a plaintext
//! signature.

use log::{debug, info};

use crate::config::Config;
use crate::error::{AttackError, Result};
use crate::lfsr::{Keystream, Recovery};
use crate::utils::bits::{contains_subslice, BitSequence};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decryption {
    /// Keystream bits discarded before the ciphertext's first bit.
    pub offset: usize,
    pub plaintext: Vec<u8>,
}

pub struct Decryptor {
    base: Keystream,
    signature: Vec<u8>,
    span: usize,
}

impl Decryptor {
    pub fn new(recovery: &Recovery, signature: &[u8], span: usize) -> Self {
        Self {
            base: Keystream::new(recovery.window, recovery.taps),
            signature: signature.to_vec(),
            span,
        }
    }

    /// Searches one offset per bit of `known`, the prefix `recovery` was taken from.
    pub fn from_config(recovery: &Recovery, known: &BitSequence, config: &Config) -> Self {
        Self::new(recovery, &config.signature, known.len())
    }

    /// Decrypts with the keystream advanced by exactly `offset` bits.
    pub fn decrypt_at(&self, ciphertext: &[u8], offset: usize) -> Vec<u8> {
        let mut ks = self.base.clone();
        ks.advance(offset);
        ks.apply(ciphertext)
    }

    /// Returns the first offset whose decryption contains the signature.
    pub fn search(&self, ciphertext: &[u8]) -> Result<Decryption> {
        let mut cursor = self.base.clone();
        for offset in 0..self.span {
            let plaintext = cursor.clone().apply(ciphertext);
            if contains_subslice(&plaintext, &self.signature) {
                info!("signature found at offset {}", offset);
                return Ok(Decryption { offset, plaintext });
            }
            debug!("offset {} rejected", offset);
            cursor.next_bit();
        }
        Err(AttackError::NoMatchingOffset {
            span: self.span,
            ciphertext_len: ciphertext.len(),
        })
    }
}
