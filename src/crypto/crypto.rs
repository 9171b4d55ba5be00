// src/crypto.rs

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};

use crate::error::{Result, SpoofError};

/// Hash used to fingerprint whole files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Length of the hex rendering of a digest.
    pub fn hex_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 64,
            DigestAlgorithm::Sha512 => 128,
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = SpoofError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            "sha512" | "sha-512" => Ok(DigestAlgorithm::Sha512),
            other => Err(SpoofError::Config(format!("unknown digest algorithm {:?}", other))),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Sha256 => f.write_str("sha256"),
            DigestAlgorithm::Sha512 => f.write_str("sha512"),
        }
    }
}

/// Lowercase hex digest of the whole buffer.
pub fn digest_hex(algorithm: DigestAlgorithm, data: &[u8]) -> String {
    match algorithm {
        DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
        DigestAlgorithm::Sha512 => hex::encode(Sha512::digest(data)),
    }
}

/// Fills `payload` from `rng`. There is no fallback source: a failing RNG
/// ends the run.
pub fn fill_payload<R: RngCore + ?Sized>(rng: &mut R, payload: &mut [u8]) -> Result<()> {
    rng.try_fill_bytes(payload)
        .map_err(|e| SpoofError::RandomSource(e.to_string()))
}
