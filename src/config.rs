use crate::crypto::crypto::DigestAlgorithm;
use crate::error::{Result, SpoofError};
use crate::formats::container::ContainerKind;
use crate::formats::png_chunk::ChunkTag;
use crate::utils::prefix::HexPrefix;

pub const DEFAULT_PAYLOAD_SIZE: usize = 32;
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1000;

/// Knobs for one search run.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Random bytes per inserted chunk/segment.
    pub payload_size: usize,

    /// Report progress every N attempts; 0 turns progress reports off.
    pub progress_interval: u64,

    /// Worker threads running attempts in parallel.
    pub workers: usize,

    /// Ancillary chunk type used for PNG inserts. Ignored for JPEG.
    pub chunk_tag: ChunkTag,

    pub algorithm: DigestAlgorithm,

    /// Decode original and result and require identical pixels before the
    /// output is written.
    pub verify_render: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            payload_size: DEFAULT_PAYLOAD_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            workers: 1,
            chunk_tag: ChunkTag::default(),
            algorithm: DigestAlgorithm::default(),
            verify_render: false,
        }
    }
}

impl SearchConfig {
    /// Checks that a run against `kind` for `prefix` can work at all.
    pub fn validate(&self, kind: ContainerKind, prefix: &HexPrefix) -> Result<()> {
        if self.workers == 0 {
            return Err(SpoofError::Config("at least one worker is required".to_string()));
        }
        if prefix.len() > self.algorithm.hex_len() {
            return Err(SpoofError::InvalidPrefix(format!(
                "{} digits is longer than a {} digest ({} digits)",
                prefix.len(),
                self.algorithm,
                self.algorithm.hex_len()
            )));
        }
        // Each hex digit is 4 bits of search space.
        if self.payload_size.saturating_mul(8) < prefix.len() * 4 {
            return Err(SpoofError::Config(format!(
                "payload of {} bytes has too little entropy for a {} digit prefix",
                self.payload_size,
                prefix.len()
            )));
        }
        if self.payload_size > kind.max_payload() {
            return Err(SpoofError::Format(format!(
                "{} payload of {} bytes exceeds the format limit of {} bytes",
                kind,
                self.payload_size,
                kind.max_payload()
            )));
        }
        Ok(())
    }
}
