use std::fmt;
use std::path::Path;

use crate::error::{Result, SpoofError};
use crate::formats::jpeg_segment;
use crate::formats::png_chunk::{self, ChunkTag, PNG_SIGNATURE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Png,
    Jpeg,
}

impl ContainerKind {
    pub fn from_extension(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "png" => Ok(ContainerKind::Png),
            "jpg" | "jpeg" => Ok(ContainerKind::Jpeg),
            other => Err(SpoofError::format(format!(
                "unsupported file format {:?} (only PNG/JPG supported)",
                other
            ))),
        }
    }

    /// Guess the kind from leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Result<Self> {
        if bytes.starts_with(PNG_SIGNATURE) {
            Ok(ContainerKind::Png)
        } else if bytes.starts_with(&jpeg_segment::SOI) {
            Ok(ContainerKind::Jpeg)
        } else {
            Err(SpoofError::format("unrecognised file content (only PNG/JPG supported)"))
        }
    }

    /// Largest payload a single inserted chunk/segment can carry.
    pub fn max_payload(&self) -> usize {
        match self {
            ContainerKind::Png => png_chunk::MAX_CHUNK_DATA,
            ContainerKind::Jpeg => jpeg_segment::MAX_COMMENT_PAYLOAD,
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Png => f.write_str("PNG"),
            ContainerKind::Jpeg => f.write_str("JPEG"),
        }
    }
}

/// The original file. Structurally checked once and never modified; every
/// candidate is derived from these bytes.
#[derive(Debug, Clone)]
pub struct Container {
    kind: ContainerKind,
    bytes: Vec<u8>,
    insert_at: usize,
}

impl Container {
    pub fn new(kind: ContainerKind, bytes: Vec<u8>) -> Result<Self> {
        let insert_at = match kind {
            ContainerKind::Png => png_chunk::locate_terminal_chunk(&bytes)?,
            ContainerKind::Jpeg => {
                jpeg_segment::validate_boundaries(&bytes)?;
                jpeg_segment::SOI.len()
            }
        };
        Ok(Container { kind, bytes, insert_at })
    }

    /// Picks the kind from the file extension, or from the content when the
    /// path carries no extension at all.
    pub fn classify(path: &Path, bytes: Vec<u8>) -> Result<Self> {
        let kind = match path.extension() {
            Some(_) => ContainerKind::from_extension(path)?,
            None => ContainerKind::sniff(&bytes)?,
        };
        Self::new(kind, bytes)
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Offset where the synthetic chunk/segment goes.
    pub fn insertion_point(&self) -> usize {
        self.insert_at
    }

    pub fn candidate(&self, payload: &[u8], tag: ChunkTag) -> Result<Vec<u8>> {
        match self.kind {
            ContainerKind::Png => {
                png_chunk::insert_ancillary_chunk(&self.bytes, self.insert_at, payload, tag)
            }
            ContainerKind::Jpeg => jpeg_segment::insert_comment_segment(&self.bytes, payload),
        }
    }

    /// Removes the synthetic chunk/segment from a candidate of this kind.
    pub fn strip_candidate(&self, candidate: &[u8], tag: ChunkTag) -> Result<Vec<u8>> {
        match self.kind {
            ContainerKind::Png => png_chunk::remove_chunk_before_terminal(candidate, tag),
            ContainerKind::Jpeg => jpeg_segment::remove_comment_segment(candidate),
        }
    }
}
