// src/formats/png_chunk.rs

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SpoofError};

pub const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";
pub const TERMINAL_TAG: &[u8; 4] = b"IEND";
/// Length + tag + CRC around the data of every chunk.
pub const CHUNK_OVERHEAD: usize = 12;
pub const MAX_CHUNK_DATA: usize = 0x7FFF_FFFF;

/// A four letter PNG chunk type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkTag([u8; 4]);

impl ChunkTag {
    pub fn new(tag: &[u8]) -> Result<Self> {
        if tag.len() != 4 || !tag.iter().all(u8::is_ascii_alphabetic) {
            return Err(SpoofError::format(format!(
                "chunk type must be 4 ASCII letters, got {:?}",
                String::from_utf8_lossy(tag)
            )));
        }
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(tag);
        Ok(ChunkTag(bytes))
    }

    /// Like [`ChunkTag::new`], but refuses critical chunk types that a
    /// decoder would be required to understand.
    pub fn ancillary(tag: &[u8]) -> Result<Self> {
        let tag = Self::new(tag)?;
        if !tag.is_ancillary() {
            return Err(SpoofError::format(format!(
                "chunk type {} is critical; inserted chunks must start with a lowercase letter",
                tag
            )));
        }
        Ok(tag)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    // Property bits live in bit 5 of each byte (lowercase = set).
    pub fn is_ancillary(&self) -> bool {
        self.0[0] & 0x20 != 0
    }

    pub fn is_private(&self) -> bool {
        self.0[1] & 0x20 != 0
    }
}

impl Default for ChunkTag {
    fn default() -> Self {
        ChunkTag(*b"npFX")
    }
}

impl FromStr for ChunkTag {
    type Err = SpoofError;

    fn from_str(s: &str) -> Result<Self> {
        ChunkTag::ancillary(s.as_bytes())
    }
}

impl fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// A chunk borrowed from a PNG buffer.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    /// Offset of the length field within the buffer.
    pub offset: usize,
    pub tag: [u8; 4],
    pub data: &'a [u8],
    pub crc: u32,
}

impl<'a> Chunk<'a> {
    /// Total encoded size including length, tag and CRC.
    pub fn encoded_len(&self) -> usize {
        CHUNK_OVERHEAD + self.data.len()
    }

    pub fn end(&self) -> usize {
        self.offset + self.encoded_len()
    }

    pub fn has_valid_crc(&self) -> bool {
        chunk_crc(&self.tag, self.data) == self.crc
    }
}

/// IEEE CRC-32 over tag followed by data.
pub fn chunk_crc(tag: &[u8; 4], data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(tag);
    hasher.update(data);
    hasher.finalize()
}

pub fn encode_chunk(tag: ChunkTag, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_CHUNK_DATA {
        return Err(SpoofError::format(format!(
            "chunk data of {} bytes exceeds the PNG limit of {} bytes",
            data.len(),
            MAX_CHUNK_DATA
        )));
    }

    let mut buffer = Vec::with_capacity(CHUNK_OVERHEAD + data.len());
    buffer.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buffer.extend_from_slice(tag.as_bytes());
    buffer.extend_from_slice(data);
    buffer.extend_from_slice(&chunk_crc(tag.as_bytes(), data).to_be_bytes());
    Ok(buffer)
}

pub fn check_signature(buf: &[u8]) -> Result<()> {
    if buf.len() < PNG_SIGNATURE.len() || &buf[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
        return Err(SpoofError::format("missing PNG signature"));
    }
    Ok(())
}

fn read_u32_be(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn read_chunk(buf: &[u8], offset: usize) -> Result<Chunk<'_>> {
    if offset + 8 > buf.len() {
        return Err(SpoofError::format(format!(
            "truncated chunk header at offset {}",
            offset
        )));
    }

    let length = read_u32_be(buf, offset) as usize;
    let mut tag = [0u8; 4];
    tag.copy_from_slice(&buf[offset + 4..offset + 8]);

    let end = offset
        .checked_add(CHUNK_OVERHEAD)
        .and_then(|n| n.checked_add(length))
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| {
            SpoofError::format(format!(
                "chunk {} at offset {} declares {} bytes, past the end of the file",
                String::from_utf8_lossy(&tag),
                offset,
                length
            ))
        })?;

    Ok(Chunk {
        offset,
        tag,
        data: &buf[offset + 8..end - 4],
        crc: read_u32_be(buf, end - 4),
    })
}

/// Iterator over the chunk stream that follows the signature. Stops after the
/// terminal chunk or the first framing error.
pub struct Chunks<'a> {
    buf: &'a [u8],
    offset: usize,
    done: bool,
}

pub fn chunks(buf: &[u8]) -> Chunks<'_> {
    Chunks {
        buf,
        offset: PNG_SIGNATURE.len(),
        done: false,
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<Chunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.buf.len() {
            return None;
        }
        match read_chunk(self.buf, self.offset) {
            Ok(chunk) => {
                self.offset = chunk.end();
                self.done = &chunk.tag == TERMINAL_TAG;
                Some(Ok(chunk))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Offset of the length field of the `IEND` chunk.
pub fn locate_terminal_chunk(buf: &[u8]) -> Result<usize> {
    check_signature(buf)?;
    for chunk in chunks(buf) {
        let chunk = chunk?;
        if &chunk.tag == TERMINAL_TAG {
            return Ok(chunk.offset);
        }
    }
    Err(SpoofError::format("IEND chunk not found before end of file"))
}

/// Splices a new chunk carrying `payload` in front of `offset`. Bytes on
/// either side are copied through untouched.
pub fn insert_ancillary_chunk(
    buf: &[u8],
    offset: usize,
    payload: &[u8],
    tag: ChunkTag,
) -> Result<Vec<u8>> {
    if !tag.is_ancillary() {
        return Err(SpoofError::format(format!(
            "refusing to insert critical chunk type {}",
            tag
        )));
    }
    if offset < PNG_SIGNATURE.len() || offset > buf.len() {
        return Err(SpoofError::format(format!(
            "insertion offset {} outside chunk stream of {} bytes",
            offset,
            buf.len()
        )));
    }

    let chunk = encode_chunk(tag, payload)?;
    let mut out = Vec::with_capacity(buf.len() + chunk.len());
    out.extend_from_slice(&buf[..offset]);
    out.extend_from_slice(&chunk);
    out.extend_from_slice(&buf[offset..]);
    Ok(out)
}

/// Removes the `tag` chunk sitting directly in front of `IEND`.
pub fn remove_chunk_before_terminal(buf: &[u8], tag: ChunkTag) -> Result<Vec<u8>> {
    check_signature(buf)?;

    let mut previous: Option<Chunk<'_>> = None;
    for chunk in chunks(buf) {
        let chunk = chunk?;
        if &chunk.tag != TERMINAL_TAG {
            previous = Some(chunk);
            continue;
        }

        let inserted = previous
            .filter(|c| &c.tag == tag.as_bytes())
            .ok_or_else(|| SpoofError::format(format!("no {} chunk before IEND", tag)))?;
        if !inserted.has_valid_crc() {
            return Err(SpoofError::format(format!(
                "{} chunk at offset {} has a bad CRC",
                tag, inserted.offset
            )));
        }

        let mut out = Vec::with_capacity(buf.len() - inserted.encoded_len());
        out.extend_from_slice(&buf[..inserted.offset]);
        out.extend_from_slice(&buf[inserted.end()..]);
        return Ok(out);
    }
    Err(SpoofError::format("IEND chunk not found before end of file"))
}
