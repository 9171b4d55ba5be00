// src/formats/jpeg_segment.rs

use crate::error::{Result, SpoofError};

pub const SOI: [u8; 2] = [0xFF, 0xD8];
pub const EOI: [u8; 2] = [0xFF, 0xD9];
pub const COM: [u8; 2] = [0xFF, 0xFE];
/// The 16-bit length field counts its own two bytes.
pub const MAX_COMMENT_PAYLOAD: usize = u16::MAX as usize - 2;

pub fn validate_boundaries(buf: &[u8]) -> Result<()> {
    if buf.len() < 4 {
        return Err(SpoofError::format(format!(
            "JPEG too short: {} bytes",
            buf.len()
        )));
    }
    if buf[..2] != SOI {
        return Err(SpoofError::format("not a valid JPEG (no SOI marker)"));
    }
    if buf[buf.len() - 2..] != EOI {
        return Err(SpoofError::format("not a valid JPEG (no EOI marker)"));
    }
    Ok(())
}

pub fn encode_comment_segment(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_COMMENT_PAYLOAD {
        return Err(SpoofError::format(format!(
            "comment payload of {} bytes exceeds the segment limit of {} bytes",
            payload.len(),
            MAX_COMMENT_PAYLOAD
        )));
    }

    let length = (payload.len() + 2) as u16;
    let mut segment = Vec::with_capacity(4 + payload.len());
    segment.extend_from_slice(&COM);
    segment.extend_from_slice(&length.to_be_bytes());
    segment.extend_from_slice(payload);
    Ok(segment)
}

/// Places a COM segment right after SOI. The rest of the stream is copied
/// through unchanged.
pub fn insert_comment_segment(buf: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    validate_boundaries(buf)?;
    let segment = encode_comment_segment(payload)?;

    let mut out = Vec::with_capacity(buf.len() + segment.len());
    out.extend_from_slice(&buf[..SOI.len()]);
    out.extend_from_slice(&segment);
    out.extend_from_slice(&buf[SOI.len()..]);
    Ok(out)
}

/// Inverse of [`insert_comment_segment`]: drops the COM segment that directly
/// follows SOI, using its own length field.
pub fn remove_comment_segment(buf: &[u8]) -> Result<Vec<u8>> {
    validate_boundaries(buf)?;
    if buf.len() < 6 || buf[2..4] != COM {
        return Err(SpoofError::format("no comment segment after SOI"));
    }

    let length = u16::from_be_bytes([buf[4], buf[5]]) as usize;
    let end = 4 + length;
    if length < 2 || end > buf.len() - EOI.len() {
        return Err(SpoofError::format(format!(
            "comment segment length {} is out of bounds",
            length
        )));
    }

    let mut out = Vec::with_capacity(buf.len() - (end - 2));
    out.extend_from_slice(&buf[..2]);
    out.extend_from_slice(&buf[end..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::minimal_jpeg;

    #[test]
    fn accepts_soi_eoi_only_stream() {
        assert!(validate_boundaries(&[0xFF, 0xD8, 0xFF, 0xD9]).is_ok());
        assert!(validate_boundaries(&minimal_jpeg()).is_ok());
    }

    #[test]
    fn rejects_bad_boundaries() {
        assert!(validate_boundaries(&[0xFF, 0xD8]).is_err());
        assert!(validate_boundaries(&[0x89, b'P', 0xFF, 0xD9]).is_err());
        assert!(validate_boundaries(&[0xFF, 0xD8, 0x00, 0x00]).is_err());
    }

    #[test]
    fn comment_follows_soi_and_tail_is_untouched() {
        let jpeg = minimal_jpeg();
        let payload = [0x42; 32];
        let out = insert_comment_segment(&jpeg, &payload).unwrap();

        assert_eq!(&out[..2], &SOI);
        assert_eq!(&out[2..4], &COM);
        assert_eq!(u16::from_be_bytes([out[4], out[5]]), 34);
        assert_eq!(&out[6..38], &payload);
        assert_eq!(&out[38..], &jpeg[2..]);
    }

    #[test]
    fn payload_limit_is_enforced() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xD9];
        assert!(insert_comment_segment(&jpeg, &vec![0u8; MAX_COMMENT_PAYLOAD]).is_ok());

        let err = insert_comment_segment(&jpeg, &vec![0u8; 65534]).unwrap_err();
        assert!(matches!(err, SpoofError::Format(_)));
    }

    #[test]
    fn max_payload_fills_length_field() {
        let segment = encode_comment_segment(&vec![1u8; MAX_COMMENT_PAYLOAD]).unwrap();
        assert_eq!(&segment[2..4], &[0xFF, 0xFF]);
    }

    #[test]
    fn removing_comment_restores_original() {
        let jpeg = minimal_jpeg();
        let out = insert_comment_segment(&jpeg, b"hello").unwrap();
        assert_eq!(remove_comment_segment(&out).unwrap(), jpeg);
        assert!(remove_comment_segment(&jpeg).is_err());
    }
}
