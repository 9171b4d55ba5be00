use std::fmt;

use crate::error::{Result, SpoofError};

/// A normalized target prefix: lowercase hex digits, no `0x` marker. An
/// empty prefix is allowed and matches any digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexPrefix(String);

impl HexPrefix {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .unwrap_or(raw);
        let normalized = trimmed.to_ascii_lowercase();

        if let Some(bad) = normalized.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(SpoofError::InvalidPrefix(format!(
                "{:?} contains non-hex character {:?}",
                raw, bad
            )));
        }
        Ok(HexPrefix(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, digest_hex: &str) -> bool {
        digest_hex.starts_with(&self.0)
    }

    /// The leading part of `digest_hex` that gets compared against the prefix.
    pub fn truncate<'a>(&self, digest_hex: &'a str) -> &'a str {
        &digest_hex[..self.0.len().min(digest_hex.len())]
    }

    /// Mean number of independent attempts before a match (16^k). Grows past
    /// anything practical after a dozen or so digits; nothing here caps it.
    pub fn expected_attempts(&self) -> f64 {
        16f64.powi(self.0.len() as i32)
    }
}

impl fmt::Display for HexPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
