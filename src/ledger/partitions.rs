//! Key layout for the `drafts` partition
//!
//! - `drafts`: draft:{draft_key} -> DraftDocument (JSON)
use crate::draft::DraftKey;

const DRAFT_PREFIX: &str = "draft:";

/// Encode a draft key: draft:{draft_key}
pub fn encode_draft_key(key: &DraftKey) -> Vec<u8> {
    format!("{DRAFT_PREFIX}{key}").into_bytes()
}

/// Prefix covering every draft entry
pub fn draft_prefix() -> &'static [u8] {
    DRAFT_PREFIX.as_bytes()
}

/// Decode a draft key: draft:{draft_key} -> draft_key
pub fn decode_draft_key(key: &[u8]) -> Option<DraftKey> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str
        .strip_prefix(DRAFT_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(DraftKey::from_raw)
}
