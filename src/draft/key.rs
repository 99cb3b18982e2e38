//! Identifiers threaded through every draft component
//!
//! - [`DraftKey`] - one in-progress report instance (`{prefix}:{station}[:{report}]`)
//! - [`ItemKey`] - one checklist slot, either a plain item or a member of a group
//! - [`PhotoId`] - one attached photo, human-traceable back to its slot
//!
//! Blobs live under `{draft_key}/{photo_id}` in the blob store.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between a group id and a member id in the string form of [`ItemKey`]
pub const GROUP_SEPARATOR: &str = "::";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("station id must not be empty")]
    EmptyStation,

    #[error("draft key prefix must be non-empty and must not contain ':' (got {0:?})")]
    InvalidPrefix(String),

    #[error("station id and report must not contain ':' (got {0:?})")]
    SeparatorInPart(String),

    #[error("malformed group member key: {0:?}")]
    MalformedGroupMember(String),

    #[error("bad escape in item key: {0:?}")]
    BadEscape(String),
}

/// Opaque key for one draft in the metadata store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftKey(String);

impl DraftKey {
    /// Derive the key for a station, optionally narrowed to one report.
    ///
    /// The same `(prefix, station, report)` triple always yields the same key,
    /// and different stations never share one.
    pub fn derive(prefix: &str, station_id: &str, report: Option<&str>) -> Result<Self, KeyError> {
        if prefix.is_empty() || prefix.contains(':') {
            return Err(KeyError::InvalidPrefix(prefix.to_string()));
        }

        let station = station_id.trim();
        if station.is_empty() {
            return Err(KeyError::EmptyStation);
        }
        if station.contains(':') {
            return Err(KeyError::SeparatorInPart(station.to_string()));
        }

        let key = match report.map(str::trim).filter(|r| !r.is_empty()) {
            Some(report) if report.contains(':') => {
                return Err(KeyError::SeparatorInPart(report.to_string()));
            }
            Some(report) => format!("{prefix}:{station}:{report}"),
            None => format!("{prefix}:{station}"),
        };

        Ok(Self(key))
    }

    /// Mint a discriminator for a brand-new report on a station
    pub fn fresh_discriminator() -> String {
        uuid::Uuid::now_v7().to_string()
    }

    /// Wrap a key read back from storage
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blob store key for one photo of this draft
    pub fn storage_key(&self, photo: &PhotoId) -> String {
        format!("{}/{}", self.0, photo.as_str())
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checklist slot a photo, answer or remark belongs to
///
/// Serialized as `"7"` for a leaf and `"4::2"` for member `2` of group `4`,
/// so it can be used directly as a JSON object key. `%` and `:` inside an id
/// are escaped as `%25` and `%3A`, so every key reads back as itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ItemKey {
    Leaf(String),
    GroupMember { group: String, member: String },
}

impl ItemKey {
    pub fn leaf(id: impl Into<String>) -> Self {
        ItemKey::Leaf(id.into())
    }

    pub fn member(group: impl Into<String>, member: impl Into<String>) -> Self {
        ItemKey::GroupMember {
            group: group.into(),
            member: member.into(),
        }
    }

    /// Short form used inside photo ids (`7`, `4.2`)
    pub fn slug(&self) -> String {
        match self {
            ItemKey::Leaf(id) => id.clone(),
            ItemKey::GroupMember { group, member } => format!("{group}.{member}"),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Leaf(id) => f.write_str(&escape_id(id)),
            ItemKey::GroupMember { group, member } => {
                write!(f, "{}{GROUP_SEPARATOR}{}", escape_id(group), escape_id(member))
            }
        }
    }
}

impl FromStr for ItemKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.contains(':') {
            return Ok(ItemKey::Leaf(unescape_id(s)?));
        }

        match s.split_once(GROUP_SEPARATOR) {
            Some((group, member)) if !group.contains(':') && !member.contains(':') => {
                Ok(ItemKey::member(unescape_id(group)?, unescape_id(member)?))
            }
            _ => Err(KeyError::MalformedGroupMember(s.to_string())),
        }
    }
}

fn escape_id(id: &str) -> Cow<'_, str> {
    if id.contains(['%', ':']) {
        Cow::Owned(id.replace('%', "%25").replace(':', "%3A"))
    } else {
        Cow::Borrowed(id)
    }
}

fn unescape_id(raw: &str) -> Result<String, KeyError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(at) = rest.find('%') {
        out.push_str(&rest[..at]);
        let escape = rest.get(at..at + 3);
        match escape {
            Some("%25") => out.push('%'),
            Some("%3A") | Some("%3a") => out.push(':'),
            _ => return Err(KeyError::BadEscape(raw.to_string())),
        }
        rest = &rest[at + 3..];
    }
    out.push_str(rest);
    Ok(out)
}

impl TryFrom<String> for ItemKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ItemKey> for String {
    fn from(key: ItemKey) -> Self {
        key.to_string()
    }
}

/// Identifier of one attached photo: `{item}-{millis}-{seq}-{filename}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(String);

impl PhotoId {
    pub fn new(item: &ItemKey, attached_at_millis: i64, seq: u32, original_name: &str) -> Self {
        Self(format!(
            "{}-{}-{}-{}",
            item.slug(),
            attached_at_millis,
            seq,
            sanitize_file_name(original_name)
        ))
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keep file names readable while making them safe as a single path segment
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "photo".to_string()
    } else {
        cleaned
    }
}
