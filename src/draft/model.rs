use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::key::{ItemKey, PhotoId};

/// Report stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Pre,
    Post,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Pre => "pre",
            Stage::Post => "post",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pre" => Ok(Stage::Pre),
            "post" => Ok(Stage::Post),
            other => Err(format!("unknown stage: {other}")),
        }
    }
}

/// PASS/FAIL/NA style answer for one checklist slot
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub remark: String,
}

impl Answer {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            remark: String::new(),
        }
    }
}

/// One numeric reading, kept as typed text until submission
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub unit: String,
}

impl Measurement {
    pub fn new(value: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            unit: unit.into(),
        }
    }
}

/// Durable pointer to a photo payload held in the blob store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef {
    pub id: PhotoId,
    pub storage_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    pub original_name: String,
    pub mime_type: String,
    pub byte_size: u64,
    pub last_modified: DateTime<Utc>,
    /// Stage the photo was taken in; photos upload grouped by stage
    #[serde(default)]
    pub stage: Stage,
}

/// Everything persisted for one draft, replaced wholesale on every save
///
/// Contains no binary payloads: photos are present only as [`PhotoRef`]s.
/// Photo lists keep attachment order; every other map is order-irrelevant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DraftDocument {
    #[serde(default)]
    pub answers: BTreeMap<ItemKey, Answer>,
    /// group id -> field id -> reading
    #[serde(default)]
    pub measurements: BTreeMap<String, BTreeMap<String, Measurement>>,
    /// section id -> text (remarks, summary, technician notes)
    #[serde(default)]
    pub free_text: BTreeMap<String, String>,
    #[serde(default)]
    pub photo_refs: BTreeMap<ItemKey, Vec<PhotoRef>>,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
}

impl DraftDocument {
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
            && self.measurements.is_empty()
            && self.free_text.is_empty()
            && self.photo_refs.values().all(Vec::is_empty)
            && self.flags.is_empty()
    }

    /// Every photo id referenced by this document, in slot then attachment order
    pub fn photo_ids(&self) -> Vec<PhotoId> {
        self.photo_refs
            .values()
            .flatten()
            .map(|photo| photo.id.clone())
            .collect()
    }

    pub fn photo_count(&self) -> usize {
        self.photo_refs.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn photo_ref(id: &str, stage: Stage) -> PhotoRef {
        PhotoRef {
            id: PhotoId::from_raw(id),
            storage_key: format!("pmDraft:S/{id}"),
            remark: None,
            original_name: "a.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            byte_size: 3,
            last_modified: Utc.timestamp_millis_opt(1_712_340_000_123).unwrap(),
            stage,
        }
    }

    fn sample_document() -> DraftDocument {
        let mut doc = DraftDocument::default();
        doc.answers.insert(
            ItemKey::leaf("1"),
            Answer {
                status: "PASS".to_string(),
                remark: "clean".to_string(),
            },
        );
        doc.answers
            .insert(ItemKey::member("4", "2"), Answer::new("NA"));
        doc.measurements
            .entry("9".to_string())
            .or_default()
            .insert("L1-N".to_string(), Measurement::new("229.5", "V"));
        doc.free_text
            .insert("summary".to_string(), "All good".to_string());
        doc.photo_refs.insert(
            ItemKey::leaf("7"),
            vec![
                photo_ref("7-2-0-b.jpg", Stage::Post),
                photo_ref("7-1-0-a.jpg", Stage::Pre),
            ],
        );
        doc.flags.insert("postEdit".to_string(), false);
        doc
    }

    #[test]
    fn test_document_json_round_trip() {
        let doc = sample_document();
        let json = serde_json::to_vec(&doc).unwrap();
        let back: DraftDocument = serde_json::from_slice(&json).unwrap();

        assert_eq!(back, doc);
        // Attachment order survives, not sorted by id
        let ids: Vec<_> = back.photo_refs[&ItemKey::leaf("7")]
            .iter()
            .map(|p| p.id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["7-2-0-b.jpg", "7-1-0-a.jpg"]);
    }

    #[test]
    fn test_missing_sections_default() {
        let doc: DraftDocument = serde_json::from_str(r#"{"answers":{"1":{"status":"FAIL"}}}"#).unwrap();
        assert_eq!(doc.answers[&ItemKey::leaf("1")].status, "FAIL");
        assert!(doc.photo_refs.is_empty());
        assert!(!doc.is_empty());
        assert!(DraftDocument::default().is_empty());
    }

    #[test]
    fn test_photo_ids_and_count() {
        let doc = sample_document();
        assert_eq!(doc.photo_count(), 2);
        assert_eq!(doc.photo_ids()[0].as_str(), "7-2-0-b.jpg");
    }

    #[test]
    fn test_stage_parse() {
        assert_eq!("POST".parse::<Stage>().unwrap(), Stage::Post);
        assert!("mid".parse::<Stage>().is_err());
        assert_eq!(Stage::default(), Stage::Pre);
    }
}
