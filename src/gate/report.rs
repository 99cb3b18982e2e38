use serde::Serialize;
use std::fmt;

use crate::draft::{ItemKey, Stage};

/// One unmet requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum MissingItem {
    Photo { item: ItemKey },
    Answer { item: ItemKey },
    Measurement { group: String, field: String },
    Summary { section: String },
    Verdict { item: ItemKey },
}

impl fmt::Display for MissingItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingItem::Photo { item } => write!(f, "photo for item {item}"),
            MissingItem::Answer { item } => write!(f, "answer for item {item}"),
            MissingItem::Measurement { group, field } => {
                write!(f, "measurement {field} of item {group}")
            }
            MissingItem::Summary { section } => write!(f, "summary text ({section})"),
            MissingItem::Verdict { item } => write!(f, "final verdict ({item})"),
        }
    }
}

/// Result of one predicate category, unmet items in schema order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletenessReport {
    pub ok: bool,
    pub missing: Vec<MissingItem>,
}

impl CompletenessReport {
    pub fn from_missing(missing: Vec<MissingItem>) -> Self {
        Self {
            ok: missing.is_empty(),
            missing,
        }
    }

    pub fn satisfied() -> Self {
        Self::from_missing(Vec::new())
    }
}

/// Every predicate for one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub photos: CompletenessReport,
    pub answers: CompletenessReport,
    pub measurements: CompletenessReport,
    pub summary: CompletenessReport,
}

impl StageReport {
    /// Guard for `pre -> post`
    pub fn can_advance(&self) -> bool {
        self.photos.ok && self.measurements.ok
    }

    /// Guard for `post -> submitted`
    pub fn can_submit(&self) -> bool {
        self.photos.ok && self.answers.ok && self.measurements.ok && self.summary.ok
    }

    /// All unmet items, category by category, each in schema order
    pub fn missing(&self) -> Vec<&MissingItem> {
        [&self.photos, &self.answers, &self.measurements, &self.summary]
            .into_iter()
            .flat_map(|report| report.missing.iter())
            .collect()
    }

    /// Unmet items that block `pre -> post`
    pub fn advance_blockers(&self) -> Vec<&MissingItem> {
        self.photos
            .missing
            .iter()
            .chain(self.measurements.missing.iter())
            .collect()
    }
}
