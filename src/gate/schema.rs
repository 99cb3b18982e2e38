use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::draft::{GROUP_SEPARATOR, ItemKey, Stage};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read checklist {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse checklist: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate checklist item: {0}")]
    DuplicateItem(String),

    #[error("item id {0:?} is empty or contains '::'")]
    InvalidItemId(String),

    #[error("group item {0} has no members")]
    EmptyGroup(String),

    #[error("measure item {0} has no measurement fields")]
    NoMeasurementFields(String),

    #[error("checklist accepts no answer statuses")]
    NoAcceptedStatuses,

    #[error("summary section name is empty")]
    EmptySummarySection,
}

pub type Result<T> = std::result::Result<T, SchemaError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Simple,
    Measure,
    Group,
}

/// One checklist row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSpec {
    pub id: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub measurement_fields: Vec<String>,
    #[serde(default)]
    pub required_photos: bool,
    #[serde(default = "default_true")]
    pub required_in_pre_stage: bool,
}

impl ItemSpec {
    /// Photo and answer slots this row contributes, in declared order
    pub fn slots(&self) -> Vec<ItemKey> {
        match self.kind {
            ItemKind::Group => self
                .members
                .iter()
                .map(|m| ItemKey::member(self.id.as_str(), m.as_str()))
                .collect(),
            ItemKind::Simple | ItemKind::Measure => vec![ItemKey::leaf(self.id.as_str())],
        }
    }

    fn in_stage(&self, stage: Stage) -> bool {
        match stage {
            Stage::Pre => self.required_in_pre_stage,
            Stage::Post => true,
        }
    }
}

/// Free-text summary and final verdict required before submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySpec {
    pub section: String,
    #[serde(default)]
    pub verdict_item: Option<String>,
}

/// Ordered checklist definition, supplied as configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistSchema {
    pub name: String,
    #[serde(default = "default_statuses")]
    pub accepted_statuses: Vec<String>,
    #[serde(default)]
    pub summary: Option<SummarySpec>,
    #[serde(default)]
    pub items: Vec<ItemSpec>,
}

fn is_usable_id(id: &str) -> bool {
    !id.trim().is_empty() && !id.contains(GROUP_SEPARATOR)
}

fn default_true() -> bool {
    true
}

fn default_statuses() -> Vec<String> {
    ["PASS", "FAIL", "NA"].into_iter().map(String::from).collect()
}

impl ChecklistSchema {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let schema: Self = toml::from_str(raw)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.accepted_statuses.iter().all(|s| s.trim().is_empty()) {
            return Err(SchemaError::NoAcceptedStatuses);
        }

        if self
            .summary
            .as_ref()
            .is_some_and(|summary| summary.section.trim().is_empty())
        {
            return Err(SchemaError::EmptySummarySection);
        }

        let mut seen = HashSet::new();
        for item in &self.items {
            if let Some(bad) = std::iter::once(&item.id)
                .chain(&item.members)
                .find(|id| !is_usable_id(id))
            {
                return Err(SchemaError::InvalidItemId(bad.clone()));
            }
            if !seen.insert(item.id.as_str()) {
                return Err(SchemaError::DuplicateItem(item.id.clone()));
            }
            match item.kind {
                ItemKind::Group if item.members.is_empty() => {
                    return Err(SchemaError::EmptyGroup(item.id.clone()));
                }
                ItemKind::Measure if item.measurement_fields.is_empty() => {
                    return Err(SchemaError::NoMeasurementFields(item.id.clone()));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Rows that count toward the given stage
    pub fn items_for(&self, stage: Stage) -> impl Iterator<Item = &ItemSpec> {
        self.items.iter().filter(move |item| item.in_stage(stage))
    }

    pub fn photo_slots(&self, stage: Stage) -> Vec<ItemKey> {
        self.items_for(stage)
            .filter(|item| item.required_photos)
            .flat_map(ItemSpec::slots)
            .collect()
    }

    /// Simple items and group members need a status; measure rows do not
    pub fn answer_slots(&self, stage: Stage) -> Vec<ItemKey> {
        self.items_for(stage)
            .filter(|item| item.kind != ItemKind::Measure)
            .flat_map(ItemSpec::slots)
            .collect()
    }

    /// `(group, field)` pairs, group key being the measure row's id
    pub fn measurement_fields(&self, stage: Stage) -> Vec<(String, String)> {
        self.items_for(stage)
            .filter(|item| item.kind == ItemKind::Measure)
            .flat_map(|item| {
                item.measurement_fields
                    .iter()
                    .map(move |field| (item.id.clone(), field.clone()))
            })
            .collect()
    }

    pub fn accepts(&self, status: &str) -> bool {
        let status = status.trim();
        !status.is_empty() && self.accepted_statuses.iter().any(|s| s == status)
    }
}
