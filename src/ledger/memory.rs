use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::error::Result;
use super::store::MetadataStore;
use crate::draft::{DraftDocument, DraftKey};

/// Process-local metadata store for development and tests
///
/// Documents still go through JSON so serialization failures surface the same
/// way they would against Fjall.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    drafts: RwLock<BTreeMap<DraftKey, Vec<u8>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.drafts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.drafts.read().await.is_empty()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn save(&self, key: &DraftKey, document: &DraftDocument) -> Result<()> {
        let value = serde_json::to_vec(document)?;
        self.drafts.write().await.insert(key.clone(), value);
        Ok(())
    }

    async fn load(&self, key: &DraftKey) -> Result<Option<DraftDocument>> {
        match self.drafts.read().await.get(key) {
            Some(value) => Ok(Some(serde_json::from_slice(value)?)),
            None => Ok(None),
        }
    }

    async fn clear(&self, key: &DraftKey) -> Result<()> {
        self.drafts.write().await.remove(key);
        Ok(())
    }
}
