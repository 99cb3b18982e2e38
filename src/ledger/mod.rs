/// Fjall-backed persistence for draft documents
///
/// Each draft is one JSON document under `draft:{draft_key}` in the `drafts`
/// partition, overwritten wholesale on every save. Binary photo payloads never
/// land here; see [`crate::storage`].
///
/// ## Usage
///
/// ```rust,ignore
/// use pmdraft::ledger::{FjallMetadataStore, MetadataStore};
///
/// let store = FjallMetadataStore::open("data/drafts")?;
/// store.save(&key, &document).await?;
/// let restored = store.load(&key).await?;
/// ```
pub mod error;
mod memory;
pub mod partitions;
pub mod store;

pub use error::{LedgerError, Result};
pub use memory::MemoryMetadataStore;
pub use store::{FjallMetadataStore, MetadataStore, StoreStats};
