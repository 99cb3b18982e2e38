use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info, warn};

use super::item::{PhotoBlob, PhotoFile, PhotoItem};
use super::preview::PreviewRegistry;
use super::{PhotoError, Result};
use crate::draft::{DraftKey, ItemKey, PhotoId, PhotoRef, Stage};
use crate::storage::{BlobError, BlobStore};

/// Result of attaching a photo
#[derive(Debug)]
pub enum AttachOutcome {
    /// Payload is in the blob store and the item carries a [`PhotoRef`]
    Stored(PhotoItem),
    /// The device refused the payload; the item is usable but pending
    Unsaved { item: PhotoItem, error: BlobError },
}

impl AttachOutcome {
    pub fn item(&self) -> &PhotoItem {
        match self {
            AttachOutcome::Stored(item) | AttachOutcome::Unsaved { item, .. } => item,
        }
    }

    pub fn into_item(self) -> PhotoItem {
        match self {
            AttachOutcome::Stored(item) | AttachOutcome::Unsaved { item, .. } => item,
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, AttachOutcome::Stored(_))
    }
}

/// Photos rebuilt from a stored draft
#[derive(Debug, Default)]
pub struct Rehydrated {
    pub photos: BTreeMap<ItemKey, Vec<PhotoItem>>,
    /// References whose blob was missing or unreadable
    pub dropped: Vec<PhotoId>,
}

/// Moves photo payloads between the form and the blob store
pub struct PhotoManager {
    blobs: Arc<dyn BlobStore>,
    previews: Arc<PreviewRegistry>,
    seq: AtomicU32,
}

impl PhotoManager {
    pub fn new(blobs: Arc<dyn BlobStore>, previews: Arc<PreviewRegistry>) -> Self {
        Self {
            blobs,
            previews,
            seq: AtomicU32::new(0),
        }
    }

    pub fn previews(&self) -> &Arc<PreviewRegistry> {
        &self.previews
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Attach a picked file to a checklist slot
    ///
    /// The returned item is displayable immediately. When the blob store is
    /// full or unavailable the item comes back as [`AttachOutcome::Unsaved`]
    /// instead of failing, so the form keeps working.
    pub async fn attach(
        &self,
        key: &DraftKey,
        item: &ItemKey,
        stage: Stage,
        file: PhotoFile,
    ) -> Result<AttachOutcome> {
        if file.bytes.is_empty() {
            return Err(PhotoError::Empty(file.name));
        }
        let mime_type = resolve_mime(&file)?;

        let now = Utc::now();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let id = PhotoId::new(item, now.timestamp_millis(), seq, &file.name);
        let storage_key = key.storage_key(&id);
        let byte_size = file.bytes.len() as u64;

        let put = self.blobs.put(&storage_key, file.bytes.clone()).await;
        let photo_ref = match put {
            Ok(()) => Some(PhotoRef {
                id: id.clone(),
                storage_key,
                remark: None,
                original_name: file.name.clone(),
                mime_type: mime_type.clone(),
                byte_size,
                last_modified: file.last_modified.unwrap_or(now),
                stage,
            }),
            Err(e) if e.is_local_storage_failure() => {
                warn!(draft_key = %key, photo_id = %id, error = %e, "Photo kept in memory only");
                let blob = PhotoBlob {
                    bytes: file.bytes.clone(),
                    name: file.name,
                    mime_type,
                };
                let preview = self.previews.acquire(&id, blob.bytes.clone());
                let item = PhotoItem::new(id, item.clone(), stage, blob, None, preview);
                return Ok(AttachOutcome::Unsaved { item, error: e });
            }
            Err(e) => return Err(e.into()),
        };

        info!(draft_key = %key, item = %item, photo_id = %id, size = byte_size, "Photo attached");

        let blob = PhotoBlob {
            bytes: file.bytes,
            name: file.name,
            mime_type,
        };
        let preview = self.previews.acquire(&id, blob.bytes.clone());
        Ok(AttachOutcome::Stored(PhotoItem::new(
            id,
            item.clone(),
            stage,
            blob,
            photo_ref,
            preview,
        )))
    }

    /// Retry storing a pending item's payload; no-op for durable items
    pub async fn persist_pending(&self, key: &DraftKey, item: &mut PhotoItem) -> Result<()> {
        if item.is_durable() {
            return Ok(());
        }
        let payload = item
            .payload
            .as_ref()
            .ok_or_else(|| PhotoError::NotFound(item.id.clone()))?;

        let storage_key = key.storage_key(&item.id);
        self.blobs.put(&storage_key, payload.bytes.clone()).await?;

        let photo_ref = PhotoRef {
            id: item.id.clone(),
            storage_key,
            remark: None,
            original_name: payload.name.clone(),
            mime_type: payload.mime_type.clone(),
            byte_size: payload.bytes.len() as u64,
            last_modified: Utc::now(),
            stage: item.stage,
        };
        item.attach_ref(photo_ref);
        debug!(draft_key = %key, photo_id = %item.id, "Pending photo stored");
        Ok(())
    }

    /// Remove one photo from `photos`, deleting its blob first
    ///
    /// If the blob delete fails the item stays in `photos` untouched and the
    /// error is returned.
    pub async fn detach(
        &self,
        key: &DraftKey,
        photos: &mut Vec<PhotoItem>,
        id: &PhotoId,
    ) -> Result<()> {
        let index = photos
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| PhotoError::NotFound(id.clone()))?;

        let storage_key = photos[index]
            .photo_ref
            .as_ref()
            .map(|r| r.storage_key.clone())
            .unwrap_or_else(|| key.storage_key(id));

        if let Err(e) = self.blobs.delete(&storage_key).await {
            warn!(draft_key = %key, photo_id = %id, error = %e, "Blob delete failed, keeping reference");
            return Err(e.into());
        }

        let mut removed = photos.remove(index);
        removed.release_preview();
        info!(draft_key = %key, photo_id = %id, "Photo detached");
        Ok(())
    }

    /// Swap one photo for a new file in the same slot and position
    ///
    /// The new photo is attached before the old one is detached. If the old
    /// blob cannot be deleted both photos stay and the error is returned.
    pub async fn replace(
        &self,
        key: &DraftKey,
        photos: &mut Vec<PhotoItem>,
        old: &PhotoId,
        file: PhotoFile,
    ) -> Result<PhotoId> {
        let (index, item_key, stage) = photos
            .iter()
            .enumerate()
            .find(|(_, p)| &p.id == old)
            .map(|(i, p)| (i, p.item.clone(), p.stage))
            .ok_or_else(|| PhotoError::NotFound(old.clone()))?;

        let replacement = self.attach(key, &item_key, stage, file).await?.into_item();
        let new_id = replacement.id.clone();
        photos.insert(index + 1, replacement);

        self.detach(key, photos, old).await?;
        Ok(new_id)
    }

    /// Rebuild display-ready items for every stored reference
    ///
    /// A reference whose blob is missing or unreadable is dropped from the
    /// result and reported in [`Rehydrated::dropped`]; the rest load normally.
    pub async fn rehydrate(
        &self,
        key: &DraftKey,
        refs: &BTreeMap<ItemKey, Vec<PhotoRef>>,
    ) -> Rehydrated {
        let mut rehydrated = Rehydrated::default();

        for (item_key, list) in refs {
            let mut items = Vec::with_capacity(list.len());

            for photo_ref in list {
                let bytes = match self.blobs.get(&photo_ref.storage_key).await {
                    Ok(Some(bytes)) => bytes,
                    Ok(None) => {
                        warn!(draft_key = %key, photo_id = %photo_ref.id, "Photo blob missing, dropping reference");
                        rehydrated.dropped.push(photo_ref.id.clone());
                        continue;
                    }
                    Err(e) => {
                        warn!(draft_key = %key, photo_id = %photo_ref.id, error = %e, "Photo blob unreadable, dropping reference");
                        rehydrated.dropped.push(photo_ref.id.clone());
                        continue;
                    }
                };

                let blob = PhotoBlob {
                    bytes,
                    name: photo_ref.original_name.clone(),
                    mime_type: photo_ref.mime_type.clone(),
                };
                let preview = self.previews.acquire(&photo_ref.id, blob.bytes.clone());
                items.push(PhotoItem::new(
                    photo_ref.id.clone(),
                    item_key.clone(),
                    photo_ref.stage,
                    blob,
                    Some(photo_ref.clone()),
                    preview,
                ));
            }

            if !items.is_empty() {
                rehydrated.photos.insert(item_key.clone(), items);
            }
        }

        debug!(
            draft_key = %key,
            restored = rehydrated.photos.values().map(Vec::len).sum::<usize>(),
            dropped = rehydrated.dropped.len(),
            "Photos rehydrated"
        );
        rehydrated
    }
}

/// Content type for a picked file; only images are accepted
fn resolve_mime(file: &PhotoFile) -> Result<String> {
    let not_an_image = |mime_type: String| PhotoError::NotAnImage {
        name: file.name.clone(),
        mime_type,
    };

    let mime: mime::Mime = match &file.mime_type {
        Some(declared) => declared
            .parse()
            .map_err(|_| not_an_image(declared.clone()))?,
        None => guess_from_name(&file.name),
    };

    if mime.type_() != mime::IMAGE {
        return Err(not_an_image(mime.essence_str().to_string()));
    }
    Ok(mime.essence_str().to_string())
}

fn guess_from_name(name: &str) -> mime::Mime {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let guessed = match extension.as_str() {
        "jpg" | "jpeg" => Some(mime::IMAGE_JPEG),
        "png" => Some(mime::IMAGE_PNG),
        "gif" => Some(mime::IMAGE_GIF),
        "bmp" => Some(mime::IMAGE_BMP),
        "webp" => "image/webp".parse().ok(),
        "heic" => "image/heic".parse().ok(),
        _ => None,
    };
    guessed.unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FlakyBlobStore, ObjectBlobStore, PutFailure};
    use bytes::Bytes;

    fn draft_key() -> DraftKey {
        DraftKey::derive("pmDraft", "STATION-42", None).unwrap()
    }

    fn jpeg(name: &str, body: &'static [u8]) -> PhotoFile {
        PhotoFile::builder()
            .name(name)
            .bytes(Bytes::from_static(body))
            .build()
    }

    fn manager_with(blobs: Arc<dyn BlobStore>) -> PhotoManager {
        PhotoManager::new(blobs, PreviewRegistry::new())
    }

    #[tokio::test]
    async fn test_attach_stores_blob_and_ref() {
        let blobs: Arc<dyn BlobStore> = Arc::new(ObjectBlobStore::in_memory());
        let manager = manager_with(blobs.clone());
        let key = draft_key();

        let outcome = manager
            .attach(&key, &ItemKey::leaf("7"), Stage::Pre, jpeg("a.jpg", b"abc"))
            .await
            .unwrap();
        assert!(outcome.is_stored());

        let item = outcome.into_item();
        let photo_ref = item.photo_ref.clone().unwrap();
        assert!(item.id.as_str().starts_with("7-"));
        assert!(item.id.as_str().ends_with("-0-a.jpg"));
        assert_eq!(photo_ref.mime_type, "image/jpeg");
        assert_eq!(photo_ref.byte_size, 3);
        assert_eq!(photo_ref.storage_key, key.storage_key(&item.id));
        assert!(item.preview().is_some());
        assert_eq!(manager.previews().live(), 1);

        let stored = blobs.get(&photo_ref.storage_key).await.unwrap().unwrap();
        assert_eq!(stored.as_ref(), b"abc");
    }

    #[tokio::test]
    async fn test_attach_rejects_non_images() {
        let manager = manager_with(Arc::new(ObjectBlobStore::in_memory()));
        let key = draft_key();

        let err = manager
            .attach(&key, &ItemKey::leaf("1"), Stage::Pre, jpeg("notes.txt", b"hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, PhotoError::NotAnImage { .. }));

        let declared = PhotoFile::builder()
            .name("scan")
            .bytes(Bytes::from_static(b"%PDF"))
            .mime_type("application/pdf")
            .build();
        let err = manager
            .attach(&key, &ItemKey::leaf("1"), Stage::Pre, declared)
            .await
            .unwrap_err();
        assert!(matches!(err, PhotoError::NotAnImage { .. }));

        let err = manager
            .attach(&key, &ItemKey::leaf("1"), Stage::Pre, jpeg("empty.jpg", b""))
            .await
            .unwrap_err();
        assert!(matches!(err, PhotoError::Empty(_)));
        assert_eq!(manager.previews().live(), 0);
    }

    #[tokio::test]
    async fn test_attach_on_full_store_keeps_pending_item() {
        let flaky = Arc::new(FlakyBlobStore::new(Arc::new(ObjectBlobStore::in_memory())));
        flaky.fail_puts(PutFailure::QuotaExceeded);
        let manager = manager_with(flaky.clone());
        let key = draft_key();

        let outcome = manager
            .attach(&key, &ItemKey::leaf("3"), Stage::Pre, jpeg("b.png", b"png"))
            .await
            .unwrap();

        let AttachOutcome::Unsaved { mut item, error } = outcome else {
            panic!("expected unsaved outcome");
        };
        assert!(matches!(error, BlobError::QuotaExceeded(_)));
        assert!(!item.is_durable());
        assert!(item.payload.is_some());

        flaky.heal();
        manager.persist_pending(&key, &mut item).await.unwrap();
        assert!(item.is_durable());
        assert_eq!(item.photo_ref.as_ref().unwrap().mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_detach_deletes_blob_then_drops_item() {
        let blobs: Arc<dyn BlobStore> = Arc::new(ObjectBlobStore::in_memory());
        let manager = manager_with(blobs.clone());
        let key = draft_key();

        let item = manager
            .attach(&key, &ItemKey::leaf("7"), Stage::Pre, jpeg("a.jpg", b"abc"))
            .await
            .unwrap()
            .into_item();
        let id = item.id.clone();
        let storage_key = item.photo_ref.as_ref().unwrap().storage_key.clone();
        let mut photos = vec![item];

        manager.detach(&key, &mut photos, &id).await.unwrap();

        assert!(photos.is_empty());
        assert!(blobs.get(&storage_key).await.unwrap().is_none());
        assert_eq!(manager.previews().live(), 0);
    }

    #[tokio::test]
    async fn test_failed_blob_delete_keeps_reference() {
        let flaky = Arc::new(FlakyBlobStore::new(Arc::new(ObjectBlobStore::in_memory())));
        let manager = manager_with(flaky.clone());
        let key = draft_key();

        let item = manager
            .attach(&key, &ItemKey::leaf("7"), Stage::Pre, jpeg("a.jpg", b"abc"))
            .await
            .unwrap()
            .into_item();
        let id = item.id.clone();
        let mut photos = vec![item];

        flaky.fail_delete_of(id.as_str());
        let err = manager.detach(&key, &mut photos, &id).await.unwrap_err();

        assert!(matches!(err, PhotoError::Blob(_)));
        assert_eq!(photos.len(), 1);
        assert!(photos[0].is_durable());
        assert_eq!(manager.previews().live(), 1);
    }

    #[tokio::test]
    async fn test_detach_unknown_photo() {
        let manager = manager_with(Arc::new(ObjectBlobStore::in_memory()));
        let mut photos = Vec::new();
        let err = manager
            .detach(&draft_key(), &mut photos, &PhotoId::from_raw("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, PhotoError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_replace_keeps_position() {
        let manager = manager_with(Arc::new(ObjectBlobStore::in_memory()));
        let key = draft_key();
        let slot = ItemKey::leaf("2");

        let mut photos = Vec::new();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            let item = manager
                .attach(&key, &slot, Stage::Post, jpeg(name, b"x"))
                .await
                .unwrap()
                .into_item();
            photos.push(item);
        }
        let old = photos[1].id.clone();

        let new_id = manager
            .replace(&key, &mut photos, &old, jpeg("d.jpg", b"y"))
            .await
            .unwrap();

        let names: Vec<_> = photos.iter().map(|p| p.file_name().unwrap().to_string()).collect();
        assert_eq!(names, vec!["a.jpg", "d.jpg", "c.jpg"]);
        assert_eq!(photos[1].id, new_id);
        assert_eq!(photos[1].stage, Stage::Post);
        assert_eq!(manager.previews().live(), 3);
    }

    #[tokio::test]
    async fn test_rehydrate_drops_missing_blobs() {
        let blobs: Arc<dyn BlobStore> = Arc::new(ObjectBlobStore::in_memory());
        let manager = manager_with(blobs.clone());
        let key = draft_key();

        let mut refs: BTreeMap<ItemKey, Vec<PhotoRef>> = BTreeMap::new();
        for (slot, name) in [("1", "a.jpg"), ("1", "b.jpg"), ("2", "c.jpg")] {
            let item = manager
                .attach(&key, &ItemKey::leaf(slot), Stage::Pre, jpeg(name, b"data"))
                .await
                .unwrap()
                .into_item();
            refs.entry(ItemKey::leaf(slot))
                .or_default()
                .push(item.photo_ref.clone().unwrap());
        }
        assert_eq!(manager.previews().live(), 0);

        let lost = refs[&ItemKey::leaf("2")][0].clone();
        blobs.delete(&lost.storage_key).await.unwrap();

        let rehydrated = manager.rehydrate(&key, &refs).await;
        assert_eq!(rehydrated.dropped, vec![lost.id]);
        assert_eq!(rehydrated.photos.len(), 1);
        assert_eq!(rehydrated.photos[&ItemKey::leaf("1")].len(), 2);
        assert_eq!(manager.previews().live(), 2);
    }

    #[tokio::test]
    async fn test_rehydrate_survives_unreadable_blob() {
        let flaky = Arc::new(FlakyBlobStore::new(Arc::new(ObjectBlobStore::in_memory())));
        let manager = manager_with(flaky.clone());
        let key = draft_key();

        let a = manager
            .attach(&key, &ItemKey::leaf("1"), Stage::Pre, jpeg("a.jpg", b"1"))
            .await
            .unwrap()
            .into_item();
        let b = manager
            .attach(&key, &ItemKey::leaf("1"), Stage::Pre, jpeg("b.jpg", b"2"))
            .await
            .unwrap()
            .into_item();

        let mut refs = BTreeMap::new();
        refs.insert(
            ItemKey::leaf("1"),
            vec![a.photo_ref.clone().unwrap(), b.photo_ref.clone().unwrap()],
        );
        flaky.fail_get_of(a.id.as_str());

        let rehydrated = manager.rehydrate(&key, &refs).await;
        assert_eq!(rehydrated.dropped, vec![a.id.clone()]);
        assert_eq!(rehydrated.photos[&ItemKey::leaf("1")][0].id, b.id);
    }

    #[tokio::test]
    async fn test_rehydrate_twice_is_identical() {
        let manager = manager_with(Arc::new(ObjectBlobStore::in_memory()));
        let key = draft_key();

        let mut item = manager
            .attach(&key, &ItemKey::member("4", "2"), Stage::Pre, jpeg("a.jpg", b"payload"))
            .await
            .unwrap()
            .into_item();
        item.set_remark("corroded terminal");

        let mut refs = BTreeMap::new();
        refs.insert(ItemKey::member("4", "2"), vec![item.photo_ref.clone().unwrap()]);

        let first = manager.rehydrate(&key, &refs).await;
        let second = manager.rehydrate(&key, &refs).await;

        let describe = |r: &Rehydrated| -> Vec<(String, String, Bytes)> {
            r.photos
                .values()
                .flatten()
                .map(|p| {
                    (
                        p.id.to_string(),
                        p.remark.clone(),
                        p.payload.as_ref().unwrap().bytes.clone(),
                    )
                })
                .collect()
        };
        assert_eq!(describe(&first), describe(&second));
        assert_eq!(describe(&first)[0].1, "corroded terminal");
    }

    #[test]
    fn test_guess_from_name() {
        assert_eq!(guess_from_name("A.JPEG"), mime::IMAGE_JPEG);
        assert_eq!(guess_from_name("x.webp").essence_str(), "image/webp");
        assert_eq!(guess_from_name("noext"), mime::APPLICATION_OCTET_STREAM);
    }
}
