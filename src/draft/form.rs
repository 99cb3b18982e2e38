use std::collections::BTreeMap;

use super::key::{ItemKey, PhotoId};
use super::model::{Answer, DraftDocument, Measurement};
use crate::photos::PhotoItem;

/// Read access the completeness gate needs, over either live form state or a
/// stored document
pub trait FormView {
    /// Photos attached to a slot, pending or durable
    fn photo_count(&self, item: &ItemKey) -> usize;

    fn answer(&self, item: &ItemKey) -> Option<&Answer>;

    fn measurement(&self, group: &str, field: &str) -> Option<&Measurement>;

    fn free_text(&self, section: &str) -> Option<&str>;
}

/// Live in-memory form state; authoritative until the next successful save
#[derive(Debug, Default)]
pub struct FormState {
    pub answers: BTreeMap<ItemKey, Answer>,
    pub measurements: BTreeMap<String, BTreeMap<String, Measurement>>,
    pub free_text: BTreeMap<String, String>,
    pub flags: BTreeMap<String, bool>,
    pub photos: BTreeMap<ItemKey, Vec<PhotoItem>>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splice a stored document and its rehydrated photos into a fresh form
    pub fn from_parts(document: DraftDocument, photos: BTreeMap<ItemKey, Vec<PhotoItem>>) -> Self {
        Self {
            answers: document.answers,
            measurements: document.measurements,
            free_text: document.free_text,
            flags: document.flags,
            photos,
        }
    }

    /// Serializable view of the form: photo references only, no payloads or
    /// previews. Pending photos (no reference yet) are left out.
    pub fn snapshot(&self) -> DraftDocument {
        let photo_refs = self
            .photos
            .iter()
            .filter_map(|(key, items)| {
                let refs: Vec<_> = items
                    .iter()
                    .filter_map(|item| item.photo_ref.clone())
                    .collect();
                (!refs.is_empty()).then(|| (key.clone(), refs))
            })
            .collect();

        DraftDocument {
            answers: self.answers.clone(),
            measurements: self.measurements.clone(),
            free_text: self.free_text.clone(),
            photo_refs,
            flags: self.flags.clone(),
        }
    }

    pub fn photo_ids(&self) -> Vec<PhotoId> {
        self.photos
            .values()
            .flatten()
            .map(|item| item.id.clone())
            .collect()
    }

    pub fn find_photo_mut(&mut self, item: &ItemKey, id: &PhotoId) -> Option<&mut PhotoItem> {
        self.photos.get_mut(item)?.iter_mut().find(|p| &p.id == id)
    }

    pub fn set_answer(&mut self, item: ItemKey, status: impl Into<String>) {
        self.answers.entry(item).or_default().status = status.into();
    }

    pub fn set_answer_remark(&mut self, item: ItemKey, remark: impl Into<String>) {
        self.answers.entry(item).or_default().remark = remark.into();
    }

    pub fn set_measurement(
        &mut self,
        group: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
        unit: impl Into<String>,
    ) {
        self.measurements
            .entry(group.into())
            .or_default()
            .insert(field.into(), Measurement::new(value, unit));
    }

    pub fn set_free_text(&mut self, section: impl Into<String>, text: impl Into<String>) {
        self.free_text.insert(section.into(), text.into());
    }

    pub fn set_flag(&mut self, flag: impl Into<String>, value: bool) {
        self.flags.insert(flag.into(), value);
    }

    /// Release every preview handle the form holds (view unmount)
    pub fn release_previews(&mut self) {
        for item in self.photos.values_mut().flatten() {
            item.release_preview();
        }
    }
}

impl FormView for FormState {
    fn photo_count(&self, item: &ItemKey) -> usize {
        self.photos.get(item).map_or(0, Vec::len)
    }

    fn answer(&self, item: &ItemKey) -> Option<&Answer> {
        self.answers.get(item)
    }

    fn measurement(&self, group: &str, field: &str) -> Option<&Measurement> {
        self.measurements.get(group)?.get(field)
    }

    fn free_text(&self, section: &str) -> Option<&str> {
        self.free_text.get(section).map(String::as_str)
    }
}

impl FormView for DraftDocument {
    fn photo_count(&self, item: &ItemKey) -> usize {
        self.photo_refs.get(item).map_or(0, Vec::len)
    }

    fn answer(&self, item: &ItemKey) -> Option<&Answer> {
        self.answers.get(item)
    }

    fn measurement(&self, group: &str, field: &str) -> Option<&Measurement> {
        self.measurements.get(group)?.get(field)
    }

    fn free_text(&self, section: &str) -> Option<&str> {
        self.free_text.get(section).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_carries_structured_state() {
        let mut form = FormState::new();
        form.set_answer(ItemKey::leaf("1"), "PASS");
        form.set_answer_remark(ItemKey::leaf("1"), "ok");
        form.set_measurement("9", "L1-N", "230", "V");
        form.set_free_text("summary", "done");
        form.set_flag("postEdit", false);

        let doc = form.snapshot();
        assert_eq!(doc.answers[&ItemKey::leaf("1")].remark, "ok");
        assert_eq!(doc.measurements["9"]["L1-N"].value, "230");
        assert_eq!(doc.free_text["summary"], "done");
        assert_eq!(doc.flags["postEdit"], false);
        assert!(doc.photo_refs.is_empty());
    }

    #[test]
    fn test_document_view_reads_refs() {
        let mut doc = DraftDocument::default();
        doc.answers.insert(ItemKey::leaf("2"), Answer::new("NA"));
        assert_eq!(FormView::photo_count(&doc, &ItemKey::leaf("2")), 0);
        assert_eq!(
            FormView::answer(&doc, &ItemKey::leaf("2")).unwrap().status,
            "NA"
        );
        assert!(FormView::measurement(&doc, "9", "L1-N").is_none());
    }
}
