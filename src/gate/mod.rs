//! Stage completeness predicates over a checklist schema
//!
//! Everything here is pure: the gate reads a [`FormView`] and a
//! [`ChecklistSchema`] and never touches the stores. Unmet items are listed in
//! the schema's declared order, never in the order the form was filled.

mod report;
mod schema;

pub use report::{CompletenessReport, MissingItem, StageReport};
pub use schema::{ChecklistSchema, ItemKind, ItemSpec, Result, SchemaError, SummarySpec};

use crate::draft::{FormView, ItemKey, Stage};

/// Predicates for one checklist
#[derive(Debug, Clone, Copy)]
pub struct CompletenessGate<'a> {
    schema: &'a ChecklistSchema,
}

impl<'a> CompletenessGate<'a> {
    pub fn new(schema: &'a ChecklistSchema) -> Self {
        Self { schema }
    }

    /// Every required photo slot has at least one photo, pending or durable
    pub fn photos_ok(&self, stage: Stage, form: &impl FormView) -> CompletenessReport {
        let missing = self
            .schema
            .photo_slots(stage)
            .into_iter()
            .filter(|slot| form.photo_count(slot) == 0)
            .map(|item| MissingItem::Photo { item })
            .collect();
        CompletenessReport::from_missing(missing)
    }

    /// Every answer slot holds an accepted status
    pub fn answers_ok(&self, stage: Stage, form: &impl FormView) -> CompletenessReport {
        let missing = self
            .schema
            .answer_slots(stage)
            .into_iter()
            .filter(|slot| !self.answered(form, slot))
            .map(|item| MissingItem::Answer { item })
            .collect();
        CompletenessReport::from_missing(missing)
    }

    /// Every measurement field has a non-blank value; units are not checked
    pub fn measurements_ok(&self, stage: Stage, form: &impl FormView) -> CompletenessReport {
        let missing = self
            .schema
            .measurement_fields(stage)
            .into_iter()
            .filter(|(group, field)| {
                form.measurement(group, field)
                    .is_none_or(|m| m.value.trim().is_empty())
            })
            .map(|(group, field)| MissingItem::Measurement { group, field })
            .collect();
        CompletenessReport::from_missing(missing)
    }

    /// Summary text is non-blank and the verdict, if the checklist has one,
    /// is an accepted status
    pub fn summary_ok(&self, form: &impl FormView) -> CompletenessReport {
        let Some(summary) = &self.schema.summary else {
            return CompletenessReport::satisfied();
        };

        let mut missing = Vec::new();
        if form
            .free_text(&summary.section)
            .is_none_or(|text| text.trim().is_empty())
        {
            missing.push(MissingItem::Summary {
                section: summary.section.clone(),
            });
        }
        if let Some(verdict) = &summary.verdict_item {
            let item = ItemKey::leaf(verdict.as_str());
            if !self.answered(form, &item) {
                missing.push(MissingItem::Verdict { item });
            }
        }
        CompletenessReport::from_missing(missing)
    }

    /// All four predicates; the summary only counts for `post`
    pub fn evaluate(&self, stage: Stage, form: &impl FormView) -> StageReport {
        let summary = match stage {
            Stage::Pre => CompletenessReport::satisfied(),
            Stage::Post => self.summary_ok(form),
        };

        StageReport {
            stage,
            photos: self.photos_ok(stage, form),
            answers: self.answers_ok(stage, form),
            measurements: self.measurements_ok(stage, form),
            summary,
        }
    }

    fn answered(&self, form: &impl FormView, item: &ItemKey) -> bool {
        form.answer(item)
            .is_some_and(|answer| self.schema.accepts(&answer.status))
    }
}


#[cfg(test)]
mod tests {
    use super::fixture::{EV_CHARGER, THREE_PRE_PHOTOS};
    use super::*;
    use crate::draft::{DraftDocument, PhotoId, PhotoRef};
    use chrono::Utc;

    fn schema(raw: &str) -> ChecklistSchema {
        ChecklistSchema::from_toml_str(raw).unwrap()
    }

    fn with_photo(doc: &mut DraftDocument, item: ItemKey) {
        let id = PhotoId::new(&item, 171234, 0, "a.jpg");
        doc.photo_refs.entry(item).or_default().push(PhotoRef {
            storage_key: format!("pmDraft:S/{id}"),
            id,
            remark: None,
            original_name: "a.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            byte_size: 3,
            last_modified: Utc::now(),
            stage: Stage::Pre,
        });
    }

    fn complete_post(doc: &mut DraftDocument) {
        for item in [
            ItemKey::leaf("1"),
            ItemKey::member("4", "1"),
            ItemKey::member("4", "2"),
            ItemKey::member("4", "3"),
        ] {
            with_photo(doc, item.clone());
            doc.answers.insert(item, crate::draft::Answer::new("PASS"));
        }
        let fields = doc.measurements.entry("9".to_string()).or_default();
        fields.insert("L1-N".into(), crate::draft::Measurement::new("230", "V"));
        fields.insert("L2-N".into(), crate::draft::Measurement::new("231", "V"));
        doc.free_text.insert("summary".into(), "All good".into());
        doc.answers
            .insert(ItemKey::leaf("overall"), crate::draft::Answer::new("PASS"));
    }

    #[test]
    fn test_empty_form_reports_everything_in_schema_order() {
        let schema = schema(EV_CHARGER);
        let report = CompletenessGate::new(&schema).evaluate(Stage::Post, &DraftDocument::default());

        assert!(!report.can_submit());
        assert_eq!(
            report.photos.missing,
            vec![
                MissingItem::Photo { item: ItemKey::leaf("1") },
                MissingItem::Photo { item: ItemKey::member("4", "1") },
                MissingItem::Photo { item: ItemKey::member("4", "2") },
                MissingItem::Photo { item: ItemKey::member("4", "3") },
            ]
        );
        assert_eq!(
            report.summary.missing,
            vec![
                MissingItem::Summary { section: "summary".into() },
                MissingItem::Verdict { item: ItemKey::leaf("overall") },
            ]
        );
        assert_eq!(report.missing().len(), 4 + 4 + 2 + 2);
    }

    #[test]
    fn test_missing_order_ignores_fill_order() {
        let schema = schema(EV_CHARGER);
        let mut doc = DraftDocument::default();
        with_photo(&mut doc, ItemKey::member("4", "3"));
        with_photo(&mut doc, ItemKey::member("4", "1"));

        let report = CompletenessGate::new(&schema).photos_ok(Stage::Post, &doc);
        assert_eq!(
            report.missing,
            vec![
                MissingItem::Photo { item: ItemKey::leaf("1") },
                MissingItem::Photo { item: ItemKey::member("4", "2") },
            ]
        );
    }

    #[test]
    fn test_pre_stage_ignores_post_only_items_and_summary() {
        let schema = schema(EV_CHARGER);
        let mut doc = DraftDocument::default();
        with_photo(&mut doc, ItemKey::leaf("1"));
        let fields = doc.measurements.entry("9".to_string()).or_default();
        fields.insert("L1-N".into(), crate::draft::Measurement::new("230", "V"));
        fields.insert("L2-N".into(), crate::draft::Measurement::new("229", "V"));

        let report = CompletenessGate::new(&schema).evaluate(Stage::Pre, &doc);
        assert!(report.can_advance());
        assert!(report.summary.ok);
        // Answers do not guard the advance
        assert!(!report.answers.ok);
    }

    #[test]
    fn test_blank_values_do_not_count() {
        let schema = schema(EV_CHARGER);
        let mut doc = DraftDocument::default();
        doc.answers
            .insert(ItemKey::leaf("1"), crate::draft::Answer::new("  "));
        doc.measurements
            .entry("9".to_string())
            .or_default()
            .insert("L1-N".into(), crate::draft::Measurement::new(" ", "V"));
        doc.free_text.insert("summary".into(), "\n".into());

        let gate = CompletenessGate::new(&schema);
        assert_eq!(gate.answers_ok(Stage::Pre, &doc).missing.len(), 1);
        assert_eq!(gate.measurements_ok(Stage::Pre, &doc).missing.len(), 2);
        assert!(!gate.summary_ok(&doc).ok);
    }

    #[test]
    fn test_unknown_status_is_unanswered() {
        let schema = schema(EV_CHARGER);
        let mut doc = DraftDocument::default();
        doc.answers
            .insert(ItemKey::leaf("1"), crate::draft::Answer::new("MAYBE"));

        let report = CompletenessGate::new(&schema).answers_ok(Stage::Pre, &doc);
        assert_eq!(report.missing, vec![MissingItem::Answer { item: ItemKey::leaf("1") }]);
    }

    #[test]
    fn test_complete_form_can_submit() {
        let schema = schema(EV_CHARGER);
        let mut doc = DraftDocument::default();
        complete_post(&mut doc);

        let report = CompletenessGate::new(&schema).evaluate(Stage::Post, &doc);
        assert!(report.can_submit(), "{:?}", report.missing());
        assert!(report.missing().is_empty());
    }

    #[test]
    fn test_n_minus_one_photos_reports_one_missing() {
        let schema = schema(THREE_PRE_PHOTOS);
        let gate = CompletenessGate::new(&schema);
        let mut doc = DraftDocument::default();
        with_photo(&mut doc, ItemKey::leaf("1"));
        with_photo(&mut doc, ItemKey::leaf("3"));

        let report = gate.evaluate(Stage::Pre, &doc);
        assert!(!report.can_advance());
        assert_eq!(report.advance_blockers(), vec![&MissingItem::Photo { item: ItemKey::leaf("2") }]);

        with_photo(&mut doc, ItemKey::leaf("2"));
        assert!(gate.evaluate(Stage::Pre, &doc).can_advance());
    }

    #[test]
    fn test_adding_requirements_is_monotonic() {
        let schema = schema(EV_CHARGER);
        let gate = CompletenessGate::new(&schema);
        let mut full = DraftDocument::default();
        complete_post(&mut full);

        // Remove one requirement at a time: never submittable, and restoring
        // it always brings the form back to submittable
        let photo_keys: Vec<_> = full.photo_refs.keys().cloned().collect();
        for key in photo_keys {
            let mut doc = full.clone();
            doc.photo_refs.remove(&key);
            assert!(!gate.evaluate(Stage::Post, &doc).can_submit());
            with_photo(&mut doc, key);
            assert!(gate.evaluate(Stage::Post, &doc).can_submit());
        }

        let answer_keys: Vec<_> = full.answers.keys().cloned().collect();
        for key in answer_keys {
            let mut doc = full.clone();
            let answer = doc.answers.remove(&key).unwrap();
            assert!(!gate.evaluate(Stage::Post, &doc).can_submit());
            doc.answers.insert(key, answer);
            assert!(gate.evaluate(Stage::Post, &doc).can_submit());
        }

        // Extra photos and answers never take a submittable form back
        let mut doc = full.clone();
        with_photo(&mut doc, ItemKey::leaf("unlisted"));
        doc.answers
            .insert(ItemKey::leaf("extra"), crate::draft::Answer::new("NA"));
        assert!(gate.evaluate(Stage::Post, &doc).can_submit());
    }

    #[test]
    fn test_gate_reads_live_form_state() {
        let schema = schema(THREE_PRE_PHOTOS);
        let mut form = crate::draft::FormState::new();
        form.set_answer(ItemKey::leaf("1"), "PASS");

        let report = CompletenessGate::new(&schema).answers_ok(Stage::Pre, &form);
        assert_eq!(
            report.missing,
            vec![
                MissingItem::Answer { item: ItemKey::leaf("2") },
                MissingItem::Answer { item: ItemKey::leaf("3") },
            ]
        );
    }
}
