use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::domain::{QuestionId, QuestionType};
use super::error::AssessmentError;
use super::templates::TemplateBank;

pub const MIN_QUESTION_TEXT_LEN: usize = 10;

/// One question as frozen into a single assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotQuestion {
    pub id: QuestionId,
    pub question_type: QuestionType,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    pub order: u32,
    pub is_custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_question_id: Option<QuestionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub question_type: QuestionType,
    pub text: String,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub source_question_id: Option<QuestionId>,
}

/// Partial edit; an empty `help_text` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionEdit {
    pub text: Option<String>,
    pub help_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCheck {
    pub snapshot_version: u64,
    pub current_version: u64,
    pub is_outdated: bool,
}

/// Per-assessment copy of the question bank, owned by the assessment record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSnapshot {
    version: u64,
    questions: BTreeMap<QuestionType, Vec<SnapshotQuestion>>,
    next_sequence: u64,
}

impl QuestionSnapshot {
    /// Copies every active template question. The version is read before the
    /// questions so a concurrent bank edit can only make the copy look older.
    pub fn from_bank<B>(bank: &B) -> Self
    where
        B: TemplateBank + ?Sized,
    {
        let mut snapshot = Self {
            version: bank.current_version(),
            questions: BTreeMap::new(),
            next_sequence: 1,
        };

        for question_type in QuestionType::ALL {
            let copies: Vec<_> = bank
                .list_active(question_type)
                .into_iter()
                .enumerate()
                .map(|(index, template)| SnapshotQuestion {
                    id: snapshot.allocate_id(question_type),
                    question_type,
                    text: template.text,
                    help_text: template.help_text,
                    order: index as u32 + 1,
                    is_custom: false,
                    source_question_id: Some(template.id),
                })
                .collect();
            snapshot.questions.insert(question_type, copies);
        }

        snapshot
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn questions(&self, question_type: QuestionType) -> &[SnapshotQuestion] {
        self.questions
            .get(&question_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn find(&self, id: &QuestionId) -> Option<&SnapshotQuestion> {
        self.questions
            .values()
            .flat_map(|questions| questions.iter())
            .find(|question| &question.id == id)
    }

    pub fn contains(&self, question_type: QuestionType, id: &QuestionId) -> bool {
        self.questions(question_type)
            .iter()
            .any(|question| &question.id == id)
    }

    pub fn len(&self) -> usize {
        self.questions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn check_version(&self, current_version: u64) -> VersionCheck {
        VersionCheck {
            snapshot_version: self.version,
            current_version,
            is_outdated: self.version < current_version,
        }
    }

    pub fn add(&mut self, question: NewQuestion) -> Result<SnapshotQuestion, AssessmentError> {
        let text = validated_text(&question.text)?;
        let order = self
            .questions(question.question_type)
            .iter()
            .map(|existing| existing.order)
            .max()
            .unwrap_or(0)
            + 1;

        let added = SnapshotQuestion {
            id: self.allocate_id(question.question_type),
            question_type: question.question_type,
            text,
            help_text: normalized_help(question.help_text),
            order,
            is_custom: question.source_question_id.is_none(),
            source_question_id: question.source_question_id,
        };

        self.questions
            .entry(question.question_type)
            .or_default()
            .push(added.clone());
        Ok(added)
    }

    pub fn update(
        &mut self,
        id: &QuestionId,
        edit: QuestionEdit,
    ) -> Result<SnapshotQuestion, AssessmentError> {
        let text = edit.text.as_deref().map(validated_text).transpose()?;
        let question = self
            .questions
            .values_mut()
            .flat_map(|questions| questions.iter_mut())
            .find(|question| &question.id == id)
            .ok_or_else(|| AssessmentError::QuestionNotFound(id.clone()))?;

        if let Some(text) = text {
            question.text = text;
        }
        if edit.help_text.is_some() {
            question.help_text = normalized_help(edit.help_text);
        }
        Ok(question.clone())
    }

    /// Removes the question only; recorded answers for it stay untouched.
    pub fn delete(&mut self, id: &QuestionId) -> Result<SnapshotQuestion, AssessmentError> {
        for questions in self.questions.values_mut() {
            if let Some(position) = questions.iter().position(|question| &question.id == id) {
                return Ok(questions.remove(position));
            }
        }
        Err(AssessmentError::QuestionNotFound(id.clone()))
    }

    /// Rewrites `order` to follow `ordered_ids`, which must be an exact permutation.
    pub fn reorder(
        &mut self,
        question_type: QuestionType,
        ordered_ids: &[QuestionId],
    ) -> Result<(), AssessmentError> {
        let existing: BTreeSet<&QuestionId> = self
            .questions(question_type)
            .iter()
            .map(|question| &question.id)
            .collect();
        let requested: BTreeSet<&QuestionId> = ordered_ids.iter().collect();

        if existing != requested || ordered_ids.len() != existing.len() {
            return Err(AssessmentError::ReorderMismatch {
                question_type,
                missing: existing.difference(&requested).map(|id| (*id).clone()).collect(),
                unexpected: requested.difference(&existing).map(|id| (*id).clone()).collect(),
            });
        }

        let mut by_id: BTreeMap<QuestionId, SnapshotQuestion> = self
            .questions
            .remove(&question_type)
            .unwrap_or_default()
            .into_iter()
            .map(|question| (question.id.clone(), question))
            .collect();

        let reordered = ordered_ids
            .iter()
            .enumerate()
            .filter_map(|(index, id)| {
                by_id.remove(id).map(|mut question| {
                    question.order = index as u32 + 1;
                    question
                })
            })
            .collect();
        self.questions.insert(question_type, reordered);
        Ok(())
    }

    fn allocate_id(&mut self, question_type: QuestionType) -> QuestionId {
        let id = QuestionId(format!("{}-{:03}", question_type.label(), self.next_sequence));
        self.next_sequence += 1;
        id
    }
}

fn validated_text(text: &str) -> Result<String, AssessmentError> {
    let text = text.trim();
    if text.chars().count() < MIN_QUESTION_TEXT_LEN {
        return Err(AssessmentError::validation(format!(
            "question text must be at least {MIN_QUESTION_TEXT_LEN} characters"
        )));
    }
    Ok(text.to_string())
}

fn normalized_help(help_text: Option<String>) -> Option<String> {
    help_text
        .map(|help| help.trim().to_string())
        .filter(|help| !help.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::templates::TemplateRegistry;

    fn custom(question_type: QuestionType, text: &str) -> NewQuestion {
        NewQuestion {
            question_type,
            text: text.to_string(),
            help_text: None,
            source_question_id: None,
        }
    }

    #[test]
    fn copies_active_template_questions_with_sources() {
        let registry = TemplateRegistry::standard();
        let snapshot = QuestionSnapshot::from_bank(&registry);

        assert_eq!(snapshot.version(), 1);
        for question_type in QuestionType::ALL {
            let templates = registry.list_active(question_type);
            let copies = snapshot.questions(question_type);
            assert_eq!(copies.len(), templates.len());
            for (copy, template) in copies.iter().zip(&templates) {
                assert_eq!(copy.text, template.text);
                assert!(!copy.is_custom);
                assert_eq!(copy.source_question_id.as_ref(), Some(&template.id));
            }
        }
    }

    #[test]
    fn later_bank_edits_do_not_leak_into_snapshot() {
        let registry = TemplateRegistry::standard();
        let snapshot = QuestionSnapshot::from_bank(&registry);
        let first = registry.list_active(QuestionType::Company)[0].clone();

        registry
            .edit(&first.id, "Rewritten template question text", None)
            .expect("edit succeeds");

        assert_eq!(snapshot.questions(QuestionType::Company)[0].text, first.text);
        assert!(snapshot.check_version(registry.current_version()).is_outdated);
    }

    #[test]
    fn add_appends_custom_question_at_next_order() {
        let mut snapshot = QuestionSnapshot::from_bank(&TemplateRegistry::standard());
        let before = snapshot.questions(QuestionType::Sector).len();

        let added = snapshot
            .add(custom(QuestionType::Sector, "Is the sector subject to price controls?"))
            .expect("valid question");

        assert!(added.is_custom);
        assert_eq!(added.order as usize, before + 1);
        assert_eq!(snapshot.questions(QuestionType::Sector).len(), before + 1);
        assert!(snapshot.contains(QuestionType::Sector, &added.id));
    }

    #[test]
    fn add_with_source_is_a_template_copy() {
        let mut snapshot = QuestionSnapshot::default();
        let added = snapshot
            .add(NewQuestion {
                source_question_id: Some(QuestionId::new("tpl-042")),
                ..custom(QuestionType::Company, "Re-added template question")
            })
            .expect("valid question");
        assert!(!added.is_custom);
        assert_eq!(added.order, 1);
    }

    #[test]
    fn add_rejects_short_text() {
        let mut snapshot = QuestionSnapshot::default();
        let err = snapshot
            .add(custom(QuestionType::Company, "  too short "))
            .expect_err("short text is invalid");
        assert!(matches!(err, AssessmentError::Validation(_)));
        assert!(snapshot.is_empty());
    }

    #[test]
    fn update_touches_only_this_copy() {
        let registry = TemplateRegistry::standard();
        let mut first = QuestionSnapshot::from_bank(&registry);
        let second = QuestionSnapshot::from_bank(&registry);
        let target = first.questions(QuestionType::Financial)[0].id.clone();

        let updated = first
            .update(
                &target,
                QuestionEdit {
                    text: Some("Are the financial statements audited by a peer-reviewed firm?".to_string()),
                    help_text: Some(String::new()),
                },
            )
            .expect("update succeeds");

        assert!(updated.text.contains("peer-reviewed"));
        assert_eq!(updated.help_text, None);
        assert_ne!(second.find(&target).map(|question| &question.text), Some(&updated.text));
        assert_eq!(
            registry.list_active(QuestionType::Financial)[0].text,
            second.questions(QuestionType::Financial)[0].text
        );
    }

    #[test]
    fn update_and_delete_report_unknown_ids() {
        let mut snapshot = QuestionSnapshot::default();
        let missing = QuestionId::new("company-999");
        assert!(matches!(
            snapshot.update(&missing, QuestionEdit::default()),
            Err(AssessmentError::QuestionNotFound(_))
        ));
        assert!(matches!(
            snapshot.delete(&missing),
            Err(AssessmentError::QuestionNotFound(_))
        ));
    }

    #[test]
    fn delete_removes_question() {
        let mut snapshot = QuestionSnapshot::from_bank(&TemplateRegistry::standard());
        let target = snapshot.questions(QuestionType::Eligibility)[0].clone();
        let removed = snapshot.delete(&target.id).expect("delete succeeds");
        assert_eq!(removed, target);
        assert!(snapshot.find(&target.id).is_none());
    }

    #[test]
    fn reorder_permutes_without_touching_content() {
        let mut snapshot = QuestionSnapshot::from_bank(&TemplateRegistry::standard());
        let original = snapshot.questions(QuestionType::Company).to_vec();
        let reversed: Vec<_> = original.iter().rev().map(|question| question.id.clone()).collect();

        snapshot
            .reorder(QuestionType::Company, &reversed)
            .expect("permutation accepted");

        let reordered = snapshot.questions(QuestionType::Company);
        for (position, question) in reordered.iter().enumerate() {
            assert_eq!(question.id, reversed[position]);
            assert_eq!(question.order as usize, position + 1);
            let before = original
                .iter()
                .find(|candidate| candidate.id == question.id)
                .expect("question preserved");
            assert_eq!(
                SnapshotQuestion {
                    order: before.order,
                    ..question.clone()
                },
                *before
            );
        }
    }

    #[test]
    fn reorder_mismatch_leaves_order_untouched() {
        let mut snapshot = QuestionSnapshot::from_bank(&TemplateRegistry::standard());
        let original = snapshot.questions(QuestionType::Company).to_vec();
        let mut ids: Vec<_> = original.iter().map(|question| question.id.clone()).collect();
        ids.pop();
        ids.push(QuestionId::new("financial-004"));

        match snapshot.reorder(QuestionType::Company, &ids) {
            Err(AssessmentError::ReorderMismatch {
                missing,
                unexpected,
                ..
            }) => {
                assert_eq!(missing, vec![original.last().expect("question").id.clone()]);
                assert_eq!(unexpected, vec![QuestionId::new("financial-004")]);
            }
            other => panic!("expected reorder mismatch, got {other:?}"),
        }
        assert_eq!(snapshot.questions(QuestionType::Company), original.as_slice());

        let mut duplicated: Vec<_> = original.iter().map(|question| question.id.clone()).collect();
        duplicated.push(duplicated[0].clone());
        assert!(matches!(
            snapshot.reorder(QuestionType::Company, &duplicated),
            Err(AssessmentError::ReorderMismatch { .. })
        ));
    }

    #[test]
    fn version_check_flags_drift_only_when_older() {
        let snapshot = QuestionSnapshot::from_bank(&TemplateRegistry::standard());
        assert!(!snapshot.check_version(1).is_outdated);
        let check = snapshot.check_version(3);
        assert!(check.is_outdated);
        assert_eq!(check.snapshot_version, 1);
        assert_eq!(check.current_version, 3);
    }
}
