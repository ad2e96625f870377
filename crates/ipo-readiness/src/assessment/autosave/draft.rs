use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::assessment::domain::{
    AnswerPatch, AnswerRecord, AnswerSection, Assessment, FixedAnswers, QuestionId,
    SectionAnswers, FIRST_STEP, LAST_STEP,
};

/// Unit of dirtiness tracked between saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftSection {
    Company,
    Financial,
    Sector,
    Fixed,
    Progress,
}

impl From<AnswerSection> for DraftSection {
    fn from(section: AnswerSection) -> Self {
        match section {
            AnswerSection::Company => DraftSection::Company,
            AnswerSection::Financial => DraftSection::Financial,
            AnswerSection::Sector => DraftSection::Sector,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DraftEdit {
    SetAnswer {
        section: AnswerSection,
        question_id: QuestionId,
        answer: AnswerRecord,
    },
    ClearAnswer {
        section: AnswerSection,
        question_id: QuestionId,
    },
    SetFixed {
        fixed: FixedAnswers,
    },
    SetStep {
        step: u8,
    },
}

/// Local working copy of everything the assessor can edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftState {
    pub answers: SectionAnswers,
    pub fixed: FixedAnswers,
    pub current_step: u8,
}

impl DraftState {
    pub fn from_assessment(assessment: &Assessment) -> Self {
        Self {
            answers: assessment.answers.clone(),
            fixed: assessment.fixed.clone(),
            current_step: assessment.current_step,
        }
    }

    /// Applies `edit`, returning the section that changed or `None` for a no-op.
    pub fn apply(&mut self, edit: DraftEdit) -> Option<DraftSection> {
        match edit {
            DraftEdit::SetAnswer {
                section,
                question_id,
                answer,
            } => {
                let answers = self.answers.section_mut(section);
                if answers.get(&question_id) == Some(&answer) {
                    return None;
                }
                answers.insert(question_id, answer);
                Some(section.into())
            }
            DraftEdit::ClearAnswer {
                section,
                question_id,
            } => self
                .answers
                .section_mut(section)
                .remove(&question_id)
                .map(|_| section.into()),
            DraftEdit::SetFixed { fixed } => {
                if self.fixed == fixed {
                    return None;
                }
                self.fixed = fixed;
                Some(DraftSection::Fixed)
            }
            DraftEdit::SetStep { step } => {
                let step = step.clamp(FIRST_STEP, LAST_STEP);
                if self.current_step == step {
                    return None;
                }
                self.current_step = step;
                Some(DraftSection::Progress)
            }
        }
    }

    /// Patch carrying only the listed sections, taken from the current draft.
    pub fn patch(&self, sections: &BTreeSet<DraftSection>, expected_revision: Option<u64>) -> AnswerPatch {
        let mut patch = AnswerPatch {
            expected_revision,
            ..AnswerPatch::default()
        };
        for section in sections {
            match section {
                DraftSection::Company => patch.company = Some(self.answers.company.clone()),
                DraftSection::Financial => patch.financial = Some(self.answers.financial.clone()),
                DraftSection::Sector => patch.sector = Some(self.answers.sector.clone()),
                DraftSection::Fixed => patch.fixed = Some(self.fixed.clone()),
                DraftSection::Progress => patch.current_step = Some(self.current_step),
            }
        }
        patch
    }
}
