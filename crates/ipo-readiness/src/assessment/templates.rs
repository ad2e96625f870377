use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::domain::{QuestionId, QuestionType};
use super::snapshot::MIN_QUESTION_TEXT_LEN;

/// Reviewer-managed master question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateQuestion {
    pub id: QuestionId,
    pub question_type: QuestionType,
    pub text: String,
    pub help_text: Option<String>,
    pub order: u32,
    pub active: bool,
}

/// Read-only view of the template bank consumed by the engine.
pub trait TemplateBank: Send + Sync {
    /// Active questions of one type in display order.
    fn list_active(&self, question_type: QuestionType) -> Vec<TemplateQuestion>;
    fn current_version(&self) -> u64;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("question text must be at least 10 characters")]
    TextTooShort,
    #[error("template question {0} not found")]
    NotFound(QuestionId),
}

#[derive(Debug, Default)]
struct RegistryState {
    version: u64,
    next_id: u64,
    questions: Vec<TemplateQuestion>,
}

/// Versioned in-memory template bank. Every mutation bumps the version.
#[derive(Debug)]
pub struct TemplateRegistry {
    state: RwLock<RegistryState>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                version: 1,
                next_id: 1,
                questions: Vec::new(),
            }),
        }
    }

    /// Bank seeded with the standard readiness questionnaire at version 1.
    pub fn standard() -> Self {
        let registry = Self::new();
        {
            let mut state = registry.state.write().expect("template registry lock poisoned");
            for (question_type, text, help_text) in STANDARD_QUESTIONS {
                let order = state
                    .questions
                    .iter()
                    .filter(|question| question.question_type == *question_type)
                    .count() as u32
                    + 1;
                let id = QuestionId(format!("tpl-{:03}", state.next_id));
                state.next_id += 1;
                state.questions.push(TemplateQuestion {
                    id,
                    question_type: *question_type,
                    text: text.to_string(),
                    help_text: help_text.map(str::to_string),
                    order,
                    active: true,
                });
            }
        }
        registry
    }

    /// Increments the version counter without touching questions.
    pub fn bump(&self) -> u64 {
        let mut state = self.state.write().expect("template registry lock poisoned");
        state.version += 1;
        state.version
    }

    pub fn add(
        &self,
        question_type: QuestionType,
        text: &str,
        help_text: Option<&str>,
    ) -> Result<TemplateQuestion, TemplateError> {
        let text = validated_text(text)?;
        let mut state = self.state.write().expect("template registry lock poisoned");
        let order = state
            .questions
            .iter()
            .filter(|question| question.question_type == question_type && question.active)
            .map(|question| question.order)
            .max()
            .unwrap_or(0)
            + 1;
        let question = TemplateQuestion {
            id: QuestionId(format!("tpl-{:03}", state.next_id)),
            question_type,
            text,
            help_text: help_text.map(str::to_string),
            order,
            active: true,
        };
        state.next_id += 1;
        state.version += 1;
        state.questions.push(question.clone());
        Ok(question)
    }

    pub fn edit(
        &self,
        id: &QuestionId,
        text: &str,
        help_text: Option<&str>,
    ) -> Result<TemplateQuestion, TemplateError> {
        let text = validated_text(text)?;
        let mut state = self.state.write().expect("template registry lock poisoned");
        let question = state
            .questions
            .iter_mut()
            .find(|question| &question.id == id)
            .ok_or_else(|| TemplateError::NotFound(id.clone()))?;
        question.text = text;
        question.help_text = help_text.map(str::to_string);
        let edited = question.clone();
        state.version += 1;
        Ok(edited)
    }

    /// Soft delete; snapshots that copied the question keep their copy.
    pub fn deactivate(&self, id: &QuestionId) -> Result<(), TemplateError> {
        let mut state = self.state.write().expect("template registry lock poisoned");
        let question = state
            .questions
            .iter_mut()
            .find(|question| &question.id == id && question.active)
            .ok_or_else(|| TemplateError::NotFound(id.clone()))?;
        question.active = false;
        state.version += 1;
        Ok(())
    }
}

impl TemplateBank for TemplateRegistry {
    fn list_active(&self, question_type: QuestionType) -> Vec<TemplateQuestion> {
        let state = self.state.read().expect("template registry lock poisoned");
        let mut questions: Vec<_> = state
            .questions
            .iter()
            .filter(|question| question.question_type == question_type && question.active)
            .cloned()
            .collect();
        questions.sort_by_key(|question| question.order);
        questions
    }

    fn current_version(&self) -> u64 {
        self.state
            .read()
            .expect("template registry lock poisoned")
            .version
    }
}

fn validated_text(text: &str) -> Result<String, TemplateError> {
    let text = text.trim();
    if text.chars().count() < MIN_QUESTION_TEXT_LEN {
        return Err(TemplateError::TextTooShort);
    }
    Ok(text.to_string())
}

const STANDARD_QUESTIONS: &[(QuestionType, &str, Option<&str>)] = &[
    (
        QuestionType::Company,
        "Is the company incorporated as a public limited company?",
        Some("Private companies must convert before filing the offer document."),
    ),
    (
        QuestionType::Company,
        "Has the company been operational for at least three financial years?",
        None,
    ),
    (
        QuestionType::Company,
        "Are statutory registers and board minutes up to date?",
        None,
    ),
    (
        QuestionType::Financial,
        "Are the last three years of financial statements audited?",
        Some("Peer-reviewed auditor reports are preferred."),
    ),
    (
        QuestionType::Financial,
        "Are there any qualifications in the latest audit report?",
        None,
    ),
    (
        QuestionType::Financial,
        "Is revenue recognition consistent with applicable accounting standards?",
        None,
    ),
    (
        QuestionType::Sector,
        "Does the company hold every licence required in its sector?",
        None,
    ),
    (
        QuestionType::Sector,
        "Is the addressable market growing faster than the wider economy?",
        Some("Cite an industry report where possible."),
    ),
    (
        QuestionType::Eligibility,
        "Is the post-issue paid-up capital within the exchange's platform limits?",
        None,
    ),
    (
        QuestionType::Eligibility,
        "Are promoters free of regulatory debarment orders?",
        None,
    ),
];
