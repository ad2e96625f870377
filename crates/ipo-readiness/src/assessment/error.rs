use super::domain::{ActorRole, AssessmentId, AssessmentStatus, QuestionId, QuestionType};
use super::lifecycle::Transition;
use super::repository::RepositoryError;

/// Every reason an engine operation can be refused.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("{0}")]
    Validation(String),
    #[error("cannot {action} while the assessment is {status}")]
    InvalidState {
        action: &'static str,
        status: AssessmentStatus,
    },
    #[error("cannot {transition} an assessment that is {from}")]
    InvalidTransition {
        from: AssessmentStatus,
        transition: Transition,
    },
    #[error(
        "questions are from template version {snapshot_version} but version {current_version} is current; confirm to continue with the old questions"
    )]
    QuestionsOutdated {
        snapshot_version: u64,
        current_version: u64,
    },
    #[error("question ids do not match the {question_type} questions of this assessment; reload and retry")]
    ReorderMismatch {
        question_type: QuestionType,
        missing: Vec<QuestionId>,
        unexpected: Vec<QuestionId>,
    },
    #[error("assessment {0} was changed by someone else; reload before retrying")]
    ConcurrentModification(AssessmentId),
    #[error("a {role} may not {action}")]
    Forbidden {
        role: ActorRole,
        action: &'static str,
    },
    #[error("assessment {0} not found")]
    NotFound(AssessmentId),
    #[error("question {0} is not part of this assessment")]
    QuestionNotFound(QuestionId),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl AssessmentError {
    /// Stable machine-readable code for hosts.
    pub const fn code(&self) -> &'static str {
        match self {
            AssessmentError::Validation(_) => "validation_error",
            AssessmentError::InvalidState { .. } => "invalid_state",
            AssessmentError::InvalidTransition { .. } => "invalid_transition",
            AssessmentError::QuestionsOutdated { .. } => "questions_outdated",
            AssessmentError::ReorderMismatch { .. } => "reorder_mismatch",
            AssessmentError::ConcurrentModification(_) => "concurrent_modification",
            AssessmentError::Forbidden { .. } => "forbidden",
            AssessmentError::NotFound(_) => "not_found",
            AssessmentError::QuestionNotFound(_) => "question_not_found",
            AssessmentError::Repository(_) => "repository_error",
        }
    }

    /// The outdated-snapshot gate asks for confirmation instead of failing outright.
    pub const fn is_confirmation_gate(&self) -> bool {
        matches!(self, AssessmentError::QuestionsOutdated { .. })
    }

    /// Optimistic-lock losses succeed after the caller reloads; never retry blindly.
    pub const fn is_retryable_after_reload(&self) -> bool {
        matches!(self, AssessmentError::ConcurrentModification(_))
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        AssessmentError::Validation(message.into())
    }
}

impl From<RepositoryError> for AssessmentError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::RevisionMismatch { id, .. } => {
                AssessmentError::ConcurrentModification(id)
            }
            RepositoryError::NotFound(id) => AssessmentError::NotFound(id),
            other => AssessmentError::Repository(other),
        }
    }
}
