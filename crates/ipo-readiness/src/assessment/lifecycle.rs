//! Status transition table and the preconditions guarding each edge.
//!
//! Everything here is pure: the service loads a record, runs these checks
//! against it, and persists the result with a compare-and-swap.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::{Actor, ActorRole, AnswerSection, Assessment, AssessmentStatus};
use super::error::AssessmentError;
use super::scoring::section_tallies;
use super::snapshot::{VersionCheck, MIN_QUESTION_TEXT_LEN};

pub const MIN_REJECT_COMMENT_LEN: usize = 10;

/// Minimum lengths enforced on reviewer comments and custom question text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPolicy {
    pub min_reject_comment_len: usize,
    pub min_question_text_len: usize,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            min_reject_comment_len: MIN_REJECT_COMMENT_LEN,
            min_question_text_len: MIN_QUESTION_TEXT_LEN,
        }
    }
}

impl ReviewPolicy {
    /// Snapshot storage always enforces its own floor; a policy may only be stricter.
    pub fn require_question_text(&self, text: &str) -> Result<(), AssessmentError> {
        if text.trim().chars().count() < self.min_question_text_len {
            return Err(AssessmentError::validation(format!(
                "question text must be at least {} characters",
                self.min_question_text_len
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Submit,
    Approve,
    Reject,
    Resume,
    Restart,
}

impl Transition {
    pub const fn label(self) -> &'static str {
        match self {
            Transition::Submit => "submit",
            Transition::Approve => "approve",
            Transition::Reject => "reject",
            Transition::Resume => "resume editing",
            Transition::Restart => "restart with new questions",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Target status for `transition` from `from`, if the edge exists.
pub fn next_status(
    from: AssessmentStatus,
    transition: Transition,
) -> Result<AssessmentStatus, AssessmentError> {
    use AssessmentStatus::*;

    match (from, transition) {
        (Draft | Rejected, Transition::Submit) => Ok(Submitted),
        (Submitted, Transition::Approve) => Ok(Approved),
        (Submitted, Transition::Reject) => Ok(Rejected),
        (Rejected, Transition::Resume) => Ok(Draft),
        (Draft, Transition::Restart) => Ok(Draft),
        (from, Transition::Restart) => Err(AssessmentError::InvalidState {
            action: Transition::Restart.label(),
            status: from,
        }),
        (from, transition) => Err(AssessmentError::InvalidTransition { from, transition }),
    }
}

pub fn require_role(
    actor: &Actor,
    role: ActorRole,
    action: &'static str,
) -> Result<(), AssessmentError> {
    if actor.role == role {
        Ok(())
    } else {
        Err(AssessmentError::Forbidden {
            role: actor.role,
            action,
        })
    }
}

pub fn require_editable(
    assessment: &Assessment,
    action: &'static str,
) -> Result<(), AssessmentError> {
    if assessment.status.is_editable() {
        Ok(())
    } else {
        Err(AssessmentError::InvalidState {
            action,
            status: assessment.status,
        })
    }
}

/// Outcome of the outdated-snapshot gate when it lets the caller through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotAcknowledgement {
    Current,
    OutdatedConfirmed,
}

/// Drift blocks the transition unless the caller explicitly confirmed it.
pub fn snapshot_gate(
    check: &VersionCheck,
    confirm_old_questions: bool,
) -> Result<SnapshotAcknowledgement, AssessmentError> {
    match (check.is_outdated, confirm_old_questions) {
        (false, _) => Ok(SnapshotAcknowledgement::Current),
        (true, true) => Ok(SnapshotAcknowledgement::OutdatedConfirmed),
        (true, false) => Err(AssessmentError::QuestionsOutdated {
            snapshot_version: check.snapshot_version,
            current_version: check.current_version,
        }),
    }
}

/// Each free-form section needs at least one non-zero answer to a snapshot question.
pub fn require_answered_sections(assessment: &Assessment) -> Result<(), AssessmentError> {
    let tallies = section_tallies(&assessment.answers, &assessment.snapshot);
    let unanswered: Vec<&str> = AnswerSection::ALL
        .into_iter()
        .filter(|section| tallies.get(section).map_or(0, |tally| tally.answered) == 0)
        .map(AnswerSection::label)
        .collect();

    if unanswered.is_empty() {
        Ok(())
    } else {
        Err(AssessmentError::validation(format!(
            "answer at least one question in each section (missing: {})",
            unanswered.join(", ")
        )))
    }
}

pub fn require_reject_comments(
    comments: Option<&str>,
    policy: &ReviewPolicy,
) -> Result<String, AssessmentError> {
    let comments = comments.map(str::trim).unwrap_or_default();
    if comments.chars().count() < policy.min_reject_comment_len {
        return Err(AssessmentError::validation(format!(
            "rejection comments must be at least {} characters",
            policy.min_reject_comment_len
        )));
    }
    Ok(comments.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUSES: [AssessmentStatus; 4] = [
        AssessmentStatus::Draft,
        AssessmentStatus::Submitted,
        AssessmentStatus::Approved,
        AssessmentStatus::Rejected,
    ];

    #[test]
    fn only_defined_edges_are_allowed() {
        use AssessmentStatus::*;

        let allowed = [
            (Draft, Transition::Submit, Submitted),
            (Rejected, Transition::Submit, Submitted),
            (Submitted, Transition::Approve, Approved),
            (Submitted, Transition::Reject, Rejected),
            (Rejected, Transition::Resume, Draft),
            (Draft, Transition::Restart, Draft),
        ];

        for from in STATUSES {
            for transition in [
                Transition::Submit,
                Transition::Approve,
                Transition::Reject,
                Transition::Resume,
                Transition::Restart,
            ] {
                let expected = allowed
                    .iter()
                    .find(|(source, edge, _)| *source == from && *edge == transition)
                    .map(|(_, _, target)| *target);
                match (next_status(from, transition), expected) {
                    (Ok(target), Some(expected)) => assert_eq!(target, expected),
                    (Err(AssessmentError::InvalidState { .. }), None) => {
                        assert_eq!(transition, Transition::Restart)
                    }
                    (Err(AssessmentError::InvalidTransition { .. }), None) => {
                        assert_ne!(transition, Transition::Restart)
                    }
                    (outcome, expected) => {
                        panic!("{from:?} --{transition:?}: got {outcome:?}, expected {expected:?}")
                    }
                }
            }
        }
    }

    #[test]
    fn approving_a_draft_is_an_invalid_transition() {
        let err = next_status(AssessmentStatus::Draft, Transition::Approve)
            .expect_err("draft cannot be approved");
        assert_eq!(err.code(), "invalid_transition");
        assert_eq!(err.to_string(), "cannot approve an assessment that is draft");
    }

    #[test]
    fn outdated_gate_requires_confirmation() {
        let outdated = VersionCheck {
            snapshot_version: 2,
            current_version: 4,
            is_outdated: true,
        };
        let err = snapshot_gate(&outdated, false).expect_err("gate closes");
        assert!(err.is_confirmation_gate());
        assert_eq!(
            snapshot_gate(&outdated, true).expect("confirmed"),
            SnapshotAcknowledgement::OutdatedConfirmed
        );

        let current = VersionCheck {
            is_outdated: false,
            snapshot_version: 4,
            ..outdated
        };
        assert_eq!(
            snapshot_gate(&current, false).expect("no drift"),
            SnapshotAcknowledgement::Current
        );
    }

    #[test]
    fn reject_comments_need_ten_characters() {
        let policy = ReviewPolicy::default();
        assert!(require_reject_comments(None, &policy).is_err());
        assert!(require_reject_comments(Some("too short"), &policy).is_err());
        assert!(require_reject_comments(Some("   padded   "), &policy).is_err());
        assert_eq!(
            require_reject_comments(Some(" Missing audits "), &policy).expect("long enough"),
            "Missing audits"
        );
    }

    #[test]
    fn stricter_policy_raises_the_bar() {
        let policy = ReviewPolicy {
            min_reject_comment_len: 20,
            min_question_text_len: 25,
        };
        assert!(require_reject_comments(Some("Missing audits"), &policy).is_err());
        assert!(policy.require_question_text("Is revenue recurring?").is_err());
        assert!(ReviewPolicy::default()
            .require_question_text("Is revenue recurring?")
            .is_ok());
    }

    #[test]
    fn roles_are_checked_exactly() {
        let reviewer = Actor::reviewer("rev-1", "Priya");
        assert!(require_role(&reviewer, ActorRole::Reviewer, "approve").is_ok());
        let err = require_role(&reviewer, ActorRole::Assessor, "submit").expect_err("forbidden");
        assert_eq!(err.to_string(), "a reviewer may not submit");
    }
}
