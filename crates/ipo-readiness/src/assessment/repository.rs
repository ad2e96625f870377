use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{Assessment, AssessmentId, LeadId};

/// Storage abstraction so the engine can be exercised in isolation.
///
/// `compare_and_swap` must check the stored revision and write in one atomic
/// step, storing the record with `revision = expected_revision + 1`.
pub trait AssessmentRepository: Send + Sync {
    fn insert(&self, record: Assessment) -> Result<Assessment, RepositoryError>;
    fn fetch(&self, id: &AssessmentId) -> Result<Option<Assessment>, RepositoryError>;
    fn find_by_lead(&self, lead_id: &LeadId) -> Result<Option<Assessment>, RepositoryError>;
    fn compare_and_swap(
        &self,
        record: Assessment,
        expected_revision: u64,
    ) -> Result<Assessment, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("an assessment already exists for lead {0}")]
    Conflict(LeadId),
    #[error("assessment {0} not found")]
    NotFound(AssessmentId),
    #[error("assessment {id} is at revision {actual}, expected {expected}")]
    RevisionMismatch {
        id: AssessmentId,
        expected: u64,
        actual: u64,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AssessmentSubmitted,
    AssessmentApproved,
    AssessmentRejected,
    AssessmentRestarted,
}

impl EventKind {
    pub const fn name(self) -> &'static str {
        match self {
            EventKind::AssessmentSubmitted => "assessment_submitted",
            EventKind::AssessmentApproved => "assessment_approved",
            EventKind::AssessmentRejected => "assessment_rejected",
            EventKind::AssessmentRestarted => "assessment_restarted",
        }
    }
}

/// Fire-and-forget payload handed to the notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentEvent {
    pub kind: EventKind,
    pub assessment_id: AssessmentId,
    pub lead_id: LeadId,
    pub details: BTreeMap<String, String>,
}

/// Outbound notifications (reviewer e-mail, dashboards). Errors are logged, never propagated.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: AssessmentEvent) -> Result<(), NotifyError>;
}

/// Lead pipeline collaborator told when an assessment is approved.
pub trait LeadStatusHook: Send + Sync {
    fn on_approved(&self, lead_id: &LeadId) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
