//! Assessment lifecycle: question snapshots, the fixed scoring rubric,
//! debounced auto-save, and the draft/submitted/approved/rejected workflow.

pub mod autosave;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod memory;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod snapshot;
pub mod templates;

#[cfg(test)]
mod tests;

pub use autosave::{
    spawn_autosave, AutoSaveConfig, AutoSaveCoordinator, AutoSaveHandle, Clock, DraftEdit,
    DraftSaver, DraftSection, DraftState, ManualClock, SaveFailure, SaveRequest, SaveStatus,
    TokioClock,
};
pub use domain::{
    Actor, ActorRole, AnswerMap, AnswerPatch, AnswerRecord, AnswerScore, AnswerSection,
    Assessment, AssessmentId, AssessmentStatus, FixedAnswers, GovernanceFlags, LeadId,
    QuestionId, QuestionType, SectionAnswers, TeamFlags, Verification, VerifiedSection,
    YearlyFigures,
};
pub use error::AssessmentError;
pub use ledger::{ReviewAction, ReviewEntry, ReviewLedger};
pub use lifecycle::{ReviewPolicy, Transition};
pub use memory::{InMemoryAssessmentRepository, RecordingLeadHook, RecordingNotifier};
pub use repository::{
    AssessmentEvent, AssessmentRepository, EventKind, LeadStatusHook, NotificationSink,
    NotifyError, RepositoryError,
};
pub use router::assessment_router;
pub use scoring::{Criterion, Rating, ScoreCalculator, ScoreCard, ScoreComponent, SectionTally};
pub use service::{
    AssessmentService, ReviewCommand, SaveReceipt, ServiceDraftSaver, SubmitCommand,
};
pub use snapshot::{NewQuestion, QuestionEdit, QuestionSnapshot, SnapshotQuestion, VersionCheck};
pub use templates::{TemplateBank, TemplateError, TemplateQuestion, TemplateRegistry};
