use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

use axum::body::to_bytes;
use axum::response::Response;
use serde_json::Value;

use crate::assessment::domain::{
    Actor, AnswerMap, AnswerPatch, AnswerRecord, AnswerScore, Assessment, AssessmentId,
    FixedAnswers, GovernanceFlags, LeadId, QuestionType, TeamFlags, YearlyFigures,
};
use crate::assessment::memory::{
    InMemoryAssessmentRepository, RecordingLeadHook, RecordingNotifier,
};
use crate::assessment::repository::{
    AssessmentEvent, AssessmentRepository, NotificationSink, NotifyError, RepositoryError,
};
use crate::assessment::service::AssessmentService;
use crate::assessment::templates::TemplateRegistry;

pub(super) type MemoryService = AssessmentService<InMemoryAssessmentRepository, TemplateRegistry>;

pub(super) struct Harness {
    pub(super) service: Arc<MemoryService>,
    pub(super) repository: Arc<InMemoryAssessmentRepository>,
    pub(super) templates: Arc<TemplateRegistry>,
    pub(super) notifier: RecordingNotifier,
    pub(super) leads: RecordingLeadHook,
}

pub(super) fn harness() -> Harness {
    let repository = Arc::new(InMemoryAssessmentRepository::default());
    let templates = Arc::new(TemplateRegistry::standard());
    let notifier = RecordingNotifier::default();
    let leads = RecordingLeadHook::default();
    let service = Arc::new(AssessmentService::new(
        repository.clone(),
        templates.clone(),
        Arc::new(notifier.clone()),
        Arc::new(leads.clone()),
    ));

    Harness {
        service,
        repository,
        templates,
        notifier,
        leads,
    }
}

pub(super) fn assessor() -> Actor {
    Actor::assessor("asr-7", "Meera Nair")
}

pub(super) fn reviewer() -> Actor {
    Actor::reviewer("rev-3", "Arjun Rao")
}

pub(super) fn lead(suffix: &str) -> LeadId {
    LeadId(format!("lead-{suffix}"))
}

pub(super) fn answer(score: i8) -> AnswerRecord {
    AnswerRecord::scored(AnswerScore::try_from(score).expect("valid score"))
}

/// The worked example: 70.625 of 82.5 points.
pub(super) fn example_fixed() -> FixedAnswers {
    FixedAnswers {
        investment_plan: Some(true),
        governance: GovernanceFlags {
            independent_directors: Some(true),
            audit_committee: Some(true),
            related_party_policy: Some(true),
            whistleblower_mechanism: Some(false),
        },
        team: TeamFlags {
            full_time_cfo: Some(true),
            company_secretary: Some(true),
            experienced_promoters: Some(true),
            second_line_management: Some(true),
        },
        paid_up_capital: Some(8.0),
        net_worth: Some(12.0),
        borrowings: Some(3.0),
        debt_equity_ratio: Some(0.8),
        turnover: YearlyFigures::new(40.0, 52.0, 61.0),
        ebitda: YearlyFigures::new(6.0, 7.5, 9.2),
        eps: Some(8.0),
        outstanding_shares: Some(750_000),
    }
}

fn first_question_answered(assessment: &Assessment, question_type: QuestionType) -> AnswerMap {
    assessment
        .snapshot
        .questions(question_type)
        .iter()
        .take(1)
        .map(|question| (question.id.clone(), answer(1)))
        .collect()
}

/// One positive answer per section plus the example's fixed answers.
pub(super) fn complete_patch(assessment: &Assessment) -> AnswerPatch {
    AnswerPatch {
        expected_revision: Some(assessment.revision),
        current_step: Some(3),
        company: Some(first_question_answered(assessment, QuestionType::Company)),
        financial: Some(first_question_answered(assessment, QuestionType::Financial)),
        sector: Some(first_question_answered(assessment, QuestionType::Sector)),
        fixed: Some(example_fixed()),
    }
}

/// Starts an assessment and fills it in, ready to submit.
pub(super) fn answered_assessment(harness: &Harness, suffix: &str) -> Assessment {
    let started = harness
        .service
        .start(&assessor(), lead(suffix))
        .expect("assessment starts");
    harness
        .service
        .save_answers(&assessor(), &started.id, complete_patch(&started))
        .expect("answers saved");
    harness.service.get(&started.id).expect("assessment exists")
}

pub(super) fn submitted_assessment(harness: &Harness, suffix: &str) -> Assessment {
    let answered = answered_assessment(harness, suffix);
    harness
        .service
        .submit(&assessor(), &answered.id, Default::default())
        .expect("submit succeeds")
}

pub(super) fn event_names(events: &[AssessmentEvent]) -> Vec<&'static str> {
    events.iter().map(|event| event.kind.name()).collect()
}

pub(super) async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) struct FailingNotifier;

impl NotificationSink for FailingNotifier {
    fn notify(&self, _event: AssessmentEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay down".to_string()))
    }
}

/// Repository whose reads rendezvous once armed, so two writers load the same revision.
pub(super) struct RendezvousRepository {
    pub(super) inner: InMemoryAssessmentRepository,
    barrier: Barrier,
    armed: AtomicBool,
}

impl RendezvousRepository {
    pub(super) fn new(parties: usize) -> Self {
        Self {
            inner: InMemoryAssessmentRepository::default(),
            barrier: Barrier::new(parties),
            armed: AtomicBool::new(false),
        }
    }

    pub(super) fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl AssessmentRepository for RendezvousRepository {
    fn insert(&self, record: Assessment) -> Result<Assessment, RepositoryError> {
        self.inner.insert(record)
    }

    fn fetch(&self, id: &AssessmentId) -> Result<Option<Assessment>, RepositoryError> {
        let record = self.inner.fetch(id)?;
        if self.armed.load(Ordering::SeqCst) {
            self.barrier.wait();
        }
        Ok(record)
    }

    fn find_by_lead(&self, lead_id: &LeadId) -> Result<Option<Assessment>, RepositoryError> {
        self.inner.find_by_lead(lead_id)
    }

    fn compare_and_swap(
        &self,
        record: Assessment,
        expected_revision: u64,
    ) -> Result<Assessment, RepositoryError> {
        self.inner.compare_and_swap(record, expected_revision)
    }
}

pub(super) struct UnavailableRepository;

impl AssessmentRepository for UnavailableRepository {
    fn insert(&self, _record: Assessment) -> Result<Assessment, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &AssessmentId) -> Result<Option<Assessment>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_lead(&self, _lead_id: &LeadId) -> Result<Option<Assessment>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn compare_and_swap(
        &self,
        _record: Assessment,
        _expected_revision: u64,
    ) -> Result<Assessment, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}
