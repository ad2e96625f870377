use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::autosave::{DraftSaver, SaveFailure};
use super::domain::{
    Actor, ActorRole, AnswerPatch, Assessment, AssessmentId, AssessmentStatus, LeadId,
    QuestionId, QuestionType, VerifiedSection, FIRST_STEP, LAST_STEP,
};
use super::error::AssessmentError;
use super::ledger::{ReviewAction, ReviewEntry};
use super::lifecycle::{
    next_status, require_answered_sections, require_editable, require_reject_comments,
    require_role, snapshot_gate, ReviewPolicy, SnapshotAcknowledgement, Transition,
};
use super::repository::{
    AssessmentEvent, AssessmentRepository, EventKind, LeadStatusHook, NotificationSink,
};
use super::scoring::{section_tallies, ScoreCalculator};
use super::snapshot::{NewQuestion, QuestionEdit, QuestionSnapshot, SnapshotQuestion, VersionCheck};
use super::templates::TemplateBank;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitCommand {
    /// Explicit acknowledgement that the snapshot predates the current template bank.
    pub confirm_old_questions: bool,
    pub expected_revision: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewCommand {
    pub comments: Option<String>,
    pub confirm_old_questions: bool,
    pub expected_revision: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub assessment_id: AssessmentId,
    pub revision: u64,
    pub status: AssessmentStatus,
    pub updated_at: DateTime<Utc>,
}

/// Service composing the snapshot store, scoring rubric, state machine and review ledger.
pub struct AssessmentService<R, B> {
    repository: Arc<R>,
    templates: Arc<B>,
    notifier: Arc<dyn NotificationSink>,
    leads: Arc<dyn LeadStatusHook>,
    calculator: ScoreCalculator,
    policy: ReviewPolicy,
}

static ASSESSMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_assessment_id() -> AssessmentId {
    let id = ASSESSMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AssessmentId(format!("asm-{id:06}"))
}

impl<R, B> AssessmentService<R, B>
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    pub fn new(
        repository: Arc<R>,
        templates: Arc<B>,
        notifier: Arc<dyn NotificationSink>,
        leads: Arc<dyn LeadStatusHook>,
    ) -> Self {
        Self {
            repository,
            templates,
            notifier,
            leads,
            calculator: ScoreCalculator::new(),
            policy: ReviewPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReviewPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Create the lead's assessment with a fresh copy of the template bank.
    pub fn start(&self, actor: &Actor, lead_id: LeadId) -> Result<Assessment, AssessmentError> {
        require_role(actor, ActorRole::Assessor, "start assessments")?;

        if let Some(existing) = self.repository.find_by_lead(&lead_id)? {
            return Ok(existing);
        }

        let snapshot = QuestionSnapshot::from_bank(self.templates.as_ref());
        let record = Assessment::new(next_assessment_id(), lead_id, snapshot, Utc::now());
        let stored = self.repository.insert(record)?;

        info!(
            assessment_id = %stored.id,
            lead_id = %stored.lead_id,
            snapshot_version = stored.snapshot.version(),
            "assessment started"
        );
        Ok(stored)
    }

    pub fn get(&self, id: &AssessmentId) -> Result<Assessment, AssessmentError> {
        self.load(id)
    }

    pub fn review_history(&self, id: &AssessmentId) -> Result<Vec<ReviewEntry>, AssessmentError> {
        Ok(self.load(id)?.review_history.entries().to_vec())
    }

    /// Drift check only; never migrates the snapshot.
    pub fn check_version(&self, id: &AssessmentId) -> Result<VersionCheck, AssessmentError> {
        let record = self.load(id)?;
        Ok(record
            .snapshot
            .check_version(self.templates.current_version()))
    }

    /// Unified save target for the auto-save coordinator: only sections present in
    /// the patch are replaced. The first save after a rejection reopens the draft.
    pub fn save_answers(
        &self,
        actor: &Actor,
        id: &AssessmentId,
        patch: AnswerPatch,
    ) -> Result<SaveReceipt, AssessmentError> {
        require_role(actor, ActorRole::Assessor, "edit answers")?;
        if let Some(step) = patch.current_step {
            if !(FIRST_STEP..=LAST_STEP).contains(&step) {
                return Err(AssessmentError::validation(format!(
                    "current step must be between {FIRST_STEP} and {LAST_STEP}"
                )));
            }
        }

        let expected_revision = patch.expected_revision;
        let (stored, resumed) = self.commit(id, expected_revision, |assessment| {
            require_editable(assessment, "edit answers")?;
            let resumed = assessment.status == AssessmentStatus::Rejected;
            if resumed && patch.is_empty() {
                return Err(AssessmentError::validation(
                    "an empty save cannot reopen a rejected assessment",
                ));
            }
            if resumed {
                assessment.status = next_status(assessment.status, Transition::Resume)?;
            }

            let AnswerPatch {
                current_step,
                company,
                financial,
                sector,
                fixed,
                ..
            } = patch;
            if let Some(step) = current_step {
                assessment.current_step = step;
            }
            if let Some(company) = company {
                assessment.answers.company = company;
            }
            if let Some(financial) = financial {
                assessment.answers.financial = financial;
            }
            if let Some(sector) = sector {
                assessment.answers.sector = sector;
            }
            if let Some(fixed) = fixed {
                assessment.fixed = fixed;
            }
            Ok(resumed)
        })?;

        if resumed {
            info!(assessment_id = %id, actor = %actor.id, "rejected assessment reopened as draft");
        }

        Ok(SaveReceipt {
            assessment_id: stored.id,
            revision: stored.revision,
            status: stored.status,
            updated_at: stored.updated_at,
        })
    }

    pub fn verify(
        &self,
        actor: &Actor,
        id: &AssessmentId,
        section: VerifiedSection,
    ) -> Result<Assessment, AssessmentError> {
        require_role(actor, ActorRole::Assessor, "verify sections")?;
        let (stored, ()) = self.commit(id, None, |assessment| {
            require_editable(assessment, "verify sections")?;
            let verification = assessment.verification_mut(section);
            verification.verified = true;
            verification.verified_at = Some(Utc::now());
            Ok(())
        })?;
        Ok(stored)
    }

    pub fn add_question(
        &self,
        actor: &Actor,
        id: &AssessmentId,
        question: NewQuestion,
    ) -> Result<SnapshotQuestion, AssessmentError> {
        self.policy.require_question_text(&question.text)?;
        let (_, added) = self.commit(id, None, |assessment| {
            require_editable(assessment, "change questions")?;
            assessment.snapshot.add(question)
        })?;
        info!(assessment_id = %id, actor = %actor.id, question_id = %added.id, "snapshot question added");
        Ok(added)
    }

    pub fn update_question(
        &self,
        actor: &Actor,
        id: &AssessmentId,
        question_id: &QuestionId,
        edit: QuestionEdit,
    ) -> Result<SnapshotQuestion, AssessmentError> {
        if let Some(text) = &edit.text {
            self.policy.require_question_text(text)?;
        }
        let (_, updated) = self.commit(id, None, |assessment| {
            require_editable(assessment, "change questions")?;
            assessment.snapshot.update(question_id, edit)
        })?;
        info!(assessment_id = %id, actor = %actor.id, %question_id, "snapshot question updated");
        Ok(updated)
    }

    pub fn delete_question(
        &self,
        actor: &Actor,
        id: &AssessmentId,
        question_id: &QuestionId,
    ) -> Result<SnapshotQuestion, AssessmentError> {
        let (_, removed) = self.commit(id, None, |assessment| {
            require_editable(assessment, "change questions")?;
            assessment.snapshot.delete(question_id)
        })?;
        info!(assessment_id = %id, actor = %actor.id, %question_id, "snapshot question deleted");
        Ok(removed)
    }

    pub fn reorder_questions(
        &self,
        actor: &Actor,
        id: &AssessmentId,
        question_type: QuestionType,
        ordered_ids: &[QuestionId],
    ) -> Result<Vec<SnapshotQuestion>, AssessmentError> {
        let (stored, ()) = self
            .commit(id, None, |assessment| {
                require_editable(assessment, "change questions")?;
                assessment.snapshot.reorder(question_type, ordered_ids)
            })
            .map_err(|err| self.log_rejection(id, "reorder questions", err))?;
        info!(assessment_id = %id, actor = %actor.id, %question_type, "snapshot questions reordered");
        Ok(stored.snapshot.questions(question_type).to_vec())
    }

    /// Destructive: replaces the snapshot and clears per-question answers and the score.
    pub fn restart_with_new_questions(
        &self,
        actor: &Actor,
        id: &AssessmentId,
    ) -> Result<Assessment, AssessmentError> {
        require_role(actor, ActorRole::Assessor, "restart assessments")?;
        let snapshot = QuestionSnapshot::from_bank(self.templates.as_ref());

        let (stored, ()) = self
            .commit(id, None, |assessment| {
                next_status(assessment.status, Transition::Restart)?;
                assessment.snapshot = snapshot;
                assessment.answers.clear();
                assessment.current_step = FIRST_STEP;
                assessment.score = None;
                assessment.submitted_at = None;
                Ok(())
            })
            .map_err(|err| self.log_rejection(id, Transition::Restart.label(), err))?;

        info!(
            assessment_id = %id,
            actor = %actor.id,
            snapshot_version = stored.snapshot.version(),
            "assessment restarted with current questions"
        );
        self.notify(EventKind::AssessmentRestarted, &stored, BTreeMap::new());
        Ok(stored)
    }

    pub fn submit(
        &self,
        actor: &Actor,
        id: &AssessmentId,
        command: SubmitCommand,
    ) -> Result<Assessment, AssessmentError> {
        require_role(actor, ActorRole::Assessor, "submit assessments")?;
        let current_version = self.templates.current_version();

        let (stored, acknowledgement) = self
            .commit(id, command.expected_revision, |assessment| {
                let target = next_status(assessment.status, Transition::Submit)?;
                require_answered_sections(assessment)?;
                let acknowledgement = snapshot_gate(
                    &assessment.snapshot.check_version(current_version),
                    command.confirm_old_questions,
                )?;

                let card = self
                    .calculator
                    .compute(&assessment.fixed)
                    .with_section_tallies(section_tallies(
                        &assessment.answers,
                        &assessment.snapshot,
                    ));
                assessment.score = Some(card);
                assessment.status = target;
                assessment.submitted_at = Some(Utc::now());
                Ok(acknowledgement)
            })
            .map_err(|err| self.log_rejection(id, Transition::Submit.label(), err))?;

        let mut details = BTreeMap::new();
        if let Some(card) = &stored.score {
            info!(
                assessment_id = %id,
                actor = %actor.id,
                total_score = card.total_score,
                rating = %card.rating,
                "assessment submitted"
            );
            details.insert("total_score".to_string(), card.total_score.to_string());
            details.insert("percentage".to_string(), format!("{:.2}", card.percentage));
            details.insert("rating".to_string(), card.rating.label().to_string());
        }
        if acknowledgement == SnapshotAcknowledgement::OutdatedConfirmed {
            details.insert(
                "snapshot_version".to_string(),
                stored.snapshot.version().to_string(),
            );
        }
        self.notify(EventKind::AssessmentSubmitted, &stored, details);
        Ok(stored)
    }

    pub fn approve(
        &self,
        actor: &Actor,
        id: &AssessmentId,
        command: ReviewCommand,
    ) -> Result<Assessment, AssessmentError> {
        require_role(actor, ActorRole::Reviewer, "approve assessments")?;
        let current_version = self.templates.current_version();
        let comments = command
            .comments
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        let (stored, ()) = self
            .commit(id, command.expected_revision, |assessment| {
                let target = next_status(assessment.status, Transition::Approve)?;
                snapshot_gate(
                    &assessment.snapshot.check_version(current_version),
                    command.confirm_old_questions,
                )?;
                assessment.review_history.append(review_entry(
                    actor,
                    ReviewAction::Approved,
                    comments,
                ));
                assessment.status = target;
                Ok(())
            })
            .map_err(|err| self.log_rejection(id, Transition::Approve.label(), err))?;

        info!(assessment_id = %id, reviewer = %actor.id, "assessment approved");
        self.notify(EventKind::AssessmentApproved, &stored, reviewer_details(actor));
        if let Err(err) = self.leads.on_approved(&stored.lead_id) {
            warn!(
                assessment_id = %id,
                lead_id = %stored.lead_id,
                error = %err,
                "lead status hook failed after approval"
            );
        }
        Ok(stored)
    }

    pub fn reject(
        &self,
        actor: &Actor,
        id: &AssessmentId,
        command: ReviewCommand,
    ) -> Result<Assessment, AssessmentError> {
        require_role(actor, ActorRole::Reviewer, "reject assessments")?;

        let (stored, ()) = self
            .commit(id, command.expected_revision, |assessment| {
                let target = next_status(assessment.status, Transition::Reject)?;
                let comments =
                    require_reject_comments(command.comments.as_deref(), &self.policy)?;
                assessment.review_history.append(review_entry(
                    actor,
                    ReviewAction::Rejected,
                    comments,
                ));
                assessment.status = target;
                Ok(())
            })
            .map_err(|err| self.log_rejection(id, Transition::Reject.label(), err))?;

        info!(assessment_id = %id, reviewer = %actor.id, "assessment rejected");
        let mut details = reviewer_details(actor);
        if let Some(entry) = stored.review_history.latest() {
            details.insert("comments".to_string(), entry.comments.clone());
        }
        details.insert(
            "rejection_count".to_string(),
            stored
                .review_history
                .count(ReviewAction::Rejected)
                .to_string(),
        );
        self.notify(EventKind::AssessmentRejected, &stored, details);
        Ok(stored)
    }

    fn load(&self, id: &AssessmentId) -> Result<Assessment, AssessmentError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| AssessmentError::NotFound(id.clone()))
    }

    /// Read, check the caller's revision, mutate a copy, then compare-and-swap.
    /// Nothing is written when `apply` fails.
    fn commit<T, F>(
        &self,
        id: &AssessmentId,
        expected_revision: Option<u64>,
        apply: F,
    ) -> Result<(Assessment, T), AssessmentError>
    where
        F: FnOnce(&mut Assessment) -> Result<T, AssessmentError>,
    {
        let mut record = self.load(id)?;
        let loaded_revision = record.revision;
        if let Some(expected) = expected_revision {
            if expected != loaded_revision {
                return Err(AssessmentError::ConcurrentModification(id.clone()));
            }
        }

        let outcome = apply(&mut record)?;
        record.updated_at = Utc::now();
        let stored = self.repository.compare_and_swap(record, loaded_revision)?;
        Ok((stored, outcome))
    }

    fn log_rejection(
        &self,
        id: &AssessmentId,
        action: &'static str,
        err: AssessmentError,
    ) -> AssessmentError {
        warn!(assessment_id = %id, action, code = err.code(), error = %err, "operation rejected");
        err
    }

    fn notify(&self, kind: EventKind, assessment: &Assessment, details: BTreeMap<String, String>) {
        let event = AssessmentEvent {
            kind,
            assessment_id: assessment.id.clone(),
            lead_id: assessment.lead_id.clone(),
            details,
        };
        if let Err(err) = self.notifier.notify(event) {
            warn!(
                assessment_id = %assessment.id,
                event = kind.name(),
                error = %err,
                "notification sink failed"
            );
        }
    }
}

fn review_entry(actor: &Actor, action: ReviewAction, comments: String) -> ReviewEntry {
    ReviewEntry {
        reviewed_at: Utc::now(),
        action,
        comments,
        reviewer_id: actor.id.clone(),
        reviewer_name: actor.name.clone(),
    }
}

fn reviewer_details(actor: &Actor) -> BTreeMap<String, String> {
    let mut details = BTreeMap::new();
    details.insert("reviewer_id".to_string(), actor.id.clone());
    details.insert("reviewer_name".to_string(), actor.name.clone());
    details
}

/// Auto-save target writing one assessor's draft through the service.
pub struct ServiceDraftSaver<R, B> {
    service: Arc<AssessmentService<R, B>>,
    actor: Actor,
    assessment_id: AssessmentId,
}

impl<R, B> ServiceDraftSaver<R, B> {
    pub fn new(
        service: Arc<AssessmentService<R, B>>,
        actor: Actor,
        assessment_id: AssessmentId,
    ) -> Self {
        Self {
            service,
            actor,
            assessment_id,
        }
    }
}

impl<R, B> DraftSaver for ServiceDraftSaver<R, B>
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    fn save(&self, patch: AnswerPatch) -> Result<u64, SaveFailure> {
        self.service
            .save_answers(&self.actor, &self.assessment_id, patch)
            .map(|receipt| receipt.revision)
            .map_err(|err| SaveFailure::from(&err))
    }
}
