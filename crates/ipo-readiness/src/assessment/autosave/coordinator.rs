use std::collections::BTreeSet;
use std::mem;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::clock::Clock;
use super::draft::{DraftEdit, DraftSection, DraftState};
use crate::assessment::domain::AnswerPatch;
use crate::assessment::error::AssessmentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSaveConfig {
    pub debounce: Duration,
    /// Total attempts for one save, the first try included.
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1_500),
            max_attempts: 3,
            base_backoff: Duration::from_millis(1_000),
        }
    }
}

impl AutoSaveConfig {
    /// Delay before the retry that follows the `failures`-th consecutive failure.
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1u32 << exponent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SaveStatus {
    Clean,
    Dirty,
    Saving { attempt: u32 },
    RetryScheduled { failures: u32 },
    Failed { failures: u32, message: String },
    /// Someone else saved first; the draft must be reloaded before saving resumes.
    Conflict { message: String },
}

impl SaveStatus {
    pub fn is_clean(&self) -> bool {
        matches!(self, SaveStatus::Clean)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SaveFailure {
    #[error("save failed: {0}")]
    Transient(String),
    #[error("save conflicted: {0}")]
    Conflict(String),
    #[error("save rejected: {0}")]
    Rejected(String),
}

impl SaveFailure {
    pub fn message(&self) -> &str {
        match self {
            SaveFailure::Transient(message)
            | SaveFailure::Conflict(message)
            | SaveFailure::Rejected(message) => message,
        }
    }
}

impl From<&AssessmentError> for SaveFailure {
    fn from(err: &AssessmentError) -> Self {
        match err {
            AssessmentError::ConcurrentModification(_) => SaveFailure::Conflict(err.to_string()),
            AssessmentError::Repository(_) => SaveFailure::Transient(err.to_string()),
            _ => SaveFailure::Rejected(err.to_string()),
        }
    }
}

/// A save the host must perform and then report back through `complete`.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub sequence: u64,
    pub attempt: u32,
    pub sections: BTreeSet<DraftSection>,
    pub patch: AnswerPatch,
}

#[derive(Debug, Clone)]
struct InFlight {
    sequence: u64,
    sections: BTreeSet<DraftSection>,
}

/// Debounced, retrying save state machine. It performs no I/O: the host polls for
/// requests, executes them, and reports outcomes. At most one save is in flight.
#[derive(Debug)]
pub struct AutoSaveCoordinator<C> {
    clock: C,
    config: AutoSaveConfig,
    draft: DraftState,
    revision: u64,
    dirty: BTreeSet<DraftSection>,
    debounce_at: Option<Instant>,
    retry_at: Option<Instant>,
    in_flight: Option<InFlight>,
    failures: u32,
    next_sequence: u64,
    status: SaveStatus,
}

impl<C: Clock> AutoSaveCoordinator<C> {
    pub fn new(clock: C, config: AutoSaveConfig, draft: DraftState, revision: u64) -> Self {
        Self {
            clock,
            config,
            draft,
            revision,
            dirty: BTreeSet::new(),
            debounce_at: None,
            retry_at: None,
            in_flight: None,
            failures: 0,
            next_sequence: 1,
            status: SaveStatus::Clean,
        }
    }

    pub fn draft(&self) -> &DraftState {
        &self.draft
    }

    /// Last revision the server acknowledged.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !self.dirty.is_empty() || self.in_flight.is_some()
    }

    /// Records an edit and (re)arms the debounce timer.
    pub fn edit(&mut self, edit: DraftEdit) {
        let Some(section) = self.draft.apply(edit) else {
            return;
        };
        self.dirty.insert(section);

        if matches!(self.status, SaveStatus::Conflict { .. }) {
            return;
        }
        if matches!(self.status, SaveStatus::Failed { .. }) {
            self.failures = 0;
        }
        self.debounce_at = Some(self.clock.now() + self.config.debounce);

        if self.in_flight.is_none() && self.retry_at.is_none() {
            self.status = SaveStatus::Dirty;
        }
    }

    /// Next save to perform, if one is due now.
    pub fn poll(&mut self) -> Option<SaveRequest> {
        if self.in_flight.is_some() || matches!(self.status, SaveStatus::Conflict { .. }) {
            return None;
        }
        let now = self.clock.now();

        if let Some(retry_at) = self.retry_at {
            if now < retry_at {
                return None;
            }
            self.retry_at = None;
            self.debounce_at = None;
            return self.dispatch(self.failures + 1);
        }
        if matches!(self.status, SaveStatus::Failed { .. }) {
            return None;
        }

        match self.debounce_at {
            Some(due) if now >= due => {
                self.debounce_at = None;
                self.dispatch(1)
            }
            _ => None,
        }
    }

    /// Skips the debounce (and any pending backoff) and returns the save to run now.
    pub fn flush(&mut self) -> Option<SaveRequest> {
        if self.in_flight.is_some()
            || self.dirty.is_empty()
            || matches!(self.status, SaveStatus::Conflict { .. })
        {
            return None;
        }
        if matches!(self.status, SaveStatus::Failed { .. }) {
            self.failures = 0;
        }
        let attempt = self.failures + 1;
        self.retry_at = None;
        self.debounce_at = None;
        self.dispatch(attempt)
    }

    /// Reports the outcome of request `sequence`. Stale sequences are ignored.
    pub fn complete(&mut self, sequence: u64, outcome: Result<u64, SaveFailure>) -> bool {
        let in_flight = match self.in_flight.take() {
            Some(in_flight) if in_flight.sequence == sequence => in_flight,
            other => {
                self.in_flight = other;
                return false;
            }
        };

        match outcome {
            Ok(revision) => {
                self.revision = revision;
                self.failures = 0;
                if self.dirty.is_empty() {
                    self.status = SaveStatus::Clean;
                } else {
                    if self.debounce_at.is_none() {
                        self.debounce_at = Some(self.clock.now() + self.config.debounce);
                    }
                    self.status = SaveStatus::Dirty;
                }
            }
            Err(failure) => {
                self.dirty.extend(in_flight.sections);
                self.failures += 1;
                match failure {
                    SaveFailure::Transient(message) => {
                        if self.failures >= self.config.max_attempts {
                            self.retry_at = None;
                            self.status = SaveStatus::Failed {
                                failures: self.failures,
                                message,
                            };
                        } else {
                            self.retry_at =
                                Some(self.clock.now() + self.config.backoff(self.failures));
                            self.status = SaveStatus::RetryScheduled {
                                failures: self.failures,
                            };
                        }
                    }
                    SaveFailure::Conflict(message) => {
                        self.retry_at = None;
                        self.debounce_at = None;
                        self.status = SaveStatus::Conflict { message };
                    }
                    SaveFailure::Rejected(message) => {
                        self.retry_at = None;
                        self.status = SaveStatus::Failed {
                            failures: self.failures,
                            message,
                        };
                    }
                }
            }
        }
        true
    }

    /// When the host should call `poll` next.
    pub fn next_wakeup(&self) -> Option<Instant> {
        if self.in_flight.is_some() || matches!(self.status, SaveStatus::Conflict { .. }) {
            return None;
        }
        if self.retry_at.is_some() {
            return self.retry_at;
        }
        if matches!(self.status, SaveStatus::Failed { .. }) || self.dirty.is_empty() {
            return None;
        }
        self.debounce_at
    }

    /// Replaces the draft with server state, discarding unsaved local edits.
    pub fn reload(&mut self, draft: DraftState, revision: u64) {
        self.draft = draft;
        self.revision = revision;
        self.dirty.clear();
        self.debounce_at = None;
        self.retry_at = None;
        self.in_flight = None;
        self.failures = 0;
        self.status = SaveStatus::Clean;
    }

    fn dispatch(&mut self, attempt: u32) -> Option<SaveRequest> {
        if self.dirty.is_empty() {
            return None;
        }
        let sections = mem::take(&mut self.dirty);
        let patch = self.draft.patch(&sections, Some(self.revision));
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.in_flight = Some(InFlight {
            sequence,
            sections: sections.clone(),
        });
        self.status = SaveStatus::Saving { attempt };
        Some(SaveRequest {
            sequence,
            attempt,
            sections,
            patch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::autosave::clock::ManualClock;
    use crate::assessment::domain::{AnswerRecord, AnswerScore, AnswerSection, QuestionId};

    fn coordinator(clock: &ManualClock) -> AutoSaveCoordinator<ManualClock> {
        AutoSaveCoordinator::new(
            clock.clone(),
            AutoSaveConfig::default(),
            DraftState::default(),
            1,
        )
    }

    fn answer_edit(question: &str, score: i8) -> DraftEdit {
        DraftEdit::SetAnswer {
            section: AnswerSection::Company,
            question_id: QuestionId::new(question),
            answer: AnswerRecord::scored(AnswerScore::try_from(score).expect("valid score")),
        }
    }

    #[test]
    fn backoff_doubles_from_base() {
        let config = AutoSaveConfig::default();
        assert_eq!(config.backoff(1), Duration::from_millis(1_000));
        assert_eq!(config.backoff(2), Duration::from_millis(2_000));
        assert_eq!(config.backoff(3), Duration::from_millis(4_000));
    }

    #[test]
    fn edits_inside_debounce_window_coalesce() {
        let clock = ManualClock::new();
        let mut saver = coordinator(&clock);

        saver.edit(answer_edit("company-001", 1));
        clock.advance(Duration::from_millis(1_000));
        saver.edit(answer_edit("company-002", -1));
        clock.advance(Duration::from_millis(1_000));
        assert!(saver.poll().is_none(), "debounce restarts on every edit");

        clock.advance(Duration::from_millis(500));
        let request = saver.poll().expect("save due");
        assert_eq!(request.attempt, 1);
        assert_eq!(request.patch.expected_revision, Some(1));
        assert_eq!(request.patch.company.as_ref().map(|map| map.len()), Some(2));
        assert!(saver.poll().is_none(), "only one save in flight");
    }

    #[test]
    fn successful_save_returns_to_clean() {
        let clock = ManualClock::new();
        let mut saver = coordinator(&clock);
        saver.edit(answer_edit("company-001", 1));
        clock.advance(Duration::from_millis(1_500));

        let request = saver.poll().expect("save due");
        assert!(saver.has_unsaved_changes());
        assert!(saver.complete(request.sequence, Ok(2)));

        assert_eq!(saver.status(), &SaveStatus::Clean);
        assert_eq!(saver.revision(), 2);
        assert!(!saver.has_unsaved_changes());
        assert!(saver.next_wakeup().is_none());
    }

    #[test]
    fn edit_during_save_is_saved_afterwards() {
        let clock = ManualClock::new();
        let mut saver = coordinator(&clock);
        saver.edit(answer_edit("company-001", 1));
        clock.advance(Duration::from_millis(1_500));
        let first = saver.poll().expect("save due");

        saver.edit(answer_edit("company-002", 1));
        assert_eq!(saver.status(), &SaveStatus::Saving { attempt: 1 });
        saver.complete(first.sequence, Ok(2));
        assert_eq!(saver.status(), &SaveStatus::Dirty);

        clock.advance(Duration::from_millis(1_500));
        let second = saver.poll().expect("second save due");
        assert_eq!(second.patch.expected_revision, Some(2));
    }

    #[test]
    fn transient_failures_back_off_then_give_up() {
        let clock = ManualClock::new();
        let mut saver = coordinator(&clock);
        saver.edit(answer_edit("company-001", 1));
        clock.advance(Duration::from_millis(1_500));

        let first = saver.poll().expect("first attempt");
        saver.complete(first.sequence, Err(SaveFailure::Transient("offline".into())));
        assert_eq!(saver.status(), &SaveStatus::RetryScheduled { failures: 1 });
        clock.advance(Duration::from_millis(999));
        assert!(saver.poll().is_none());
        clock.advance(Duration::from_millis(1));

        let second = saver.poll().expect("second attempt");
        assert_eq!(second.attempt, 2);
        assert_eq!(second.sections, first.sections);
        saver.complete(second.sequence, Err(SaveFailure::Transient("offline".into())));
        clock.advance(Duration::from_millis(2_000));

        let third = saver.poll().expect("third attempt");
        assert_eq!(third.attempt, 3);
        saver.complete(third.sequence, Err(SaveFailure::Transient("offline".into())));

        assert_eq!(
            saver.status(),
            &SaveStatus::Failed {
                failures: 3,
                message: "offline".into()
            }
        );
        clock.advance(Duration::from_secs(60));
        assert!(saver.poll().is_none());
        assert!(saver.has_unsaved_changes());
    }

    #[test]
    fn conflict_halts_until_reload() {
        let clock = ManualClock::new();
        let mut saver = coordinator(&clock);
        saver.edit(answer_edit("company-001", 1));
        clock.advance(Duration::from_millis(1_500));
        let request = saver.poll().expect("save due");

        saver.complete(request.sequence, Err(SaveFailure::Conflict("stale".into())));
        saver.edit(answer_edit("company-002", 1));
        clock.advance(Duration::from_secs(10));
        assert!(saver.poll().is_none());
        assert!(saver.flush().is_none());

        saver.reload(DraftState::default(), 7);
        assert_eq!(saver.status(), &SaveStatus::Clean);
        saver.edit(answer_edit("company-003", 1));
        let request = saver.flush().expect("flush after reload");
        assert_eq!(request.patch.expected_revision, Some(7));
    }

    #[test]
    fn flush_skips_debounce() {
        let clock = ManualClock::new();
        let mut saver = coordinator(&clock);
        assert!(saver.flush().is_none(), "nothing to flush");

        saver.edit(answer_edit("company-001", 1));
        let request = saver.flush().expect("flushed immediately");
        assert_eq!(request.attempt, 1);
    }

    #[test]
    fn stale_completion_is_ignored() {
        let clock = ManualClock::new();
        let mut saver = coordinator(&clock);
        saver.edit(answer_edit("company-001", 1));
        let request = saver.flush().expect("save");

        assert!(!saver.complete(request.sequence + 1, Ok(9)));
        assert!(saver.complete(request.sequence, Ok(2)));
        assert_eq!(saver.revision(), 2);
    }

    #[test]
    fn edit_after_failure_rearms_saving() {
        let clock = ManualClock::new();
        let mut saver = coordinator(&clock);
        saver.edit(answer_edit("company-001", 1));
        let request = saver.flush().expect("save");
        saver.complete(request.sequence, Err(SaveFailure::Rejected("invalid state".into())));
        assert!(matches!(saver.status(), SaveStatus::Failed { .. }));

        saver.edit(answer_edit("company-002", 1));
        assert_eq!(saver.status(), &SaveStatus::Dirty);
        clock.advance(Duration::from_millis(1_500));
        let retry = saver.poll().expect("save after new edit");
        assert_eq!(retry.attempt, 1);
        assert_eq!(retry.patch.company.as_ref().map(|map| map.len()), Some(2));
    }
}
