//! In-process adapters for the engine's collaborator traits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::domain::{Assessment, AssessmentId, LeadId};
use super::repository::{
    AssessmentEvent, AssessmentRepository, LeadStatusHook, NotificationSink, NotifyError,
    RepositoryError,
};

#[derive(Default, Clone)]
pub struct InMemoryAssessmentRepository {
    records: Arc<Mutex<HashMap<AssessmentId, Assessment>>>,
}

impl InMemoryAssessmentRepository {
    pub fn len(&self) -> usize {
        self.records.lock().expect("repository mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssessmentRepository for InMemoryAssessmentRepository {
    fn insert(&self, record: Assessment) -> Result<Assessment, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard
            .values()
            .any(|existing| existing.lead_id == record.lead_id || existing.id == record.id)
        {
            return Err(RepositoryError::Conflict(record.lead_id));
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &AssessmentId) -> Result<Option<Assessment>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_by_lead(&self, lead_id: &LeadId) -> Result<Option<Assessment>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .find(|record| &record.lead_id == lead_id)
            .cloned())
    }

    fn compare_and_swap(
        &self,
        mut record: Assessment,
        expected_revision: u64,
    ) -> Result<Assessment, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let stored = guard
            .get_mut(&record.id)
            .ok_or_else(|| RepositoryError::NotFound(record.id.clone()))?;

        if stored.revision != expected_revision {
            return Err(RepositoryError::RevisionMismatch {
                id: record.id,
                expected: expected_revision,
                actual: stored.revision,
            });
        }

        record.revision = expected_revision + 1;
        *stored = record.clone();
        Ok(record)
    }
}

/// Sink that keeps every event, for demos and tests.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<AssessmentEvent>>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<AssessmentEvent> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, event: AssessmentEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(event);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct RecordingLeadHook {
    approved: Arc<Mutex<Vec<LeadId>>>,
}

impl RecordingLeadHook {
    pub fn approved_leads(&self) -> Vec<LeadId> {
        self.approved.lock().expect("lead hook mutex poisoned").clone()
    }
}

impl LeadStatusHook for RecordingLeadHook {
    fn on_approved(&self, lead_id: &LeadId) -> Result<(), NotifyError> {
        self.approved
            .lock()
            .expect("lead hook mutex poisoned")
            .push(lead_id.clone());
        Ok(())
    }
}
