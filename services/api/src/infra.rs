use ipo_readiness::assessment::{
    AssessmentEvent, AssessmentService, InMemoryAssessmentRepository, LeadId, LeadStatusHook,
    NotificationSink, NotifyError, TemplateRegistry,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type ApiAssessmentService =
    AssessmentService<InMemoryAssessmentRepository, TemplateRegistry>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Writes lifecycle events to the log until a mail relay is wired in.
#[derive(Debug, Default, Clone)]
pub(crate) struct LoggingNotifier;

impl NotificationSink for LoggingNotifier {
    fn notify(&self, event: AssessmentEvent) -> Result<(), NotifyError> {
        info!(
            event = event.kind.name(),
            assessment_id = %event.assessment_id,
            lead_id = %event.lead_id,
            details = ?event.details,
            "assessment event"
        );
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct LoggingLeadHook;

impl LeadStatusHook for LoggingLeadHook {
    fn on_approved(&self, lead_id: &LeadId) -> Result<(), NotifyError> {
        info!(%lead_id, "lead marked assessment-approved");
        Ok(())
    }
}

pub(crate) fn build_service(
    templates: Arc<TemplateRegistry>,
    notifier: Arc<dyn NotificationSink>,
    leads: Arc<dyn LeadStatusHook>,
) -> ApiAssessmentService {
    AssessmentService::new(
        Arc::new(InMemoryAssessmentRepository::default()),
        templates,
        notifier,
        leads,
    )
}
