use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use super::clock::TokioClock;
use super::coordinator::{AutoSaveConfig, AutoSaveCoordinator, SaveFailure, SaveRequest, SaveStatus};
use super::draft::{DraftEdit, DraftState};
use crate::assessment::domain::AnswerPatch;

/// Destination for auto-saved patches; returns the new revision on success.
pub trait DraftSaver: Send + Sync + 'static {
    fn save(&self, patch: AnswerPatch) -> Result<u64, SaveFailure>;
}

enum Command {
    Edit(DraftEdit),
    Flush(oneshot::Sender<SaveStatus>),
    Reload(DraftState, u64),
    Shutdown,
}

/// Client side of a running auto-save task.
pub struct AutoSaveHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SaveStatus>,
    task: JoinHandle<()>,
}

impl AutoSaveHandle {
    /// Queues an edit; returns `false` once the task has stopped.
    pub fn edit(&self, edit: DraftEdit) -> bool {
        self.commands.send(Command::Edit(edit)).is_ok()
    }

    /// Saves pending edits now and waits for the outcome.
    pub async fn flush(&self) -> Option<SaveStatus> {
        let (reply, outcome) = oneshot::channel();
        self.commands.send(Command::Flush(reply)).ok()?;
        outcome.await.ok()
    }

    pub fn reload(&self, draft: DraftState, revision: u64) -> bool {
        self.commands.send(Command::Reload(draft, revision)).is_ok()
    }

    pub fn status(&self) -> SaveStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status.clone()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !self.status.borrow().is_clean()
    }

    /// Flushes what is pending, stops the task and reports the final status.
    pub async fn shutdown(self) -> SaveStatus {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(err) = self.task.await {
            warn!(error = %err, "auto-save task ended abnormally");
        }
        let status = self.status.borrow().clone();
        status
    }
}

/// Runs a coordinator on the current tokio runtime against `saver`.
pub fn spawn_autosave<S: DraftSaver>(
    saver: Arc<S>,
    config: AutoSaveConfig,
    draft: DraftState,
    revision: u64,
) -> AutoSaveHandle {
    let coordinator = AutoSaveCoordinator::new(TokioClock, config, draft, revision);
    let (commands, receiver) = mpsc::unbounded_channel();
    let (publisher, status) = watch::channel(SaveStatus::Clean);
    let task = tokio::spawn(run(coordinator, saver, receiver, publisher));

    AutoSaveHandle {
        commands,
        status,
        task,
    }
}

async fn run<S: DraftSaver>(
    mut coordinator: AutoSaveCoordinator<TokioClock>,
    saver: Arc<S>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<SaveStatus>,
) {
    loop {
        while let Some(request) = coordinator.poll() {
            execute(&mut coordinator, saver.as_ref(), request);
        }
        status.send_replace(coordinator.status().clone());

        let wakeup = coordinator.next_wakeup().map(Instant::from_std);
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Edit(edit)) => coordinator.edit(edit),
                Some(Command::Flush(reply)) => {
                    if let Some(request) = coordinator.flush() {
                        execute(&mut coordinator, saver.as_ref(), request);
                    }
                    status.send_replace(coordinator.status().clone());
                    let _ = reply.send(coordinator.status().clone());
                }
                Some(Command::Reload(draft, revision)) => coordinator.reload(draft, revision),
                Some(Command::Shutdown) | None => {
                    if let Some(request) = coordinator.flush() {
                        execute(&mut coordinator, saver.as_ref(), request);
                    }
                    status.send_replace(coordinator.status().clone());
                    break;
                }
            },
            _ = sleep_until(wakeup.unwrap_or_else(Instant::now)), if wakeup.is_some() => {}
        }
    }
}

fn execute<S: DraftSaver>(
    coordinator: &mut AutoSaveCoordinator<TokioClock>,
    saver: &S,
    request: SaveRequest,
) {
    debug!(
        sequence = request.sequence,
        attempt = request.attempt,
        sections = request.sections.len(),
        "auto-saving draft"
    );
    let outcome = saver.save(request.patch);
    if let Err(failure) = &outcome {
        warn!(attempt = request.attempt, error = %failure, "auto-save attempt failed");
    }
    coordinator.complete(request.sequence, outcome);
}
