//! Debounced auto-save for assessment drafts.
//!
//! [`AutoSaveCoordinator`] is a pure state machine over an injectable [`Clock`];
//! [`spawn_autosave`] drives one on tokio against a [`DraftSaver`].

mod clock;
mod coordinator;
mod draft;
mod driver;

pub use clock::{Clock, ManualClock, TokioClock};
pub use coordinator::{AutoSaveConfig, AutoSaveCoordinator, SaveFailure, SaveRequest, SaveStatus};
pub use draft::{DraftEdit, DraftSection, DraftState};
pub use driver::{spawn_autosave, AutoSaveHandle, DraftSaver};
