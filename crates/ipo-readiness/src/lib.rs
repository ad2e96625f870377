//! Assessment lifecycle engine for IPO-readiness reviews.
//!
//! The engine owns the per-assessment question snapshot, the fixed scoring
//! rubric, the debounced auto-save scheduler, and the
//! draft/submitted/approved/rejected state machine together with its review
//! ledger. Identity, persistence, the template question bank, and outbound
//! notifications are collaborators injected through traits.

pub mod assessment;
pub mod config;
pub mod error;
pub mod telemetry;
