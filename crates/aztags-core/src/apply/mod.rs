//! Applying an actionable change-set to the control plane.

mod executor;
mod plan;

pub use executor::{ApplyConfig, ApplyEvent, ApplySummary, Applier, Progress, TagUpdater};
pub use plan::{
    ApplyState, ApplyStep, Phase, ResourcePlan, SubmitMode, TagSubmission, UpdatePath,
};
