pub mod apply;
pub mod capability;
pub mod change;
pub mod desired;
pub mod error;
pub mod export;
pub mod filter;
pub mod identity;
pub mod reconcile;
pub mod report;
pub mod scope;
pub mod store;

pub use apply::{Applier, ApplyConfig, ApplyEvent, ApplySummary, TagSubmission, TagUpdater};
pub use capability::{CapabilityTable, DEFAULT_CAPABILITY_URL};
pub use change::{ChangeKind, ChangeRecord, ChangeTypes, NO_VALUE, TagValue};
pub use desired::{Delimiter, DesiredSource, DesiredState};
pub use error::{CoreError, ErrorCategory, Result};
pub use export::{ExportMode, TagExporter, TagInventory};
pub use filter::{ExclusionSet, FilterPolicy, SkipReason, Taggability, TaggabilityFilter};
pub use identity::{ResourceId, Scope};
pub use reconcile::{Actionable, ChangeSet, Classified, Reconciled, Reconciler, ResourceChanges};
pub use report::{ChangeReport, ReportLine};
pub use scope::ScopeTable;
pub use store::{ActualResource, ActualState, DocumentKind};
