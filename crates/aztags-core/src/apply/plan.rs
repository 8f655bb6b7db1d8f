//! Per-resource submission planning.
//!
//! A resource with a case-only rename (`SWAP`) is applied in two
//! submissions separated by a settle wait; any other resource needs a single
//! submission. [`ResourcePlan`] walks the states
//! `PendingBase -> Settle -> PendingFinal -> Done` and yields one
//! [`ApplyStep`] per transition. Single-submission resources start at
//! `PendingFinal`.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::change::ChangeKind;
use crate::identity::ResourceId;
use crate::reconcile::ResourceChanges;

/// Depth (number of `/`) above which the tag-only update path is used.
const TAG_ONLY_MIN_DEPTH: usize = 5;

/// Whether tags not in a submission survive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    Merge,
    Replace,
}

impl SubmitMode {
    fn for_deletes(deletes_enabled: bool) -> Self {
        if deletes_enabled {
            Self::Replace
        } else {
            Self::Merge
        }
    }
}

impl fmt::Display for SubmitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => write!(f, "Merge"),
            Self::Replace => write!(f, "Replace"),
        }
    }
}

/// Which control-plane operation carries the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePath {
    /// Tags-only endpoint, used for resources nested below resource groups.
    TagOnly,
    /// Resource-scoped endpoint; the tag-only endpoint does not apply to a
    /// resource group itself.
    ResourceScoped,
}

impl UpdatePath {
    pub fn for_id(display: &str) -> Self {
        if display.matches('/').count() > TAG_ONLY_MIN_DEPTH {
            Self::TagOnly
        } else {
            Self::ResourceScoped
        }
    }
}

/// One external tag update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSubmission {
    pub id: ResourceId,
    pub path: UpdatePath,
    pub mode: SubmitMode,
    pub tags: Vec<(String, String)>,
}

impl TagSubmission {
    /// `name=value` arguments; an empty tag list is passed as one empty
    /// argument.
    pub fn tag_args(&self) -> Vec<String> {
        if self.tags.is_empty() {
            return vec![String::new()];
        }
        self.tags
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect()
    }

    /// The control-plane command line for this submission.
    pub fn command_line(&self, program: &str) -> Vec<String> {
        let mut args = vec![program.to_string()];
        match self.path {
            UpdatePath::TagOnly => {
                args.extend(["tag", "update", "--operation"].map(String::from));
                args.push(self.mode.to_string());
                args.extend(["--resource-id".to_string(), self.id.display().to_string()]);
            }
            UpdatePath::ResourceScoped => {
                args.extend(["resource", "tag"].map(String::from));
                if self.mode == SubmitMode::Merge {
                    args.push("--is-incremental".to_string());
                }
                args.extend(["--ids".to_string(), self.id.display().to_string()]);
            }
        }
        args.push("--tags".to_string());
        args.extend(self.tag_args());
        args
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Everything except the renamed tag.
    Base,
    Final,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyStep {
    Submit { phase: Phase, submission: TagSubmission },
    /// Wait before re-adding a renamed tag; the control plane may drop a
    /// case-only rename that follows a conflicting write too closely.
    Settle(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyState {
    PendingBase,
    Settle,
    PendingFinal,
    Done,
}

/// Step sequence for one resource.
#[derive(Debug, Clone)]
pub struct ResourcePlan<'a> {
    resource: &'a ResourceChanges,
    deletes_enabled: bool,
    settle_delay: Duration,
    state: ApplyState,
}

impl<'a> ResourcePlan<'a> {
    pub fn new(resource: &'a ResourceChanges, deletes_enabled: bool, settle_delay: Duration) -> Self {
        let state = if resource.has_kind(ChangeKind::Swap) {
            ApplyState::PendingBase
        } else {
            ApplyState::PendingFinal
        };
        Self {
            resource,
            deletes_enabled,
            settle_delay,
            state,
        }
    }

    pub fn state(&self) -> ApplyState {
        self.state
    }

    pub fn is_two_phase(&self) -> bool {
        self.resource.has_kind(ChangeKind::Swap)
    }

    fn base_submission(&self) -> TagSubmission {
        let mut casings: HashMap<String, usize> = HashMap::new();
        for tag in self.resource.tags.keys() {
            *casings.entry(tag.to_lowercase()).or_default() += 1;
        }
        let kinds = [
            ChangeKind::Add,
            ChangeKind::Update,
            ChangeKind::NoUpdate,
            ChangeKind::Leave,
            ChangeKind::Del,
        ];
        self.submission(&kinds, SubmitMode::Merge, |tag| {
            casings.get(&tag.to_lowercase()).copied().unwrap_or_default() == 1
        })
    }

    fn final_submission(&self) -> TagSubmission {
        let mut kinds = vec![ChangeKind::Add, ChangeKind::Update];
        if self.is_two_phase() {
            kinds.push(ChangeKind::Leave);
            if self.deletes_enabled {
                kinds.push(ChangeKind::NoUpdate);
            }
        } else if self.deletes_enabled {
            kinds.extend([ChangeKind::NoUpdate, ChangeKind::Leave]);
        }
        self.submission(&kinds, SubmitMode::for_deletes(self.deletes_enabled), |_| true)
    }

    fn submission(
        &self,
        kinds: &[ChangeKind],
        mode: SubmitMode,
        include: impl Fn(&str) -> bool,
    ) -> TagSubmission {
        let tags = self
            .resource
            .tags
            .iter()
            .filter(|(tag, record)| kinds.contains(&record.kind) && include(tag.as_str()))
            .filter_map(|(tag, record)| {
                record
                    .submitted_value()
                    .map(|value| (tag.clone(), value.to_string()))
            })
            .collect();
        TagSubmission {
            id: self.resource.id.clone(),
            path: UpdatePath::for_id(self.resource.id.display()),
            mode,
            tags,
        }
    }
}

impl Iterator for ResourcePlan<'_> {
    type Item = ApplyStep;

    fn next(&mut self) -> Option<ApplyStep> {
        match self.state {
            ApplyState::PendingBase => {
                self.state = ApplyState::Settle;
                Some(ApplyStep::Submit {
                    phase: Phase::Base,
                    submission: self.base_submission(),
                })
            }
            ApplyState::Settle => {
                self.state = ApplyState::PendingFinal;
                Some(ApplyStep::Settle(self.settle_delay))
            }
            ApplyState::PendingFinal => {
                self.state = ApplyState::Done;
                Some(ApplyStep::Submit {
                    phase: Phase::Final,
                    submission: self.final_submission(),
                })
            }
            ApplyState::Done => None,
        }
    }
}
