use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CoreError, Result};
use crate::identity::ResourceId;
use crate::reconcile::Actionable;

use super::plan::{ApplyStep, Phase, ResourcePlan, TagSubmission};

/// Issues tag updates against the control plane.
#[async_trait]
pub trait TagUpdater: Send + Sync {
    /// Make `subscription` the target of the following submissions.
    async fn select_subscription(&self, subscription: &str) -> Result<()>;

    async fn submit(&self, submission: &TagSubmission) -> Result<()>;
}

/// Apply settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyConfig {
    /// Walk every step without submitting or waiting.
    pub dry_run: bool,
    /// Stop after this many failed resources.
    pub max_failures: usize,
    pub settle_delay: Duration,
    pub submit_timeout: Duration,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_failures: 10,
            settle_delay: Duration::from_secs(10),
            submit_timeout: Duration::from_secs(300),
        }
    }
}

/// Position of a resource within the whole run, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub index: usize,
    pub total: usize,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.total)
    }
}

/// Notifications emitted while applying, in order.
#[derive(Debug)]
pub enum ApplyEvent<'a> {
    Subscription(&'a str),
    Submit {
        progress: Progress,
        phase: Phase,
        submission: &'a TagSubmission,
    },
    Settle {
        progress: Progress,
        delay: Duration,
    },
    Failed {
        progress: Progress,
        id: &'a ResourceId,
        error: &'a CoreError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub submissions: usize,
}

/// Runs the per-resource plans of an [`Actionable`] change-set one at a time.
pub struct Applier<U> {
    updater: U,
    config: ApplyConfig,
}

impl<U: TagUpdater> Applier<U> {
    pub fn new(updater: U, config: ApplyConfig) -> Self {
        Self { updater, config }
    }

    pub fn config(&self) -> &ApplyConfig {
        &self.config
    }

    pub fn updater(&self) -> &U {
        &self.updater
    }

    /// Apply every resource, stopping once `max_failures` resources failed.
    ///
    /// Returns [`CoreError::ApplyFailed`] listing every failed ID when any
    /// resource failed.
    pub async fn apply<F>(&self, actionable: &Actionable, mut on_event: F) -> Result<ApplySummary>
    where
        F: FnMut(ApplyEvent<'_>),
    {
        let deletes_enabled = actionable.change_types.deletes_enabled();
        let total = actionable.resource_count();
        let mut summary = ApplySummary::default();
        let mut failed: Vec<String> = Vec::new();
        let mut index = 0;

        'subscriptions: for (subscription, resources) in actionable.changes.subscriptions() {
            tracing::info!(subscription, dry_run = self.config.dry_run, "Updating tags for subscription");
            on_event(ApplyEvent::Subscription(subscription));
            if !self.config.dry_run {
                self.updater.select_subscription(subscription).await?;
            }

            for resource in resources {
                index += 1;
                let progress = Progress { index, total };
                summary.attempted += 1;

                let plan = ResourcePlan::new(resource, deletes_enabled, self.config.settle_delay);
                match self.run_plan(plan, progress, &mut summary, &mut on_event).await {
                    Ok(()) => summary.succeeded += 1,
                    Err(error) => {
                        tracing::warn!(id = %resource.id, %progress, error = %error, "Tag update failed");
                        on_event(ApplyEvent::Failed {
                            progress,
                            id: &resource.id,
                            error: &error,
                        });
                        failed.push(resource.id.display().to_string());
                        if failed.len() >= self.config.max_failures {
                            tracing::error!(failures = failed.len(), "Too many failed updates, stopping");
                            break 'subscriptions;
                        }
                    }
                }
            }
        }

        if failed.is_empty() {
            tracing::info!(
                resources = summary.succeeded,
                submissions = summary.submissions,
                "Tag updates complete"
            );
            Ok(summary)
        } else {
            Err(CoreError::apply_failed(failed))
        }
    }

    /// Run one resource's steps. The first failed submission ends the
    /// resource; a failed base phase is never followed by the final phase.
    async fn run_plan<F>(
        &self,
        plan: ResourcePlan<'_>,
        progress: Progress,
        summary: &mut ApplySummary,
        on_event: &mut F,
    ) -> Result<()>
    where
        F: FnMut(ApplyEvent<'_>),
    {
        for step in plan {
            match step {
                ApplyStep::Submit { phase, submission } => {
                    on_event(ApplyEvent::Submit {
                        progress,
                        phase,
                        submission: &submission,
                    });
                    summary.submissions += 1;
                    if !self.config.dry_run {
                        self.submit(&submission).await?;
                    }
                }
                ApplyStep::Settle(delay) => {
                    on_event(ApplyEvent::Settle { progress, delay });
                    if !self.config.dry_run {
                        tracing::debug!(%progress, ?delay, "Waiting before re-adding renamed tag");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        Ok(())
    }

    async fn submit(&self, submission: &TagSubmission) -> Result<()> {
        let timeout = self.config.submit_timeout;
        match tokio::time::timeout(timeout, self.updater.submit(submission)).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::submit_timeout(
                submission.id.display(),
                timeout.as_secs(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeKind, ChangeRecord, ChangeTypes, TagValue};
    use crate::reconcile::ChangeSet;
    use std::sync::Mutex;

    const SUB: &str = "11111111-2222-3333-4444-555555555555";

    #[derive(Default)]
    struct Recorder {
        selected: Mutex<Vec<String>>,
        submitted: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl TagUpdater for Recorder {
        async fn select_subscription(&self, subscription: &str) -> Result<()> {
            self.selected.lock().unwrap().push(subscription.to_string());
            Ok(())
        }

        async fn submit(&self, submission: &TagSubmission) -> Result<()> {
            let id = submission.id.display().to_string();
            self.submitted.lock().unwrap().push(id.clone());
            if self.fail_on.as_deref().is_some_and(|f| id.ends_with(f)) {
                return Err(CoreError::submission(id, "boom"));
            }
            Ok(())
        }
    }

    fn actionable(rgs: &[&str]) -> Actionable {
        let mut changes = ChangeSet::new();
        for rg in rgs {
            let id = ResourceId::parse(&format!("/subscriptions/{SUB}/resourceGroups/{rg}")).unwrap();
            changes.insert(
                &id,
                "Env",
                ChangeRecord::new(ChangeKind::Add, TagValue::Text("prod".into()), None),
            );
        }
        Actionable {
            changes,
            change_types: ChangeTypes::incremental(),
        }
    }

    #[tokio::test]
    async fn test_applies_every_resource_in_order() {
        let applier = Applier::new(Recorder::default(), ApplyConfig::default());
        let mut progress = Vec::new();
        let summary = applier
            .apply(&actionable(&["a", "b"]), |event| {
                if let ApplyEvent::Submit { progress: p, .. } = event {
                    progress.push(p.to_string());
                }
            })
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(progress, vec!["1/2", "2/2"]);
        assert_eq!(*applier.updater().selected.lock().unwrap(), vec![SUB.to_string()]);
    }

    #[tokio::test]
    async fn test_dry_run_submits_nothing() {
        let config = ApplyConfig {
            dry_run: true,
            ..Default::default()
        };
        let applier = Applier::new(Recorder::default(), config);
        let summary = applier.apply(&actionable(&["a"]), |_| {}).await.unwrap();
        assert_eq!(summary.submissions, 1);
        assert!(applier.updater().submitted.lock().unwrap().is_empty());
        assert!(applier.updater().selected.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_breaker_stops_after_threshold() {
        let updater = Recorder {
            fail_on: Some("/a".into()),
            ..Default::default()
        };
        let config = ApplyConfig {
            max_failures: 1,
            ..Default::default()
        };
        let applier = Applier::new(updater, config);
        let err = applier.apply(&actionable(&["a", "b"]), |_| {}).await.unwrap_err();

        assert_eq!(err.failed_ids().len(), 1);
        assert!(err.failed_ids()[0].ends_with("/resourceGroups/a"));
        assert_eq!(applier.updater().submitted.lock().unwrap().len(), 1, "b is never attempted");
    }
}
