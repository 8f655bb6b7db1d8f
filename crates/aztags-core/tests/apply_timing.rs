use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use aztags_core::apply::{ApplyEvent, Phase};
use aztags_core::reconcile::ChangeSet;
use aztags_core::{
    Actionable, Applier, ApplyConfig, ChangeKind, ChangeRecord, ChangeTypes, CoreError,
    ResourceId, TagSubmission, TagUpdater, TagValue,
};
use tokio::time::Instant;

const SUB: &str = "0b1f6471-1bf0-4dda-aec3-cb9272f09590";

/// Records when each submission arrives; optionally never answers for one ID.
struct ClockedUpdater {
    started: Instant,
    calls: Mutex<Vec<(String, Duration)>>,
    hang_on: Option<&'static str>,
}

impl ClockedUpdater {
    fn new(hang_on: Option<&'static str>) -> Self {
        Self {
            started: Instant::now(),
            calls: Mutex::new(Vec::new()),
            hang_on,
        }
    }
}

#[async_trait]
impl TagUpdater for ClockedUpdater {
    async fn select_subscription(&self, _subscription: &str) -> aztags_core::Result<()> {
        Ok(())
    }

    async fn submit(&self, submission: &TagSubmission) -> aztags_core::Result<()> {
        let id = submission.id.display().to_string();
        self.calls
            .lock()
            .unwrap()
            .push((submission.tag_args().join(" "), self.started.elapsed()));
        if self.hang_on.is_some_and(|h| id.ends_with(h)) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

fn record(kind: ChangeKind, value: &str, current: Option<&str>) -> ChangeRecord {
    ChangeRecord::new(kind, TagValue::Text(value.into()), current.map(str::to_string))
}

fn swap_changes() -> Actionable {
    let id = ResourceId::parse(&format!("/subscriptions/{SUB}/resourceGroups/Web")).unwrap();
    let mut changes = ChangeSet::new();
    changes.insert(&id, "Env", record(ChangeKind::Add, "prod", None));
    changes.insert(&id, "Owner", record(ChangeKind::NoUpdate, "ops", Some("ops")));
    changes.insert(&id, "env", record(ChangeKind::Swap, "prod", Some("prod")));
    Actionable {
        changes,
        change_types: ChangeTypes::incremental(),
    }
}

#[tokio::test(start_paused = true)]
async fn swap_waits_for_settle_between_phases() {
    let applier = Applier::new(ClockedUpdater::new(None), ApplyConfig::default());
    let mut phases = Vec::new();
    applier
        .apply(&swap_changes(), |event| match event {
            ApplyEvent::Submit { phase, .. } => phases.push(format!("{phase:?}")),
            ApplyEvent::Settle { delay, .. } => phases.push(format!("settle {}s", delay.as_secs())),
            _ => {}
        })
        .await
        .expect("apply");

    assert_eq!(phases, vec!["Base", "settle 10s", "Final"]);
    let calls = applier.updater().calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "Owner=ops");
    assert_eq!(calls[1].0, "Env=prod");
    assert!(calls[1].1 - calls[0].1 >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn dry_run_skips_settle_wait() {
    let config = ApplyConfig {
        dry_run: true,
        ..Default::default()
    };
    let applier = Applier::new(ClockedUpdater::new(None), config);
    let started = Instant::now();
    let mut submits = 0;
    applier
        .apply(&swap_changes(), |event| {
            if let ApplyEvent::Submit { phase, .. } = event {
                submits += 1;
                assert!(matches!(phase, Phase::Base | Phase::Final));
            }
        })
        .await
        .expect("dry run");

    assert_eq!(submits, 2);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(applier.updater().calls.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn hung_submission_times_out_and_counts_as_failure() {
    let mut changes = ChangeSet::new();
    for name in ["stuck", "fine"] {
        let id = ResourceId::parse(&format!("/subscriptions/{SUB}/resourceGroups/{name}")).unwrap();
        changes.insert(&id, "Env", record(ChangeKind::Add, "prod", None));
    }
    let actionable = Actionable {
        changes,
        change_types: ChangeTypes::incremental(),
    };

    let config = ApplyConfig {
        submit_timeout: Duration::from_secs(300),
        ..Default::default()
    };
    let applier = Applier::new(ClockedUpdater::new(Some("/stuck")), config);
    let mut failures = Vec::new();
    let err = applier
        .apply(&actionable, |event| {
            if let ApplyEvent::Failed { error, .. } = event {
                failures.push(error.to_string());
            }
        })
        .await
        .expect_err("timeout is a failure");

    assert!(matches!(err, CoreError::ApplyFailed { count: 1, .. }));
    assert!(err.to_string().ends_with(&format!("\n/subscriptions/{SUB}/resourceGroups/stuck")));
    assert!(failures[0].contains("timed out after 300s"));
    let calls = applier.updater().calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2, "processing continues below the threshold");
    assert!(calls[1].1 >= Duration::from_secs(300));
}
