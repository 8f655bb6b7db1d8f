#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use aztags_cli::azcli::AzCli;
use aztags_core::apply::{SubmitMode, UpdatePath};
use aztags_core::{ResourceId, TagSubmission, TagUpdater};

const SUB: &str = "0b1f6471-1bf0-4dda-aec3-cb9272f09590";

/// Write a stand-in `az` that logs its arguments and prints canned listings.
fn fake_az(dir: &Path, fail_updates: bool) -> (PathBuf, PathBuf) {
    let log = dir.join("calls.log");
    let script = dir.join("az");
    let update_exit = if fail_updates { 1 } else { 0 };
    let body = format!(
        r#"#!/bin/sh
echo "$@" >> "{log}"
case "$1 $2" in
  "account set") exit 0 ;;
  "resource list") echo '[{{"id": "/subscriptions/{SUB}/resourceGroups/Web/providers/Microsoft.Web/sites/frontend", "type": "Microsoft.Web/sites", "tags": {{"Env": "dev"}}}}]' ;;
  "group list") echo '[{{"id": "/subscriptions/{SUB}/resourceGroups/Web", "type": "Microsoft.Resources/resourceGroups", "tags": {{"Owner": "ops"}}}}]' ;;
  "account show") echo '{{"id": "{SUB}", "name": "dev"}}' ;;
  *) echo "update rejected" >&2; exit {update_exit} ;;
esac
"#,
        log = log.display()
    );
    fs::write(&script, body).expect("write script");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");
    (script, log)
}

#[tokio::test]
async fn fetches_listings_per_subscription() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let (script, log) = fake_az(dir.path(), false);
    let az = AzCli::new(script.display().to_string());

    let store = az.fetch_actual_state([SUB]).await.expect("fetch");
    assert_eq!(store.len(), 3);
    let site = store
        .get(&format!("/subscriptions/{SUB}/resourceGroups/web/providers/Microsoft.Web/sites/frontend"))
        .expect("site loaded");
    assert_eq!(site.tag("Env"), Some("dev"));

    let calls = fs::read_to_string(log).expect("log");
    let calls: Vec<&str> = calls.lines().collect();
    assert_eq!(
        calls,
        vec![
            format!("account set -s {SUB}").as_str(),
            "resource list",
            "group list",
            "account show"
        ]
    );
}

#[tokio::test]
async fn submission_runs_rendered_command_line() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let (script, log) = fake_az(dir.path(), false);
    let az = AzCli::new(script.display().to_string());

    let id = ResourceId::parse(&format!("/subscriptions/{SUB}/resourceGroups/Web")).expect("id");
    let submission = TagSubmission {
        path: UpdatePath::for_id(id.display()),
        id,
        mode: SubmitMode::Merge,
        tags: vec![("Owner".into(), "ops".into())],
    };
    az.submit(&submission).await.expect("submit");

    let calls = fs::read_to_string(log).expect("log");
    assert_eq!(
        calls.trim(),
        format!("resource tag --is-incremental --ids /subscriptions/{SUB}/resourceGroups/Web --tags Owner=ops")
    );
}

#[tokio::test]
async fn failed_update_carries_stderr() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let (script, _log) = fake_az(dir.path(), true);
    let az = AzCli::new(script.display().to_string());

    let id = ResourceId::parse(&format!(
        "/subscriptions/{SUB}/resourceGroups/Web/providers/Microsoft.Web/sites/frontend"
    ))
    .expect("id");
    let submission = TagSubmission {
        path: UpdatePath::for_id(id.display()),
        id,
        mode: SubmitMode::Replace,
        tags: vec![],
    };
    let err = az.submit(&submission).await.expect_err("update fails");
    assert!(err.to_string().contains("update rejected"));
}
