//! Control-plane access through the `az` command line.

use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aztags_core::{ActualState, CoreError, DocumentKind, TagSubmission, TagUpdater};
use tokio::process::Command;

/// Runs `az` as a child process.
#[derive(Debug, Clone)]
pub struct AzCli {
    program: String,
}

impl AzCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run `az` with `args` and return its stdout.
    async fn run(&self, args: &[&str]) -> std::result::Result<String, String> {
        tracing::debug!(program = %self.program, ?args, "Executing");
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("failed to run {}: {e}", self.program))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("{} ({})", stderr.trim(), output.status));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Fetch resources, resource groups and the subscription itself for each
    /// subscription in turn.
    pub async fn fetch_actual_state<'a, I>(&self, subscriptions: I) -> Result<ActualState>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut store = ActualState::new();
        for subscription in subscriptions {
            tracing::info!(subscription, "Retrieving azure resources");
            self.run(&["account", "set", "-s", subscription])
                .await
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Failed to select subscription {subscription}"))?;

            let listings = [
                (["resource", "list"], DocumentKind::Resources),
                (["group", "list"], DocumentKind::ResourceGroups),
                (["account", "show"], DocumentKind::Subscriptions),
            ];
            for (args, kind) in listings {
                let json = self
                    .run(&args)
                    .await
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("az {} failed", args.join(" ")))?;
                let count = store
                    .load_json(&json, kind)
                    .with_context(|| format!("Bad JSON from az {}", args.join(" ")))?;
                tracing::debug!(subscription, ?kind, count, "Loaded listing");
            }
        }
        Ok(store)
    }
}

#[async_trait]
impl TagUpdater for AzCli {
    async fn select_subscription(&self, subscription: &str) -> aztags_core::Result<()> {
        self.run(&["account", "set", "-s", subscription])
            .await
            .map(|_| ())
            .map_err(|message| CoreError::submission(subscription, message))
    }

    async fn submit(&self, submission: &TagSubmission) -> aztags_core::Result<()> {
        let command = submission.command_line(&self.program);
        let args: Vec<&str> = command[1..].iter().map(String::as_str).collect();
        self.run(&args)
            .await
            .map(|_| ())
            .map_err(|message| CoreError::submission(submission.id.display(), message))
    }
}
