use std::io::{self, BufRead};

use anyhow::{Context, Result};
use aztags_config::AppConfig;
use aztags_core::{Applier, ChangeReport, Reconciled};
use colored::Colorize;

use crate::azcli::AzCli;
use crate::cli::Cli;
use crate::output::{print_apply_event, print_report, print_success};

/// Report the pending changes and, with `--apply`, submit them.
pub async fn run(cli: &Cli, cfg: &AppConfig, az: &AzCli, reconciled: &Reconciled) -> Result<()> {
    let actionable = reconciled.prune();
    let report = ChangeReport::build(reconciled, &actionable, cli.verbose);
    print_report(&report);

    if !cli.apply {
        return Ok(());
    }
    if !report.has_changes() {
        println!();
        print_success("Nothing to apply.");
        return Ok(());
    }
    if !cli.yes {
        println!();
        println!("Enter {} to apply the above tag changes", "yes".bold());
        let stdin = io::stdin();
        if !confirm(stdin.lock())? {
            tracing::info!("Apply not confirmed");
            return Ok(());
        }
    }
    println!();

    let applier = Applier::new(az.clone(), cfg.apply_config(cli.dry_run));
    let summary = applier
        .apply(&actionable, |event| {
            print_apply_event(&event, az.program(), cli.dry_run)
        })
        .await?;

    if !cli.dry_run {
        print_success(&format!(
            "Updated {} of {} resource(s) with {} submission(s)",
            summary.succeeded, summary.attempted, summary.submissions
        ));
    }
    Ok(())
}

/// Read one line and accept only an exact `yes`.
pub fn confirm<R: BufRead>(mut reader: R) -> Result<bool> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("Failed to read confirmation")?;
    Ok(line.trim_end_matches(['\r', '\n']) == "yes")
}
