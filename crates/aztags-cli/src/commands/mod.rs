pub mod export;
pub mod reconcile;

use std::fs::{self, File};

use anyhow::{Context, Result};
use aztags_config::AppConfig;
use aztags_core::{
    ActualState, DesiredState, DocumentKind, ExclusionSet, Reconciled, Reconciler, TagInventory,
    TaggabilityFilter,
};

use crate::azcli::AzCli;
use crate::capability::load_capabilities;
use crate::cli::Cli;
use crate::output::print_inventory;

/// Load every input, reconcile, then either export or report and apply.
pub async fn run(cli: &Cli, cfg: &AppConfig) -> Result<()> {
    let az = AzCli::new(cfg.sources.az_path.clone());

    let capabilities =
        load_capabilities(cfg.sources.capability_file.as_deref(), &cfg.sources.capability_url)
            .await?;
    let exclusions = load_exclusions(cli)?;

    let desired = DesiredState::load_paths(&cli.tag_files)?;
    let store = load_actual_state(cli, &az, &desired).await?;

    let filter = TaggabilityFilter::new(cfg.filter_policy()?, exclusions, capabilities);
    let inventory = TagInventory::collect(&store, &filter);
    if cli.verbose > 0 {
        print_inventory(&inventory);
    }

    let reconciled = calculate_changes(&store, &filter, cfg, &desired)?;

    match &cli.save_tags_file {
        Some(path) => export::run(cli, cfg, &store, &reconciled, &inventory, path),
        None => reconcile::run(cli, cfg, &az, &reconciled).await,
    }
}

fn calculate_changes(
    store: &ActualState,
    filter: &TaggabilityFilter,
    cfg: &AppConfig,
    desired: &DesiredState,
) -> Result<Reconciled> {
    let classified = Reconciler::new(store, filter, cfg.change_types()?).classify(desired)?;
    let reconciled = classified.detect(store)?;
    tracing::info!(
        resources = reconciled.changes.resource_count(),
        skipped = reconciled.skipped.len(),
        "Calculated tag changes"
    );
    Ok(reconciled)
}

fn load_exclusions(cli: &Cli) -> Result<ExclusionSet> {
    let mut exclusions = ExclusionSet::new();
    for path in &cli.exclude_ids {
        let file = File::open(path).with_context(|| format!("Failed to read {}", path.display()))?;
        exclusions.load(&path.display().to_string(), file)?;
    }
    Ok(exclusions)
}

async fn load_actual_state(cli: &Cli, az: &AzCli, desired: &DesiredState) -> Result<ActualState> {
    if !cli.has_listing_files() {
        let subscriptions = desired.subscriptions();
        return az
            .fetch_actual_state(subscriptions.iter().map(String::as_str))
            .await;
    }

    let mut store = ActualState::new();
    let listings = [
        (&cli.az_resources, DocumentKind::Resources),
        (&cli.az_groups, DocumentKind::ResourceGroups),
        (&cli.az_subscriptions, DocumentKind::Subscriptions),
    ];
    for (path, kind) in listings {
        let Some(path) = path else { continue };
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let count = store
            .load_json(&text, kind)
            .with_context(|| format!("Bad resource JSON in {}", path.display()))?;
        tracing::info!(path = %path.display(), ?kind, count, "Loaded existing resources");
    }
    Ok(store)
}
