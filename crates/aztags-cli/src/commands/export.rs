use std::path::Path;

use anyhow::Result;
use aztags_config::AppConfig;
use aztags_core::export::per_tag_paths;
use aztags_core::{ActualState, Reconciled, TagExporter, TagInventory};

use crate::cli::Cli;
use crate::output::print_success;

/// Write existing tags to `path`: one merged file when `--save-tags` names
/// tags (or `all`), otherwise one file per existing tag.
pub fn run(
    cli: &Cli,
    cfg: &AppConfig,
    store: &ActualState,
    reconciled: &Reconciled,
    inventory: &TagInventory,
    path: &Path,
) -> Result<()> {
    let mode = cfg.export_mode()?;
    let exporter = TagExporter::new(store, reconciled, mode);
    tracing::info!(%mode, "Exporting existing tags");

    if !cli.save_tags.is_empty() {
        let tags = merged_tags(&cli.save_tags, inventory);
        println!("Writing existing tags to file");
        let rows = exporter.write_file(path, &tags)?;
        print_success(&format!("Wrote {rows} row(s) to {}", path.display()));
        return Ok(());
    }

    println!("Writing existing tags [{}] to files", inventory.len());
    let mut files = 0;
    for (tag, file) in per_tag_paths(path, inventory.tags()) {
        if exporter.write_file(&file, &[tag])? > 0 {
            files += 1;
        }
    }
    print_success(&format!("Wrote {files} file(s)"));
    Ok(())
}

/// Tags for a merged export; `all` anywhere in the list means every existing
/// tag.
fn merged_tags(requested: &[String], inventory: &TagInventory) -> Vec<String> {
    if requested.iter().any(|t| t == "all") {
        inventory.tags().map(str::to_string).collect()
    } else {
        requested.to_vec()
    }
}
