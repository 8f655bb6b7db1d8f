use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use aztags_core::CapabilityTable;

/// Read the capability table from `file` when given, otherwise download it
/// from `url`.
pub async fn load_capabilities(file: Option<&Path>, url: &str) -> Result<CapabilityTable> {
    match file {
        Some(path) => {
            let reader =
                File::open(path).with_context(|| format!("Failed to read {}", path.display()))?;
            let table = CapabilityTable::from_reader(&path.display().to_string(), reader)?;
            tracing::info!(path = %path.display(), types = table.len(), "Loaded tag support table");
            Ok(table)
        }
        None => download_capabilities(url).await,
    }
}

pub async fn download_capabilities(url: &str) -> Result<CapabilityTable> {
    let url = url::Url::parse(url).with_context(|| format!("Invalid tag support URL: {url}"))?;
    tracing::info!(%url, "Downloading tag support table");
    let resp = reqwest::get(url.clone())
        .await
        .context("Failed to download tag support table")?;
    let status = resp.status();
    if !status.is_success() {
        anyhow::bail!("Tag support download failed (HTTP {status}): {url}");
    }
    let body = resp.text().await.context("Failed to read tag support table")?;
    let table = CapabilityTable::from_csv_str(url.as_str(), &body)?;
    tracing::info!(types = table.len(), "Downloaded tag support table");
    Ok(table)
}
