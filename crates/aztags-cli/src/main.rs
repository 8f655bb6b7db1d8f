use anyhow::Result;
use clap::Parser;

use aztags_cli::cli::Cli;
use aztags_cli::output::print_fatal;
use aztags_cli::{commands, observability};
use aztags_config::loader::load_config;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_fatal(&e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    let cli = Cli::parse();
    let verbose_level = observability::level_for_verbosity(cli.verbose);
    observability::init_tracing_with_level(verbose_level.unwrap_or("warn"));

    let config_path = cli.config.as_ref().map(|p| p.display().to_string());
    let mut cfg = load_config(config_path.as_deref())?;
    cli.apply_overrides(&mut cfg);
    cfg.validate()?;
    if verbose_level.is_none() {
        observability::apply_logging_level(&cfg.logging.level);
    }

    if cli.show_config {
        print!("{}", cfg.to_toml()?);
        return Ok(());
    }

    commands::run(&cli, &cfg).await
}
