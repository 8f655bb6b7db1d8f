use std::path::PathBuf;

use aztags_config::AppConfig;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "aztags")]
#[command(about = "Update Azure resource tags from tag files")]
#[command(version)]
pub struct Cli {
    /// Tag files with an `id` column and any number of `tags.<name>` columns
    #[arg(required_unless_present = "show_config")]
    pub tag_files: Vec<PathBuf>,

    /// Verbose output, or -vv for extra verbose
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Apply tag changes
    #[arg(short, long)]
    pub apply: bool,

    /// With --apply, print the az commands instead of running them
    #[arg(short, long)]
    pub dry_run: bool,

    /// No interaction
    #[arg(short, long)]
    pub yes: bool,

    /// Config file (defaults to ~/.aztags/config.toml)
    #[arg(long, env = "AZTAGS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub show_config: bool,

    /// Existing resources as JSON, e.g. from `az resource list`
    #[arg(long, value_name = "FILE")]
    pub az_resources: Option<PathBuf>,

    /// Existing resource groups as JSON, e.g. from `az group list`
    #[arg(long, value_name = "FILE")]
    pub az_groups: Option<PathBuf>,

    /// Existing subscriptions as JSON, e.g. from `az account list`
    #[arg(long, value_name = "FILE")]
    pub az_subscriptions: Option<PathBuf>,

    /// Resource types that support tags; downloaded when not given
    #[arg(long, value_name = "FILE")]
    pub tag_support: Option<PathBuf>,

    /// Files listing resource IDs to exclude
    #[arg(long, value_name = "FILE", num_args = 1..)]
    pub exclude_ids: Vec<PathBuf>,

    /// Regexes the lower-cased resource ID must all match
    #[arg(long, value_name = "REGEX", num_args = 1..)]
    pub limit: Vec<String>,

    /// Save existing tags to this file; without --save-tags one file per tag
    /// is written, e.g. FILE.tag1.txt
    #[arg(long, value_name = "FILE")]
    pub save_tags_file: Option<PathBuf>,

    /// Which existing tags to save: all, or del (those that would be deleted)
    #[arg(long, value_name = "MODE")]
    pub save_tags_mode: Option<String>,

    /// Tags to put in the save file; "all" puts every tag in one file
    #[arg(long, value_name = "TAG", num_args = 1..)]
    pub save_tags: Vec<String>,

    /// Bail out after this number of update errors
    #[arg(long)]
    pub max_errors: Option<usize>,

    /// Only resources whose ID has at least this many slashes
    #[arg(long)]
    pub min_scope: Option<u32>,

    /// Only resources whose ID has at most this many slashes
    #[arg(long)]
    pub max_scope: Option<u32>,

    /// inc, all, or a combination such as ADD,UPDATE
    #[arg(long)]
    pub change_types: Option<String>,

    /// Skip resources carrying any of these tags
    #[arg(long, value_name = "TAG", num_args = 1..)]
    pub skip_tags: Vec<String>,
}

impl Cli {
    /// Apply command-line overrides on top of file and environment settings.
    pub fn apply_overrides(&self, cfg: &mut AppConfig) {
        if let Some(types) = &self.change_types {
            cfg.reconcile.change_types = types.clone();
        }
        if self.min_scope.is_some() {
            cfg.reconcile.min_scope = self.min_scope;
        }
        if self.max_scope.is_some() {
            cfg.reconcile.max_scope = self.max_scope;
        }
        if !self.skip_tags.is_empty() {
            cfg.reconcile.skip_tags = self.skip_tags.clone();
        }
        if !self.limit.is_empty() {
            cfg.reconcile.id_filters = self.limit.clone();
        }
        if let Some(max) = self.max_errors {
            cfg.apply.max_failures = max;
        }
        if let Some(mode) = &self.save_tags_mode {
            cfg.export.mode = mode.clone();
        }
        if let Some(path) = &self.tag_support {
            cfg.sources.capability_file = Some(path.clone());
        }
    }

    /// Actual state comes from files when any listing file is given.
    pub fn has_listing_files(&self) -> bool {
        self.az_resources.is_some() || self.az_groups.is_some() || self.az_subscriptions.is_some()
    }
}
