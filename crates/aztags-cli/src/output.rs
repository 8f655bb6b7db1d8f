use aztags_core::apply::Phase;
use aztags_core::{
    ApplyEvent, ChangeKind, ChangeReport, CoreError, ErrorCategory, ReportLine, TagInventory,
};
use colored::Colorize;
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Category of the engine error behind `err`, if any.
pub fn error_category(err: &anyhow::Error) -> Option<ErrorCategory> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<CoreError>())
        .map(CoreError::category)
}

/// Report a run-ending error, logging its category.
pub fn print_fatal(err: &anyhow::Error) {
    match error_category(err) {
        Some(category) => tracing::error!(%category, "Run failed"),
        None => tracing::error!("Run failed"),
    }
    print_error(&format!("{err:#}"));
}

pub fn print_report(report: &ChangeReport) {
    for line in &report.lines {
        let text = line.to_string();
        let styled = match line {
            ReportLine::Skip { reason, .. } if reason.is_warning() => text.yellow(),
            ReportLine::Skip { .. } => text.dimmed(),
            ReportLine::Subscription(_) | ReportLine::Total { .. } => text.bold(),
            ReportLine::Resource(_) => text.cyan(),
            ReportLine::Tag { kind, .. } => match kind {
                ChangeKind::Add => text.green(),
                ChangeKind::Update => text.yellow(),
                ChangeKind::Del => text.red(),
                ChangeKind::Swap => text.magenta(),
                ChangeKind::NoUpdate | ChangeKind::Leave => text.dimmed(),
            },
            ReportLine::Summary { .. } => text.normal(),
        };
        println!("{styled}");
    }
}

pub fn print_inventory(inventory: &TagInventory) {
    if inventory.is_empty() {
        println!("No existing tags found.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Tag", "IDs"]);
    for (tag, count) in inventory.iter() {
        builder.push_record([tag.to_string(), count.to_string()]);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
    println!("Existing tags: {}", inventory.len());
}

/// Command line as a shell would need it typed.
pub fn render_command(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.is_empty() || arg.contains(char::is_whitespace) || arg.contains('"') {
                format!("\"{}\"", arg.replace('"', "\\\""))
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Print progress while applying; `program` is the `az` binary shown in
/// dry-run command lines.
pub fn print_apply_event(event: &ApplyEvent<'_>, program: &str, dry_run: bool) {
    match event {
        ApplyEvent::Subscription(sub) => {
            println!("{} /subscriptions/{sub}", "SUB".bold());
        }
        ApplyEvent::Submit {
            progress,
            phase,
            submission,
        } => {
            if dry_run {
                let command = render_command(&submission.command_line(program));
                println!("[{progress}] {command}");
            } else {
                let label = match phase {
                    Phase::Base => "updating tags (before rename)",
                    Phase::Final => "updating tags",
                };
                println!(
                    "[{progress}] {label} {} ({})",
                    submission.id.display().cyan(),
                    submission.mode
                );
            }
        }
        ApplyEvent::Settle { progress, delay } => {
            if !dry_run {
                println!("[{progress}] waiting {}s before re-adding renamed tags", delay.as_secs());
            }
        }
        ApplyEvent::Failed {
            progress,
            id,
            error,
        } => {
            print_error(&format!("[{progress}] {}: {error}", id.display()));
        }
    }
}
