//! Change report: what a run would do, grouped by subscription.
//!
//! The report is built as a list of [`ReportLine`]s so a front end can style
//! each kind of line; `Display` renders the plain text form.

use std::fmt;

use crate::change::ChangeKind;
use crate::filter::SkipReason;
use crate::reconcile::{Actionable, Reconciled};

/// Tag names at least this long don't widen the tag column.
const MAX_ALIGNED_TAG_LEN: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    Skip { reason: SkipReason, id: String },
    Subscription(String),
    /// Resource ID relative to its subscription.
    Resource(String),
    Tag {
        kind: ChangeKind,
        scope: Option<String>,
        tag: String,
        value: String,
        previous: Option<String>,
        width: usize,
    },
    Summary { ids: usize, totals: [usize; 6] },
    Total {
        skipped: usize,
        ids: usize,
        totals: [usize; 6],
    },
}

fn write_totals(f: &mut fmt::Formatter<'_>, totals: &[usize; 6]) -> fmt::Result {
    for (kind, count) in ChangeKind::ALL.iter().zip(totals) {
        if *count > 0 {
            write!(f, "; {count} tag(s) to {}", kind.label().to_lowercase())?;
        }
    }
    Ok(())
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip { reason, id } => write!(f, "{reason}: {id}"),
            Self::Subscription(sub) => write!(f, "SUB /subscriptions/{sub}"),
            Self::Resource(id) => write!(f, "  ID {id}"),
            Self::Tag {
                kind,
                scope,
                tag,
                value,
                previous,
                width,
            } => {
                let scope = scope.as_ref().map(|s| format!("[{s}]")).unwrap_or_default();
                let width = *width;
                write!(f, "    {:<6} {scope:<5} tags.{tag:<width$}: {value}", kind.label())?;
                if let Some(previous) = previous {
                    write!(f, " [from {previous}]")?;
                }
                Ok(())
            }
            Self::Summary { ids, totals } => {
                write!(f, "  SUMMARY {ids:>4} id(s) to update")?;
                write_totals(f, totals)
            }
            Self::Total {
                skipped,
                ids,
                totals,
            } => {
                write!(f, "TOTAL: {skipped} id(s) skipped; {ids} id(s) to update")?;
                write_totals(f, totals)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeReport {
    pub lines: Vec<ReportLine>,
    pub skipped: usize,
    pub ids_to_update: usize,
}

impl ChangeReport {
    /// Build the report for `actionable`, with skip reasons and scope
    /// annotations taken from `reconciled`. `KEEP` lines are shown only when
    /// `verbosity > 0`; skip lines follow each reason's own threshold.
    pub fn build(reconciled: &Reconciled, actionable: &Actionable, verbosity: u8) -> Self {
        let mut lines = Vec::new();
        for skipped in reconciled.skipped.values() {
            if skipped.reason.visible_at(verbosity) {
                lines.push(ReportLine::Skip {
                    reason: skipped.reason.clone(),
                    id: skipped.id.display().to_string(),
                });
            }
        }

        let width = actionable
            .changes
            .resources()
            .flat_map(|r| r.tags.keys())
            .map(String::len)
            .filter(|len| *len < MAX_ALIGNED_TAG_LEN)
            .max()
            .unwrap_or_default();

        let mut ids_to_update = 0;
        let mut totals = [0usize; 6];
        for (subscription, resources) in actionable.changes.subscriptions() {
            lines.push(ReportLine::Subscription(subscription.to_string()));
            let mut ids = 0;
            let mut sub_totals = [0usize; 6];

            for resource in resources {
                ids += 1;
                let mut printed_id = false;
                for (tag, record) in &resource.tags {
                    sub_totals[record.kind.index()] += 1;
                    if verbosity == 0 && record.kind == ChangeKind::NoUpdate {
                        continue;
                    }
                    if !printed_id {
                        printed_id = true;
                        lines.push(ReportLine::Resource(resource.id.relative_display().to_string()));
                    }
                    lines.push(ReportLine::Tag {
                        kind: record.kind,
                        scope: reconciled
                            .scopes
                            .get(resource.id.normalized(), tag)
                            .map(|s| s.to_string()),
                        tag: tag.clone(),
                        value: record.value.resolved().to_string(),
                        previous: record.previous().filter(|p| !p.is_empty()).map(str::to_string),
                        width,
                    });
                }
            }

            lines.push(ReportLine::Summary {
                ids,
                totals: sub_totals,
            });
            ids_to_update += ids;
            for (total, sub) in totals.iter_mut().zip(sub_totals) {
                *total += sub;
            }
        }

        let skipped = reconciled.skipped.len();
        lines.push(ReportLine::Total {
            skipped,
            ids: ids_to_update,
            totals,
        });
        Self {
            lines,
            skipped,
            ids_to_update,
        }
    }

    pub fn has_changes(&self) -> bool {
        self.ids_to_update > 0
    }
}

impl fmt::Display for ChangeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_line_format() {
        let line = ReportLine::Tag {
            kind: ChangeKind::Update,
            scope: Some("rg".into()),
            tag: "Env".into(),
            value: "prod".into(),
            previous: Some("dev".into()),
            width: 5,
        };
        assert_eq!(line.to_string(), "    UPDATE [rg]  tags.Env  : prod [from dev]");
    }

    #[test]
    fn test_totals_format() {
        let line = ReportLine::Total {
            skipped: 1,
            ids: 2,
            totals: [3, 0, 1, 0, 0, 0],
        };
        assert_eq!(
            line.to_string(),
            "TOTAL: 1 id(s) skipped; 2 id(s) to update; 3 tag(s) to add; 1 tag(s) to keep"
        );

        let summary = ReportLine::Summary {
            ids: 2,
            totals: [0, 1, 0, 0, 0, 0],
        };
        assert_eq!(summary.to_string(), "  SUMMARY    2 id(s) to update; 1 tag(s) to update");
    }

    #[test]
    fn test_skip_line_format() {
        let line = ReportLine::Skip {
            reason: SkipReason::DoesNotExist,
            id: "/subscriptions/x/resourceGroups/rg".into(),
        };
        assert_eq!(
            line.to_string(),
            "WARNING: Resource does not exist: /subscriptions/x/resourceGroups/rg"
        );
    }
}
