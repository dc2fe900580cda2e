//! 🧾 Report: what happened, told once, at the end.

use std::time::Duration;

use comfy_table::{Cell, Table, presets::UTF8_FULL};

use crate::common::{DocumentFailure, TransferOutcome};
use crate::progress::format_duration;

/// 🔀 An alias that was moved: from every index in `previous` to `current`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasSwap {
    pub alias: String,
    pub previous: Vec<String>,
    pub current: String,
}

/// 📊 The result of a migration that ran to the end.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub source_index: String,
    pub target_index: String,
    /// 🏗️ false when an existing target was reused with the operator's blessing.
    pub target_created: bool,
    pub transfer: TransferOutcome,
    pub elapsed: Duration,
    pub alias_swap: Option<AliasSwap>,
}

/// 🎬 How a run ended, when it ended on purpose.
#[derive(Debug, Clone)]
pub enum MigrationOutcome {
    Completed(MigrationReport),
    /// 🛑 The target existed and the operator said no. Nothing was copied.
    Declined { target_index: String },
}

impl MigrationReport {
    /// 📝 A few human lines for the end of the run.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "<{}> → <{}> ({}) in {}: {} documents succeeded, {} failed",
            self.source_index,
            self.target_index,
            if self.target_created { "created" } else { "reused" },
            format_duration(self.elapsed),
            self.transfer.success_count,
            self.transfer.failure_count,
        )];
        match self.alias_swap {
            Some(ref swap) => lines.push(format!(
                "alias <{}> moved from [{}] to <{}>",
                swap.alias,
                swap.previous.join(", "),
                swap.current
            )),
            None => lines.push(format!(
                "<{}> was not an alias; update any references to point at <{}>",
                self.source_index, self.target_index
            )),
        }
        lines.join("\n")
    }

    /// 🍽️ The failed documents as a table, or None if there weren't any.
    pub fn failures_table(&self) -> Option<String> {
        if self.transfer.failures.is_empty() {
            return None;
        }
        Some(render_failures(&self.transfer.failures))
    }
}

fn render_failures(failures: &[DocumentFailure]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Index", "Type", "Id", "Error"]);
    for failure in failures {
        table.add_row(vec![
            Cell::new(&failure.index),
            Cell::new(failure.doc_type.as_deref().unwrap_or("_doc")),
            Cell::new(&failure.id),
            Cell::new(&failure.error),
        ]);
    }
    table.to_string()
}
