use std::collections::HashSet;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::ReconcileArgs;
use crate::model::ExternalEstimate;
use crate::reconcile::ReconciliationEngine;
use crate::structure::BudgetTree;
use crate::util::{read_json, write_json_pretty};

pub fn run(args: ReconcileArgs) -> Result<()> {
    let report_path = args
        .report_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("reconciliation_report.json"));

    info!(
        tree_path = %args.tree_path.display(),
        estimate_path = %args.estimate_path.display(),
        "reconciling local tree against external estimate"
    );

    let tree: BudgetTree = read_json(&args.tree_path)?;
    let estimate: ExternalEstimate = read_json(&args.estimate_path)?;
    let reviewed: HashSet<String> = args.reviewed_codes.iter().cloned().collect();

    let engine = ReconciliationEngine::new();
    let report = engine.reconcile(&tree, &estimate, &reviewed);

    if !report.unmatched_local.is_empty() {
        warn!(
            count = report.unmatched_local.len(),
            "local codes missing from the external estimate"
        );
    }
    if !report.unmatched_external.is_empty() {
        warn!(
            count = report.unmatched_external.len(),
            "external codes missing from the local tree"
        );
    }

    write_json_pretty(&report_path, &report)?;

    info!(
        path = %report_path.display(),
        validated = report.counts.validated,
        discrepancies = report.counts.discrepancies,
        pending = report.counts.pending,
        reviewed = report.counts.reviewed,
        "reconciliation completed"
    );

    Ok(())
}
