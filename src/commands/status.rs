use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::ParseRunSummary;
use crate::structure::BudgetTree;
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_path = args.cache_root.join("manifests").join("parse_run_latest.json");
    let tree_path = args.cache_root.join("tree.json");

    info!(cache_root = %args.cache_root.display(), "status requested");

    if manifest_path.exists() {
        let summary: ParseRunSummary = read_json(&manifest_path)?;

        info!(
            run_id = %summary.run_id,
            status = %summary.status,
            started_at = %summary.started_at,
            updated_at = %summary.updated_at,
            source_sha256 = %summary.source_sha256,
            lines = summary.counts.lines_total,
            chapters = summary.counts.chapters_built,
            subchapters = summary.counts.subchapters_built,
            items = summary.counts.items_built,
            code_rejections = summary.counts.code_rejections,
            budget_total = summary.budget_total,
            "loaded latest parse manifest"
        );

        for warning in &summary.warnings {
            warn!(warning = %warning, "parse warning");
        }
    } else {
        warn!(path = %manifest_path.display(), "parse manifest missing");
    }

    if tree_path.exists() {
        let tree: BudgetTree = read_json(&tree_path)?;
        info!(
            path = %tree_path.display(),
            chapters = tree.chapters.len(),
            items = tree.item_count(),
            budget_total = tree.budget_total(),
            "tree artifact status"
        );
    } else {
        warn!(path = %tree_path.display(), "tree artifact missing");
    }

    Ok(())
}
