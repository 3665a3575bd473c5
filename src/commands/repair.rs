use anyhow::Result;
use tracing::{info, warn};

use crate::cli::RepairArgs;
use crate::structure::{BudgetTree, repair_tree};
use crate::tables::RuleTables;
use crate::util::{read_json, write_json_pretty};

pub fn run(args: RepairArgs) -> Result<()> {
    let output_path = args.output_path.clone().unwrap_or_else(|| args.tree_path.clone());

    info!(tree_path = %args.tree_path.display(), "running repair pass");

    let mut tree: BudgetTree = read_json(&args.tree_path)?;
    let tables = RuleTables::new()?;
    let stats = repair_tree(&mut tree, &tables);

    for warning in &stats.warnings {
        warn!("{warning}");
    }

    write_json_pretty(&output_path, &tree)?;

    info!(
        path = %output_path.display(),
        synthesized = stats.synthesized_subchapters,
        reassigned = stats.reassigned_items,
        budget_total = tree.budget_total(),
        "repair completed"
    );

    Ok(())
}
