use std::collections::BTreeMap;

use anyhow::Result;
use tracing::info;

use crate::classify::LineClassifier;
use crate::cli::ClassifyArgs;
use crate::commands::load_line_records;
use crate::tables::RuleTables;
use crate::util::write_json_pretty;

pub fn run(args: ClassifyArgs) -> Result<()> {
    let lines = load_line_records(&args.lines_path, args.lines_format)?;
    info!(
        lines_path = %args.lines_path.display(),
        lines = lines.len(),
        "classifying line block"
    );

    let tables = RuleTables::new()?;
    let classifier = LineClassifier::new(&tables);
    let classified = classifier.classify_block(&lines);

    let mut tallies = BTreeMap::<&str, usize>::new();
    for line in &classified {
        *tallies.entry(line.kind.label()).or_insert(0) += 1;
    }

    for (label, count) in &tallies {
        info!(kind = label, count, "classified lines");
    }

    if let Some(output_path) = &args.output_path {
        write_json_pretty(output_path, &classified)?;
        info!(path = %output_path.display(), "wrote classification dump");
    }

    Ok(())
}
