use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::classify::LineClassifier;
use crate::cli::ParseArgs;
use crate::commands::load_line_records;
use crate::model::{ParseCounts, ParsePaths, ParseRunManifest, RejectedCode};
use crate::structure::{ParseStats, RepairStats, StructureBuilder, repair_tree};
use crate::tables::RuleTables;
use crate::util::{ensure_directory, now_utc_string, sha256_file, utc_compact_string, write_json_pretty};

pub fn run(args: ParseArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let tree_path = args
        .tree_path
        .clone()
        .unwrap_or_else(|| cache_root.join("tree.json"));
    let manifest_path = args.parse_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("parse_run_{}.json", utc_compact_string(started_ts)))
    });
    let latest_manifest_path = manifest_dir.join("parse_run_latest.json");

    info!(
        lines_path = %args.lines_path.display(),
        run_id = %run_id,
        "starting parse"
    );

    let source_sha256 = sha256_file(&args.lines_path)?;
    let lines = load_line_records(&args.lines_path, args.lines_format)?;
    info!(lines = lines.len(), "loaded line records");

    let tables = RuleTables::new()?;
    let classifier = LineClassifier::new(&tables);
    let classified = classifier.classify_block(&lines);

    let builder = StructureBuilder::new(&tables);
    let (mut tree, stats) = builder.build(&classified);

    let repair_stats = if args.repair {
        let repaired = repair_tree(&mut tree, &tables);
        info!(
            synthesized = repaired.synthesized_subchapters,
            reassigned = repaired.reassigned_items,
            "repair pass applied"
        );
        Some(repaired)
    } else {
        None
    };

    write_json_pretty(&tree_path, &tree)?;

    let updated_at = now_utc_string();
    let manifest = ParseRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: "completed".to_string(),
        started_at,
        updated_at,
        source_sha256,
        lines_format: args.lines_format.as_str().to_string(),
        paths: ParsePaths {
            cache_root: cache_root.display().to_string(),
            lines_path: args.lines_path.display().to_string(),
            tree_path: tree_path.display().to_string(),
            manifest_path: manifest_path.display().to_string(),
        },
        counts: build_counts(&stats, repair_stats.as_ref()),
        budget_total: tree.budget_total(),
        rejected_codes: stats
            .rejected_codes
            .iter()
            .map(|rejected| RejectedCode {
                code: rejected.code.clone(),
                reason: rejected.reason.as_str().to_string(),
                line_index: rejected.line_index,
            })
            .collect(),
        warnings: collect_warnings(&stats, repair_stats.as_ref()),
        notes: vec![
            "Totals are derived bottom-up from item amounts; totals text in the document is advisory only."
                .to_string(),
        ],
    };

    write_json_pretty(&manifest_path, &manifest)?;
    write_json_pretty(&latest_manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote parse run manifest");
    info!(
        chapters = stats.chapters_built,
        subchapters = stats.subchapters_built,
        items = stats.items_built,
        budget_total = tree.budget_total(),
        "parse completed"
    );

    Ok(())
}

fn build_counts(stats: &ParseStats, repair: Option<&RepairStats>) -> ParseCounts {
    ParseCounts {
        lines_total: stats.lines_total,
        chapter_lines: stats.chapter_lines,
        subchapter_lines: stats.subchapter_lines,
        heading_lines: stats.heading_lines,
        item_header_lines: stats.item_header_lines,
        figures_lines: stats.figures_lines,
        total_lines: stats.total_lines,
        description_lines: stats.description_lines,
        table_header_lines: stats.table_header_lines,
        ignored_lines: stats.ignored_lines,
        chapters_built: stats.chapters_built,
        subchapters_built: stats.subchapters_built,
        headings_built: stats.headings_built,
        items_built: stats.items_built,
        promoted_chapters: stats.promoted_chapters,
        code_rejections: stats.rejected_codes.len(),
        zero_amount_items: stats.zero_amount_items,
        amount_mismatches: stats.amount_mismatches.len(),
        measurement_sum_mismatches: stats.measurement_sum_mismatches.len(),
        stray_figures_rows: stats.stray_figures_rows,
        synthesized_subchapters: repair.map(|r| r.synthesized_subchapters).unwrap_or(0),
        reassigned_items: repair.map(|r| r.reassigned_items).unwrap_or(0),
    }
}

fn collect_warnings(stats: &ParseStats, repair: Option<&RepairStats>) -> Vec<String> {
    let mut warnings = stats.hierarchy_warnings.clone();

    for mismatch in &stats.amount_mismatches {
        warnings.push(format!(
            "item {}: quantity × price = {:.2} disagrees with stated amount {:.2}",
            mismatch.code, mismatch.computed, mismatch.stated
        ));
    }

    for mismatch in &stats.measurement_sum_mismatches {
        warnings.push(format!(
            "item {}: partial measurement sum {:.2} disagrees with final quantity {:.2}",
            mismatch.code, mismatch.partial_sum, mismatch.final_quantity
        ));
    }

    if let Some(repair) = repair {
        warnings.extend(repair.warnings.iter().cloned());
    }

    warnings
}
