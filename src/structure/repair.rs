use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::tables::RuleTables;

use super::{BudgetTree, Chapter, Item, Subchapter};

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairStats {
    pub synthesized_subchapters: usize,
    pub synthesized_codes: Vec<String>,
    pub reassigned_items: usize,
    pub warnings: Vec<String>,
}

pub fn repair_tree(tree: &mut BudgetTree, tables: &RuleTables) -> RepairStats {
    let mut stats = RepairStats::default();

    for chapter in &mut tree.chapters {
        repair_chapter(chapter, tables, &mut stats);
    }

    tree.recompute_totals();
    stats
}

fn repair_chapter(chapter: &mut Chapter, tables: &RuleTables, stats: &mut RepairStats) {
    let needed = collect_needed_prefixes(chapter, tables);
    if needed.is_empty() {
        return;
    }

    let mut index = chapter.subchapter_index();

    for code in &needed {
        if index.contains_key(code) {
            continue;
        }

        let parent_code = code.rsplit_once('.').map(|(head, _)| head).unwrap_or("");
        let parent = index.get(parent_code).copied();
        if parent.is_none() && parent_code.contains('.') {
            let message =
                format!("implied parent {parent_code} missing for synthesized sub-chapter {code}");
            warn!("{message}");
            stats.warnings.push(message);
        }

        let new_index = chapter.subchapters.len();
        chapter.subchapters.push(Subchapter {
            code: code.clone(),
            name: format!("Subcapítulo {code}"),
            parent,
            children: Vec::new(),
            headings: Vec::new(),
            items: Vec::new(),
            total: 0.0,
            synthesized: true,
        });

        match parent {
            Some(parent_index) => chapter.subchapters[parent_index].children.push(new_index),
            None => chapter.roots.push(new_index),
        }

        index.insert(code.clone(), new_index);
        stats.synthesized_subchapters += 1;
        stats.synthesized_codes.push(code.clone());
        debug!(code = %code, "synthesized sub-chapter");
    }

    reassign_items(chapter, tables, &index, stats);
}

fn collect_needed_prefixes(chapter: &Chapter, tables: &RuleTables) -> BTreeSet<String> {
    let mut needed = BTreeSet::new();

    let mut add_prefixes = |item: &Item| {
        let Some(run) = tables.item_code_prefix.find(&item.code) else {
            return;
        };
        let segments: Vec<&str> = run.as_str().split('.').collect();
        for depth in 2..segments.len() {
            needed.insert(segments[..depth].join("."));
        }
    };

    for item in &chapter.items {
        add_prefixes(item);
    }
    for subchapter in &chapter.subchapters {
        for item in &subchapter.items {
            add_prefixes(item);
        }
        for heading in &subchapter.headings {
            for item in &heading.items {
                add_prefixes(item);
            }
        }
    }

    needed
}

fn reassign_items(
    chapter: &mut Chapter,
    tables: &RuleTables,
    index: &std::collections::HashMap<String, usize>,
    stats: &mut RepairStats,
) {
    let target_of = |code: &str| -> Option<usize> {
        let run = tables.item_code_prefix.find(code)?;
        let segments: Vec<&str> = run.as_str().split('.').collect();
        if segments.len() < 3 {
            return None;
        }
        let prefix = segments[..segments.len() - 1].join(".");
        index.get(prefix.as_str()).copied()
    };

    let mut pending: Vec<(usize, Item)> = Vec::new();

    let direct = std::mem::take(&mut chapter.items);
    for item in direct {
        match target_of(&item.code) {
            Some(target) => {
                pending.push((target, item));
                stats.reassigned_items += 1;
            }
            None => chapter.items.push(item),
        }
    }

    for subchapter_index in 0..chapter.subchapters.len() {
        let owned = std::mem::take(&mut chapter.subchapters[subchapter_index].items);
        for item in owned {
            match target_of(&item.code) {
                Some(target) if target != subchapter_index => {
                    pending.push((target, item));
                    stats.reassigned_items += 1;
                }
                _ => chapter.subchapters[subchapter_index].items.push(item),
            }
        }

        for heading_index in 0..chapter.subchapters[subchapter_index].headings.len() {
            let owned = std::mem::take(
                &mut chapter.subchapters[subchapter_index].headings[heading_index].items,
            );
            for item in owned {
                match target_of(&item.code) {
                    Some(target) => {
                        pending.push((target, item));
                        stats.reassigned_items += 1;
                    }
                    None => chapter.subchapters[subchapter_index].headings[heading_index]
                        .items
                        .push(item),
                }
            }
        }
    }

    for (target, item) in pending {
        chapter.subchapters[target].items.push(item);
    }
}
