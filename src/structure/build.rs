use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::classify::{ClassifiedLine, Figures, LineKind};
use crate::codes::{CodeRejection, CodeValidator};
use crate::normalize::{amount_matches, join_description_lines, normalize_unit};
use crate::tables::RuleTables;

use super::{BudgetTree, Chapter, Heading, Item, Subchapter};

const AMOUNT_TOLERANCE: f64 = 0.05;
const QUANTITY_SUM_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Serialize)]
pub struct RejectedCodeStat {
    pub code: String,
    pub reason: CodeRejection,
    pub line_index: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AmountMismatch {
    pub code: String,
    pub computed: f64,
    pub stated: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SumMismatch {
    pub code: String,
    pub partial_sum: f64,
    pub final_quantity: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseStats {
    pub lines_total: usize,
    pub chapter_lines: usize,
    pub subchapter_lines: usize,
    pub heading_lines: usize,
    pub item_header_lines: usize,
    pub figures_lines: usize,
    pub total_lines: usize,
    pub description_lines: usize,
    pub table_header_lines: usize,
    pub ignored_lines: usize,
    pub chapters_built: usize,
    pub subchapters_built: usize,
    pub headings_built: usize,
    pub items_built: usize,
    pub promoted_chapters: usize,
    pub zero_amount_items: usize,
    pub stray_figures_rows: usize,
    pub rejected_codes: Vec<RejectedCodeStat>,
    pub amount_mismatches: Vec<AmountMismatch>,
    pub measurement_sum_mismatches: Vec<SumMismatch>,
    pub hierarchy_warnings: Vec<String>,
}

#[derive(Debug)]
struct ItemDraft {
    code: String,
    unit: String,
    summary: String,
    description_lines: Vec<String>,
    rows: Vec<Figures>,
    line_index: usize,
}

pub struct StructureBuilder<'a> {
    tables: &'a RuleTables,
}

impl<'a> StructureBuilder<'a> {
    pub fn new(tables: &'a RuleTables) -> Self {
        Self { tables }
    }

    pub fn build(&self, lines: &[ClassifiedLine]) -> (BudgetTree, ParseStats) {
        let mut pass = BuildPass {
            validator: CodeValidator::new(self.tables),
            tree: BudgetTree::default(),
            stats: ParseStats::default(),
            chapter: None,
            subchapter: None,
            heading: None,
            code_index: HashMap::new(),
            draft: None,
        };

        pass.stats.lines_total = lines.len();

        for line in lines {
            pass.count_kind(&line.kind);

            match &line.kind {
                LineKind::Chapter { code, name } => pass.on_chapter(code, name),
                LineKind::Subchapter { code, name } => pass.on_subchapter(code, name),
                LineKind::Heading { code, name } => pass.on_heading(code, name),
                LineKind::ItemHeader {
                    code,
                    unit,
                    summary,
                    figures,
                } => pass.on_item_header(code, unit, summary, *figures, line.line_index),
                LineKind::Figures { figures } => pass.on_figures(*figures),
                LineKind::Total { code, .. } => pass.on_total(code.as_deref()),
                LineKind::Description { text } => pass.on_description(text),
                LineKind::TableHeader | LineKind::Ignorable => {}
            }
        }

        pass.close_item();
        pass.tree.recompute_totals();

        (pass.tree, pass.stats)
    }
}

struct BuildPass<'a> {
    validator: CodeValidator<'a>,
    tree: BudgetTree,
    stats: ParseStats,
    chapter: Option<usize>,
    subchapter: Option<usize>,
    heading: Option<usize>,
    code_index: HashMap<String, usize>,
    draft: Option<ItemDraft>,
}

impl BuildPass<'_> {
    fn count_kind(&mut self, kind: &LineKind) {
        match kind {
            LineKind::Chapter { .. } => self.stats.chapter_lines += 1,
            LineKind::Subchapter { .. } => self.stats.subchapter_lines += 1,
            LineKind::Heading { .. } => self.stats.heading_lines += 1,
            LineKind::ItemHeader { .. } => self.stats.item_header_lines += 1,
            LineKind::Figures { .. } => self.stats.figures_lines += 1,
            LineKind::Total { .. } => self.stats.total_lines += 1,
            LineKind::Description { .. } => self.stats.description_lines += 1,
            LineKind::TableHeader => self.stats.table_header_lines += 1,
            LineKind::Ignorable => self.stats.ignored_lines += 1,
        }
    }

    fn on_chapter(&mut self, code: &str, name: &str) {
        self.close_item();

        self.tree
            .chapters
            .push(Chapter::new(code.to_string(), name.to_string()));
        self.chapter = Some(self.tree.chapters.len() - 1);
        self.subchapter = None;
        self.heading = None;
        self.code_index.clear();
        self.stats.chapters_built += 1;
        debug!(code, name, "opened chapter");
    }

    fn on_subchapter(&mut self, code: &str, name: &str) {
        self.close_item();
        self.heading = None;

        let Some(chapter_index) = self.chapter else {
            self.on_chapter(code, name);
            self.stats.promoted_chapters += 1;
            debug!(code, "promoted sub-chapter header to chapter");
            return;
        };

        let chapter = &mut self.tree.chapters[chapter_index];
        let segments = code.split('.').count();
        let parent_code = code.rsplit_once('.').map(|(head, _)| head).unwrap_or("");
        let parent = self.code_index.get(parent_code).copied();

        let index = chapter.subchapters.len();
        chapter.subchapters.push(Subchapter {
            code: code.to_string(),
            name: name.to_string(),
            parent,
            children: Vec::new(),
            headings: Vec::new(),
            items: Vec::new(),
            total: 0.0,
            synthesized: false,
        });

        match parent {
            Some(parent_index) => chapter.subchapters[parent_index].children.push(index),
            None => {
                chapter.roots.push(index);
                if segments > 2 {
                    let message = format!(
                        "parent {parent_code} not found for sub-chapter {code}, attached at level 1"
                    );
                    warn!("{message}");
                    self.stats.hierarchy_warnings.push(message);
                }
            }
        }

        self.code_index.insert(code.to_string(), index);
        self.subchapter = Some(index);
        self.stats.subchapters_built += 1;
        debug!(code, name, "opened sub-chapter");
    }

    fn on_heading(&mut self, code: &str, name: &str) {
        self.close_item();

        let Some(chapter_index) = self.chapter else {
            self.record_heading_warning(code);
            return;
        };
        let Some(subchapter_index) = self.subchapter else {
            self.record_heading_warning(code);
            return;
        };

        let subchapter = &mut self.tree.chapters[chapter_index].subchapters[subchapter_index];
        subchapter.headings.push(Heading {
            code: code.to_string(),
            name: name.to_string(),
            items: Vec::new(),
            total: 0.0,
        });
        self.heading = Some(subchapter.headings.len() - 1);
        self.stats.headings_built += 1;
        debug!(code, name, "opened heading");
    }

    fn record_heading_warning(&mut self, code: &str) {
        let message = format!("heading {code} with no open sub-chapter, skipped");
        warn!("{message}");
        self.stats.hierarchy_warnings.push(message);
        self.heading = None;
    }

    fn on_item_header(
        &mut self,
        code: &str,
        unit: &str,
        summary: &str,
        figures: Option<Figures>,
        line_index: usize,
    ) {
        self.close_item();

        let verdict = match figures {
            Some(figures) => self.validator.validate(code, Some(figures.amount)),
            None => self.validator.validate_shape(code),
        };

        if let Err(reason) = verdict {
            debug!(code, reason = reason.as_str(), "rejected item code");
            if reason == CodeRejection::ZeroAmount {
                self.stats.zero_amount_items += 1;
            }
            self.stats.rejected_codes.push(RejectedCodeStat {
                code: code.to_string(),
                reason,
                line_index,
            });
            self.draft = None;
            return;
        }

        self.draft = Some(ItemDraft {
            code: code.to_string(),
            unit: normalize_unit(unit),
            summary: summary.to_string(),
            description_lines: Vec::new(),
            rows: figures.into_iter().collect(),
            line_index,
        });
    }

    fn on_figures(&mut self, figures: Figures) {
        match &mut self.draft {
            Some(draft) => draft.rows.push(figures),
            None => self.stats.stray_figures_rows += 1,
        }
    }

    fn on_description(&mut self, text: &str) {
        if let Some(draft) = &mut self.draft {
            draft.description_lines.push(text.to_string());
        }
    }

    fn on_total(&mut self, code: Option<&str>) {
        self.close_item();

        let Some(chapter_index) = self.chapter else {
            return;
        };

        match code {
            Some(code) => {
                if self.open_heading_code(chapter_index) == Some(code) {
                    self.heading = None;
                } else if self.open_subchapter_code(chapter_index) == Some(code) {
                    self.heading = None;
                    self.cursor_to_parent(chapter_index);
                }
            }
            None => {
                if self.heading.is_some() {
                    self.heading = None;
                } else if self.subchapter.is_some() {
                    self.cursor_to_parent(chapter_index);
                }
            }
        }
    }

    fn open_heading_code(&self, chapter_index: usize) -> Option<&str> {
        let subchapter_index = self.subchapter?;
        let heading_index = self.heading?;
        self.tree.chapters[chapter_index].subchapters[subchapter_index]
            .headings
            .get(heading_index)
            .map(|heading| heading.code.as_str())
    }

    fn open_subchapter_code(&self, chapter_index: usize) -> Option<&str> {
        let subchapter_index = self.subchapter?;
        Some(self.tree.chapters[chapter_index].subchapters[subchapter_index].code.as_str())
    }

    fn cursor_to_parent(&mut self, chapter_index: usize) {
        self.subchapter = self
            .subchapter
            .and_then(|index| self.tree.chapters[chapter_index].subchapters[index].parent);
    }

    fn close_item(&mut self) {
        let Some(draft) = self.draft.take() else {
            return;
        };

        let Some(final_row) = draft.rows.last().copied() else {
            self.reject_zero_amount(&draft);
            return;
        };

        if final_row.amount.abs() < f64::EPSILON {
            self.reject_zero_amount(&draft);
            return;
        }

        if draft.rows.len() > 1 {
            let partial_sum: f64 = draft.rows[..draft.rows.len() - 1]
                .iter()
                .map(|row| row.quantity)
                .sum();
            if (partial_sum - final_row.quantity).abs() > QUANTITY_SUM_TOLERANCE {
                self.stats.measurement_sum_mismatches.push(SumMismatch {
                    code: draft.code.clone(),
                    partial_sum,
                    final_quantity: final_row.quantity,
                });
            }
        }

        if !amount_matches(
            final_row.quantity,
            final_row.unit_price,
            final_row.amount,
            AMOUNT_TOLERANCE,
        ) {
            self.stats.amount_mismatches.push(AmountMismatch {
                code: draft.code.clone(),
                computed: final_row.quantity * final_row.unit_price,
                stated: final_row.amount,
            });
        }

        let description = if draft.description_lines.is_empty() {
            None
        } else {
            Some(join_description_lines(&draft.description_lines))
        };

        let item = Item {
            code: draft.code,
            unit: draft.unit,
            summary: draft.summary,
            description,
            quantity: final_row.quantity,
            unit_price: final_row.unit_price,
            amount: final_row.amount,
        };

        let Some(chapter_index) = self.chapter else {
            let message = format!("item {} with no open grouping, dropped", item.code);
            warn!("{message}");
            self.stats.hierarchy_warnings.push(message);
            return;
        };

        let chapter = &mut self.tree.chapters[chapter_index];
        match (self.subchapter, self.heading) {
            (Some(subchapter_index), Some(heading_index)) => {
                chapter.subchapters[subchapter_index].headings[heading_index]
                    .items
                    .push(item);
            }
            (Some(subchapter_index), None) => {
                chapter.subchapters[subchapter_index].items.push(item);
            }
            _ => chapter.items.push(item),
        }
        self.stats.items_built += 1;
    }

    fn reject_zero_amount(&mut self, draft: &ItemDraft) {
        debug!(code = %draft.code, "dropped item with zero amount");
        self.stats.zero_amount_items += 1;
        self.stats.rejected_codes.push(RejectedCodeStat {
            code: draft.code.clone(),
            reason: CodeRejection::ZeroAmount,
            line_index: draft.line_index,
        });
    }
}
