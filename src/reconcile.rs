use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{EstimateNode, ExternalEstimate};
use crate::structure::{BudgetTree, Chapter};

const VALIDATION_TOLERANCE: f64 = 0.01;
const PERCENT_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    Pending,
    Validated,
    Discrepancy,
    Reviewed,
}

impl ValidationState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validated => "validated",
            Self::Discrepancy => "discrepancy",
            Self::Reviewed => "reviewed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationNode {
    pub code: String,
    pub name: String,
    pub local_total: f64,
    pub local_item_count: usize,
    pub external_total: Option<f64>,
    pub external_item_count: Option<usize>,
    pub difference_amount: Option<f64>,
    pub difference_percent: Option<f64>,
    pub state: ValidationState,
    pub needs_review: bool,
    pub children: Vec<ReconciliationNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileCounts {
    pub validated: usize,
    pub discrepancies: usize,
    pub pending: usize,
    pub reviewed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub chapters: Vec<ReconciliationNode>,
    pub counts: ReconcileCounts,
    pub unmatched_local: Vec<String>,
    pub unmatched_external: Vec<String>,
}

pub struct ReconciliationEngine {
    tolerance: f64,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self {
            tolerance: VALIDATION_TOLERANCE,
        }
    }

    pub fn reconcile(
        &self,
        tree: &BudgetTree,
        estimate: &ExternalEstimate,
        reviewed_codes: &HashSet<String>,
    ) -> ReconciliationReport {
        let mut estimates = HashMap::new();
        for node in &estimate.chapters {
            flatten_estimate(node, &mut estimates);
        }

        let mut matched = HashSet::new();
        let mut counts = ReconcileCounts::default();
        let mut unmatched_local = Vec::new();

        let chapters: Vec<ReconciliationNode> = tree
            .chapters
            .iter()
            .map(|chapter| {
                self.reconcile_chapter(
                    chapter,
                    &estimates,
                    reviewed_codes,
                    &mut matched,
                    &mut counts,
                    &mut unmatched_local,
                )
            })
            .collect();

        let mut unmatched_external: Vec<String> = estimates
            .keys()
            .filter(|code| !matched.contains(*code))
            .cloned()
            .collect();
        unmatched_external.sort();

        for code in &unmatched_external {
            warn!(code = %code, "external estimate code not present in local tree");
        }

        ReconciliationReport {
            chapters,
            counts,
            unmatched_local,
            unmatched_external,
        }
    }

    fn reconcile_chapter(
        &self,
        chapter: &Chapter,
        estimates: &HashMap<String, (f64, Option<usize>)>,
        reviewed_codes: &HashSet<String>,
        matched: &mut HashSet<String>,
        counts: &mut ReconcileCounts,
        unmatched_local: &mut Vec<String>,
    ) -> ReconciliationNode {
        let children: Vec<ReconciliationNode> = chapter
            .roots
            .iter()
            .map(|root| {
                self.reconcile_subchapter(
                    chapter,
                    *root,
                    estimates,
                    reviewed_codes,
                    matched,
                    counts,
                    unmatched_local,
                )
            })
            .collect();

        self.make_node(
            &chapter.code,
            &chapter.name,
            chapter.total,
            chapter.item_count(),
            children,
            estimates,
            reviewed_codes,
            matched,
            counts,
            unmatched_local,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn reconcile_subchapter(
        &self,
        chapter: &Chapter,
        index: usize,
        estimates: &HashMap<String, (f64, Option<usize>)>,
        reviewed_codes: &HashSet<String>,
        matched: &mut HashSet<String>,
        counts: &mut ReconcileCounts,
        unmatched_local: &mut Vec<String>,
    ) -> ReconciliationNode {
        let subchapter = &chapter.subchapters[index];
        let children: Vec<ReconciliationNode> = subchapter
            .children
            .iter()
            .map(|child| {
                self.reconcile_subchapter(
                    chapter,
                    *child,
                    estimates,
                    reviewed_codes,
                    matched,
                    counts,
                    unmatched_local,
                )
            })
            .collect();

        self.make_node(
            &subchapter.code,
            &subchapter.name,
            subchapter.total,
            chapter.subtree_item_count(index),
            children,
            estimates,
            reviewed_codes,
            matched,
            counts,
            unmatched_local,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn make_node(
        &self,
        code: &str,
        name: &str,
        local_total: f64,
        local_item_count: usize,
        children: Vec<ReconciliationNode>,
        estimates: &HashMap<String, (f64, Option<usize>)>,
        reviewed_codes: &HashSet<String>,
        matched: &mut HashSet<String>,
        counts: &mut ReconcileCounts,
        unmatched_local: &mut Vec<String>,
    ) -> ReconciliationNode {
        let external = estimates.get(code).copied();
        if external.is_some() {
            matched.insert(code.to_string());
        }

        let reviewed = reviewed_codes.contains(code);
        let (external_total, external_item_count) = match external {
            Some((total, item_count)) => (Some(total), item_count),
            None => (None, None),
        };

        let (difference_amount, difference_percent) = match external_total {
            Some(total) => {
                let difference = (local_total - total).abs();
                let percent = difference / total.abs().max(PERCENT_EPSILON) * 100.0;
                (Some(difference), Some(percent))
            }
            None => (None, None),
        };

        let state = if reviewed {
            ValidationState::Reviewed
        } else {
            match difference_amount {
                Some(difference) if difference < self.tolerance => ValidationState::Validated,
                Some(_) => ValidationState::Discrepancy,
                None => ValidationState::Pending,
            }
        };

        match state {
            ValidationState::Validated => counts.validated += 1,
            ValidationState::Discrepancy => counts.discrepancies += 1,
            ValidationState::Pending => counts.pending += 1,
            ValidationState::Reviewed => counts.reviewed += 1,
        }

        if state == ValidationState::Pending {
            unmatched_local.push(code.to_string());
        }

        let descendants_unresolved = children.iter().any(|child| {
            child.needs_review
                || matches!(
                    child.state,
                    ValidationState::Discrepancy | ValidationState::Pending
                )
        });
        let needs_review = state == ValidationState::Discrepancy || descendants_unresolved;

        debug!(
            code,
            state = state.as_str(),
            needs_review,
            "reconciled node"
        );

        ReconciliationNode {
            code: code.to_string(),
            name: name.to_string(),
            local_total,
            local_item_count,
            external_total,
            external_item_count,
            difference_amount,
            difference_percent,
            state,
            needs_review,
            children,
        }
    }
}

fn flatten_estimate(node: &EstimateNode, out: &mut HashMap<String, (f64, Option<usize>)>) {
    out.insert(node.code.clone(), (node.total, node.item_count));
    for child in &node.children {
        flatten_estimate(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::Subchapter;

    fn estimate_node(code: &str, total: f64, children: Vec<EstimateNode>) -> EstimateNode {
        EstimateNode {
            code: code.to_string(),
            name: None,
            total,
            item_count: Some(1),
            children,
        }
    }

    fn single_chapter_tree(code: &str, total: f64) -> BudgetTree {
        let mut chapter = Chapter::new(code.to_string(), "CAPÍTULO".to_string());
        chapter.total = total;
        BudgetTree {
            chapters: vec![chapter],
        }
    }

    fn tree_with_subchapter(chapter_total: f64, sub_code: &str, sub_total: f64) -> BudgetTree {
        let mut chapter = Chapter::new("01".to_string(), "CAPÍTULO".to_string());
        chapter.subchapters.push(Subchapter {
            code: sub_code.to_string(),
            name: "SUBCAPÍTULO".to_string(),
            parent: None,
            children: Vec::new(),
            headings: Vec::new(),
            items: Vec::new(),
            total: sub_total,
            synthesized: false,
        });
        chapter.roots.push(0);
        chapter.total = chapter_total;
        BudgetTree {
            chapters: vec![chapter],
        }
    }

    #[test]
    fn equal_totals_validate() {
        let tree = single_chapter_tree("01", 603315.72);
        let estimate = ExternalEstimate {
            chapters: vec![estimate_node("01", 603315.72, Vec::new())],
        };

        let report =
            ReconciliationEngine::new().reconcile(&tree, &estimate, &HashSet::new());
        assert_eq!(report.chapters[0].state, ValidationState::Validated);
        assert!(!report.chapters[0].needs_review);
        assert_eq!(report.chapters[0].difference_amount, Some(0.0));
    }

    #[test]
    fn one_cent_difference_is_a_discrepancy() {
        let tree = single_chapter_tree("01", 603315.72);
        let estimate = ExternalEstimate {
            chapters: vec![estimate_node("01", 603315.73, Vec::new())],
        };

        let report =
            ReconciliationEngine::new().reconcile(&tree, &estimate, &HashSet::new());
        let node = &report.chapters[0];
        assert_eq!(node.state, ValidationState::Discrepancy);
        assert!(node.needs_review);
        assert!(node.difference_amount.expect("difference") >= 0.01);
    }

    #[test]
    fn sub_cent_rounding_noise_still_validates() {
        let tree = single_chapter_tree("01", 100.004);
        let estimate = ExternalEstimate {
            chapters: vec![estimate_node("01", 100.0, Vec::new())],
        };

        let report =
            ReconciliationEngine::new().reconcile(&tree, &estimate, &HashSet::new());
        assert_eq!(report.chapters[0].state, ValidationState::Validated);
    }

    #[test]
    fn reviewed_override_never_regresses() {
        let tree = tree_with_subchapter(100.0, "01.01", 100.0);
        let estimate = ExternalEstimate {
            chapters: vec![estimate_node(
                "01",
                100.0,
                vec![estimate_node("01.01", 250.0, Vec::new())],
            )],
        };

        let reviewed: HashSet<String> = ["01.01".to_string()].into_iter().collect();
        let report = ReconciliationEngine::new().reconcile(&tree, &estimate, &reviewed);

        let chapter = &report.chapters[0];
        let subchapter = &chapter.children[0];
        assert_eq!(subchapter.state, ValidationState::Reviewed);
        assert!(!subchapter.needs_review);
        assert!(!chapter.needs_review);
        assert_eq!(subchapter.difference_amount, Some(150.0));
    }

    #[test]
    fn descendant_discrepancy_propagates_upward_only() {
        let tree = tree_with_subchapter(100.0, "01.01", 100.0);
        let estimate = ExternalEstimate {
            chapters: vec![estimate_node(
                "01",
                100.0,
                vec![estimate_node("01.01", 250.0, Vec::new())],
            )],
        };

        let report =
            ReconciliationEngine::new().reconcile(&tree, &estimate, &HashSet::new());
        let chapter = &report.chapters[0];
        assert_eq!(chapter.state, ValidationState::Validated);
        assert!(chapter.needs_review);
        assert_eq!(chapter.children[0].state, ValidationState::Discrepancy);
        assert!(chapter.children[0].needs_review);
    }

    #[test]
    fn unmatched_codes_are_reported_on_both_sides() {
        let tree = tree_with_subchapter(100.0, "01.01", 100.0);
        let estimate = ExternalEstimate {
            chapters: vec![estimate_node(
                "01",
                100.0,
                vec![estimate_node("01.99", 50.0, Vec::new())],
            )],
        };

        let report =
            ReconciliationEngine::new().reconcile(&tree, &estimate, &HashSet::new());
        assert_eq!(report.unmatched_local, vec!["01.01".to_string()]);
        assert_eq!(report.unmatched_external, vec!["01.99".to_string()]);

        let chapter = &report.chapters[0];
        assert_eq!(chapter.children[0].state, ValidationState::Pending);
        assert!(chapter.needs_review);
    }

    #[test]
    fn zero_external_total_keeps_percent_finite() {
        let tree = single_chapter_tree("01", 100.0);
        let estimate = ExternalEstimate {
            chapters: vec![estimate_node("01", 0.0, Vec::new())],
        };

        let report =
            ReconciliationEngine::new().reconcile(&tree, &estimate, &HashSet::new());
        let percent = report.chapters[0].difference_percent.expect("percent");
        assert!(percent.is_finite());
        assert_eq!(report.chapters[0].state, ValidationState::Discrepancy);
    }
}
