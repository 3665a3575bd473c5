use std::collections::HashMap;

use serde::{Deserialize, Serialize};

mod build;
mod repair;
#[cfg(test)]
mod tests;

pub use build::{AmountMismatch, ParseStats, RejectedCodeStat, StructureBuilder, SumMismatch};
pub use repair::{RepairStats, repair_tree};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub code: String,
    pub unit: String,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heading {
    pub code: String,
    pub name: String,
    pub items: Vec<Item>,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subchapter {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default)]
    pub children: Vec<usize>,
    #[serde(default)]
    pub headings: Vec<Heading>,
    #[serde(default)]
    pub items: Vec<Item>,
    pub total: f64,
    #[serde(default)]
    pub synthesized: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub subchapters: Vec<Subchapter>,
    #[serde(default)]
    pub roots: Vec<usize>,
    pub total: f64,
}

impl Chapter {
    pub fn new(code: String, name: String) -> Self {
        Self {
            code,
            name,
            items: Vec::new(),
            subchapters: Vec::new(),
            roots: Vec::new(),
            total: 0.0,
        }
    }

    pub fn subchapter_index(&self) -> HashMap<String, usize> {
        self.subchapters
            .iter()
            .enumerate()
            .map(|(index, subchapter)| (subchapter.code.clone(), index))
            .collect()
    }

    pub fn recompute_totals(&mut self) {
        let roots = self.roots.clone();
        let mut total: f64 = self.items.iter().map(|item| item.amount).sum();
        for root in roots {
            total += compute_subchapter_total(&mut self.subchapters, root);
        }
        self.total = total;
    }

    pub fn subtree_item_count(&self, index: usize) -> usize {
        let subchapter = &self.subchapters[index];
        let mut count = subchapter.items.len();
        count += subchapter
            .headings
            .iter()
            .map(|heading| heading.items.len())
            .sum::<usize>();
        for child in &subchapter.children {
            count += self.subtree_item_count(*child);
        }
        count
    }

    pub fn item_count(&self) -> usize {
        let mut count = self.items.len();
        for root in &self.roots {
            count += self.subtree_item_count(*root);
        }
        count
    }
}

fn compute_subchapter_total(subchapters: &mut [Subchapter], index: usize) -> f64 {
    let mut total: f64 = subchapters[index].items.iter().map(|item| item.amount).sum();

    for heading in &mut subchapters[index].headings {
        heading.total = heading.items.iter().map(|item| item.amount).sum();
        total += heading.total;
    }

    let children = subchapters[index].children.clone();
    for child in children {
        total += compute_subchapter_total(subchapters, child);
    }

    subchapters[index].total = total;
    total
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetTree {
    pub chapters: Vec<Chapter>,
}

impl BudgetTree {
    pub fn recompute_totals(&mut self) {
        for chapter in &mut self.chapters {
            chapter.recompute_totals();
        }
    }

    pub fn budget_total(&self) -> f64 {
        self.chapters.iter().map(|chapter| chapter.total).sum()
    }

    pub fn item_count(&self) -> usize {
        self.chapters.iter().map(Chapter::item_count).sum()
    }
}
