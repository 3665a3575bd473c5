use super::*;
use crate::classify::{ClassifiedLine, Figures, LineClassifier, LineKind};
use crate::codes::CodeRejection;
use crate::model::LineRecord;
use crate::tables::RuleTables;

fn tables() -> RuleTables {
    RuleTables::new().expect("rule tables build")
}

fn build_from_text(tables: &RuleTables, lines: &[&str]) -> (BudgetTree, ParseStats) {
    let records: Vec<LineRecord> = lines.iter().map(|line| LineRecord::from_text(line)).collect();
    let classified = LineClassifier::new(tables).classify_block(&records);
    StructureBuilder::new(tables).build(&classified)
}

fn classified(kind: LineKind) -> ClassifiedLine {
    ClassifiedLine {
        line_index: 0,
        page: None,
        text: String::new(),
        kind,
    }
}

fn item_header(code: &str, figures: Option<Figures>) -> ClassifiedLine {
    classified(LineKind::ItemHeader {
        code: code.to_string(),
        unit: "m".to_string(),
        summary: "SUMMARY".to_string(),
        figures,
    })
}

fn figures(quantity: f64, unit_price: f64, amount: f64) -> Figures {
    Figures {
        quantity,
        unit_price,
        amount,
    }
}

#[test]
fn three_line_document_builds_one_chapter_with_one_item() {
    let tables = tables();
    let (tree, stats) = build_from_text(
        &tables,
        &[
            "01.04 DEMOLICIONES",
            "U01AB100 m2 LEVANTADO PAVIMENTO",
            "10,00 5,00 50,00",
        ],
    );

    assert_eq!(tree.chapters.len(), 1);
    let chapter = &tree.chapters[0];
    assert_eq!(chapter.code, "01.04");
    assert_eq!(chapter.name, "DEMOLICIONES");
    assert_eq!(chapter.items.len(), 1);

    let item = &chapter.items[0];
    assert_eq!(item.code, "U01AB100");
    assert_eq!(item.unit, "m²");
    assert_eq!(item.quantity, 10.0);
    assert_eq!(item.unit_price, 5.0);
    assert_eq!(item.amount, 50.0);

    assert_eq!(chapter.total, 50.0);
    assert_eq!(stats.promoted_chapters, 1);
    assert_eq!(stats.items_built, 1);
}

#[test]
fn nested_subchapters_aggregate_totals_exactly() {
    let tables = tables();
    let (tree, stats) = build_from_text(
        &tables,
        &[
            "01 URBANIZACIÓN",
            "01.01 DEMOLICIONES",
            "DEM06 Ml CORTE PAVIMENTO EXISTENTE 630,00 1,12 705,60",
            "01.01.01 BORDILLOS",
            "U01AB100 m DEMOLICIÓN Y LEVANTADO DE BORDILLO",
            "630,00 5,40 3.402,00",
            "TOTAL 01.01.01....... 3.402,00",
            "01.02 RED DE RIEGO",
            "U12TV020 m TUBERÍA PVC 90/125",
            "100,00 2,50 250,00",
        ],
    );

    assert_eq!(tree.chapters.len(), 1);
    let chapter = &tree.chapters[0];
    assert_eq!(chapter.subchapters.len(), 3);
    assert_eq!(chapter.roots.len(), 2);
    assert_eq!(stats.subchapters_built, 3);

    let index = chapter.subchapter_index();
    let sub_01_01 = &chapter.subchapters[index["01.01"]];
    let sub_01_01_01 = &chapter.subchapters[index["01.01.01"]];
    let sub_01_02 = &chapter.subchapters[index["01.02"]];

    assert_eq!(sub_01_01_01.parent, Some(index["01.01"]));
    assert_eq!(sub_01_01_01.total, 3402.0);
    assert_eq!(sub_01_02.total, 250.0);

    let direct: f64 = sub_01_01.items.iter().map(|item| item.amount).sum();
    assert_eq!(sub_01_01.total, direct + sub_01_01_01.total);
    assert_eq!(chapter.total, sub_01_01.total + sub_01_02.total);
    assert_eq!(tree.budget_total(), chapter.total);
}

#[test]
fn dotted_total_returns_cursor_to_parent_subchapter() {
    let tables = tables();
    let (tree, _) = build_from_text(
        &tables,
        &[
            "01 URBANIZACIÓN",
            "01.01 DEMOLICIONES",
            "01.01.01 BORDILLOS",
            "U01AB100 m DEMOLICIÓN DE BORDILLO",
            "10,00 1,00 10,00",
            "TOTAL 01.01.01....... 10,00",
            "DEM06 Ml CORTE PAVIMENTO EXISTENTE",
            "20,00 1,00 20,00",
        ],
    );

    let chapter = &tree.chapters[0];
    let index = chapter.subchapter_index();
    assert_eq!(chapter.subchapters[index["01.01"]].items.len(), 1);
    assert_eq!(chapter.subchapters[index["01.01"]].items[0].code, "DEM06");
    assert_eq!(chapter.subchapters[index["01.01.01"]].items.len(), 1);
}

#[test]
fn partial_measurement_rows_use_the_final_triple() {
    let tables = tables();
    let rows = vec![
        classified(LineKind::Chapter {
            code: "01".to_string(),
            name: "CAP".to_string(),
        }),
        item_header("U01AB100", None),
        classified(LineKind::Figures {
            figures: figures(4.0, 0.0, 0.0),
        }),
        classified(LineKind::Figures {
            figures: figures(6.0, 0.0, 0.0),
        }),
        classified(LineKind::Figures {
            figures: figures(10.0, 5.0, 50.0),
        }),
    ];

    let (tree, stats) = StructureBuilder::new(&tables).build(&rows);
    let item = &tree.chapters[0].items[0];
    assert_eq!(item.quantity, 10.0);
    assert_eq!(item.unit_price, 5.0);
    assert_eq!(item.amount, 50.0);
    assert!(stats.measurement_sum_mismatches.is_empty());
}

#[test]
fn partial_sum_disagreement_is_recorded_not_corrected() {
    let tables = tables();
    let rows = vec![
        classified(LineKind::Chapter {
            code: "01".to_string(),
            name: "CAP".to_string(),
        }),
        item_header("U01AB100", None),
        classified(LineKind::Figures {
            figures: figures(4.0, 0.0, 0.0),
        }),
        classified(LineKind::Figures {
            figures: figures(10.0, 5.0, 50.0),
        }),
    ];

    let (tree, stats) = StructureBuilder::new(&tables).build(&rows);
    let item = &tree.chapters[0].items[0];
    assert_eq!(item.quantity, 10.0);
    assert_eq!(item.amount, 50.0);
    assert_eq!(stats.measurement_sum_mismatches.len(), 1);
    assert_eq!(stats.measurement_sum_mismatches[0].partial_sum, 4.0);
}

#[test]
fn rejected_codes_and_zero_amounts_are_counted_not_fatal() {
    let tables = tables();
    let rows = vec![
        classified(LineKind::Chapter {
            code: "01".to_string(),
            name: "CAP".to_string(),
        }),
        item_header("ORDEN", Some(figures(1.0, 1.0, 1.0))),
        item_header("U01AB100", Some(figures(1.0, 0.0, 0.0))),
        item_header("DEM06", Some(figures(10.0, 5.0, 50.0))),
    ];

    let (tree, stats) = StructureBuilder::new(&tables).build(&rows);
    assert_eq!(tree.chapters[0].items.len(), 1);
    assert_eq!(tree.chapters[0].items[0].code, "DEM06");
    assert_eq!(stats.rejected_codes.len(), 2);
    assert_eq!(stats.rejected_codes[0].reason, CodeRejection::ForbiddenWord);
    assert_eq!(stats.rejected_codes[1].reason, CodeRejection::ZeroAmount);
    assert_eq!(stats.zero_amount_items, 1);
}

#[test]
fn amount_mismatch_is_recorded_and_the_stated_amount_kept() {
    let tables = tables();
    let rows = vec![
        classified(LineKind::Chapter {
            code: "01".to_string(),
            name: "CAP".to_string(),
        }),
        item_header("U01AB100", Some(figures(10.0, 5.0, 60.0))),
    ];

    let (tree, stats) = StructureBuilder::new(&tables).build(&rows);
    assert_eq!(tree.chapters[0].items[0].amount, 60.0);
    assert_eq!(stats.amount_mismatches.len(), 1);
    assert_eq!(stats.amount_mismatches[0].computed, 50.0);
}

#[test]
fn description_lines_join_into_one_paragraph() {
    let tables = tables();
    let (tree, _) = build_from_text(
        &tables,
        &[
            "01 URBANIZACIÓN",
            "01.01 DEMOLICIONES",
            "DEM06 Ml CORTE PAVIMENTO EXISTENTE",
            "Corte de pavimento de aglomerado asfáltico u hormigón,",
            "con cortadora de disco diamante, en calzadas.",
            "630,00 1,12 705,60",
        ],
    );

    let index = tree.chapters[0].subchapter_index();
    let item = &tree.chapters[0].subchapters[index["01.01"]].items[0];
    assert_eq!(
        item.description.as_deref(),
        Some("Corte de pavimento de aglomerado asfáltico u hormigón, con cortadora de disco diamante, en calzadas.")
    );
}

#[test]
fn repair_synthesizes_missing_prefixes_and_reassigns_items() {
    let tables = tables();
    let mut chapter = Chapter::new("C08".to_string(), "CALYPO FADO".to_string());
    for (code, amount) in [
        ("C08.01.001", 100.0),
        ("C08.01.002", 50.0),
        ("C08.02.001", 25.0),
    ] {
        chapter.items.push(Item {
            code: code.to_string(),
            unit: "m".to_string(),
            summary: "SUMMARY".to_string(),
            description: None,
            quantity: 1.0,
            unit_price: amount,
            amount,
        });
    }
    let mut tree = BudgetTree {
        chapters: vec![chapter],
    };

    let stats = repair_tree(&mut tree, &tables);
    assert_eq!(stats.synthesized_subchapters, 2);
    assert_eq!(
        stats.synthesized_codes,
        vec!["C08.01".to_string(), "C08.02".to_string()]
    );
    assert_eq!(stats.reassigned_items, 3);

    let chapter = &tree.chapters[0];
    assert!(chapter.items.is_empty());
    let index = chapter.subchapter_index();
    let sub_01 = &chapter.subchapters[index["C08.01"]];
    let sub_02 = &chapter.subchapters[index["C08.02"]];
    assert_eq!(sub_01.items.len(), 2);
    assert_eq!(sub_02.items.len(), 1);
    assert!(sub_01.synthesized);
    assert_eq!(sub_01.name, "Subcapítulo C08.01");
    assert_eq!(sub_01.total, 150.0);
    assert_eq!(chapter.total, 175.0);
}

#[test]
fn repair_links_deep_prefixes_to_their_parents() {
    let tables = tables();
    let mut chapter = Chapter::new("01".to_string(), "FASE 1".to_string());
    chapter.items.push(Item {
        code: "01.10.01.001".to_string(),
        unit: "Ud".to_string(),
        summary: "SUMMARY".to_string(),
        description: None,
        quantity: 1.0,
        unit_price: 10.0,
        amount: 10.0,
    });
    let mut tree = BudgetTree {
        chapters: vec![chapter],
    };

    repair_tree(&mut tree, &tables);

    let chapter = &tree.chapters[0];
    let index = chapter.subchapter_index();
    let deep = &chapter.subchapters[index["01.10.01"]];
    assert_eq!(deep.parent, Some(index["01.10"]));
    assert_eq!(deep.items.len(), 1);
    assert_eq!(chapter.subchapters[index["01.10"]].children, vec![index["01.10.01"]]);
}

#[test]
fn repair_is_idempotent() {
    let tables = tables();
    let mut chapter = Chapter::new("C08".to_string(), "CALYPO FADO".to_string());
    chapter.items.push(Item {
        code: "C08.01.001".to_string(),
        unit: "m".to_string(),
        summary: "SUMMARY".to_string(),
        description: None,
        quantity: 1.0,
        unit_price: 100.0,
        amount: 100.0,
    });
    let mut tree = BudgetTree {
        chapters: vec![chapter],
    };

    let first = repair_tree(&mut tree, &tables);
    assert_eq!(first.synthesized_subchapters, 1);
    assert_eq!(first.reassigned_items, 1);

    let second = repair_tree(&mut tree, &tables);
    assert_eq!(second.synthesized_subchapters, 0);
    assert_eq!(second.reassigned_items, 0);
}

#[test]
fn items_without_open_grouping_are_dropped_with_a_warning() {
    let tables = tables();
    let rows = vec![item_header("U01AB100", Some(figures(1.0, 1.0, 1.0)))];

    let (tree, stats) = StructureBuilder::new(&tables).build(&rows);
    assert!(tree.chapters.is_empty());
    assert_eq!(stats.items_built, 0);
    assert_eq!(stats.hierarchy_warnings.len(), 1);
}

#[test]
fn headings_group_items_under_the_open_subchapter() {
    let tables = tables();
    let (tree, stats) = build_from_text(
        &tables,
        &[
            "01 URBANIZACIÓN",
            "01.01 DEMOLICIONES",
            "APARTADO 01.01.01 CALZADAS",
            "DEM06 Ml CORTE PAVIMENTO EXISTENTE",
            "630,00 1,12 705,60",
            "TOTAL APARTADO 01.01.01 ....... 705,60",
            "U01AB100 m DEMOLICIÓN DE BORDILLO",
            "10,00 1,00 10,00",
        ],
    );

    assert_eq!(stats.headings_built, 1);
    let chapter = &tree.chapters[0];
    let index = chapter.subchapter_index();
    let sub = &chapter.subchapters[index["01.01"]];
    assert_eq!(sub.headings.len(), 1);
    assert_eq!(sub.headings[0].items.len(), 1);
    assert_eq!(sub.headings[0].total, 705.60);
    assert_eq!(sub.items.len(), 1);
    assert_eq!(sub.total, 705.60 + 10.0);
}
