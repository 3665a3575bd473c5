use serde::Serialize;

use crate::codes::CodeValidator;
use crate::model::LineRecord;
use crate::normalize::parse_spanish_number;
use crate::tables::RuleTables;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Figures {
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineKind {
    Chapter {
        code: String,
        name: String,
    },
    Subchapter {
        code: String,
        name: String,
    },
    Heading {
        code: String,
        name: String,
    },
    ItemHeader {
        code: String,
        unit: String,
        summary: String,
        figures: Option<Figures>,
    },
    Figures {
        figures: Figures,
    },
    Total {
        level: Option<String>,
        code: Option<String>,
    },
    TableHeader,
    Description {
        text: String,
    },
    Ignorable,
}

impl LineKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Chapter { .. } => "chapter",
            Self::Subchapter { .. } => "subchapter",
            Self::Heading { .. } => "heading",
            Self::ItemHeader { .. } => "item_header",
            Self::Figures { .. } => "figures",
            Self::Total { .. } => "total",
            Self::TableHeader => "table_header",
            Self::Description { .. } => "description",
            Self::Ignorable => "ignorable",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyContext {
    pub item_open: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedLine {
    pub line_index: usize,
    pub page: Option<u32>,
    pub text: String,
    pub kind: LineKind,
}

pub struct LineClassifier<'a> {
    tables: &'a RuleTables,
    validator: CodeValidator<'a>,
}

impl<'a> LineClassifier<'a> {
    pub fn new(tables: &'a RuleTables) -> Self {
        Self {
            tables,
            validator: CodeValidator::new(tables),
        }
    }

    pub fn classify(&self, line: &str, ctx: ClassifyContext) -> LineKind {
        let line = line.trim();
        if line.is_empty() {
            return LineKind::Ignorable;
        }

        if self.tables.pagination.is_match(line) {
            return LineKind::Ignorable;
        }

        if let Some(captures) = self.tables.total_keyword.captures(line) {
            let level = captures.get(1).map(|value| value.as_str().to_uppercase());
            let code = captures
                .get(2)
                .map(|value| value.as_str().trim_matches('.').to_string())
                .filter(|value| !value.is_empty());
            return LineKind::Total { level, code };
        }

        if let Some(captures) = self.tables.total_dotted.captures(line) {
            let code = captures.get(1).map(|value| value.as_str().to_string());
            return LineKind::Total {
                level: Some("SUBCAPÍTULO".to_string()),
                code,
            };
        }

        if let Some(captures) = self.tables.chapter_keyword.captures(line) {
            return LineKind::Chapter {
                code: capture_string(&captures, 1),
                name: capture_string(&captures, 2),
            };
        }

        if let Some(captures) = self.tables.subchapter_keyword.captures(line) {
            return LineKind::Subchapter {
                code: capture_string(&captures, 1),
                name: capture_string(&captures, 2),
            };
        }

        if let Some(captures) = self.tables.heading_keyword.captures(line) {
            return LineKind::Heading {
                code: capture_string(&captures, 1),
                name: capture_string(&captures, 2),
            };
        }

        if self.tables.is_adjustment_line(line) {
            return LineKind::Ignorable;
        }

        if let Some(captures) = self.tables.subchapter_implicit.captures(line) {
            if let Some(kind) = self.match_item_header(line, None) {
                return kind;
            }
            return LineKind::Subchapter {
                code: capture_string(&captures, 1),
                name: capture_string(&captures, 2),
            };
        }

        if let Some(captures) = self.tables.chapter_implicit.captures(line) {
            return LineKind::Chapter {
                code: capture_string(&captures, 1),
                name: capture_string(&captures, 2),
            };
        }

        if let Some(captures) = self.tables.numbers_tail.captures(line) {
            let figures = figures_from_captures(&captures);
            let head = line[..captures.get(1).map(|value| value.start()).unwrap_or(0)].trim();

            if !head.is_empty() {
                if let Some(kind) = self.match_item_header(head, Some(figures)) {
                    return kind;
                }
                if let Some(kind) = self.match_unitless_with_figures(head, figures) {
                    return kind;
                }
            }

            if ctx.item_open {
                return LineKind::Figures { figures };
            }
        } else {
            if let Some(kind) = self.match_item_header(line, None) {
                return kind;
            }
            if let Some(kind) = self.match_unitless_bare(line) {
                return kind;
            }
        }

        if self.tables.is_table_header_line(line) {
            return LineKind::TableHeader;
        }

        if ctx.item_open {
            return LineKind::Description {
                text: line.to_string(),
            };
        }

        LineKind::Ignorable
    }

    pub fn classify_block(&self, lines: &[LineRecord]) -> Vec<ClassifiedLine> {
        let mut results = Vec::with_capacity(lines.len());
        let mut ctx = ClassifyContext::default();

        for (index, record) in lines.iter().enumerate() {
            let kind = self.classify(&record.text, ctx);

            match kind {
                LineKind::ItemHeader { .. } => ctx.item_open = true,
                LineKind::Chapter { .. }
                | LineKind::Subchapter { .. }
                | LineKind::Heading { .. }
                | LineKind::Total { .. } => ctx.item_open = false,
                _ => {}
            }

            results.push(ClassifiedLine {
                line_index: index,
                page: record.page,
                text: record.text.trim().to_string(),
                kind,
            });
        }

        self.merge_continued_summaries(&mut results);
        results
    }

    fn match_item_header(&self, text: &str, figures: Option<Figures>) -> Option<LineKind> {
        let captures = self.tables.item_header.captures(text)?;
        let code = captures.get(1)?.as_str();

        if !self.tables.item_code_shape.is_match(code) {
            return None;
        }
        if self.validator.validate_shape(code).is_err() {
            return None;
        }

        Some(LineKind::ItemHeader {
            code: code.to_string(),
            unit: captures.get(2)?.as_str().to_string(),
            summary: captures.get(3)?.as_str().trim().to_string(),
            figures,
        })
    }

    fn match_unitless_with_figures(&self, head: &str, figures: Figures) -> Option<LineKind> {
        let captures = self.tables.unitless_with_figures.captures(head)?;
        let code = captures.get(1)?.as_str();

        if self.tables.amount_format.is_match(code) {
            return None;
        }
        if self.tables.unit_word.is_match(code) {
            return None;
        }
        if self.validator.validate_shape(code).is_err() {
            return None;
        }

        Some(LineKind::ItemHeader {
            code: code.to_string(),
            unit: "X".to_string(),
            summary: captures.get(2)?.as_str().trim().to_string(),
            figures: Some(figures),
        })
    }

    fn match_unitless_bare(&self, line: &str) -> Option<LineKind> {
        let captures = self.tables.unitless_bare.captures(line)?;
        let code = captures.get(1)?.as_str();
        let summary = captures.get(2)?.as_str().trim();

        if self.tables.unit_word.is_match(code) {
            return None;
        }
        if summary.split_whitespace().count() < 2 {
            return None;
        }
        if self.validator.validate_shape(code).is_err() {
            return None;
        }

        Some(LineKind::ItemHeader {
            code: code.to_string(),
            unit: "X".to_string(),
            summary: summary.to_string(),
            figures: None,
        })
    }

    fn merge_continued_summaries(&self, results: &mut [ClassifiedLine]) -> usize {
        let mut merged = 0usize;

        for index in 0..results.len().saturating_sub(1) {
            if !matches!(results[index].kind, LineKind::ItemHeader { .. }) {
                continue;
            }

            let continuation = {
                let next = &results[index + 1];
                if !matches!(
                    next.kind,
                    LineKind::Description { .. } | LineKind::Ignorable
                ) {
                    continue;
                }
                if next.text.is_empty() || next.text.len() >= 150 {
                    continue;
                }
                if self.tables.continuation_code_start.is_match(&next.text)
                    || self.tables.numbers_tail.is_match(&next.text)
                    || self.tables.is_table_header_line(&next.text)
                {
                    continue;
                }
                let letters: Vec<char> =
                    next.text.chars().filter(|ch| ch.is_alphabetic()).collect();
                if letters.is_empty() || !letters.iter().all(|ch| ch.is_uppercase()) {
                    continue;
                }
                next.text.clone()
            };

            if let LineKind::ItemHeader { summary, .. } = &mut results[index].kind {
                summary.push(' ');
                summary.push_str(&continuation);
                results[index + 1].kind = LineKind::Ignorable;
                merged += 1;
            }
        }

        merged
    }
}

fn capture_string(captures: &regex::Captures<'_>, group: usize) -> String {
    captures
        .get(group)
        .map(|value| value.as_str().trim().to_string())
        .unwrap_or_default()
}

fn figures_from_captures(captures: &regex::Captures<'_>) -> Figures {
    Figures {
        quantity: parse_group(captures, 1),
        unit_price: parse_group(captures, 2),
        amount: parse_group(captures, 3),
    }
}

fn parse_group(captures: &regex::Captures<'_>, group: usize) -> f64 {
    captures
        .get(group)
        .and_then(|value| parse_spanish_number(value.as_str()))
        .unwrap_or(0.0)
}
