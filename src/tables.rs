use anyhow::{Context, Result};
use regex::Regex;

#[derive(Debug)]
pub struct RuleTables {
    pub pagination: Regex,
    pub total_keyword: Regex,
    pub total_dotted: Regex,
    pub chapter_keyword: Regex,
    pub subchapter_keyword: Regex,
    pub heading_keyword: Regex,
    pub chapter_implicit: Regex,
    pub subchapter_implicit: Regex,
    pub item_header: Regex,
    pub item_code_shape: Regex,
    pub unitless_with_figures: Regex,
    pub unitless_bare: Regex,
    pub numbers_tail: Regex,
    pub amount_format: Regex,
    pub subchapter_code_shape: Regex,
    pub item_code_prefix: Regex,
    pub code_final_shape: Regex,
    pub unit_word: Regex,
    pub continuation_code_start: Regex,

    pub forbidden_words: &'static [&'static str],
    pub table_header_words: &'static [&'static str],
    pub unit_suffixes_digit: &'static [&'static str],
    pub unit_suffixes_letter: &'static [&'static str],
    pub noise_tokens: &'static [&'static str],
    pub adjustment_prefixes: &'static [&'static str],
}

const FORBIDDEN_WORDS: &[&str] = &[
    "ORDEN",
    "CODIGO",
    "CÓDIGO",
    "RESUMEN",
    "CANTIDAD",
    "PRECIO",
    "IMPORTE",
    "UNIDAD",
    "UD",
    "TOTAL",
    "SUBTOTAL",
    "CAPITULO",
    "CAPÍTULO",
    "SUBCAPITULO",
    "SUBCAPÍTULO",
    "APARTADO",
    "FOM",
    "NTE",
    "RD",
];

const TABLE_HEADER_WORDS: &[&str] = &["CÓDIGO", "CODIGO", "RESUMEN", "CANTIDAD", "PRECIO", "IMPORTE"];

const UNIT_SUFFIXES_DIGIT: &[&str] = &["m2", "m3"];

const UNIT_SUFFIXES_LETTER: &[&str] = &["ml", "ud", "uf", "pa", "kg", "m", "u", "d"];

const NOISE_TOKENS: &[&str] = &["d", "a", "b", "c", "1", "2"];

const ADJUSTMENT_PREFIXES: &[&str] = &["A DEDUCIR", "A DESCONTAR"];

const UNIT_ALTERNATION: &str =
    "m[23²³]|ml|m\\.?|ud|uf|u|p[.:]a[.:]?|pa|kg|sm|mes|d[ií]a|año|sem|h|l|t|d";

impl RuleTables {
    pub fn new() -> Result<Self> {
        let unit_group = format!("((?i)(?:{UNIT_ALTERNATION})(?:/[a-z]+)?)");

        Ok(Self {
            pagination: compile(r"^\d+(?:\s+\d+)*$")?,
            total_keyword: compile(
                r"(?i)^TOTAL\s+(SUBCAP[IÍ]TULO|CAP[IÍ]TULO|APARTADO)\s+([A-Z]?[\d.]+)",
            )?,
            total_dotted: compile(r"(?i)^TOTAL\s+(\d{1,2}(?:\.\d{1,2})*)[\s.]+[\d.,]+$")?,
            chapter_keyword: compile(r"(?i)^CAP[IÍ]TULO\s+([A-Z]?\d+)\s+(.+)$")?,
            subchapter_keyword: compile(r"(?i)^SUBCAP[IÍ]TULO\s+([A-Z]?\d+(?:\.\d+)+)\s+(.+)$")?,
            heading_keyword: compile(r"(?i)^APARTADO\s+([A-Z]?\d+(?:\.\d+)+)\s+(.+)$")?,
            chapter_implicit: compile(r"^(\d{1,2})\s*([A-ZÁÉÍÓÚÑ][A-ZÁÉÍÓÚÑ0-9\s./()\-]*)$")?,
            subchapter_implicit: compile(
                r"^(\d{1,2}(?:\.\d{1,2}){1,3})\s*([A-ZÁÉÍÓÚÑ][A-ZÁÉÍÓÚÑ0-9\s./()\-]*)$",
            )?,
            item_header: compile(&format!(r"^(\S+)\s+{unit_group}\s+(\S.*)$"))?,
            item_code_shape: compile(r"^[A-Z0-9][A-Z0-9._]*$")?,
            unitless_with_figures: compile(r"^([A-Z0-9]\S*)\s+([A-ZÁÉÍÓÚÑ].*)$")?,
            unitless_bare: compile(r"^([A-Z][A-Za-z0-9_]{4,})\s+(\S.*)$")?,
            numbers_tail: compile(
                r"(\d+(?:\.\d{3})*(?:,\d{1,4})?)\s+(\d+(?:\.\d{3})*(?:,\d{1,4})?)\s+(\d+(?:\.\d{3})*(?:,\d{1,4})?)\s*$",
            )?,
            amount_format: compile(r"^\d+(?:\.\d{3})*,\d{2}$")?,
            subchapter_code_shape: compile(r"^\d{1,2}(?:\.\d{1,2}){1,3}$")?,
            item_code_prefix: compile(r"^[A-Z]?\d{1,3}(?:\.\d{1,3})+")?,
            code_final_shape: compile(r"^[A-Za-z0-9][A-Za-z0-9._\-]{2,}$")?,
            unit_word: compile(&format!(r"^(?i:{UNIT_ALTERNATION})$"))?,
            continuation_code_start: compile(r"^[A-Z0-9]\S{4,}\s+")?,
            forbidden_words: FORBIDDEN_WORDS,
            table_header_words: TABLE_HEADER_WORDS,
            unit_suffixes_digit: UNIT_SUFFIXES_DIGIT,
            unit_suffixes_letter: UNIT_SUFFIXES_LETTER,
            noise_tokens: NOISE_TOKENS,
            adjustment_prefixes: ADJUSTMENT_PREFIXES,
        })
    }

    pub fn is_table_header_line(&self, line: &str) -> bool {
        let upper = line.to_uppercase();
        let mut seen = 0usize;
        for word in self.table_header_words {
            if upper.contains(word) {
                seen += 1;
            }
        }
        if upper.contains("CÓDIGO") && upper.contains("CODIGO") {
            seen -= 1;
        }
        seen >= 3
    }

    pub fn is_adjustment_line(&self, line: &str) -> bool {
        let upper = line.to_uppercase();
        self.adjustment_prefixes
            .iter()
            .any(|prefix| upper.starts_with(prefix))
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("failed to compile pattern: {pattern}"))
}
