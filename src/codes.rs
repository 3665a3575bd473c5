use serde::Serialize;

use crate::tables::RuleTables;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeRejection {
    Empty,
    ForbiddenWord,
    NoDigits,
    ZeroAmount,
    SubchapterShape,
    TooShort,
    UnitSuffix,
    NoTrailingDigit,
    MalformedShape,
}

impl CodeRejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty code",
            Self::ForbiddenWord => "forbidden word (table header)",
            Self::NoDigits => "no digits",
            Self::ZeroAmount => "zero or missing amount",
            Self::SubchapterShape => "sub-chapter shaped code",
            Self::TooShort => "code too short",
            Self::UnitSuffix => "unit suffix collision",
            Self::NoTrailingDigit => "does not end in a digit",
            Self::MalformedShape => "malformed code shape",
        }
    }
}

pub struct CodeValidator<'a> {
    tables: &'a RuleTables,
}

impl<'a> CodeValidator<'a> {
    pub fn new(tables: &'a RuleTables) -> Self {
        Self { tables }
    }

    pub fn validate(&self, code: &str, amount: Option<f64>) -> Result<(), CodeRejection> {
        self.check_chain(code, Some(amount.unwrap_or(0.0)))
    }

    pub fn validate_shape(&self, code: &str) -> Result<(), CodeRejection> {
        self.check_chain(code, None)
    }

    fn check_chain(&self, code: &str, amount: Option<f64>) -> Result<(), CodeRejection> {
        if code.is_empty() {
            return Err(CodeRejection::Empty);
        }

        let upper = code.to_uppercase();
        if self.tables.forbidden_words.contains(&upper.as_str()) {
            return Err(CodeRejection::ForbiddenWord);
        }

        if !code.chars().any(|ch| ch.is_ascii_digit()) {
            return Err(CodeRejection::NoDigits);
        }

        if let Some(amount) = amount {
            if amount.abs() < f64::EPSILON {
                return Err(CodeRejection::ZeroAmount);
            }
        }

        if self.tables.subchapter_code_shape.is_match(code) {
            return Err(CodeRejection::SubchapterShape);
        }

        if code.chars().count() <= 2 || self.tables.noise_tokens.contains(&code) {
            return Err(CodeRejection::TooShort);
        }

        if self.has_unit_suffix(code) {
            return Err(CodeRejection::UnitSuffix);
        }

        if !code.ends_with(|ch: char| ch.is_ascii_digit()) {
            return Err(CodeRejection::NoTrailingDigit);
        }

        if !self.tables.code_final_shape.is_match(code) {
            return Err(CodeRejection::MalformedShape);
        }

        Ok(())
    }

    fn has_unit_suffix(&self, code: &str) -> bool {
        if code.ends_with(|ch: char| ch.is_ascii_digit()) {
            let lower = code.to_lowercase();
            return self
                .tables
                .unit_suffixes_digit
                .iter()
                .any(|suffix| lower.ends_with(suffix) && lower.len() > suffix.len() + 1);
        }

        let trailing = code
            .chars()
            .rev()
            .take_while(|ch| ch.is_ascii_alphabetic())
            .count();
        if trailing == 0 || trailing > 2 {
            return false;
        }

        let split = code.len() - trailing;
        let stem = &code[..split];
        let suffix = code[split..].to_ascii_lowercase();
        stem.ends_with(|ch: char| ch.is_ascii_digit())
            && self.tables.unit_suffixes_letter.contains(&suffix.as_str())
    }
}
