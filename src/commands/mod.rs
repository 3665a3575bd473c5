use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::LinesFormat;
use crate::model::LineRecord;
use crate::util::read_file_string;

pub mod classify;
pub mod parse;
pub mod reconcile;
pub mod repair;
pub mod status;

pub fn load_line_records(path: &Path, format: LinesFormat) -> Result<Vec<LineRecord>> {
    match format {
        LinesFormat::Text => {
            let raw = read_file_string(path)?;
            Ok(raw.lines().map(LineRecord::from_text).collect())
        }
        LinesFormat::Json => {
            let raw = read_file_string(path)?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse line records: {}", path.display()))
        }
    }
}
