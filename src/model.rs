use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRecord {
    pub text: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
}

impl LineRecord {
    pub fn from_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            page: None,
            column: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateNode {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    pub total: f64,
    #[serde(default)]
    pub item_count: Option<usize>,
    #[serde(default)]
    pub children: Vec<EstimateNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalEstimate {
    pub chapters: Vec<EstimateNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParsePaths {
    pub cache_root: String,
    pub lines_path: String,
    pub tree_path: String,
    pub manifest_path: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseCounts {
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
    pub code_rejections: usize,
    pub zero_amount_items: usize,
    pub amount_mismatches: usize,
    pub measurement_sum_mismatches: usize,
    pub stray_figures_rows: usize,
    pub synthesized_subchapters: usize,
    pub reassigned_items: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedCode {
    pub code: String,
    pub reason: String,
    pub line_index: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub source_sha256: String,
    pub lines_format: String,
    pub paths: ParsePaths,
    pub counts: ParseCounts,
    pub budget_total: f64,
    pub rejected_codes: Vec<RejectedCode>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseRunSummary {
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub source_sha256: String,
    pub budget_total: f64,
    pub counts: ParseCountsSummary,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseCountsSummary {
    pub lines_total: usize,
    pub chapters_built: usize,
    pub subchapters_built: usize,
    pub items_built: usize,
    pub code_rejections: usize,
}
