use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "mediciones",
    version,
    about = "Local bill-of-quantities extraction and reconciliation tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Classify(ClassifyArgs),
    Parse(ParseArgs),
    Repair(RepairArgs),
    Reconcile(ReconcileArgs),
    Status(StatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum LinesFormat {
    Text,
    Json,
}

impl LinesFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ClassifyArgs {
    #[arg(long)]
    pub lines_path: PathBuf,

    #[arg(long, value_enum, default_value_t = LinesFormat::Text)]
    pub lines_format: LinesFormat,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    #[arg(long, default_value = ".cache/mediciones")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub lines_path: PathBuf,

    #[arg(long, value_enum, default_value_t = LinesFormat::Text)]
    pub lines_format: LinesFormat,

    #[arg(long)]
    pub tree_path: Option<PathBuf>,

    #[arg(long)]
    pub parse_manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub repair: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RepairArgs {
    #[arg(long)]
    pub tree_path: PathBuf,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ReconcileArgs {
    #[arg(long, default_value = ".cache/mediciones")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub tree_path: PathBuf,

    #[arg(long)]
    pub estimate_path: PathBuf,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long = "reviewed-code")]
    pub reviewed_codes: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/mediciones")]
    pub cache_root: PathBuf,
}
