use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::model::Country;
use crate::structure::{DEFAULT_MIN_CONTENT_LENGTH, DEFAULT_MIN_SECTION_COUNT, ValidationThresholds};

#[derive(Parser, Debug)]
#[command(
    name = "whs-laws",
    version,
    about = "Reorganize, clean and validate the EU workplace-safety law databases"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rebuild chapters from the official chapter structures.
    Reorganize(ReorganizeArgs),
    /// Strip boilerplate from section text and apply official section titles.
    Clean(CleanArgs),
    /// Check document structure and local asset references.
    Validate(ValidateArgs),
    /// Normalize, reorganize, retitle and validate in one pass.
    Run(RunArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CountrySelector {
    At,
    De,
    Nl,
    All,
}

impl CountrySelector {
    pub fn countries(self) -> Vec<Country> {
        match self {
            Self::At => vec![Country::At],
            Self::De => vec![Country::De],
            Self::Nl => vec![Country::Nl],
            Self::All => Country::ALL.to_vec(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ReorganizeArgs {
    #[arg(value_enum, default_value_t = CountrySelector::All)]
    pub country: CountrySelector,

    #[arg(long, default_value = "eu_safety_laws")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub tables_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    #[arg(value_enum, default_value_t = CountrySelector::All)]
    pub country: CountrySelector,

    #[arg(long, default_value = "eu_safety_laws")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub tables_path: Option<PathBuf>,

    /// Only apply official section titles, leave section text untouched.
    #[arg(long, default_value_t = false)]
    pub titles_only: bool,

    #[arg(long, default_value_t = false)]
    pub ai_cleanup: bool,

    #[arg(long)]
    pub ai_endpoint: Option<String>,

    #[arg(long, default_value = "default")]
    pub ai_model: String,

    #[arg(long, default_value_t = 1000)]
    pub ai_delay_ms: u64,

    #[arg(long, default_value_t = 2000)]
    pub ai_backoff_ms: u64,

    #[arg(long, default_value_t = 3)]
    pub ai_max_attempts: u32,

    #[arg(long, default_value_t = 60)]
    pub ai_timeout_secs: u64,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(value_enum, default_value_t = CountrySelector::All)]
    pub country: CountrySelector,

    #[arg(long, default_value = "eu_safety_laws")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub tables_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[arg(long, default_value_t = false)]
    pub verbose: bool,

    /// Correct the document count and chapter ids, then write the database back.
    #[arg(long, default_value_t = false)]
    pub fix: bool,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_MIN_CONTENT_LENGTH)]
    pub min_content_length: usize,

    #[arg(long, default_value_t = DEFAULT_MIN_SECTION_COUNT)]
    pub min_section_count: usize,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(value_enum, default_value_t = CountrySelector::All)]
    pub country: CountrySelector,

    #[arg(long, default_value = "eu_safety_laws")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub tables_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[arg(long, default_value_t = false)]
    pub verbose: bool,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_MIN_CONTENT_LENGTH)]
    pub min_content_length: usize,

    #[arg(long, default_value_t = DEFAULT_MIN_SECTION_COUNT)]
    pub min_section_count: usize,
}

impl ValidateArgs {
    pub fn thresholds(&self) -> ValidationThresholds {
        ValidationThresholds {
            min_content_length: self.min_content_length,
            min_section_count: self.min_section_count,
        }
    }
}

impl RunArgs {
    pub fn thresholds(&self) -> ValidationThresholds {
        ValidationThresholds {
            min_content_length: self.min_content_length,
            min_section_count: self.min_section_count,
        }
    }
}
