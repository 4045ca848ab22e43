use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{error, info, warn};

use crate::model::{Country, LawDatabase};
use crate::report::{FailedCountry, RunReport, write_json_report, write_text_report};
use crate::util::{copy_verified, now_utc_string, write_json_pretty};

pub fn database_path(data_root: &Path, country: Country) -> PathBuf {
    data_root
        .join(country.code())
        .join(format!("{}_database.json", country.code()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupKind {
    /// Taken before text cleanup, `validate --fix` and full runs.
    Full,
    /// Taken before chapter reorganization.
    Chapters,
}

pub fn backup_path(data_root: &Path, country: Country, kind: BackupKind) -> PathBuf {
    let suffix = match kind {
        BackupKind::Full => "backup",
        BackupKind::Chapters => "chapters_backup",
    };
    data_root
        .join(country.code())
        .join(format!("{}_database_{suffix}.json", country.code()))
}

/// Copies the untouched database next to itself before anything is written.
pub fn write_backup(data_root: &Path, country: Country, kind: BackupKind) -> Result<PathBuf> {
    let source = database_path(data_root, country);
    let backup = backup_path(data_root, country, kind);
    copy_verified(&source, &backup)
        .with_context(|| format!("failed to back up {} database", country))?;
    info!(country = %country, path = %backup.display(), "wrote verified backup");
    Ok(backup)
}

pub fn load_database(path: &Path, country: Country) -> Result<LawDatabase> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let database: LawDatabase = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let declared = database.metadata.country.trim();
    if !declared.is_empty() && Country::from_code(declared) != Some(country) {
        warn!(
            path = %path.display(),
            declared,
            expected = %country,
            "database metadata names a different country"
        );
    }

    info!(
        country = %country,
        path = %path.display(),
        documents = database.documents.len(),
        sections = database.section_count(),
        "loaded database"
    );
    Ok(database)
}

pub fn save_database(path: &Path, database: &mut LawDatabase) -> Result<()> {
    if let Some(stale) = database.sync_document_count() {
        warn!(
            path = %path.display(),
            stale,
            actual = database.metadata.document_count,
            "corrected metadata document_count"
        );
    }
    database.metadata.generated_at = now_utc_string();
    write_json_pretty(path, database)?;
    info!(path = %path.display(), "wrote database");
    Ok(())
}

pub struct CountryOutcomes<T> {
    pub completed: Vec<T>,
    pub failed: Vec<FailedCountry>,
}

/// Runs `process` for each country. A fatal error stops only that country.
pub fn process_countries<T, F>(countries: &[Country], mut process: F) -> CountryOutcomes<T>
where
    F: FnMut(Country) -> Result<T>,
{
    let mut outcomes = CountryOutcomes {
        completed: Vec::with_capacity(countries.len()),
        failed: Vec::new(),
    };

    for &country in countries {
        match process(country) {
            Ok(value) => outcomes.completed.push(value),
            Err(err) => {
                error!(country = %country, error = %format!("{err:#}"), "country failed");
                outcomes.failed.push(FailedCountry {
                    country,
                    error: format!("{err:#}"),
                });
            }
        }
    }
    outcomes
}

pub fn emit_report(
    report: &RunReport,
    json: bool,
    verbose: bool,
    report_path: Option<&Path>,
) -> Result<()> {
    if json {
        write_json_report(report)?;
    } else {
        write_text_report(report, verbose)?;
    }

    if let Some(path) = report_path {
        write_json_pretty(path, report)?;
        info!(path = %path.display(), "wrote report");
    }
    Ok(())
}

/// Turns failed countries and validation errors into the command's error.
pub fn finish(command: &str, failed: &[FailedCountry], error_count: usize) -> Result<()> {
    if !failed.is_empty() {
        let names = failed
            .iter()
            .map(|failed| failed.country.to_string())
            .collect::<Vec<String>>()
            .join(", ");
        bail!("{command} failed for {names}");
    }
    if error_count > 0 {
        bail!("{command} found {error_count} validation errors");
    }
    Ok(())
}
