use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::assets::AssetReport;
use crate::model::{Country, Document};
use crate::structure::DocumentStats;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentReport {
    pub id: String,
    pub abbreviation: String,
    pub title: String,
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub info: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cleanup_failures: Vec<String>,
    pub stats: DocumentStats,
}

impl DocumentReport {
    /// Identity and size of a document, without any findings.
    pub fn summary(document: &Document) -> Self {
        Self {
            id: document.id.clone(),
            abbreviation: document.abbreviation.clone(),
            title: document.title.clone(),
            valid: true,
            stats: DocumentStats {
                chapter_count: document.chapters.len(),
                section_count: document.section_count(),
                text_length: document
                    .sections()
                    .map(|section| section.text.chars().count())
                    .sum(),
                ..DocumentStats::default()
            },
            ..Self::default()
        }
    }

    pub fn label(&self) -> String {
        let name = if self.abbreviation.trim().is_empty() {
            "(no abbreviation)"
        } else {
            self.abbreviation.trim()
        };
        if self.title.trim().is_empty() {
            format!("{name} [{}]", self.id)
        } else {
            format!("{name} ({})", self.title.trim())
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CountryReport {
    pub country: Country,
    pub database_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
    pub written: bool,
    pub document_count: usize,
    pub section_count: usize,
    pub documents: Vec<DocumentReport>,
    /// Whole-batch findings such as orphaned asset files.
    #[serde(skip_serializing_if = "AssetReport::is_empty")]
    pub batch: AssetReport,
}

impl CountryReport {
    pub fn new(country: Country, database_path: String) -> Self {
        Self {
            country,
            database_path,
            backup_path: None,
            written: false,
            document_count: 0,
            section_count: 0,
            documents: Vec::new(),
            batch: AssetReport::default(),
        }
    }

    pub fn error_count(&self) -> usize {
        self.batch.errors.len()
            + self
                .documents
                .iter()
                .map(|document| document.errors.len())
                .sum::<usize>()
    }

    pub fn warning_count(&self) -> usize {
        self.batch.warnings.len()
            + self
                .documents
                .iter()
                .map(|document| document.warnings.len())
                .sum::<usize>()
    }

    pub fn invalid_document_count(&self) -> usize {
        self.documents
            .iter()
            .filter(|document| !document.valid)
            .count()
    }

    /// Appends stage notes (chapter overflow, empty documents) as warnings,
    /// aligned with `documents` by index.
    pub fn attach_notes(&mut self, notes: &[Vec<String>]) {
        for (document, notes) in self.documents.iter_mut().zip(notes) {
            document.warnings.extend(notes.iter().cloned());
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedCountry {
    pub country: Country,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: String,
    pub command: String,
    pub countries: Vec<CountryReport>,
    pub failed_countries: Vec<FailedCountry>,
}

impl RunReport {
    pub fn error_count(&self) -> usize {
        self.countries.iter().map(CountryReport::error_count).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.countries.iter().map(CountryReport::warning_count).sum()
    }
}

pub fn write_json_report(report: &RunReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, report)
        .context("failed to serialize json report")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

pub fn write_text_report(report: &RunReport, verbose: bool) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    render_text_report(&mut output, report, verbose)?;
    output.flush()?;
    Ok(())
}

pub fn render_text_report<W: Write>(output: &mut W, report: &RunReport, verbose: bool) -> Result<()> {
    for country in &report.countries {
        writeln!(
            output,
            "== {}: {} ({} documents, {} sections)",
            country.country, country.database_path, country.document_count, country.section_count
        )?;
        if let Some(backup_path) = &country.backup_path {
            writeln!(output, "   backup: {backup_path}")?;
        }

        for document in &country.documents {
            let quiet = document.errors.is_empty()
                && document.warnings.is_empty()
                && document.cleanup_failures.is_empty();
            if quiet && !verbose {
                continue;
            }

            let status = if document.valid { "ok" } else { "INVALID" };
            writeln!(
                output,
                "-- {} {} (chapters={} sections={} chars={})",
                document.label(),
                status,
                document.stats.chapter_count,
                document.stats.section_count,
                document.stats.text_length
            )?;
            for error in &document.errors {
                writeln!(output, "   [ERROR] {error}")?;
            }
            for failure in &document.cleanup_failures {
                writeln!(output, "   [ERROR] cleanup: {failure}")?;
            }
            for warning in &document.warnings {
                writeln!(output, "   [WARN]  {warning}")?;
            }
            if verbose {
                for info in &document.info {
                    writeln!(output, "   [INFO]  {info}")?;
                }
            }
        }

        for error in &country.batch.errors {
            writeln!(output, "   [ERROR] {error}")?;
        }
        for warning in &country.batch.warnings {
            writeln!(output, "   [WARN]  {warning}")?;
        }
        writeln!(
            output,
            "   {} errors, {} warnings, {} invalid documents",
            country.error_count(),
            country.warning_count(),
            country.invalid_document_count()
        )?;
    }

    for failed in &report.failed_countries {
        writeln!(output, "== {}: FAILED: {}", failed.country, failed.error)?;
    }

    writeln!(
        output,
        "Summary: {} countries processed, {} failed, {} errors, {} warnings",
        report.countries.len(),
        report.failed_countries.len(),
        report.error_count(),
        report.warning_count()
    )?;
    Ok(())
}
