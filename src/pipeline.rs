//! Database-level stages: each applies one component to every document and
//! collects per-document findings instead of failing the batch.

use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, error, info};

use crate::assets::{AssetValidator, FileAccess};
use crate::chapters::{assign_chapters, chapter_id};
use crate::cleanup::{CLEANUP_INSTRUCTION, RetryPolicy, TextCleaner, clean_with_retry};
use crate::model::{Country, Document, LawDatabase};
use crate::normalize::TextNormalizer;
use crate::report::{CountryReport, DocumentReport};
use crate::structure::{StructureValidator, ValidationThresholds};
use crate::tables::ReferenceTables;
use crate::titles::TitleTable;

#[derive(Debug, Default, Clone, Copy)]
pub struct NormalizeStats {
    pub sections_changed: usize,
    pub boilerplate_lines_removed: usize,
    pub duplicate_notation_lines_removed: usize,
    pub chars_removed: usize,
}

#[derive(Debug, Default, Clone)]
pub struct ReorganizeStats {
    pub documents_reorganized: usize,
    pub documents_without_structure: usize,
    pub sections_assigned: usize,
    pub overflow_sections: usize,
    /// Per-document notes, aligned with `LawDatabase::documents`.
    pub notes: Vec<Vec<String>>,
}

#[derive(Debug, Default, Clone)]
pub struct CleanupStats {
    pub sections_attempted: usize,
    pub sections_cleaned: usize,
    /// Failure messages per document, aligned with `LawDatabase::documents`.
    pub failures: Vec<Vec<String>>,
}

pub struct Pipeline {
    tables: ReferenceTables,
    normalizer: TextNormalizer,
    titles: TitleTable,
    validator: StructureValidator,
}

impl Pipeline {
    pub fn new(tables: ReferenceTables, thresholds: ValidationThresholds) -> Result<Self> {
        let normalizer = TextNormalizer::new(&tables.countries)?;
        let validator = StructureValidator::new(&tables.countries, thresholds)?;
        let titles = tables.title_table();
        Ok(Self {
            tables,
            normalizer,
            titles,
            validator,
        })
    }

    pub fn tables(&self) -> &ReferenceTables {
        &self.tables
    }

    pub fn normalize_database(&self, database: &mut LawDatabase, country: Country) -> NormalizeStats {
        let mut stats = NormalizeStats::default();
        for document in &mut database.documents {
            for section in document.sections_mut() {
                let (normalized, outcome) =
                    self.normalizer.normalize_with_outcome(&section.text, country);
                stats.boilerplate_lines_removed += outcome.boilerplate_lines_removed;
                stats.duplicate_notation_lines_removed += outcome.duplicate_notation_lines_removed;
                if normalized != section.text {
                    stats.sections_changed += 1;
                    stats.chars_removed += section
                        .text
                        .chars()
                        .count()
                        .saturating_sub(normalized.chars().count());
                    section.text = normalized;
                }
            }
        }

        info!(
            country = %country,
            sections_changed = stats.sections_changed,
            boilerplate_lines = stats.boilerplate_lines_removed,
            duplicate_notation_lines = stats.duplicate_notation_lines_removed,
            chars_removed = stats.chars_removed,
            "normalized section text"
        );
        stats
    }

    /// Rebuilds chapters for every document with a curated structure. Documents
    /// without one keep their current layout.
    pub fn reorganize_database(&self, database: &mut LawDatabase, country: Country) -> ReorganizeStats {
        let mut stats = ReorganizeStats {
            notes: vec![Vec::new(); database.documents.len()],
            ..ReorganizeStats::default()
        };

        for (index, document) in database.documents.iter_mut().enumerate() {
            if document.section_count() == 0 {
                stats.notes[index].push("document has no sections".to_string());
                continue;
            }

            let Some(structure) = self.tables.chapter_structure(country, &document.abbreviation)
            else {
                stats.documents_without_structure += 1;
                if document.sections.is_empty() {
                    debug!(document = %document.display_name(), "no chapter structure, layout kept");
                    continue;
                }

                // Flat sections still need a chapter; without a structure they all overflow.
                let flat = std::mem::take(&mut document.sections);
                let assignment = assign_chapters(flat, &[], country, &document.abbreviation);
                stats.sections_assigned += assignment
                    .chapters
                    .iter()
                    .map(|chapter| chapter.sections.len())
                    .sum::<usize>();
                stats.overflow_sections += assignment.overflow_section_count;
                stats.notes[index].extend(assignment.warnings);
                info!(
                    document = %document.display_name(),
                    overflow = assignment.overflow_section_count,
                    "no chapter structure, flat sections moved to overflow chapter"
                );
                document.chapters.extend(assignment.chapters);
                continue;
            };

            let before = document.section_count();
            let sections = document.take_sections();
            let assignment = assign_chapters(sections, structure, country, &document.abbreviation);
            document.chapters = assignment.chapters;
            let after = document.section_count();
            if before != after {
                error!(document = %document.display_name(), before, after, "section count changed during reorganization");
                stats.notes[index].push(format!(
                    "section count changed during reorganization: {before} -> {after}"
                ));
            }

            stats.documents_reorganized += 1;
            stats.sections_assigned += after;
            stats.overflow_sections += assignment.overflow_section_count;
            stats.notes[index].extend(assignment.warnings);

            info!(
                document = %document.display_name(),
                chapters = document.chapters.len(),
                sections = after,
                overflow = assignment.overflow_section_count,
                "reorganized chapters"
            );
        }

        info!(
            country = %country,
            reorganized = stats.documents_reorganized,
            without_structure = stats.documents_without_structure,
            overflow_sections = stats.overflow_sections,
            "chapter reorganization complete"
        );
        stats
    }

    pub fn resolve_titles(&self, database: &mut LawDatabase, country: Country) -> usize {
        let mut updated = 0;
        for document in &mut database.documents {
            if !self.titles.has_law(&document.abbreviation, country) {
                continue;
            }
            let abbreviation = document.abbreviation.clone();
            for section in document.sections_mut() {
                let resolved =
                    self.titles
                        .resolve_title(&section.number, &section.title, &abbreviation, country);
                if resolved != section.title {
                    section.title = resolved;
                    updated += 1;
                }
            }
        }

        info!(country = %country, updated, "resolved official section titles");
        updated
    }

    /// Sends sections that still carry boilerplate keywords after regex
    /// normalization to the cleanup service, one call at a time.
    pub fn ai_cleanup<C: TextCleaner + ?Sized>(
        &self,
        database: &mut LawDatabase,
        country: Country,
        cleaner: &C,
        policy: RetryPolicy,
    ) -> CleanupStats {
        let keywords = self
            .tables
            .country_rules(country)
            .boilerplate_keywords
            .iter()
            .map(|keyword| keyword.to_lowercase())
            .collect::<Vec<String>>();
        let mut stats = CleanupStats {
            failures: vec![Vec::new(); database.documents.len()],
            ..CleanupStats::default()
        };

        for (index, document) in database.documents.iter_mut().enumerate() {
            let name = document.display_name().to_string();
            for section in document.sections_mut() {
                let lowered = section.text.to_lowercase();
                if !keywords.iter().any(|keyword| lowered.contains(keyword.as_str())) {
                    continue;
                }

                stats.sections_attempted += 1;
                let outcome = clean_with_retry(cleaner, &section.text, CLEANUP_INSTRUCTION, policy);
                if outcome.cleaned {
                    stats.sections_cleaned += 1;
                    section.text = outcome.text;
                } else if let Some(message) = outcome.error {
                    error!(document = %name, section = %section.number, error = %message, "cleanup failed, original text kept");
                    stats.failures[index].push(format!("section {}: {message}", section.number));
                }
            }
        }

        info!(
            country = %country,
            attempted = stats.sections_attempted,
            cleaned = stats.sections_cleaned,
            "ai cleanup complete"
        );
        stats
    }

    pub fn validate_document(&self, document: &Document, country: Country) -> DocumentReport {
        let validation = self.validator.validate(document, country);
        DocumentReport {
            id: document.id.clone(),
            abbreviation: document.abbreviation.clone(),
            title: document.title.clone(),
            valid: validation.valid,
            errors: validation.errors,
            warnings: validation.warnings,
            stats: validation.stats,
            ..DocumentReport::default()
        }
    }

    /// Structure and asset checks for every document, then the whole-batch
    /// orphan scan.
    pub fn validate_database<F: FileAccess>(
        &self,
        database: &LawDatabase,
        country: Country,
        assets: &mut AssetValidator<'_, F>,
        report: &mut CountryReport,
    ) {
        report.document_count = database.documents.len();
        report.section_count = database.section_count();

        for document in &database.documents {
            let mut document_report = self.validate_document(document, country);
            let asset_report = assets.validate_document(document, country);
            document_report.errors.extend(asset_report.errors);
            document_report.warnings.extend(asset_report.warnings);
            document_report.info.extend(asset_report.info);
            document_report.valid = document_report.errors.is_empty();
            report.documents.push(document_report);
        }
    }
}

/// Re-derives chapter ids from country, abbreviation and number, suffixing
/// repeats so ids stay unique. Returns how many ids changed.
pub fn fix_chapter_ids(document: &mut Document, country: Country) -> usize {
    let mut seen = HashMap::<String, usize>::new();
    let mut changed = 0;
    for chapter in &mut document.chapters {
        let base = chapter_id(country, &document.abbreviation, &chapter.number);
        let occurrence = seen.entry(base.clone()).or_insert(0);
        *occurrence += 1;
        let id = if *occurrence == 1 {
            base
        } else {
            format!("{base}-{occurrence}")
        };
        if chapter.id != id {
            chapter.id = id;
            changed += 1;
        }
    }
    changed
}
