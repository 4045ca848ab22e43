use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

use crate::model::{Country, Document};
use crate::section_key::is_parseable;
use crate::tables::CountryRules;

pub const DEFAULT_MIN_CONTENT_LENGTH: usize = 500;
pub const DEFAULT_MIN_SECTION_COUNT: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct ValidationThresholds {
    pub min_content_length: usize,
    pub min_section_count: usize,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            min_content_length: DEFAULT_MIN_CONTENT_LENGTH,
            min_section_count: DEFAULT_MIN_SECTION_COUNT,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentStats {
    pub chapter_count: usize,
    pub section_count: usize,
    pub text_length: usize,
    pub section_markers_found: usize,
    pub boilerplate_hits: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub stats: DocumentStats,
}

#[derive(Debug)]
struct CompiledRules {
    section_marker: Option<Regex>,
    boilerplate_keywords: Vec<String>,
}

/// Errors block publishing; warnings are advisory and never flip `valid`.
#[derive(Debug)]
pub struct StructureValidator {
    thresholds: ValidationThresholds,
    rules: BTreeMap<Country, CompiledRules>,
}

impl StructureValidator {
    pub fn new(
        rules: &BTreeMap<Country, CountryRules>,
        thresholds: ValidationThresholds,
    ) -> Result<Self> {
        let mut compiled = BTreeMap::new();
        for (country, country_rules) in rules {
            let section_marker = if country_rules.section_marker.is_empty() {
                None
            } else {
                Some(Regex::new(&country_rules.section_marker).with_context(|| {
                    format!(
                        "failed to compile {country} section marker: {}",
                        country_rules.section_marker
                    )
                })?)
            };
            compiled.insert(
                *country,
                CompiledRules {
                    section_marker,
                    boilerplate_keywords: country_rules.boilerplate_keywords.clone(),
                },
            );
        }

        Ok(Self {
            thresholds,
            rules: compiled,
        })
    }

    pub fn validate(&self, document: &Document, country: Country) -> DocumentValidation {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for (field, value) in [
            ("id", &document.id),
            ("abbreviation", &document.abbreviation),
            ("title", &document.title),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("missing required field: {field}"));
            }
        }

        let text = document
            .sections()
            .map(|section| section.text.as_str())
            .collect::<Vec<&str>>()
            .join("\n");

        let stats_text_length = text.chars().count();
        if stats_text_length < self.thresholds.min_content_length {
            warnings.push(format!(
                "content too short: {} chars (minimum {})",
                stats_text_length, self.thresholds.min_content_length
            ));
        }

        let rules = self.rules.get(&country);
        let section_markers_found = rules
            .and_then(|rules| rules.section_marker.as_ref())
            .map(|marker| marker.find_iter(&text).count());
        if section_markers_found == Some(0) {
            warnings.push(format!("no {country} section markers found in text"));
        }

        let section_count = document.section_count();
        if section_count < self.thresholds.min_section_count {
            warnings.push(format!(
                "low section count: {} (minimum {})",
                section_count, self.thresholds.min_section_count
            ));
        }

        let lowered = text.to_lowercase();
        let mut boilerplate_hits = 0;
        for keyword in rules
            .map(|rules| rules.boilerplate_keywords.as_slice())
            .unwrap_or_default()
        {
            if lowered.contains(&keyword.to_lowercase()) {
                boilerplate_hits += 1;
                warnings.push(format!("possible boilerplate left in text: '{keyword}'"));
            }
        }

        let mut seen = HashSet::new();
        let mut without_id = Vec::new();
        for chapter in &document.chapters {
            let id = chapter.id.trim();
            if id.is_empty() {
                without_id.push(format!("'{}'", chapter.number));
            } else if !seen.insert(id) {
                errors.push(format!("duplicate chapter id: {id}"));
            }
        }
        if !without_id.is_empty() {
            warnings.push(format!(
                "missing chapter id on chapter(s): {}",
                without_id.join(", ")
            ));
        }

        let unparseable = document
            .sections()
            .filter(|section| !is_parseable(&section.number))
            .map(|section| format!("'{}'", section.number))
            .collect::<Vec<String>>();
        if !unparseable.is_empty() {
            warnings.push(format!(
                "unrecognized section numbers: {}",
                unparseable.join(", ")
            ));
        }

        DocumentValidation {
            valid: errors.is_empty(),
            errors,
            warnings,
            stats: DocumentStats {
                chapter_count: document.chapters.len(),
                section_count,
                text_length: stats_text_length,
                section_markers_found: section_markers_found.unwrap_or_default(),
                boilerplate_hits,
            },
        }
    }
}
