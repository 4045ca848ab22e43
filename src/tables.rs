//! Curated reference data: official chapter structures, section titles and
//! per-country boilerplate rules. The built-in tables are embedded at compile
//! time; `--tables-path` swaps in a maintained copy.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chapters::ChapterDefinition;
use crate::model::Country;
use crate::titles::TitleTable;

const BUILTIN_TABLES: &str = include_str!("../data/reference_tables.json");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountryRules {
    /// Regex matched against the concatenated section text; a document without
    /// any hit carries no recognizable section numbering.
    #[serde(default)]
    pub section_marker: String,
    /// Whole-line patterns removed by the text normalizer.
    #[serde(default)]
    pub boilerplate_patterns: Vec<String>,
    /// Fragments that signal leftover website chrome to the validator.
    #[serde(default)]
    pub boilerplate_keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceTables {
    #[serde(default)]
    pub countries: BTreeMap<Country, CountryRules>,
    #[serde(default)]
    pub chapter_structures: BTreeMap<Country, BTreeMap<String, Vec<ChapterDefinition>>>,
    #[serde(default)]
    pub section_titles: BTreeMap<Country, BTreeMap<String, BTreeMap<String, String>>>,
    /// Lowercase fragments of title, abbreviation or category that mark a
    /// non-statutory guidance document.
    #[serde(default)]
    pub supplementary_markers: Vec<String>,
}

impl ReferenceTables {
    pub fn builtin() -> Result<Self> {
        serde_json::from_str(BUILTIN_TABLES).context("failed to parse built-in reference tables")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::builtin();
        };

        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let tables: Self = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        info!(
            path = %path.display(),
            structures = tables.chapter_structures.values().map(BTreeMap::len).sum::<usize>(),
            title_tables = tables.section_titles.values().map(BTreeMap::len).sum::<usize>(),
            "loaded reference tables"
        );
        Ok(tables)
    }

    /// Chapter structure for a law; abbreviations compare case-insensitively.
    pub fn chapter_structure(
        &self,
        country: Country,
        abbreviation: &str,
    ) -> Option<&[ChapterDefinition]> {
        let wanted = abbreviation.trim();
        if wanted.is_empty() {
            return None;
        }
        self.chapter_structures
            .get(&country)?
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
            .map(|(_, definitions)| definitions.as_slice())
    }

    pub fn country_rules(&self, country: Country) -> CountryRules {
        self.countries.get(&country).cloned().unwrap_or_default()
    }

    pub fn title_table(&self) -> TitleTable {
        TitleTable::new(&self.section_titles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section_key::parse_section_key;

    #[test]
    fn builtin_tables_parse_and_cover_every_country() {
        let tables = ReferenceTables::builtin().expect("built-in tables should parse");
        for country in Country::ALL {
            let rules = tables.country_rules(country);
            assert!(!rules.section_marker.is_empty(), "{country} needs a marker");
            assert!(!rules.boilerplate_patterns.is_empty());
            assert!(!rules.boilerplate_keywords.is_empty());
        }
        assert!(!tables.supplementary_markers.is_empty());
    }

    #[test]
    fn structure_lookup_is_case_insensitive() {
        let tables = ReferenceTables::builtin().expect("built-in tables should parse");
        assert!(tables.chapter_structure(Country::At, "aschg").is_some());
        assert!(tables.chapter_structure(Country::De, "ArbSchG").is_some());
        assert!(tables.chapter_structure(Country::De, "ASchG").is_none());
        assert!(tables.chapter_structure(Country::At, "").is_none());
    }

    #[test]
    fn builtin_ranges_are_ordered() {
        let tables = ReferenceTables::builtin().expect("built-in tables should parse");
        for laws in tables.chapter_structures.values() {
            for definitions in laws.values() {
                for definition in definitions {
                    if let Some(range) = &definition.section_range {
                        assert!(
                            parse_section_key(&range.0) <= parse_section_key(&range.1),
                            "inverted range in chapter {}",
                            definition.number
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn builtin_title_table_resolves_aschg() {
        let tables = ReferenceTables::builtin().expect("built-in tables should parse");
        assert_eq!(
            tables
                .title_table()
                .resolve_title("4a", "4a", "ASchG", Country::At),
            "§ 4a. Präventivdienste für Baustellen"
        );
    }
}
