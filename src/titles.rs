use std::collections::BTreeMap;

use crate::model::Country;
use crate::section_key::{normalize_section_number, strip_section_prefix};

/// Keys returned verbatim, without a numeric prefix.
const VERBATIM_KEYS: [&str; 2] = ["präambel", "langtitel"];

/// Official section titles per jurisdiction and law abbreviation.
#[derive(Debug, Clone, Default)]
pub struct TitleTable {
    entries: BTreeMap<Country, BTreeMap<String, BTreeMap<String, String>>>,
}

impl TitleTable {
    /// Builds the table, normalizing abbreviations to lowercase and section keys
    /// the same way lookups are normalized.
    pub fn new(raw: &BTreeMap<Country, BTreeMap<String, BTreeMap<String, String>>>) -> Self {
        let entries = raw
            .iter()
            .map(|(country, laws)| {
                let laws = laws
                    .iter()
                    .map(|(abbreviation, titles)| {
                        let titles = titles
                            .iter()
                            .map(|(number, title)| {
                                (normalize_section_number(number), title.trim().to_string())
                            })
                            .collect();
                        (abbreviation.trim().to_lowercase(), titles)
                    })
                    .collect();
                (*country, laws)
            })
            .collect();
        Self { entries }
    }

    pub fn official_title(
        &self,
        section_number: &str,
        abbreviation: &str,
        country: Country,
    ) -> Option<&str> {
        self.entries
            .get(&country)?
            .get(&abbreviation.trim().to_lowercase())?
            .get(&normalize_section_number(section_number))
            .map(String::as_str)
    }

    pub fn has_law(&self, abbreviation: &str, country: Country) -> bool {
        self.entries
            .get(&country)
            .is_some_and(|laws| laws.contains_key(&abbreviation.trim().to_lowercase()))
    }

    /// Formats the official title as `"§ 4a. Title"` (AT/DE) or
    /// `"Artikel 3. Title"` (NL). Without a table entry the current title is
    /// returned unchanged.
    pub fn resolve_title(
        &self,
        section_number: &str,
        current_title: &str,
        abbreviation: &str,
        country: Country,
    ) -> String {
        let Some(official) = self.official_title(section_number, abbreviation, country) else {
            return current_title.to_string();
        };

        let normalized = normalize_section_number(section_number);
        if VERBATIM_KEYS.contains(&normalized.as_str()) {
            return official.to_string();
        }

        format!(
            "{} {}. {}",
            country.section_prefix(),
            strip_section_prefix(section_number),
            official
        )
    }
}
