//! Partitions a law's flat section list into its official chapters
//! (Abschnitte / Hoofdstukken).

use serde::{Deserialize, Serialize};

use crate::model::{Chapter, Country, Section, lenient_string};
use crate::section_key::{normalize_section_number, parse_section_key};

pub const OVERFLOW_CHAPTER_NUMBER: &str = "X";
pub const OVERFLOW_CHAPTER_TITLE_EN: &str = "Other Provisions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterDefinition {
    #[serde(deserialize_with = "lenient_string")]
    pub number: String,
    pub title: String,
    #[serde(default, alias = "titleEn")]
    pub title_en: String,
    #[serde(
        default,
        alias = "sectionRange",
        skip_serializing_if = "Option::is_none"
    )]
    pub section_range: Option<SectionRange>,
    /// Identifiers placed in this chapter regardless of numeric range.
    #[serde(
        default,
        alias = "explicitSectionList",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub sections: Vec<String>,
}

/// Inclusive `[start, end]` bounds, written as section identifiers so that
/// lettered bounds such as `"20a"` are expressible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionRange(
    #[serde(deserialize_with = "lenient_string")] pub String,
    #[serde(deserialize_with = "lenient_string")] pub String,
);

impl SectionRange {
    pub fn contains(&self, key: f64) -> bool {
        if key < 0.0 {
            return false;
        }
        parse_section_key(&self.0) <= key && key <= parse_section_key(&self.1)
    }
}

impl ChapterDefinition {
    fn claims(&self, normalized_number: &str, key: f64) -> bool {
        self.sections
            .iter()
            .any(|listed| normalize_section_number(listed) == normalized_number)
            || self
                .section_range
                .as_ref()
                .is_some_and(|range| range.contains(key))
    }
}

#[derive(Debug, Default)]
pub struct ChapterAssignment {
    pub chapters: Vec<Chapter>,
    pub overflow_section_count: usize,
    pub warnings: Vec<String>,
}

pub fn chapter_id(country: Country, abbreviation: &str, number: &str) -> String {
    format!(
        "{}-{}-ch{}",
        country.code(),
        abbreviation.trim().to_lowercase(),
        number.trim().to_lowercase()
    )
}

fn overflow_title(country: Country) -> &'static str {
    match country {
        Country::At | Country::De => "Sonstige Bestimmungen",
        Country::Nl => "Overige bepalingen",
    }
}

/// First matching definition wins; sections keep their input order inside
/// each chapter. Unclaimed sections land in a trailing overflow chapter, so
/// the output holds exactly the input sections.
pub fn assign_chapters(
    sections: Vec<Section>,
    structure: &[ChapterDefinition],
    country: Country,
    abbreviation: &str,
) -> ChapterAssignment {
    if sections.is_empty() {
        return ChapterAssignment {
            warnings: vec!["document has no sections to assign to chapters".to_string()],
            ..ChapterAssignment::default()
        };
    }

    let owners = sections
        .iter()
        .map(|section| {
            let normalized = normalize_section_number(&section.number);
            let key = parse_section_key(&section.number);
            structure
                .iter()
                .position(|definition| definition.claims(&normalized, key))
        })
        .collect::<Vec<Option<usize>>>();

    let mut buckets = vec![Vec::new(); structure.len()];
    let mut overflow = Vec::new();
    for (section, owner) in sections.into_iter().zip(owners) {
        match owner {
            Some(index) => buckets[index].push(section),
            None => overflow.push(section),
        }
    }

    let mut assignment = ChapterAssignment {
        overflow_section_count: overflow.len(),
        ..ChapterAssignment::default()
    };

    for (definition, sections) in structure.iter().zip(buckets) {
        if sections.is_empty() {
            continue;
        }
        assignment.chapters.push(Chapter {
            id: chapter_id(country, abbreviation, &definition.number),
            number: definition.number.clone(),
            title: definition.title.clone(),
            title_en: definition.title_en.clone(),
            sections,
            ..Chapter::default()
        });
    }

    if !overflow.is_empty() {
        let numbers = overflow
            .iter()
            .map(|section| section.number.as_str())
            .collect::<Vec<&str>>()
            .join(", ");
        assignment.warnings.push(format!(
            "{} section(s) outside the official chapter structure placed in '{}': {}",
            overflow.len(),
            OVERFLOW_CHAPTER_TITLE_EN,
            numbers
        ));
        assignment.chapters.push(Chapter {
            id: chapter_id(country, abbreviation, OVERFLOW_CHAPTER_NUMBER),
            number: OVERFLOW_CHAPTER_NUMBER.to_string(),
            title: overflow_title(country).to_string(),
            title_en: OVERFLOW_CHAPTER_TITLE_EN.to_string(),
            sections: overflow,
            ..Chapter::default()
        });
    }

    assignment
}
