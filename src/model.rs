use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Country {
    #[serde(rename = "AT", alias = "at")]
    At,
    #[serde(rename = "DE", alias = "de")]
    De,
    #[serde(rename = "NL", alias = "nl")]
    Nl,
}

impl Country {
    pub const ALL: [Country; 3] = [Country::At, Country::De, Country::Nl];

    /// Lowercase code used in file names, chapter ids and asset directories.
    pub fn code(self) -> &'static str {
        match self {
            Self::At => "at",
            Self::De => "de",
            Self::Nl => "nl",
        }
    }

    pub fn from_code(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "at" => Some(Self::At),
            "de" => Some(Self::De),
            "nl" => Some(Self::Nl),
            _ => None,
        }
    }

    pub fn section_prefix(self) -> &'static str {
        match self {
            Self::At | Self::De => "§",
            Self::Nl => "Artikel",
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::At => "AT",
            Self::De => "DE",
            Self::Nl => "NL",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LawDatabase {
    #[serde(default, alias = "schemaVersion")]
    pub schema_version: String,
    pub metadata: DatabaseMetadata,
    pub documents: Vec<Document>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LawDatabase {
    pub fn section_count(&self) -> usize {
        self.documents.iter().map(Document::section_count).sum()
    }

    /// Restores `metadata.document_count == documents.len()`. Returns the stale
    /// count when a correction was needed.
    pub fn sync_document_count(&mut self) -> Option<usize> {
        let actual = self.documents.len();
        if self.metadata.document_count == actual {
            return None;
        }
        let stale = self.metadata.document_count;
        self.metadata.document_count = actual;
        Some(stale)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    #[serde(default, deserialize_with = "lenient_string")]
    pub country: String,
    #[serde(default, alias = "generatedAt", deserialize_with = "lenient_string")]
    pub generated_at: String,
    #[serde(default, alias = "documentCount")]
    pub document_count: usize,
    #[serde(
        default,
        alias = "dataVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub data_version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub abbreviation: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(
        default,
        alias = "titleEn",
        deserialize_with = "lenient_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub title_en: String,
    #[serde(
        default,
        rename = "type",
        deserialize_with = "lenient_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub doc_type: String,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub category: String,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    /// Flat section list of a scrape that has not been split into chapters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<Section>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    pub fn section_count(&self) -> usize {
        self.sections.len()
            + self
                .chapters
                .iter()
                .map(|chapter| chapter.sections.len())
                .sum::<usize>()
    }

    /// Sections in document order: chapter sections first, then any
    /// document-level flat sections.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.chapters
            .iter()
            .flat_map(|chapter| chapter.sections.iter())
            .chain(self.sections.iter())
    }

    pub fn sections_mut(&mut self) -> impl Iterator<Item = &mut Section> {
        self.chapters
            .iter_mut()
            .flat_map(|chapter| chapter.sections.iter_mut())
            .chain(self.sections.iter_mut())
    }

    /// Drains every section out of the document, leaving it without chapters.
    pub fn take_sections(&mut self) -> Vec<Section> {
        let mut sections = Vec::with_capacity(self.section_count());
        for chapter in self.chapters.drain(..) {
            sections.extend(chapter.sections);
        }
        sections.append(&mut self.sections);
        sections
    }

    /// Abbreviation if present, otherwise title, otherwise id. Used to name the
    /// document in reports.
    pub fn display_name(&self) -> &str {
        [&self.abbreviation, &self.title, &self.id]
            .into_iter()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .unwrap_or("(unnamed document)")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Source {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub url: String,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub authority: String,
    #[serde(
        default,
        alias = "localPdfPath",
        skip_serializing_if = "Option::is_none"
    )]
    pub local_pdf_path: Option<String>,
    #[serde(
        default,
        alias = "localHtmlPath",
        skip_serializing_if = "Option::is_none"
    )]
    pub local_html_path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(
        default,
        alias = "titleEn",
        deserialize_with = "lenient_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub title_en: String,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, deserialize_with = "lenient_string")]
    pub number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: String,
    #[serde(
        default,
        alias = "whsTopics",
        skip_serializing_if = "Option::is_none"
    )]
    pub whs_topics: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accepts a JSON string, number or null where the scrapers were inconsistent
/// about the type (section numbers in particular).
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(value)) => Ok(value),
        Some(Value::Number(value)) => Ok(value.to_string()),
        Some(other) => Err(D::Error::custom(format!(
            "expected string, number or null, found {other}"
        ))),
    }
}
