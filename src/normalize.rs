use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result};
use regex::Regex;

use crate::model::Country;
use crate::tables::CountryRules;

/// Removes scraped website chrome and duplicate legal notation from section
/// text. Idempotent: `normalize(normalize(x)) == normalize(x)`.
#[derive(Debug)]
pub struct TextNormalizer {
    line_patterns: BTreeMap<Country, Vec<Regex>>,
    paragraph_line: Regex,
    absatz_line: Regex,
    section_marker: Regex,
    paragraph_marker: Regex,
    blank_runs: Regex,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOutcome {
    pub boilerplate_lines_removed: usize,
    pub duplicate_notation_lines_removed: usize,
}

impl TextNormalizer {
    pub fn new(rules: &BTreeMap<Country, CountryRules>) -> Result<Self> {
        let mut line_patterns = BTreeMap::new();
        for (country, country_rules) in rules {
            let compiled = country_rules
                .boilerplate_patterns
                .iter()
                .map(|pattern| {
                    Regex::new(pattern).with_context(|| {
                        format!("failed to compile {country} boilerplate pattern: {pattern}")
                    })
                })
                .collect::<Result<Vec<Regex>>>()?;
            line_patterns.insert(*country, compiled);
        }

        Ok(Self {
            line_patterns,
            paragraph_line: Regex::new(r"(?i)^Paragraph\s+(\p{L}+|\d+)(?:\s*([a-z]))?\s*[,.:;]?$")
                .context("failed to compile expanded paragraph regex")?,
            absatz_line: Regex::new(r"(?i)^Absatz\s+(\p{L}+|\d+)\s*[,.:;]?$")
                .context("failed to compile expanded absatz regex")?,
            section_marker: Regex::new(r"§+\s*(\d+)([a-z])?\b")
                .context("failed to compile section marker regex")?,
            paragraph_marker: Regex::new(r"\((\d+)\)")
                .context("failed to compile paragraph marker regex")?,
            blank_runs: Regex::new(r"\n{3,}").context("failed to compile blank-run regex")?,
        })
    }

    pub fn normalize(&self, raw: &str, country: Country) -> String {
        self.normalize_with_outcome(raw, country).0
    }

    pub fn normalize_with_outcome(&self, raw: &str, country: Country) -> (String, NormalizeOutcome) {
        let mut outcome = NormalizeOutcome::default();
        if raw.trim().is_empty() {
            return (String::new(), outcome);
        }

        let unified = raw
            .replace("\r\n", "\n")
            .replace('\r', "\n")
            .replace('\u{a0}', " ");

        let patterns = self
            .line_patterns
            .get(&country)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut lines = Vec::new();
        for line in unified.lines() {
            let content = line.trim();
            if !content.is_empty() && patterns.iter().any(|pattern| pattern.is_match(content)) {
                outcome.boilerplate_lines_removed += 1;
                continue;
            }
            lines.push(line.trim_end());
        }

        if country == Country::At {
            let before = lines.len();
            lines = self.drop_expanded_notation(lines);
            outcome.duplicate_notation_lines_removed = before - lines.len();
        }

        let joined = lines.join("\n");
        let collapsed = self.blank_runs.replace_all(&joined, "\n\n");
        (collapsed.trim().to_string(), outcome)
    }

    /// RIS renders every `§ 1` a second time as a standalone `Paragraph eins`
    /// line (and `(1)` as `Absatz eins`) for screen readers.
    fn drop_expanded_notation<'a>(&self, lines: Vec<&'a str>) -> Vec<&'a str> {
        let text = lines.join("\n");

        let sections = self
            .section_marker
            .captures_iter(&text)
            .map(|captures| {
                let number = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
                let suffix = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
                format!("{}{}", number.trim_start_matches('0'), suffix)
            })
            .collect::<HashSet<String>>();
        let paragraphs = self
            .paragraph_marker
            .captures_iter(&text)
            .filter_map(|captures| captures.get(1))
            .map(|m| m.as_str().trim_start_matches('0').to_string())
            .collect::<HashSet<String>>();

        if sections.is_empty() && paragraphs.is_empty() {
            return lines;
        }

        lines
            .into_iter()
            .filter(|line| {
                let content = line.trim();
                if let Some(captures) = self.paragraph_line.captures(content) {
                    let number = captures
                        .get(1)
                        .and_then(|m| spelled_or_digits(m.as_str()));
                    let suffix = captures
                        .get(2)
                        .map(|m| m.as_str().to_lowercase())
                        .unwrap_or_default();
                    if let Some(number) = number {
                        return !sections.contains(&format!("{number}{suffix}"));
                    }
                }
                if let Some(captures) = self.absatz_line.captures(content) {
                    if let Some(number) = captures.get(1).and_then(|m| spelled_or_digits(m.as_str())) {
                        return !paragraphs.contains(&number.to_string());
                    }
                }
                true
            })
            .collect()
    }
}

fn spelled_or_digits(value: &str) -> Option<u32> {
    if value.chars().all(|character| character.is_ascii_digit()) {
        return value.parse().ok();
    }
    german_number(value)
}

const UNITS: [(&str, u32); 12] = [
    ("eins", 1),
    ("ein", 1),
    ("eine", 1),
    ("zwei", 2),
    ("drei", 3),
    ("vier", 4),
    ("fuenf", 5),
    ("sechs", 6),
    ("sieben", 7),
    ("acht", 8),
    ("neun", 9),
    ("zwo", 2),
];

const TEENS: [(&str, u32); 10] = [
    ("zehn", 10),
    ("elf", 11),
    ("zwoelf", 12),
    ("dreizehn", 13),
    ("vierzehn", 14),
    ("fuenfzehn", 15),
    ("sechzehn", 16),
    ("siebzehn", 17),
    ("achtzehn", 18),
    ("neunzehn", 19),
];

const TENS: [(&str, u32); 8] = [
    ("zwanzig", 20),
    ("dreissig", 30),
    ("vierzig", 40),
    ("fuenfzig", 50),
    ("sechzig", 60),
    ("siebzig", 70),
    ("achtzig", 80),
    ("neunzig", 90),
];

fn lookup(table: &[(&str, u32)], word: &str) -> Option<u32> {
    table
        .iter()
        .find(|(spelled, _)| *spelled == word)
        .map(|(_, value)| *value)
}

/// Parses German number words from 1 to 999 (`eins`, `einundzwanzig`,
/// `hundertzwei`, `zweihundertdreizehn`).
pub fn german_number(word: &str) -> Option<u32> {
    let word = word
        .trim()
        .to_lowercase()
        .replace('ß', "ss")
        .replace('ü', "ue")
        .replace('ö', "oe")
        .replace('ä', "ae");
    if word.is_empty() {
        return None;
    }

    let (hundreds, rest) = match word.find("hundert") {
        Some(index) => {
            let multiplier = if index == 0 {
                1
            } else {
                lookup(&UNITS, &word[..index])?
            };
            (multiplier * 100, &word[index + "hundert".len()..])
        }
        None => (0, word.as_str()),
    };

    let rest = rest.strip_prefix("und").unwrap_or(rest);
    if rest.is_empty() {
        return (hundreds > 0).then_some(hundreds);
    }

    below_hundred(rest).map(|value| hundreds + value)
}

fn below_hundred(word: &str) -> Option<u32> {
    if let Some(value) = lookup(&UNITS, word)
        .or_else(|| lookup(&TEENS, word))
        .or_else(|| lookup(&TENS, word))
    {
        return Some(value);
    }

    let (unit, tens) = word.split_once("und")?;
    Some(lookup(&UNITS, unit)? + lookup(&TENS, tens)?)
}
