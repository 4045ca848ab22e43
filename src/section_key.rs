//! Comparable keys for heterogeneous section identifiers.
//!
//! Identifiers arrive as "§ 5", "5a", "Artikel 3.2", "Art. 7", "Präambel" or bare
//! numbers. The key is `base + (letter - 'a' + 1) * 0.01`, so that
//! `"20" < "20a" < "20b" < "21"` under plain numeric comparison.

/// Returned for identifiers without a leading number. Sorts before every valid
/// key and is reported by the structure validator.
pub const UNPARSEABLE_SECTION_KEY: f64 = -1.0;

const SUFFIX_STEP: f64 = 0.01;

const PREFIXES: [&str; 6] = ["§§", "§", "artikel", "art.", "art ", "paragraph"];

/// Lowercases, trims and strips leading section markers (`§`, `Artikel`,
/// `Art.`, `Paragraph`). Used as the join key for explicit chapter lists and
/// title tables.
pub fn normalize_section_number(raw: &str) -> String {
    strip_section_prefix(raw).to_lowercase()
}

/// Strips section markers without changing case, e.g. `"§ 4a"` -> `"4a"`.
pub fn strip_section_prefix(raw: &str) -> &str {
    let mut value = raw.trim();
    while let Some(prefix) = PREFIXES.iter().find(|prefix| {
        value
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    }) {
        value = value[prefix.len()..].trim_start();
    }
    value.trim_end_matches('.').trim()
}

pub fn parse_section_key(raw: &str) -> f64 {
    let normalized = normalize_section_number(raw);
    if normalized == "0" || normalized == "präambel" || normalized == "praeambel" {
        return 0.0;
    }

    let digit_end = normalized
        .char_indices()
        .find(|(_, character)| !character.is_ascii_digit())
        .map(|(index, _)| index)
        .unwrap_or(normalized.len());
    if digit_end == 0 {
        return UNPARSEABLE_SECTION_KEY;
    }

    let Ok(base) = normalized[..digit_end].parse::<u32>() else {
        return UNPARSEABLE_SECTION_KEY;
    };

    // Only a single letter glued to the digits counts: "12a", not "12 Abs. 1" or "20bis".
    let mut rest = normalized[digit_end..].chars();
    let suffix = match (rest.next(), rest.next()) {
        (Some(letter), next)
            if letter.is_ascii_lowercase() && !next.is_some_and(char::is_alphabetic) =>
        {
            (letter as u32 - 'a' as u32 + 1) as f64 * SUFFIX_STEP
        }
        _ => 0.0,
    };

    base as f64 + suffix
}

pub fn is_parseable(raw: &str) -> bool {
    parse_section_key(raw) >= 0.0
}
