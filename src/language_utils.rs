//! Language utilities for caption track codes
//!
//! Track codes are BCP 47 style tags (`en`, `en-US`, `pt-BR`, `zh-Hans`).
//! Only the primary subtag is meaningful for ISO 639 lookups; regional and
//! script subtags are kept as-is in filenames and headers.

use anyhow::{Result, anyhow};
use isolang::Language;

/// Primary language subtag of a track code, lowercased
pub fn primary_subtag(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Normalize a language code to ISO 639-2/T (3-letter) format
///
/// Accepts ISO 639-1 codes, ISO 639-2/T codes, the ISO 639-2/B codes that
/// differ from their terminology form, and full tags with region subtags.
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let primary = primary_subtag(code);

    if primary.len() == 2 {
        if let Some(lang) = Language::from_639_1(&primary) {
            return Ok(lang.to_639_3().to_string());
        }
    } else if primary.len() == 3 {
        if Language::from_639_3(&primary).is_some() {
            return Ok(primary);
        }

        let part2t = match primary.as_str() {
            "fre" => Some("fra"),
            "ger" => Some("deu"),
            "dut" => Some("nld"),
            "gre" => Some("ell"),
            "chi" => Some("zho"),
            "cze" => Some("ces"),
            "ice" => Some("isl"),
            "alb" => Some("sqi"),
            "arm" => Some("hye"),
            "baq" => Some("eus"),
            "bur" => Some("mya"),
            "per" => Some("fas"),
            "geo" => Some("kat"),
            "may" => Some("msa"),
            "mac" => Some("mkd"),
            "rum" => Some("ron"),
            "slo" => Some("slk"),
            "wel" => Some("cym"),
            _ => None,
        };
        if let Some(part2t) = part2t {
            return Ok(part2t.to_string());
        }
    }

    Err(anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Check if two codes name the same language, ignoring region subtags
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    if code1.trim().eq_ignore_ascii_case(code2.trim()) {
        return true;
    }

    match (normalize_to_part2t(code1), normalize_to_part2t(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the English language name for a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// Display name for a track code, falling back to the code itself
pub fn display_name(code: &str) -> String {
    get_language_name(code).unwrap_or_else(|_| code.to_string())
}
