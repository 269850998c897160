//! Locale tag canonicalization.
//!
//! Servers advertise free-form locale strings (`en-us`, `pt_BR`,
//! `DE`). They are normalized to BCP-47 case conventions: language
//! lowercase, script titlecase, region uppercase, everything else
//! lowercase. Tags that are not well-formed fall back to
//! [`DEFAULT_LOCALE`]. Alias mapping (`iw` → `he`) is not applied.

use srvlist_state::{DEFAULT_LOCALE, DEFAULT_LOCALE_COUNTRY};

/// Canonical locale and its two-letter country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub tag: String,
    pub country: String,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            tag: DEFAULT_LOCALE.to_string(),
            country: DEFAULT_LOCALE_COUNTRY.to_string(),
        }
    }
}

/// Resolve a raw locale variable. Never fails.
pub fn resolve(raw: &str) -> Locale {
    let Some(tag) = canonicalize(raw) else {
        return Locale::default();
    };
    let country = tag
        .rsplit('-')
        .next()
        .filter(|last| last.len() == 2 && last.bytes().all(|b| b.is_ascii_alphabetic()))
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| DEFAULT_LOCALE_COUNTRY.to_string());
    Locale { tag, country }
}

/// Canonical form of a well-formed language tag, or `None`.
pub fn canonicalize(raw: &str) -> Option<String> {
    let normalized = raw.trim().replace('_', "-");
    let mut subtags = normalized.split('-').peekable();
    let mut out: Vec<String> = Vec::new();

    let language = subtags.next()?;
    if !is_alpha(language, 2, 3) && !is_alpha(language, 5, 8) {
        return None;
    }
    out.push(language.to_ascii_lowercase());

    // Up to three extended language subtags after a short language.
    if language.len() <= 3 {
        for _ in 0..3 {
            match subtags.peek() {
                Some(s) if is_alpha(s, 3, 3) => {
                    out.push(s.to_ascii_lowercase());
                    subtags.next();
                }
                _ => break,
            }
        }
    }

    if let Some(s) = subtags.peek().filter(|s| is_alpha(s, 4, 4)) {
        out.push(titlecase(s));
        subtags.next();
    }

    if let Some(s) = subtags
        .peek()
        .filter(|s| is_alpha(s, 2, 2) || (s.len() == 3 && s.bytes().all(|b| b.is_ascii_digit())))
    {
        out.push(s.to_ascii_uppercase());
        subtags.next();
    }

    while let Some(s) = subtags.peek().filter(|s| is_variant(s)) {
        out.push(s.to_ascii_lowercase());
        subtags.next();
    }

    // Extensions and private use: a singleton followed by at least one
    // alphanumeric subtag.
    while let Some(singleton) = subtags.next() {
        if singleton.len() != 1 || !singleton.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }
        let private_use = singleton.eq_ignore_ascii_case("x");
        let min = if private_use { 1 } else { 2 };
        out.push(singleton.to_ascii_lowercase());

        let mut count = 0;
        while let Some(s) = subtags.peek() {
            if s.len() == 1 && !private_use {
                break;
            }
            if !is_alnum(s, min, 8) {
                return None;
            }
            out.push(s.to_ascii_lowercase());
            subtags.next();
            count += 1;
        }
        if count == 0 {
            return None;
        }
    }

    Some(out.join("-"))
}

fn is_alpha(s: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_alphabetic())
}

fn is_alnum(s: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn is_variant(s: &str) -> bool {
    is_alnum(s, 5, 8) || (s.len() == 4 && s.as_bytes()[0].is_ascii_digit() && is_alnum(s, 4, 4))
}

fn titlecase(s: &str) -> String {
    let lower = s.to_ascii_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_input_is_unchanged() {
        let locale = resolve("en-US");
        assert_eq!(locale.tag, "en-US");
        assert_eq!(locale.country, "US");
    }

    #[test]
    fn case_and_separator_are_normalized() {
        assert_eq!(resolve("EN_us").tag, "en-US");
        assert_eq!(resolve("pt_br").country, "BR");
        assert_eq!(canonicalize("zh-hant-tw").as_deref(), Some("zh-Hant-TW"));
    }

    #[test]
    fn numeric_region_keeps_default_country() {
        let locale = resolve("es-419");
        assert_eq!(locale.tag, "es-419");
        assert_eq!(locale.country, DEFAULT_LOCALE_COUNTRY);
    }

    #[test]
    fn language_only_uses_language_as_country() {
        // The country is the last subtag, whatever it is.
        assert_eq!(resolve("de").country, "DE");
    }

    #[test]
    fn extensions_and_private_use() {
        assert_eq!(
            canonicalize("en-US-u-CA-gregory").as_deref(),
            Some("en-US-u-ca-gregory")
        );
        assert_eq!(canonicalize("de-DE-x-a").as_deref(), Some("de-DE-x-a"));
        assert!(canonicalize("en-u").is_none());
    }

    #[test]
    fn garbage_falls_back_to_default() {
        for raw in ["", "-", "english please", "e", "en--US", "123", "en-US-!!"] {
            assert_eq!(resolve(raw), Locale::default(), "input {raw:?}");
        }
    }
}
