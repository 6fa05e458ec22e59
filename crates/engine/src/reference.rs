//! Extraction of reference identifiers (invoice, cheque, UTR numbers) from
//! free-text descriptions.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

/// Four-digit values in this range are treated as years, not references.
const YEAR_RANGE: std::ops::RangeInclusive<u32> = 2020..=2030;

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// ASCII word boundaries, matching the token class.
re!(re_token, r"(?-u:\b)[A-Za-z0-9-]+(?-u:\b)");

/// Returns every qualifying reference in `text`, lowercased and de-duplicated.
///
/// A hyphen-stripped token qualifies when it is
/// - all digits, at least 3 long, and not a plausible year, or
/// - alphanumeric with at least one letter and at least 3 digits.
///
/// For an alphanumeric token each embedded run of digits is also emitted when
/// it qualifies on its own, so `REF1024` and `INV-1024` both yield `1024`.
pub fn extract_references(text: &str) -> BTreeSet<String> {
    let mut refs = BTreeSet::new();

    for m in re_token().find_iter(text) {
        let token: String = m
            .as_str()
            .chars()
            .filter(|c| *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        if is_numeric_reference(&token) {
            refs.insert(token);
            continue;
        }

        let digit_count = token.chars().filter(char::is_ascii_digit).count();
        let has_letter = token.chars().any(|c| c.is_ascii_alphabetic());
        if has_letter && digit_count >= 3 {
            for run in token.split(|c: char| !c.is_ascii_digit()) {
                if is_numeric_reference(run) {
                    refs.insert(run.to_string());
                }
            }
            refs.insert(token);
        }
    }

    refs
}

fn is_numeric_reference(token: &str) -> bool {
    if token.len() < 3 || !token.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    if token.len() == 4 {
        if let Ok(year) = token.parse::<u32>() {
            return !YEAR_RANGE.contains(&year);
        }
    }
    true
}

/// True when both sets are non-empty and share at least one reference.
pub fn shares_reference(a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
    first_shared(a, b).is_some()
}

pub fn first_shared<'a>(a: &'a BTreeSet<String>, b: &'a BTreeSet<String>) -> Option<&'a str> {
    a.intersection(b).next().map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(text: &str) -> Vec<String> {
        extract_references(text).into_iter().collect()
    }

    #[test]
    fn pure_digits_need_three() {
        assert_eq!(refs("Cheque 12"), Vec::<String>::new());
        assert_eq!(refs("Cheque 123"), vec!["123"]);
    }

    #[test]
    fn years_are_ignored() {
        assert!(refs("Rent March 2024").is_empty());
        assert_eq!(refs("Rent 2019"), vec!["2019"]);
        assert_eq!(refs("Lot 2031"), vec!["2031"]);
    }

    #[test]
    fn alphanumeric_needs_three_digits() {
        assert!(refs("AB12").is_empty());
        assert_eq!(refs("INV1024"), vec!["1024", "inv1024"]);
    }

    #[test]
    fn hyphens_are_stripped() {
        assert_eq!(refs("Ref 884-120"), vec!["884120"]);
        assert_eq!(refs("UTR-884-120"), vec!["884120", "utr884120"]);
        assert_eq!(refs("inv-1024"), vec!["1024", "inv1024"]);
    }

    #[test]
    fn embedded_year_digits_are_not_emitted() {
        assert_eq!(refs("FY2024Q1"), vec!["fy2024q1"]);
    }

    #[test]
    fn each_digit_run_is_checked_separately() {
        assert_eq!(refs("A12B345"), vec!["345", "a12b345"]);
    }

    #[test]
    fn case_is_normalised_and_duplicates_collapse() {
        assert_eq!(refs("ABC123 abc123 Abc-123"), vec!["123", "abc123"]);
    }

    #[test]
    fn differing_prefixes_share_digits() {
        let a = extract_references("Invoice REF1024 Payment");
        let b = extract_references("Settlement for INV1024");
        assert!(shares_reference(&a, &b));
        assert_eq!(first_shared(&a, &b), Some("1024"));
    }

    #[test]
    fn empty_sets_share_nothing() {
        let a = extract_references("Coffee");
        let b = extract_references("Coffee");
        assert!(!shares_reference(&a, &b));
    }

    #[test]
    fn non_ascii_letters_end_a_token() {
        assert_eq!(refs("Café123"), vec!["123"]);
        assert_eq!(refs("Zahlung-Nr 4711 für Müller"), vec!["4711"]);
    }
}
