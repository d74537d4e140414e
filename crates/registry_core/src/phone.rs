//! Phone number canonicalization and validation.
//!
//! # Responsibility
//! - Reduce differently formatted input for the same subscriber to one
//!   comparable string.
//! - Validate home-country numbers against the numbering plan and accept
//!   foreign numbers on a permissive structural check.
//!
//! # Invariants
//! - `normalize` is pure and idempotent: `normalize(normalize(x)) == normalize(x)`.
//! - Home-country canonical form carries neither the trunk prefix nor the
//!   calling code.
//! - International canonical form keeps every digit in its original order.

use once_cell::sync::Lazy;
use regex::Regex;

const MIN_INTERNATIONAL_DIGITS: usize = 10;
const MAX_INTERNATIONAL_DIGITS: usize = 15;

static UGANDA_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // mobile
        r"^7(?:[0157-9]\d|20|36|[46][0-4])\d{6}$",
        // fixed line
        r"^(?:20(?:(?:240|30[67])\d|6(?:00[0-2]|30[0-4]))\d{3}|(?:20(?:[0147]\d|2[5-9]|32|5[0-4]|6[15-9])|[34]\d{3})\d{5})$",
        // toll free
        r"^800[1-3]\d{5}$",
        // premium rate
        r"^90[1-3]\d{6}$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid numbering plan regex"))
    .collect()
});

/// Numbering plan of the registry's home country.
#[derive(Debug, Clone)]
pub struct NumberingPlan {
    region: &'static str,
    calling_code: &'static str,
    national_prefix: &'static str,
    patterns: &'static [Regex],
}

impl NumberingPlan {
    /// Uganda: calling code `256`, trunk prefix `0`, 9-digit national numbers.
    pub fn uganda() -> Self {
        Self {
            region: "UG",
            calling_code: "256",
            national_prefix: "0",
            patterns: UGANDA_PATTERNS.as_slice(),
        }
    }

    /// Looks up a supported plan by ISO 3166 region code.
    pub fn for_region(region: &str) -> Option<Self> {
        match region.trim().to_ascii_uppercase().as_str() {
            "UG" => Some(Self::uganda()),
            _ => None,
        }
    }

    pub fn region(&self) -> &'static str {
        self.region
    }

    fn matches_national_number(&self, nsn: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(nsn))
    }
}

impl Default for NumberingPlan {
    fn default() -> Self {
        Self::uganda()
    }
}

/// How a raw phone string was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneClass {
    /// Blank input.
    Empty,
    /// Starts with the home calling code or the trunk prefix.
    Local,
    /// Long enough to be a foreign number and not home-prefixed.
    International,
    /// Too short to classify; treated as a bare national number.
    Short,
}

/// Canonicalizes phone numbers for one home country.
#[derive(Debug, Clone, Default)]
pub struct PhoneNormalizer {
    plan: NumberingPlan,
}

impl PhoneNormalizer {
    pub fn new(plan: NumberingPlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &NumberingPlan {
        &self.plan
    }

    /// Classifies raw input after stripping formatting characters and `+`.
    pub fn classify(&self, raw: &str) -> PhoneClass {
        let clean = strip_formatting(raw);
        self.classify_body(&without_plus(&clean))
    }

    /// Returns the canonical comparable form of `raw`.
    ///
    /// Blank input normalizes to an empty string. Unclassifiable input is
    /// returned cleaned of formatting characters.
    pub fn normalize(&self, raw: &str) -> String {
        let body = without_plus(&strip_formatting(raw));
        match self.classify_body(&body) {
            PhoneClass::Empty => String::new(),
            PhoneClass::International => body,
            PhoneClass::Local | PhoneClass::Short => self.strip_home_prefixes(&body).to_string(),
        }
    }

    /// Returns whether `raw` is an acceptable phone number.
    ///
    /// At most one `+` is accepted, and only in leading position.
    pub fn is_valid(&self, raw: &str) -> bool {
        let clean = strip_formatting(raw);
        let digits = clean.strip_prefix('+').unwrap_or(&clean);
        if !is_ascii_digits(digits) {
            return false;
        }
        match self.classify_body(digits) {
            PhoneClass::Empty => false,
            PhoneClass::International => digits.len() <= MAX_INTERNATIONAL_DIGITS,
            PhoneClass::Local | PhoneClass::Short => self
                .national_number(&clean, digits)
                .is_some_and(|nsn| self.plan.matches_national_number(nsn)),
        }
    }

    /// Classifies formatting-free input with every `+` already removed.
    ///
    /// The international length floor counts digits only, so a canonical
    /// international value classifies the same way as the input it came from.
    fn classify_body(&self, body: &str) -> PhoneClass {
        if body.is_empty() {
            return PhoneClass::Empty;
        }
        if body.starts_with(self.plan.calling_code) || body.starts_with(self.plan.national_prefix)
        {
            return PhoneClass::Local;
        }
        if body.chars().count() >= MIN_INTERNATIONAL_DIGITS {
            return PhoneClass::International;
        }
        PhoneClass::Short
    }

    /// Strips trunk prefix and calling code until neither leads the string.
    fn strip_home_prefixes<'a>(&self, mut value: &'a str) -> &'a str {
        loop {
            if let Some(rest) = value.strip_prefix(self.plan.national_prefix) {
                value = rest;
            } else if let Some(rest) = value.strip_prefix(self.plan.calling_code) {
                value = rest;
            } else {
                return value;
            }
        }
    }

    /// Extracts the national significant number the way a dialer would.
    ///
    /// `+` must be followed by the home calling code; a bare calling code is
    /// only stripped when the remainder is itself a plan-valid number.
    fn national_number<'a>(&self, clean: &str, digits: &'a str) -> Option<&'a str> {
        if clean.starts_with('+') {
            return digits.strip_prefix(self.plan.calling_code);
        }
        if let Some(rest) = digits.strip_prefix(self.plan.national_prefix) {
            return Some(rest);
        }
        if let Some(rest) = digits.strip_prefix(self.plan.calling_code) {
            if self.plan.matches_national_number(rest) {
                return Some(rest);
            }
        }
        Some(digits)
    }
}

fn strip_formatting(raw: &str) -> String {
    raw.chars()
        .filter(|ch| !ch.is_whitespace() && !matches!(ch, '-' | '(' | ')'))
        .collect()
}

fn without_plus(clean: &str) -> String {
    clean.replace('+', "")
}

fn is_ascii_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::{PhoneClass, PhoneNormalizer};

    #[test]
    fn classify_separates_local_international_and_short() {
        let phones = PhoneNormalizer::default();
        assert_eq!(phones.classify("0781234567"), PhoneClass::Local);
        assert_eq!(phones.classify("+256 781 234567"), PhoneClass::Local);
        assert_eq!(phones.classify("+1 (415) 555-1234"), PhoneClass::International);
        assert_eq!(phones.classify("781234567"), PhoneClass::Short);
        assert_eq!(phones.classify("  \t"), PhoneClass::Empty);
    }

    #[test]
    fn strip_home_prefixes_reaches_fixed_point() {
        let phones = PhoneNormalizer::default();
        assert_eq!(phones.normalize("00781234567"), "781234567");
        assert_eq!(phones.normalize("0256781234567"), "781234567");
    }

    #[test]
    fn bare_calling_code_is_stripped_only_when_remainder_is_valid() {
        let phones = PhoneNormalizer::default();
        assert!(phones.is_valid("256781234567"));
        assert!(!phones.is_valid("2567812"));
    }

    #[test]
    fn stray_plus_signs_are_dropped_by_normalize_but_fail_validation() {
        let phones = PhoneNormalizer::default();
        assert_eq!(phones.normalize("0+781234567"), "781234567");
        assert_eq!(phones.normalize("++256781234567"), "781234567");
        assert!(!phones.is_valid("0+781234567"));
        assert!(!phones.is_valid("++256781234567"));
    }

    #[test]
    fn international_floor_counts_digits_not_the_plus() {
        let phones = PhoneNormalizer::default();
        assert_eq!(phones.classify("+123456789"), PhoneClass::Short);
        assert!(!phones.is_valid("+123456789"));
        assert_eq!(phones.classify("+1234567890"), PhoneClass::International);
        assert!(phones.is_valid("+1234567890"));
    }

    #[test]
    fn plus_must_precede_home_calling_code_for_local_numbers() {
        let phones = PhoneNormalizer::default();
        assert!(!phones.is_valid("+0781234567"));
        assert!(phones.is_valid("+256781234567"));
    }
}
