//! Name matching rules for member resolution.
//!
//! # Invariants
//! - Matching is case-insensitive and Unicode-aware.
//! - An empty token matches every candidate.

/// Upper bound appended to a prefix to build an exclusive range end.
///
/// `char::MAX` has the greatest UTF-8 encoding, so it sorts after every other
/// scalar under byte-wise ordering. Only a name continuing with U+10FFFF
/// itself falls outside the range.
pub const HIGH_SENTINEL: char = char::MAX;

/// True when the lower-cased candidate name starts with the lower-cased token.
pub fn matches_prefix(candidate_full_name: &str, token: &str) -> bool {
    candidate_full_name
        .to_lowercase()
        .starts_with(&token.to_lowercase())
}

/// True when the token appears anywhere in the candidate name, ignoring case.
pub fn matches_contains(candidate_full_name: &str, token: &str) -> bool {
    candidate_full_name
        .to_lowercase()
        .contains(&token.to_lowercase())
}

/// Range bounds `[prefix, prefix + HIGH_SENTINEL)` selecting names that
/// start with `prefix` under binary ordering.
pub fn prefix_range(prefix: &str) -> (String, String) {
    let mut high = String::with_capacity(prefix.len() + HIGH_SENTINEL.len_utf8());
    high.push_str(prefix);
    high.push(HIGH_SENTINEL);
    (prefix.to_string(), high)
}

/// Returns the first `chars` characters of `token`.
pub(crate) fn char_prefix(token: &str, chars: usize) -> &str {
    match token.char_indices().nth(chars) {
        Some((byte_index, _)) => &token[..byte_index],
        None => token,
    }
}

#[cfg(test)]
mod tests {
    use super::{char_prefix, matches_contains, matches_prefix, prefix_range};

    #[test]
    fn prefix_match_ignores_case() {
        assert!(matches_prefix("Jonathan Okello", "jon"));
        assert!(matches_prefix("jonathan okello", "JONATHAN O"));
        assert!(!matches_prefix("Okello Jonathan", "jon"));
    }

    #[test]
    fn contains_match_finds_later_name_parts() {
        assert!(matches_contains("Okello Jonathan", "jonathan"));
        assert!(!matches_contains("Okello Jonathan", "john"));
    }

    #[test]
    fn prefix_range_brackets_names_with_prefix() {
        let (low, high) = prefix_range("Jon");
        assert!("Jonathan".to_string() >= low);
        assert!("Jonathan".to_string() < high);
        assert!("Joo".to_string() >= high);
        assert!("Jo".to_string() < low);
    }

    #[test]
    fn prefix_range_includes_supplementary_plane_continuations() {
        let (low, high) = prefix_range("Jon");
        for name in ["Jon\u{1F600}", "Jon\u{20000}x", "Jon\u{FFFD}"] {
            assert!(name >= low.as_str(), "{name}");
            assert!(name < high.as_str(), "{name}");
            assert!(name.as_bytes() < high.as_bytes(), "{name}");
        }
    }

    #[test]
    fn char_prefix_respects_multibyte_boundaries() {
        assert_eq!(char_prefix("Zoë", 3), "Zoë");
        assert_eq!(char_prefix("Zoëlla", 3), "Zoë");
        assert_eq!(char_prefix("Al", 5), "Al");
    }
}
