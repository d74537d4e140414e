//! Field-level validation rules for member input.
//!
//! # Responsibility
//! - Enforce full-name and school-name policies on create.
//! - Describe exactly which rule an input violated.
//!
//! # Invariants
//! - Validators never mutate input beyond trimming surrounding whitespace.

use std::error::Error;
use std::fmt::{Display, Formatter};

const MIN_NAME_PARTS: usize = 2;
const MIN_NAME_PART_CHARS: usize = 2;
const MIN_SCHOOL_CHARS: usize = 3;
const MAX_SCHOOL_ABBREVIATION_CHARS: usize = 3;

/// Input rejected by registry policy. Always recoverable by correcting input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Name has fewer than two whitespace-separated parts.
    NameTooFewParts { name: String },
    /// One name part is shorter than two characters.
    NamePartTooShort { part: String },
    /// Name is shorter than two characters (bulk import rule).
    NameTooShort,
    /// School looks like an all-caps abbreviation such as `KPS` or `K.P.S.`.
    SchoolAbbreviation { school: String },
    /// School is shorter than three characters.
    SchoolTooShort { school: String },
    /// Required field is blank after trimming.
    MissingField(&'static str),
    /// Phone field fails numbering-plan validation.
    InvalidPhone { field: &'static str, value: String },
    /// Attendance key is not a `DD_MM_YYYY` date.
    InvalidDateKey(String),
    /// Bulk import input contained no data rows.
    NoDataRows,
    /// Bulk import input contained rows, but none passed validation.
    NoValidRows { errors: Vec<String> },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameTooFewParts { name } => write!(
                f,
                "please provide full name (first and last name), got `{name}`"
            ),
            Self::NamePartTooShort { part } => write!(
                f,
                "each name part must be at least {MIN_NAME_PART_CHARS} characters, got `{part}`"
            ),
            Self::NameTooShort => write!(f, "invalid or missing name"),
            Self::SchoolAbbreviation { school } => write!(
                f,
                "please enter the full school name instead of abbreviation `{school}`"
            ),
            Self::SchoolTooShort { school } => write!(
                f,
                "please enter the complete school name (at least {MIN_SCHOOL_CHARS} characters), got `{school}`"
            ),
            Self::MissingField(field) => write!(f, "missing {field}"),
            Self::InvalidPhone { field, value } => write!(f, "invalid {field}: {value}"),
            Self::InvalidDateKey(key) => {
                write!(f, "invalid attendance date `{key}`; expected DD_MM_YYYY")
            }
            Self::NoDataRows => write!(f, "no data rows found in CSV"),
            Self::NoValidRows { errors } => write!(
                f,
                "no valid member records found in CSV ({} rejected rows)",
                errors.len()
            ),
        }
    }
}

impl Error for ValidationError {}

/// Validates that `name` holds at least a first and last name.
///
/// Every whitespace-separated part must be at least two characters.
pub fn validate_full_name(name: &str) -> Result<(), ValidationError> {
    let parts = name.split_whitespace().collect::<Vec<_>>();
    if parts.len() < MIN_NAME_PARTS {
        return Err(ValidationError::NameTooFewParts {
            name: name.trim().to_string(),
        });
    }

    if let Some(part) = parts
        .iter()
        .find(|part| part.chars().count() < MIN_NAME_PART_CHARS)
    {
        return Err(ValidationError::NamePartTooShort {
            part: (*part).to_string(),
        });
    }

    Ok(())
}

/// Validates a school name and returns its trimmed form.
///
/// The abbreviation check runs first so `KP` reports as an abbreviation
/// rather than as too short.
pub fn validate_school(school: &str) -> Result<String, ValidationError> {
    let trimmed = school.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("school"));
    }

    let without_dots = trimmed.replace('.', "");
    if is_all_caps(&without_dots)
        && without_dots.chars().count() <= MAX_SCHOOL_ABBREVIATION_CHARS
    {
        return Err(ValidationError::SchoolAbbreviation {
            school: trimmed.to_string(),
        });
    }

    if trimmed.chars().count() < MIN_SCHOOL_CHARS {
        return Err(ValidationError::SchoolTooShort {
            school: trimmed.to_string(),
        });
    }

    Ok(trimmed.to_string())
}

/// True when the text has at least one cased letter and none are lowercase.
fn is_all_caps(value: &str) -> bool {
    let mut has_cased = false;
    for ch in value.chars() {
        if ch.is_lowercase() {
            return false;
        }
        if ch.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased
}

#[cfg(test)]
mod tests {
    use super::{validate_full_name, validate_school, ValidationError};

    #[test]
    fn single_token_name_is_rejected() {
        let err = validate_full_name("John").unwrap_err();
        assert!(matches!(err, ValidationError::NameTooFewParts { .. }));
    }

    #[test]
    fn one_letter_name_part_is_rejected() {
        let err = validate_full_name("John K").unwrap_err();
        assert_eq!(
            err,
            ValidationError::NamePartTooShort {
                part: "K".to_string()
            }
        );
    }

    #[test]
    fn two_full_parts_are_accepted() {
        validate_full_name("  John   Kato ").unwrap();
        validate_full_name("Amina Nakato Ssempa").unwrap();
    }

    #[test]
    fn short_caps_school_is_an_abbreviation() {
        assert!(matches!(
            validate_school("KPS").unwrap_err(),
            ValidationError::SchoolAbbreviation { .. }
        ));
        assert!(matches!(
            validate_school("K.P.S.").unwrap_err(),
            ValidationError::SchoolAbbreviation { .. }
        ));
    }

    #[test]
    fn full_school_name_is_trimmed_and_accepted() {
        assert_eq!(
            validate_school("  Kampala Primary School ").unwrap(),
            "Kampala Primary School"
        );
        assert_eq!(validate_school("KCCA").unwrap(), "KCCA");
    }

    #[test]
    fn short_mixed_case_school_is_too_short() {
        assert!(matches!(
            validate_school("Ab").unwrap_err(),
            ValidationError::SchoolTooShort { .. }
        ));
        assert_eq!(
            validate_school("   ").unwrap_err(),
            ValidationError::MissingField("school")
        );
    }
}
