//! Entity validation errors and shared text normalization.

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Validation failure raised at construction, mutation or hydration time.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required field is absent or blank.
    MissingField(&'static str),
    /// Text field exceeds its maximum length in chars.
    TooLong { field: &'static str, max: usize },
    /// Numeric field is negative or not finite.
    InvalidNumber { field: &'static str, value: f64 },
    /// Field value is not accepted for a non-numeric reason.
    InvalidValue { field: &'static str, value: String },
    /// A task listed itself as a dependency.
    SelfDependency(String),
    /// `completed` disagrees with `status`.
    InconsistentCompletion,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "`{field}` is required"),
            Self::TooLong { field, max } => {
                write!(f, "`{field}` must be at most {max} characters")
            }
            Self::InvalidNumber { field, value } => {
                write!(f, "`{field}` must be a non-negative number, got {value}")
            }
            Self::InvalidValue { field, value } => {
                write!(f, "invalid `{field}` value `{value}`")
            }
            Self::SelfDependency(id) => write!(f, "task {id} cannot depend on itself"),
            Self::InconsistentCompletion => {
                write!(f, "`completed` must be true exactly when status is `completed`")
            }
        }
    }
}

impl Error for ValidationError {}

pub type ValidationResult<T> = Result<T, ValidationError>;

pub(crate) fn require_text(field: &'static str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

pub(crate) fn require_max_len(
    field: &'static str,
    value: &str,
    max: usize,
) -> ValidationResult<()> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

pub(crate) fn require_hours(field: &'static str, value: Option<f64>) -> ValidationResult<()> {
    match value {
        Some(hours) if !hours.is_finite() || hours < 0.0 => {
            Err(ValidationError::InvalidNumber { field, value: hours })
        }
        _ => Ok(()),
    }
}

/// Normalizes one tag: trimmed, lowercase, `None` when blank.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes and deduplicates tag values.
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .filter_map(|tag| normalize_tag(tag.as_ref()))
        .collect()
}
