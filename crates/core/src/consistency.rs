use tracing::debug;

use crate::normalize::{NormalizeKind, NOT_PROVIDED};

/// How two candidate values for the same field are compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Exact,
    CaseInsensitive,
}

impl Comparison {
    /// Enumerated kinds hold canonical values, so they compare exactly.
    pub fn for_kind(kind: NormalizeKind) -> Self {
        if kind.is_enumerated() {
            Self::Exact
        } else {
            Self::CaseInsensitive
        }
    }

    fn same(&self, left: &str, right: &str) -> bool {
        match self {
            Self::Exact => left == right,
            Self::CaseInsensitive => left.trim().to_lowercase() == right.trim().to_lowercase(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub applied: bool,
    pub kept_value: String,
    pub conflict: bool,
}

/// Keeps the earliest answer for a field.
///
/// An unset field always takes the new value. A set field never changes; when
/// the new value disagrees, a `<field>_conflict` entry is appended to
/// `inconsistencies`.
pub fn resolve(
    field: &str,
    current: &str,
    new_value: &str,
    comparison: Comparison,
    inconsistencies: &mut Vec<String>,
) -> Resolution {
    if current == NOT_PROVIDED || current.trim().is_empty() {
        return Resolution { applied: true, kept_value: new_value.to_string(), conflict: false };
    }

    if comparison.same(current, new_value) {
        return Resolution { applied: false, kept_value: current.to_string(), conflict: false };
    }

    inconsistencies.push(format!("{field}_conflict: kept '{current}', ignored '{new_value}'"));
    debug!(
        event_name = "intake.field.conflict",
        field,
        kept = current,
        ignored = new_value,
        "conflicting answer ignored"
    );
    Resolution { applied: false, kept_value: current.to_string(), conflict: true }
}
