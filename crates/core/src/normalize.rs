//! Answer normalization
//!
//! Pure functions that map raw answers onto canonical values. Enumerated
//! kinds (urgency, timeline, budget) consult the pack's synonym tables first,
//! then accept a canonical value typed directly, then fall back to keyword and
//! numeric heuristics. Text kinds only trim.

use serde::{Deserialize, Serialize};

use crate::intents::{Normalizers, SynonymTable};

/// Sentinel for "no value collected yet".
pub const NOT_PROVIDED: &str = "not_provided";

pub const URGENCY_LEVELS: [&str; 2] = ["urgent", "flexible"];
pub const TIMELINE_BUCKETS: [&str; 3] = ["within_24h", "within_1_week", "within_2_weeks"];
pub const BUDGET_BUCKETS: [&str; 5] = ["<50", "50-100", "100-300", "300-500", "500-1000"];

const QUESTION_MARKERS: [&str; 10] =
    ["what", "how", "price", "pricing", "cost", "charge", "rates", "hours", "address", "?"];
const SERVICE_TYPE_STOPLIST: [&str; 6] = ["yes", "no", "ok", "okay", "urgent", "flexible"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeKind {
    #[default]
    Text,
    Urgency,
    Timeline,
    Budget,
    ServiceType,
}

impl NormalizeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Urgency => "urgency",
            Self::Timeline => "timeline",
            Self::Budget => "budget",
            Self::ServiceType => "service_type",
        }
    }

    /// Kinds whose values come from a closed canonical set.
    pub fn is_enumerated(&self) -> bool {
        matches!(self, Self::Urgency | Self::Timeline | Self::Budget)
    }

    fn builtin_canonical(&self) -> &'static [&'static str] {
        match self {
            Self::Urgency => &URGENCY_LEVELS,
            Self::Timeline => &TIMELINE_BUCKETS,
            Self::Budget => &BUDGET_BUCKETS,
            Self::Text | Self::ServiceType => &[],
        }
    }
}

/// True when `value` holds something other than blank or the sentinel.
pub fn is_provided(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed != NOT_PROVIDED
}

pub fn normalize(kind: NormalizeKind, raw: &str, normalizers: &Normalizers) -> String {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return NOT_PROVIDED.to_string();
    }

    if matches!(kind, NormalizeKind::Text | NormalizeKind::ServiceType) {
        return cleaned.to_string();
    }

    let table = normalizers.table(kind);
    let already_canonical = table.map(|table| table.contains_key(cleaned)).unwrap_or(false)
        || kind.builtin_canonical().contains(&cleaned);
    if already_canonical || cleaned == NOT_PROVIDED {
        return cleaned.to_string();
    }

    let lowered = cleaned.to_lowercase();
    if let Some(canonical) = table.and_then(|table| match_synonym(table, &lowered)) {
        return canonical;
    }

    let heuristic = match kind {
        NormalizeKind::Budget => budget_from_text(&lowered),
        NormalizeKind::Timeline => timeline_from_text(&lowered),
        NormalizeKind::Urgency => urgency_from_text(&lowered),
        NormalizeKind::Text | NormalizeKind::ServiceType => None,
    };

    heuristic.unwrap_or(NOT_PROVIDED).to_string()
}

/// Exact, case-insensitive synonym lookup. Returns the canonical key.
pub fn match_synonym(table: &SynonymTable, lowered: &str) -> Option<String> {
    table.iter().find_map(|(canonical, synonyms)| {
        synonyms
            .iter()
            .any(|synonym| synonym.trim().to_lowercase() == lowered)
            .then(|| canonical.clone())
    })
}

/// Returns the constraint text to record, or an empty string when the answer
/// means "nothing to add".
pub fn normalize_constraints(raw: &str, normalizers: &Normalizers) -> String {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return String::new();
    }

    let lowered = cleaned.to_lowercase();
    if lowered.starts_with("no") {
        return String::new();
    }

    let ignored = normalizers
        .constraints_ignore
        .iter()
        .any(|entry| entry.trim().to_lowercase() == lowered);
    if ignored {
        return String::new();
    }

    cleaned.to_string()
}

/// Coarse filter that rejects answers which are obviously not a service type.
pub fn is_valid_service_type(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return false;
    }
    if QUESTION_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return false;
    }
    if lowered.chars().count() < 3 {
        return false;
    }
    if lowered.chars().all(|ch| ch.is_ascii_digit()) {
        return false;
    }
    !SERVICE_TYPE_STOPLIST.contains(&lowered.as_str())
}

pub fn budget_bucket(amount: u64) -> &'static str {
    match amount {
        0..=49 => "<50",
        50..=100 => "50-100",
        101..=300 => "100-300",
        301..=500 => "300-500",
        _ => "500-1000",
    }
}

/// First run of digits in `text`, accepting thousands separators inside the run.
pub fn first_number(text: &str) -> Option<u64> {
    let chars = text.chars().collect::<Vec<_>>();
    let start = chars.iter().position(|ch| ch.is_ascii_digit())?;

    let mut value: u64 = 0;
    let mut index = start;
    while index < chars.len() {
        let ch = chars[index];
        if let Some(digit) = ch.to_digit(10) {
            value = value.saturating_mul(10).saturating_add(u64::from(digit));
        } else if ch == ',' && chars.get(index + 1).is_some_and(|next| next.is_ascii_digit()) {
            // thousands separator
        } else {
            break;
        }
        index += 1;
    }

    Some(value)
}

fn budget_from_text(lowered: &str) -> Option<&'static str> {
    first_number(lowered).map(budget_bucket)
}

fn timeline_from_text(lowered: &str) -> Option<&'static str> {
    let same_day = ["today", "tomorrow", "within_24h", "within 24", "24h"];
    if same_day.iter().any(|marker| lowered.contains(marker)) {
        return Some("within_24h");
    }

    if let Some(days) = day_count(lowered) {
        match days {
            0..=1 => return Some("within_24h"),
            2..=7 => return Some("within_1_week"),
            8..=14 => return Some("within_2_weeks"),
            _ => {}
        }
    }

    if lowered.contains("week") {
        if lowered.contains('2') || lowered.contains("two") {
            return Some("within_2_weeks");
        }
        return Some("within_1_week");
    }

    None
}

/// Finds "<n> day(s)" or "<n>d" and returns n.
fn day_count(lowered: &str) -> Option<u64> {
    let chars = lowered.chars().collect::<Vec<_>>();
    let mut index = 0;

    while index < chars.len() {
        if !chars[index].is_ascii_digit() {
            index += 1;
            continue;
        }

        let mut value: u64 = 0;
        while let Some(digit) = chars.get(index).and_then(|ch| ch.to_digit(10)) {
            value = value.saturating_mul(10).saturating_add(u64::from(digit));
            index += 1;
        }

        let mut cursor = index;
        while chars.get(cursor).is_some_and(|ch| ch.is_whitespace()) {
            cursor += 1;
        }
        let rest = chars[cursor..].iter().collect::<String>();
        for unit in ["days", "day", "d"] {
            if let Some(after) = rest.strip_prefix(unit) {
                let at_boundary = after.chars().next().map_or(true, |ch| !ch.is_alphanumeric());
                if at_boundary {
                    return Some(value);
                }
            }
        }
    }

    None
}

fn urgency_from_text(lowered: &str) -> Option<&'static str> {
    let flexible = ["not urgent", "no rush", "whenever", "flexible"];
    if flexible.iter().any(|marker| lowered.contains(marker)) {
        return Some("flexible");
    }

    let urgent = ["urgent", "asap", "emergency", "immediately", "right now"];
    if urgent.iter().any(|marker| lowered.contains(marker)) {
        return Some("urgent");
    }

    None
}
