//! Best-effort field candidates from the opening message.

use std::collections::BTreeMap;

use intake_core::intents::PrefillSettings;

/// Candidates are raw strings keyed by field name; the engine normalizes them.
pub trait PrefillExtractor {
    fn extract(&self, text: &str) -> BTreeMap<String, String>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoPrefill;

impl PrefillExtractor for NoPrefill {
    fn extract(&self, _text: &str) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// Phrase and amount matching, no model calls.
#[derive(Clone, Debug, Default)]
pub struct HeuristicPrefillExtractor {
    known_locations: Vec<String>,
}

impl HeuristicPrefillExtractor {
    pub fn new(settings: &PrefillSettings) -> Self {
        Self {
            known_locations: settings
                .known_locations
                .iter()
                .map(|location| location.trim().to_string())
                .filter(|location| !location.is_empty())
                .collect(),
        }
    }
}

impl PrefillExtractor for HeuristicPrefillExtractor {
    fn extract(&self, text: &str) -> BTreeMap<String, String> {
        let lowered = text.trim().to_lowercase();
        let mut candidates = BTreeMap::new();

        if let Some(timeline) = extract_timeline(&lowered) {
            candidates.insert("timeline".to_string(), timeline.to_string());
        }

        let tokens = tokenize(&lowered);
        if let Some(amount) = extract_budget_amount(&tokens) {
            candidates.insert("budget_range".to_string(), amount);
        }

        if let Some(location) =
            self.known_locations.iter().find(|location| contains_word(&lowered, location))
        {
            candidates.insert("location".to_string(), location.clone());
        }

        if let Some(urgency) = extract_urgency(&lowered) {
            candidates.insert("urgency".to_string(), urgency.to_string());
        }

        candidates
    }
}

fn extract_timeline(lowered: &str) -> Option<&'static str> {
    let buckets: [(&[&str], &str); 3] = [
        (&["today", "tomorrow", "within 24", "within_24h"], "within_24h"),
        (&["next week", "this week", "within 1 week", "7 days"], "within_1_week"),
        (&["two weeks", "2 weeks", "within 2 weeks", "14 days"], "within_2_weeks"),
    ];

    buckets
        .iter()
        .find(|(phrases, _)| phrases.iter().any(|phrase| lowered.contains(phrase)))
        .map(|(_, bucket)| *bucket)
}

fn extract_urgency(lowered: &str) -> Option<&'static str> {
    if ["not urgent", "no rush", "whenever", "flexible"].iter().any(|word| lowered.contains(word)) {
        return Some("flexible");
    }
    if ["urgent", "asap", "emergency", "immediately", "right now"]
        .iter()
        .any(|word| lowered.contains(word))
    {
        return Some("urgent");
    }
    None
}

fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_ascii_alphanumeric() || character == '$' {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(|token| token.to_string()).collect()
}

fn amount_token(token: &str) -> Option<&str> {
    let digits = token.trim_start_matches('$');
    let plausible = (2..=6).contains(&digits.len()) && digits.chars().all(|ch| ch.is_ascii_digit());
    plausible.then_some(digits)
}

/// `$NNN`, `i have NNN budget`, `budget ... NNN`, `NNN ... budget`, in that order.
fn extract_budget_amount(tokens: &[String]) -> Option<String> {
    const NEARBY: usize = 3;

    for (index, token) in tokens.iter().enumerate() {
        if token == "$" {
            if let Some(amount) = tokens.get(index + 1).and_then(|next| amount_token(next)) {
                return Some(amount.to_string());
            }
        } else if token.starts_with('$') {
            if let Some(amount) = amount_token(token) {
                return Some(amount.to_string());
            }
        }
    }

    for window in tokens.windows(4) {
        if let [i, have, amount, budget] = window {
            if i == "i" && have == "have" && budget == "budget" {
                if let Some(amount) = amount_token(amount) {
                    return Some(amount.to_string());
                }
            }
        }
    }

    for (index, token) in tokens.iter().enumerate() {
        if token != "budget" {
            continue;
        }
        let after = tokens.iter().skip(index + 1).take(NEARBY);
        if let Some(amount) = after.filter_map(|candidate| amount_token(candidate)).next() {
            return Some(amount.to_string());
        }
    }

    for (index, token) in tokens.iter().enumerate() {
        let Some(amount) = amount_token(token) else {
            continue;
        };
        if token.starts_with('$') {
            continue;
        }
        let budget_follows = tokens.iter().skip(index + 1).take(NEARBY).any(|next| next == "budget");
        if budget_follows {
            return Some(amount.to_string());
        }
    }

    None
}

fn contains_word(lowered_text: &str, phrase: &str) -> bool {
    let needle = phrase.to_lowercase();
    let mut search_from = 0;

    while let Some(offset) = lowered_text[search_from..].find(&needle) {
        let start = search_from + offset;
        let end = start + needle.len();
        let before_ok =
            lowered_text[..start].chars().next_back().map_or(true, |ch| !ch.is_alphanumeric());
        let after_ok = lowered_text[end..].chars().next().map_or(true, |ch| !ch.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        search_from = end;
    }

    false
}

#[cfg(test)]
mod tests {
    use intake_core::intents::PrefillSettings;

    use super::{HeuristicPrefillExtractor, PrefillExtractor};

    fn extractor() -> HeuristicPrefillExtractor {
        HeuristicPrefillExtractor::new(&PrefillSettings {
            known_locations: vec!["Toronto".to_string(), "New York".to_string()],
        })
    }

    #[test]
    fn extracts_rich_opening_message() {
        let candidates =
            extractor().extract("Need help with a laptop in Toronto next week, budget $800.");

        assert_eq!(candidates.get("location").map(String::as_str), Some("Toronto"));
        assert_eq!(candidates.get("timeline").map(String::as_str), Some("within_1_week"));
        assert_eq!(candidates.get("budget_range").map(String::as_str), Some("800"));
        assert!(!candidates.contains_key("urgency"));
    }

    #[test]
    fn budget_phrasings_are_recognized() {
        let extractor = extractor();
        let amount = |text: &str| extractor.extract(text).get("budget_range").cloned();

        assert_eq!(amount("i have 250 budget for this"), Some("250".to_string()));
        assert_eq!(amount("my budget is around 400"), Some("400".to_string()));
        assert_eq!(amount("about 90 dollars of budget"), Some("90".to_string()));
        assert_eq!(amount("costs $ 1200 max"), Some("1200".to_string()));
        assert_eq!(amount("fix 2 chairs"), None);
    }

    #[test]
    fn locations_match_whole_words_with_configured_casing() {
        let extractor = extractor();
        assert_eq!(
            extractor.extract("moving to new york soon").get("location").map(String::as_str),
            Some("New York")
        );
        assert!(!extractor.extract("torontonian bakery").contains_key("location"));
    }

    #[test]
    fn urgency_prefers_the_negated_phrase() {
        let extractor = extractor();
        assert_eq!(
            extractor.extract("not urgent, whenever").get("urgency").map(String::as_str),
            Some("flexible")
        );
        assert_eq!(
            extractor.extract("URGENT leak today").get("urgency").map(String::as_str),
            Some("urgent")
        );
    }
}
