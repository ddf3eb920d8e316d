use intake_core::intents::FitRules;
use intake_core::normalize::is_provided;
use intake_core::RequestDetails;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FitDecision {
    Fit,
    NotAFit { reason_code: &'static str, notes: String, routing_hint: String },
}

impl FitDecision {
    pub fn is_fit(&self) -> bool {
        matches!(self, Self::Fit)
    }
}

/// Table-driven early exit for requests whose economics cannot work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FitPolicy {
    budget_contains: Vec<String>,
    budget_equals: Vec<String>,
    routing_hint: String,
    notes: String,
}

impl Default for FitPolicy {
    fn default() -> Self {
        Self::from_rules(&FitRules::default())
    }
}

impl FitPolicy {
    pub fn from_rules(rules: &FitRules) -> Self {
        let lowered = |values: &[String]| {
            values
                .iter()
                .map(|value| value.trim().to_lowercase())
                .filter(|value| !value.is_empty())
                .collect::<Vec<_>>()
        };

        Self {
            budget_contains: lowered(&rules.budget_contains),
            budget_equals: lowered(&rules.budget_equals),
            routing_hint: rules.routing_hint.clone(),
            notes: rules.notes.clone(),
        }
    }

    pub fn evaluate(&self, details: &RequestDetails) -> FitDecision {
        if !is_provided(&details.budget_range) {
            return FitDecision::Fit;
        }

        let budget = details.budget_range.trim().to_lowercase();
        let reason_code = if self.budget_contains.iter().any(|marker| budget.contains(marker)) {
            "budget_contains"
        } else if self.budget_equals.iter().any(|value| *value == budget) {
            "budget_equals"
        } else {
            return FitDecision::Fit;
        };

        FitDecision::NotAFit {
            reason_code,
            notes: self.notes.clone(),
            routing_hint: self.routing_hint.clone(),
        }
    }
}
