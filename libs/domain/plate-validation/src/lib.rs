//! Plate Validator (C1): normalization, regex classification, suspicion
//! detection and OCR correction suggestions. Deterministic; the only I/O is
//! the one-time load of active rules from persistent storage.

pub mod corrections;
pub mod normalize;
pub mod rules;
pub mod suspicion;

pub use corrections::{suggest_corrections, CorrectionSuggestion};
pub use normalize::normalize;
pub use rules::{PlateRuleRecord, RuleSet, ValidationResult, ValidationStatus};
pub use suspicion::{detect_suspicious, SuspicionReason, SuspicionResult};

/// Convenience facade bundling a loaded `RuleSet` with the four operations
/// from spec.md §4.1.
pub struct PlateValidator {
    rules: RuleSet,
}

impl PlateValidator {
    pub fn new(rule_records: &[PlateRuleRecord]) -> Self {
        Self {
            rules: RuleSet::load(rule_records),
        }
    }

    pub fn normalize(&self, raw: &str) -> String {
        normalize(raw)
    }

    pub fn validate(&self, vrm: &str) -> ValidationResult {
        self.rules.validate(vrm)
    }

    pub fn detect_suspicious(&self, vrm: &str, confidence: Option<f64>) -> SuspicionResult {
        detect_suspicious(vrm, confidence, &self.rules)
    }

    pub fn suggest_corrections(&self, vrm: &str) -> Vec<CorrectionSuggestion> {
        suggest_corrections(vrm, &self.rules)
    }
}
