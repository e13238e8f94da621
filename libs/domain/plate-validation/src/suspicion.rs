use crate::rules::{RuleSet, ValidationStatus};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuspicionReason {
    LowConfidence,
    NonAlphanumeric,
    AllSameCharacter,
    InvalidLength,
    ConfusedCharacterCluster,
    InvalidFormat,
    NonUkFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspicionResult {
    pub is_suspicious: bool,
    pub reasons: Vec<SuspicionReason>,
}

/// `[IOZ]{3,}` or `[0125]{3,}` at the start of the plate — clusters of
/// characters an OCR pass commonly confuses with each other.
static LEADING_CONFUSED_CLUSTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([IOZ]{3,}|[0125]{3,})").unwrap());

/// Flags a normalized plate for human review per spec.md §4.1(c).
/// `confidence` is the OCR engine's reported confidence in `[0, 1]`.
pub fn detect_suspicious(vrm: &str, confidence: Option<f64>, rules: &RuleSet) -> SuspicionResult {
    let mut reasons = Vec::new();

    if let Some(c) = confidence {
        if c < 0.8 {
            reasons.push(SuspicionReason::LowConfidence);
        }
    }

    if !vrm.chars().all(|c| c.is_ascii_alphanumeric()) {
        reasons.push(SuspicionReason::NonAlphanumeric);
    }

    if vrm.len() > 1 && vrm.chars().all(|c| c == vrm.chars().next().unwrap()) {
        reasons.push(SuspicionReason::AllSameCharacter);
    }

    if !(2..=10).contains(&vrm.len()) {
        reasons.push(SuspicionReason::InvalidLength);
    }

    if LEADING_CONFUSED_CLUSTER.is_match(vrm) {
        reasons.push(SuspicionReason::ConfusedCharacterCluster);
    }

    let validation = rules.validate(vrm);
    match validation.status {
        ValidationStatus::Invalid => reasons.push(SuspicionReason::InvalidFormat),
        ValidationStatus::InternationalValid => reasons.push(SuspicionReason::NonUkFormat),
        ValidationStatus::UkValid => {}
    }

    SuspicionResult {
        is_suspicious: !reasons.is_empty(),
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_confidence_is_flagged() {
        let rules = RuleSet::load(&[]);
        let result = detect_suspicious("AB12CDE", Some(0.5), &rules);
        assert!(result.is_suspicious);
        assert!(result.reasons.contains(&SuspicionReason::LowConfidence));
    }

    #[test]
    fn clean_uk_plate_with_high_confidence_is_not_suspicious() {
        let rules = RuleSet::load(&[]);
        let result = detect_suspicious("AB12CDE", Some(0.95), &rules);
        assert!(!result.is_suspicious);
    }

    #[test]
    fn leading_confused_cluster_is_flagged() {
        let rules = RuleSet::load(&[]);
        let result = detect_suspicious("IOI1234", Some(0.95), &rules);
        assert!(result.reasons.contains(&SuspicionReason::ConfusedCharacterCluster));
    }

    #[test]
    fn all_same_character_is_flagged() {
        let rules = RuleSet::load(&[]);
        let result = detect_suspicious("AAAAAAA", Some(0.95), &rules);
        assert!(result.reasons.contains(&SuspicionReason::AllSameCharacter));
    }
}
