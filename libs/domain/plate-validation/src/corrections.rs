use crate::rules::{RuleSet, ValidationStatus};
use anpr_core_plate_corrections::generate_candidates;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionSuggestion {
    pub candidate: String,
    pub score: f64,
}

const UK_SCORE: f64 = 0.8;
const INTERNATIONAL_SCORE: f64 = 0.6;

/// Up to 5 single-character OCR correction candidates, ranked by the
/// validity class of the resulting plate (spec.md §4.1(d)).
pub fn suggest_corrections(vrm: &str, rules: &RuleSet) -> Vec<CorrectionSuggestion> {
    let mut seen = HashSet::new();
    let mut scored: Vec<CorrectionSuggestion> = generate_candidates(vrm)
        .into_iter()
        .filter(|candidate| candidate != vrm && seen.insert(candidate.clone()))
        .filter_map(|candidate| {
            let score = match rules.validate(&candidate).status {
                ValidationStatus::UkValid => Some(UK_SCORE),
                ValidationStatus::InternationalValid => Some(INTERNATIONAL_SCORE),
                ValidationStatus::Invalid => None,
            }?;
            Some(CorrectionSuggestion { candidate, score })
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
    scored.truncate(5);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_uk_valid_candidates_above_international() {
        let rules = RuleSet::load(&[]);
        let suggestions = suggest_corrections("A812CDE", &rules);
        assert!(suggestions.iter().any(|s| s.candidate == "AB12CDE"));
        assert!(suggestions.len() <= 5);
        for window in suggestions.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
    }

    #[test]
    fn never_suggests_more_than_five() {
        let rules = RuleSet::load(&[]);
        let suggestions = suggest_corrections("0I0I0I0I0I", &rules);
        assert!(suggestions.len() <= 5);
    }
}
