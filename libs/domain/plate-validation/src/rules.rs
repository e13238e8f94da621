use once_cell::sync::Lazy;
use regex::Regex;

/// One active regex rule, as loaded from persistent storage.
#[derive(Debug, Clone)]
pub struct PlateRuleRecord {
    pub id: String,
    pub rule_name: String,
    pub pattern: String,
    pub is_international: bool,
    pub priority: i32,
    pub active: bool,
}

struct CompiledRule {
    id: String,
    rule_name: String,
    regex: Regex,
    is_international: bool,
}

/// Built-in UK fallbacks used when no rules exist in persistent storage
/// (spec.md §4.1). Current-style (post-2001) and prefix-style plates.
static CURRENT_STYLE_UK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}[0-9]{2}[A-Z]{3}$").unwrap());
static PREFIX_STYLE_UK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][0-9]{1,3}[A-Z]{3}$").unwrap());
/// General international shape: alphanumeric, length 2-10, at least one letter.
static GENERAL_INTERNATIONAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{2,10}$").unwrap());

pub enum ValidationStatus {
    UkValid,
    InternationalValid,
    Invalid,
}

pub struct ValidationResult {
    pub status: ValidationStatus,
    pub matched_rule: Option<String>,
}

/// An ordered, compiled set of active plate-format rules.
pub struct RuleSet {
    rules: Vec<CompiledRule>,
    using_builtin_fallback: bool,
}

impl RuleSet {
    /// Compiles active rules, ordered by `priority` ascending (first match
    /// wins). Falls back to the built-in UK patterns when the store has no
    /// active rules, or when a stored pattern fails to compile (logged and
    /// skipped rather than panicking the ingestion path).
    pub fn load(records: &[PlateRuleRecord]) -> Self {
        let mut active: Vec<&PlateRuleRecord> = records.iter().filter(|r| r.active).collect();
        active.sort_by_key(|r| r.priority);

        let compiled: Vec<CompiledRule> = active
            .into_iter()
            .filter_map(|record| match Regex::new(&record.pattern) {
                Ok(regex) => Some(CompiledRule {
                    id: record.id.clone(),
                    rule_name: record.rule_name.clone(),
                    regex,
                    is_international: record.is_international,
                }),
                Err(error) => {
                    tracing::warn!(rule_id = %record.id, %error, "skipping uncompilable plate rule");
                    None
                }
            })
            .collect();

        if compiled.is_empty() {
            Self {
                rules: Vec::new(),
                using_builtin_fallback: true,
            }
        } else {
            Self {
                rules: compiled,
                using_builtin_fallback: false,
            }
        }
    }

    pub fn validate(&self, vrm: &str) -> ValidationResult {
        if !self.using_builtin_fallback {
            for rule in &self.rules {
                if rule.regex.is_match(vrm) {
                    return ValidationResult {
                        status: if rule.is_international {
                            ValidationStatus::InternationalValid
                        } else {
                            ValidationStatus::UkValid
                        },
                        matched_rule: Some(rule.rule_name.clone()),
                    };
                }
            }
            return ValidationResult {
                status: ValidationStatus::Invalid,
                matched_rule: None,
            };
        }

        if CURRENT_STYLE_UK.is_match(vrm) {
            return ValidationResult {
                status: ValidationStatus::UkValid,
                matched_rule: Some("UK_CURRENT_STYLE".into()),
            };
        }
        if PREFIX_STYLE_UK.is_match(vrm) {
            return ValidationResult {
                status: ValidationStatus::UkValid,
                matched_rule: Some("UK_PREFIX_STYLE".into()),
            };
        }
        if GENERAL_INTERNATIONAL.is_match(vrm) && vrm.chars().any(|c| c.is_ascii_alphabetic()) {
            return ValidationResult {
                status: ValidationStatus::InternationalValid,
                matched_rule: Some("INTERNATIONAL_GENERIC".into()),
            };
        }
        ValidationResult {
            status: ValidationStatus::Invalid,
            matched_rule: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_fallback_accepts_current_style_uk_plate() {
        let rules = RuleSet::load(&[]);
        let result = rules.validate("AB12CDE");
        assert!(matches!(result.status, ValidationStatus::UkValid));
    }

    #[test]
    fn builtin_fallback_accepts_international_plate() {
        let rules = RuleSet::load(&[]);
        let result = rules.validate("ABC1234XY");
        assert!(matches!(result.status, ValidationStatus::InternationalValid));
    }

    #[test]
    fn stored_rules_take_priority_order() {
        let records = vec![
            PlateRuleRecord {
                id: "2".into(),
                rule_name: "SECOND".into(),
                pattern: r"^[A-Z]{3}$".into(),
                is_international: false,
                priority: 2,
                active: true,
            },
            PlateRuleRecord {
                id: "1".into(),
                rule_name: "FIRST".into(),
                pattern: r"^[A-Z]{3}$".into(),
                is_international: true,
                priority: 1,
                active: true,
            },
        ];
        let rules = RuleSet::load(&records);
        let result = rules.validate("XYZ");
        assert_eq!(result.matched_rule.as_deref(), Some("FIRST"));
    }
}
