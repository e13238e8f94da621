//! Generates single-character OCR substitution candidates for a plate string.
//!
//! This is pure candidate generation; ranking candidates by validity class
//! and truncating to the top 5 is the caller's job (`anpr-domain-plate-validation`).

/// The confusion pairs the spec calls out: `0<->O, 1<->I, 5<->S, 8<->B,
/// 2<->Z, 6<->G`. Stored both directions so substitution is symmetric.
const CONFUSION_PAIRS: &[(char, char)] = &[
    ('0', 'O'),
    ('1', 'I'),
    ('5', 'S'),
    ('8', 'B'),
    ('2', 'Z'),
    ('6', 'G'),
];

fn confusable_with(c: char) -> Option<char> {
    CONFUSION_PAIRS.iter().find_map(|&(a, b)| {
        if c == a {
            Some(b)
        } else if c == b {
            Some(a)
        } else {
            None
        }
    })
}

/// Yields every string obtained by substituting exactly one confusable
/// character in `source`, in left-to-right position order. Duplicate
/// candidates (e.g. a repeated character) are not deduplicated here.
pub struct SubstitutionIterator {
    chars: Vec<char>,
    position: usize,
}

impl SubstitutionIterator {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            position: 0,
        }
    }
}

impl Iterator for SubstitutionIterator {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        while self.position < self.chars.len() {
            let index = self.position;
            self.position += 1;

            if let Some(replacement) = confusable_with(self.chars[index]) {
                let mut candidate = self.chars.clone();
                candidate[index] = replacement;
                return Some(candidate.into_iter().collect());
            }
        }
        None
    }
}

/// Convenience wrapper collecting all single-substitution candidates.
pub fn generate_candidates(source: &str) -> Vec<String> {
    SubstitutionIterator::new(source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_each_confusable_character_once() {
        let candidates = generate_candidates("A0B1");
        assert!(candidates.contains(&"AOB1".to_string()));
        assert!(candidates.contains(&"A0BI".to_string()));
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn no_confusable_characters_yields_no_candidates() {
        assert!(generate_candidates("XYZ").is_empty());
    }
}
