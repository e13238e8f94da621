/// Uppercases and strips all whitespace. Idempotent:
/// `normalize(normalize(v)) == normalize(v)` for any `v` (spec.md §8).
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_whitespace_and_uppercases() {
        assert_eq!(normalize(" ab12 cde "), "AB12CDE");
    }

    #[test]
    fn is_idempotent() {
        let once = normalize(" ab12 cde ");
        assert_eq!(normalize(&once), once);
    }
}
