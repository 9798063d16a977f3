use crate::text::clean;

pub const EXACT_MATCH: u8 = 100;
pub const CANDIDATE_CONTAINS_QUERY: u8 = 80;
pub const QUERY_CONTAINS_CANDIDATE: u8 = 60;

/// Fuzzy score of a candidate queue name against the requested one.
///
/// Case- and whitespace-insensitive. `None` means "not a match".
pub fn score_name_match(candidate: &str, query: &str) -> Option<u8> {
    let name = clean(candidate).to_lowercase();
    let query = clean(query).to_lowercase();
    if name.is_empty() || query.is_empty() {
        return None;
    }

    if name == query {
        Some(EXACT_MATCH)
    } else if name.contains(&query) {
        Some(CANDIDATE_CONTAINS_QUERY)
    } else if query.contains(&name) {
        Some(QUERY_CONTAINS_CANDIDATE)
    } else {
        None
    }
}

/// Highest-scoring candidate; on equal scores the earliest one wins.
pub fn best_match<T, I>(candidates: I, query: &str, name_of: impl Fn(&T) -> &str) -> Option<(T, u8)>
where
    I: IntoIterator<Item = T>,
{
    let mut best: Option<(T, u8)> = None;
    for candidate in candidates {
        let Some(score) = score_name_match(name_of(&candidate), query) else {
            continue;
        };
        let better = match &best {
            Some((_, best_score)) => score > *best_score,
            None => true,
        };
        if better {
            best = Some((candidate, score));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_tiers() {
        assert_eq!(score_name_match("Support Open", "support open"), Some(100));
        assert_eq!(score_name_match("Support Open - EU", "support open"), Some(80));
        assert_eq!(score_name_match("Support", "support open"), Some(60));
        assert_eq!(score_name_match("Billing", "support open"), None);
        assert_eq!(score_name_match("", "support"), None);
    }

    #[test]
    fn test_best_match_prefers_higher_score() {
        let names = vec!["Support Open - EU", "Support Open", "Support"];
        let (name, score) = best_match(names, "support open", |n| *n).unwrap();
        assert_eq!(name, "Support Open");
        assert_eq!(score, 100);
    }

    #[test]
    fn test_best_match_ties_keep_first() {
        let names = vec!["Escalations (US)", "Escalations (EU)"];
        let (name, score) = best_match(names, "escalations", |n| *n).unwrap();
        assert_eq!(name, "Escalations (US)");
        assert_eq!(score, 80);
    }
}
