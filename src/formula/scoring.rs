//! Deal completion scoring: how fully qualified a deal record is, based on
//! the four free-text qualification fields.

/// Each populated field contributes an equal share of 100. Whitespace-only
/// text counts as empty.
pub fn completion_score(notes: &str, next_step: &str, pain_points: &str, decision_process: &str) -> i64 {
    let fields = [notes, next_step, pain_points, decision_process];
    let populated = fields.iter().filter(|f| !f.trim().is_empty()).count() as i64;
    populated * 25
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_range_from_zero_to_hundred() {
        assert_eq!(completion_score("", "", "", ""), 0);
        assert_eq!(completion_score("a", "", "", ""), 25);
        assert_eq!(completion_score("a", "b", "c", "d"), 100);
    }

    #[test]
    fn whitespace_only_counts_as_empty() {
        assert_eq!(completion_score("   ", "\t", "x", ""), 25);
    }
}
