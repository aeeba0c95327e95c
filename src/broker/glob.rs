//! Shell-style glob matching (`*`, `?`) for topic subscription patterns.
//!
//! A small hand-rolled `fnmatch` equivalent — topics are colon-delimited
//! strings (`worker:3:status`), not filesystem paths, so no separator
//! handling is needed beyond the two wildcard characters.

/// Returns true iff `pattern` accepts `topic` under shell-glob semantics:
/// `*` matches any run of characters (including none), `?` matches
/// exactly one character.
pub fn matches(pattern: &str, topic: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let topic: Vec<char> = topic.chars().collect();
    matches_from(&pattern, &topic)
}

fn matches_from(pattern: &[char], topic: &[char]) -> bool {
    match pattern.first() {
        None => topic.is_empty(),
        Some('*') => {
            matches_from(&pattern[1..], topic)
                || (!topic.is_empty() && matches_from(pattern, &topic[1..]))
        }
        Some('?') => !topic.is_empty() && matches_from(&pattern[1..], &topic[1..]),
        Some(c) => topic.first() == Some(c) && matches_from(&pattern[1..], &topic[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches("queue:status", "queue:status"));
        assert!(!matches("queue:status", "queue:jobs"));
    }

    #[test]
    fn test_star_wildcard() {
        assert!(matches("worker:*:status", "worker:3:status"));
        assert!(matches("worker:*:status", "worker:abc:status"));
        assert!(!matches("worker:*:status", "worker:3:progress"));
    }

    #[test]
    fn test_question_wildcard() {
        assert!(matches("worker:?:status", "worker:3:status"));
        assert!(!matches("worker:?:status", "worker:33:status"));
    }

    #[test]
    fn test_trailing_star_matches_everything_after() {
        assert!(matches("system:*", "system:health"));
        assert!(matches("*", "anything:at:all"));
    }

    #[test]
    fn test_empty_pattern_only_matches_empty_topic() {
        assert!(matches("", ""));
        assert!(!matches("", "x"));
    }
}
