use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s'-]").unwrap());
static EDGE_TRIM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^['-]+|['-]+$").unwrap());

/// Tokenize text into lowercase words.
/// Preserves apostrophes and hyphens inside words ("don't", "high-energy")
/// so semantic tags survive as single tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned = NON_WORD.replace_all(text, " ");
    cleaned
        .to_lowercase()
        .split_whitespace()
        .map(|t| EDGE_TRIM.replace_all(t, "").to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Unique lowercase keywords of at least `min_len` characters.
pub fn keywords(text: &str, min_len: usize) -> HashSet<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.chars().count() >= min_len)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_tokenize() {
        let tokens = tokenize("Hello, world!");
        assert_eq!(tokens, vec!["hello", "world"]);
    }

    #[test]
    fn test_apostrophe_and_hyphen_preserved() {
        let tokens = tokenize("Don't stop the high-energy loop!");
        assert_eq!(tokens, vec!["don't", "stop", "the", "high-energy", "loop"]);
    }

    #[test]
    fn test_leading_trailing_marks_stripped() {
        let tokens = tokenize("'hello' -world-");
        assert_eq!(tokens, vec!["hello", "world"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t\n  ").is_empty());
    }

    #[test]
    fn test_keywords_dedupe_and_length_filter() {
        let kw = keywords("a calm calm sea of ideas", 3);
        assert_eq!(kw.len(), 3);
        assert!(kw.contains("calm"));
        assert!(kw.contains("sea"));
        assert!(!kw.contains("of"));
    }
}
