//! Tokenization for sparse scoring
//!
//! Lowercase, strip punctuation, split on whitespace, optionally stem and
//! drop stop-words, drop short tokens, deduplicate.

use std::collections::HashSet;

use crate::keywords::stopwords::is_stop_word;

use super::porter::PorterStemmer;

/// Tokenizer pipeline switches
#[derive(Debug, Clone, Copy)]
pub struct TokenizerOptions {
    /// Run the Porter stemmer over each token
    pub stem: bool,
    /// Drop stock stop-words
    pub remove_stop_words: bool,
    /// Drop tokens shorter than this many characters
    pub min_length: usize,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        Self {
            stem: true,
            remove_stop_words: true,
            min_length: 2,
        }
    }
}

/// Tokenize text through the full pipeline.
///
/// Token order follows first occurrence; repeated tokens are deduplicated.
pub fn tokenize(text: &str, options: TokenizerOptions, stemmer: &PorterStemmer) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();

    for word in text.to_lowercase().split_whitespace() {
        let cleaned: String = word
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '\'')
            .collect();
        let cleaned = cleaned.trim_matches('\'');
        if cleaned.is_empty() {
            continue;
        }
        if options.remove_stop_words && is_stop_word(cleaned) {
            continue;
        }
        let token = if options.stem {
            stemmer.stem(cleaned)
        } else {
            cleaned.to_string()
        };
        if token.chars().count() < options.min_length {
            continue;
        }
        if seen.insert(token.clone()) {
            tokens.push(token);
        }
    }

    tokens
}

/// Tokenize without stemming or stop-word removal.
pub fn tokenize_simple(text: &str) -> Vec<String> {
    static PASSTHROUGH: once_cell::sync::Lazy<PorterStemmer> =
        once_cell::sync::Lazy::new(PorterStemmer::new);
    tokenize(
        text,
        TokenizerOptions {
            stem: false,
            remove_stop_words: false,
            min_length: 2,
        },
        &PASSTHROUGH,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_lowercases() {
        let tokens = tokenize_simple("Hello, World! (Again)");
        assert_eq!(tokens, vec!["hello", "world", "again"]);
    }

    #[test]
    fn full_pipeline_stems_and_drops_stop_words() {
        let stemmer = PorterStemmer::new();
        let tokens = tokenize(
            "The dragons were running through the castle",
            TokenizerOptions::default(),
            &stemmer,
        );
        assert!(tokens.contains(&"dragon".to_string()));
        assert!(tokens.contains(&"run".to_string()));
        assert!(tokens.contains(&"castl".to_string()));
        assert!(!tokens.iter().any(|t| t == "the" || t == "were"));
    }

    #[test]
    fn deduplicates_preserving_first_occurrence() {
        let tokens = tokenize_simple("alpha beta alpha gamma beta");
        assert_eq!(tokens, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn short_tokens_are_dropped() {
        let tokens = tokenize_simple("a an x yz abc");
        assert_eq!(tokens, vec!["an", "yz", "abc"]);
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(tokenize_simple("").is_empty());
        assert!(tokenize_simple("  \t\n ").is_empty());
    }
}
