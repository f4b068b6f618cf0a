//! Keyword extraction
//!
//! Produces weighted keywords from chunk text. Four extraction levels
//! trade scan depth for keyword count; several variants specialize for
//! plain text, TF-IDF style weighting, entity-aware extraction, lorebook
//! trigger keys, and chat prose.

pub mod stopwords;

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use vecthare_domain::value_objects::{Keyword, LorebookEntry};

use stopwords::{is_stop_word, parse_custom_stop_words};

/// Weight floor and ceiling for extracted keywords
const WEIGHT_RANGE: (f32, f32) = (1.0, 3.0);

/// Extraction depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionLevel {
    /// No extraction
    Off,
    /// Scan the first 500 chars, keep up to 3 keywords
    Minimal,
    /// Scan the first 1000 chars, keep up to 8 keywords
    #[default]
    Balanced,
    /// Scan the full text, keep up to 15 keywords
    Aggressive,
}

/// Per-level extraction parameters
#[derive(Debug, Clone, Copy)]
pub struct LevelParams {
    /// Characters scanned from the head of the text; `None` scans everything
    pub scan_chars: Option<usize>,
    /// Maximum keywords kept
    pub max_keywords: usize,
    /// Minimum occurrences for a token to qualify
    pub min_frequency: usize,
}

impl ExtractionLevel {
    /// Parameters for this level; `None` when extraction is off
    pub fn params(&self) -> Option<LevelParams> {
        match self {
            Self::Off => None,
            Self::Minimal => Some(LevelParams {
                scan_chars: Some(500),
                max_keywords: 3,
                min_frequency: 1,
            }),
            Self::Balanced => Some(LevelParams {
                scan_chars: Some(1000),
                max_keywords: 8,
                min_frequency: 1,
            }),
            Self::Aggressive => Some(LevelParams {
                scan_chars: None,
                max_keywords: 15,
                min_frequency: 1,
            }),
        }
    }
}

static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());
static ITALICS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*[^*]+\*").unwrap());

/// Keyword extractor configured with a level and custom stop-words
pub struct KeywordExtractor {
    level: ExtractionLevel,
    custom_stop_words: HashSet<String>,
}

impl KeywordExtractor {
    /// Create an extractor at the given level
    pub fn new(level: ExtractionLevel) -> Self {
        Self {
            level,
            custom_stop_words: HashSet::new(),
        }
    }

    /// Add custom stop-words from a comma-separated string.
    ///
    /// The raw string is run through `expand` first so host macros like
    /// `{{char}}` resolve before parsing.
    pub fn with_custom_stop_words<F: Fn(&str) -> String>(mut self, raw: &str, expand: F) -> Self {
        self.custom_stop_words = parse_custom_stop_words(&expand(raw));
        self
    }

    fn is_stop(&self, word: &str) -> bool {
        is_stop_word(word) || self.custom_stop_words.contains(word)
    }

    /// Frequency-based extraction over the level's head window.
    ///
    /// Strips possessives, parenthetical citations, and italic emphasis
    /// before counting; weight grows with frequency, clamped to `[1, 3]`.
    pub fn extract_text_keywords(&self, text: &str) -> Vec<Keyword> {
        let Some(params) = self.level.params() else {
            return Vec::new();
        };

        let counts = self.count_tokens(text, &params);
        let mut keywords: Vec<Keyword> = counts
            .into_iter()
            .filter(|(_, freq)| *freq >= params.min_frequency)
            .map(|(word, freq)| Keyword::new(word, frequency_weight(freq)))
            .collect();

        finalize(&mut keywords, params.max_keywords);
        keywords
    }

    /// TF-IDF style extraction against the implicit single-document corpus,
    /// with a boost for terms the author capitalizes mid-sentence.
    pub fn extract_bm25_keywords(&self, text: &str) -> Vec<Keyword> {
        let Some(params) = self.level.params() else {
            return Vec::new();
        };

        let window = head_window(text, params.scan_chars);
        let capitalized = capitalized_terms(window);
        let counts = self.count_tokens(text, &params);
        let total: usize = counts.values().sum();
        if total == 0 {
            return Vec::new();
        }

        let mut keywords: Vec<Keyword> = counts
            .into_iter()
            .filter(|(_, freq)| *freq >= params.min_frequency)
            .map(|(word, freq)| {
                // tf scaled against document mass; idf degenerates to a
                // constant with one document
                let tf = freq as f32 / total as f32;
                let mut weight = 1.0 + tf * 10.0;
                if capitalized.contains(&word) {
                    weight += 0.5;
                }
                Keyword::new(word, clamp_weight(weight))
            })
            .collect();

        finalize(&mut keywords, params.max_keywords);
        keywords
    }

    /// Entity-aware extraction: frequency weighting plus proper-noun and
    /// acronym detection, with a position weight favouring early mentions.
    pub fn extract_smart_keywords(&self, text: &str) -> Vec<Keyword> {
        let Some(params) = self.level.params() else {
            return Vec::new();
        };

        let window = head_window(text, params.scan_chars);
        let entities = detect_entities(window);
        let window_len = window.chars().count().max(1);
        let counts = self.count_tokens(text, &params);

        let mut keywords: Vec<Keyword> = counts
            .into_iter()
            .filter(|(_, freq)| *freq >= params.min_frequency)
            .map(|(word, freq)| {
                let mut weight = frequency_weight(freq);
                if entities.contains(&word) {
                    weight += 0.75;
                }
                if let Some(pos) = window.to_lowercase().find(&word) {
                    // Early occurrences carry more signal
                    let position_factor = 1.0 - (pos as f32 / window_len as f32);
                    weight += 0.5 * position_factor;
                }
                Keyword::new(word, clamp_weight(weight))
            })
            .collect();

        finalize(&mut keywords, params.max_keywords);
        keywords
    }

    /// Keywords from a lorebook entry's trigger keys.
    ///
    /// Primary keys outweigh secondary ones; everything is lowercased,
    /// deduplicated, and filtered against stock and custom stop-words.
    pub fn extract_lorebook_keywords(&self, entry: &LorebookEntry) -> Vec<Keyword> {
        let mut seen = HashSet::new();
        let mut keywords = Vec::new();

        for (keys, weight) in [(&entry.key, 2.0f32), (&entry.keysecondary, 1.5f32)] {
            for key in keys {
                let word = key.trim().to_lowercase();
                if word.chars().count() < 2 || self.is_stop(&word) {
                    continue;
                }
                if seen.insert(word.clone()) {
                    keywords.push(Keyword::new(word, clamp_weight(weight)));
                }
            }
        }

        keywords
    }

    /// Keywords from chat prose: proper nouns that do not open a sentence.
    pub fn extract_chat_keywords(&self, text: &str) -> Vec<Keyword> {
        let Some(params) = self.level.params() else {
            return Vec::new();
        };

        let window = head_window(text, params.scan_chars);
        let mut counts: HashMap<String, usize> = HashMap::new();

        for noun in proper_nouns_mid_sentence(window) {
            let word = noun.to_lowercase();
            if word.chars().count() < 2 || self.is_stop(&word) {
                continue;
            }
            *counts.entry(word).or_insert(0) += 1;
        }

        let mut keywords: Vec<Keyword> = counts
            .into_iter()
            .map(|(word, freq)| Keyword::new(word, frequency_weight(freq)))
            .collect();

        finalize(&mut keywords, params.max_keywords);
        keywords
    }

    /// Tokenize the scan window and count occurrences after cleanup
    fn count_tokens(&self, text: &str, params: &LevelParams) -> HashMap<String, usize> {
        let window = head_window(text, params.scan_chars);
        let cleaned = ITALICS.replace_all(window, " ");
        let cleaned = PARENTHETICAL.replace_all(&cleaned, " ");

        let mut counts: HashMap<String, usize> = HashMap::new();
        for word in cleaned.split_whitespace() {
            let token: String = word
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '\'')
                .collect::<String>()
                .to_lowercase();
            // Possessive stripping
            let token = token
                .strip_suffix("'s")
                .unwrap_or(&token)
                .trim_matches('\'')
                .to_string();
            if token.chars().count() < 2 || self.is_stop(&token) {
                continue;
            }
            *counts.entry(token).or_insert(0) += 1;
        }
        counts
    }
}

/// The head of `text` limited to `scan_chars` characters
fn head_window(text: &str, scan_chars: Option<usize>) -> &str {
    match scan_chars {
        Some(limit) => {
            let end = text
                .char_indices()
                .nth(limit)
                .map_or(text.len(), |(i, _)| i);
            &text[..end]
        }
        None => text,
    }
}

fn frequency_weight(freq: usize) -> f32 {
    clamp_weight(1.0 + (freq.saturating_sub(1)) as f32 * 0.25)
}

fn clamp_weight(weight: f32) -> f32 {
    weight.clamp(WEIGHT_RANGE.0, WEIGHT_RANGE.1)
}

/// Sort by weight descending (ties alphabetically for determinism) and trim
fn finalize(keywords: &mut Vec<Keyword>, max: usize) {
    keywords.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.text.cmp(&b.text))
    });
    keywords.truncate(max);
}

/// Lowercased terms that appear capitalized mid-sentence in the window
fn capitalized_terms(text: &str) -> HashSet<String> {
    proper_nouns_mid_sentence(text)
        .into_iter()
        .map(|w| w.to_lowercase())
        .collect()
}

/// Proper nouns (capitalized, not opening a sentence) and acronyms
fn detect_entities(text: &str) -> HashSet<String> {
    let mut entities: HashSet<String> = proper_nouns_mid_sentence(text)
        .into_iter()
        .map(|w| w.to_lowercase())
        .collect();

    for word in text.split_whitespace() {
        let cleaned: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
        if cleaned.chars().count() >= 2 && cleaned.chars().all(|c| c.is_ascii_uppercase()) {
            entities.insert(cleaned.to_lowercase());
        }
    }

    entities
}

/// Capitalized words that do not start a sentence
fn proper_nouns_mid_sentence(text: &str) -> Vec<String> {
    let mut nouns = Vec::new();
    let mut sentence_start = true;

    for word in text.split_whitespace() {
        let cleaned: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
        if cleaned.is_empty() {
            continue;
        }

        let starts_upper = cleaned.chars().next().is_some_and(|c| c.is_uppercase());
        let rest_lower = cleaned.chars().skip(1).any(|c| c.is_lowercase());
        if !sentence_start && starts_upper && rest_lower {
            nouns.push(cleaned.clone());
        }

        sentence_start = word.ends_with(['.', '!', '?']);
    }

    nouns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_level_extracts_nothing() {
        let extractor = KeywordExtractor::new(ExtractionLevel::Off);
        assert!(extractor.extract_text_keywords("Dragons and castles").is_empty());
    }

    #[test]
    fn level_parameters_match_the_table() {
        let minimal = ExtractionLevel::Minimal.params().unwrap();
        assert_eq!(minimal.scan_chars, Some(500));
        assert_eq!(minimal.max_keywords, 3);

        let balanced = ExtractionLevel::Balanced.params().unwrap();
        assert_eq!(balanced.scan_chars, Some(1000));
        assert_eq!(balanced.max_keywords, 8);

        let aggressive = ExtractionLevel::Aggressive.params().unwrap();
        assert_eq!(aggressive.scan_chars, None);
        assert_eq!(aggressive.max_keywords, 15);
    }

    #[test]
    fn frequency_extraction_ranks_repeats_higher() {
        let extractor = KeywordExtractor::new(ExtractionLevel::Balanced);
        let keywords = extractor
            .extract_text_keywords("dragon dragon dragon castle castle moat");
        assert_eq!(keywords[0].text, "dragon");
        assert!(keywords[0].weight > keywords[1].weight);
        assert!(keywords.iter().all(|k| (1.0..=3.0).contains(&k.weight)));
    }

    #[test]
    fn stop_words_and_short_tokens_are_dropped() {
        let extractor = KeywordExtractor::new(ExtractionLevel::Aggressive);
        let keywords = extractor.extract_text_keywords("the a of and I it dragon");
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].text, "dragon");
    }

    #[test]
    fn custom_stop_words_are_honoured_after_macro_expansion() {
        let extractor = KeywordExtractor::new(ExtractionLevel::Aggressive)
            .with_custom_stop_words("{{char}},castle", |s| s.replace("{{char}}", "alice"));
        let keywords = extractor.extract_text_keywords("alice met a dragon at the castle");
        let words: Vec<&str> = keywords.iter().map(|k| k.text.as_str()).collect();
        assert!(!words.contains(&"alice"));
        assert!(!words.contains(&"castle"));
        assert!(words.contains(&"dragon"));
    }

    #[test]
    fn possessives_and_parentheticals_are_stripped() {
        let extractor = KeywordExtractor::new(ExtractionLevel::Aggressive);
        let keywords = extractor.extract_text_keywords("Morgana's tower (see chapter 3) stood");
        let words: Vec<&str> = keywords.iter().map(|k| k.text.as_str()).collect();
        assert!(words.contains(&"morgana"));
        assert!(!words.contains(&"morgana's"));
        assert!(!words.contains(&"chapter"));
    }

    #[test]
    fn minimal_level_caps_keyword_count() {
        let extractor = KeywordExtractor::new(ExtractionLevel::Minimal);
        let keywords = extractor
            .extract_text_keywords("alpha beta gamma delta epsilon zeta keywords galore");
        assert!(keywords.len() <= 3);
    }

    #[test]
    fn bm25_variant_boosts_capitalized_terms() {
        let extractor = KeywordExtractor::new(ExtractionLevel::Aggressive);
        let keywords =
            extractor.extract_bm25_keywords("the village feared Morgana and the village walls");
        let morgana = keywords.iter().find(|k| k.text == "morgana").unwrap();
        let village = keywords.iter().find(|k| k.text == "village").unwrap();
        // village occurs twice but morgana's capitalization boost closes the gap
        assert!(morgana.weight > village.weight - 0.5);
    }

    #[test]
    fn smart_variant_detects_acronyms() {
        let extractor = KeywordExtractor::new(ExtractionLevel::Aggressive);
        let keywords = extractor.extract_smart_keywords("the NASA probe reached the outer belt");
        let nasa = keywords.iter().find(|k| k.text == "nasa");
        assert!(nasa.is_some());
        assert!(nasa.unwrap().weight > 1.0);
    }

    #[test]
    fn lorebook_keys_are_deduplicated_and_weighted() {
        let entry = LorebookEntry {
            uid: "1".into(),
            key: vec!["Dragon".into(), "dragon".into(), "a".into()],
            keysecondary: vec!["Lair".into(), "the".into()],
            content: String::new(),
            comment: String::new(),
        };
        let extractor = KeywordExtractor::new(ExtractionLevel::Balanced);
        let keywords = extractor.extract_lorebook_keywords(&entry);
        assert_eq!(keywords.len(), 2);
        let dragon = keywords.iter().find(|k| k.text == "dragon").unwrap();
        let lair = keywords.iter().find(|k| k.text == "lair").unwrap();
        assert!(dragon.weight > lair.weight);
    }

    #[test]
    fn chat_variant_skips_sentence_initial_capitals() {
        let extractor = KeywordExtractor::new(ExtractionLevel::Aggressive);
        let keywords =
            extractor.extract_chat_keywords("Hello there. We visited Ravenholm with Alyx.");
        let words: Vec<&str> = keywords.iter().map(|k| k.text.as_str()).collect();
        assert!(words.contains(&"ravenholm"));
        assert!(words.contains(&"alyx"));
        assert!(!words.contains(&"hello"));
        assert!(!words.contains(&"we"));
    }
}
