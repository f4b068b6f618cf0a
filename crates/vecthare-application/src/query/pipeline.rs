//! Re-ranking pipeline helpers
//!
//! Keyword boosting, over-fetch clamping, deduplication against the host's
//! active injections, and final payload formatting.

use std::collections::HashSet;

use vecthare_domain::ports::ActiveInjection;

use crate::results::ScoredResult;

/// Cap on any single keyword's boost contribution
const PER_KEYWORD_CAP: f32 = 0.5;

/// Over-fetch bounds: retrieval always asks for at least this many
const OVERFETCH_MIN: usize = 10;

/// ... and never more than this many
const OVERFETCH_MAX: usize = 100;

/// Candidates to request so boosting and re-weighting have room to reorder:
/// twice the final count, clamped to `[10, 100]`.
pub fn overfetch_count(top_k: usize) -> usize {
    (top_k * 2).clamp(OVERFETCH_MIN, OVERFETCH_MAX)
}

/// Boost results whose stored keywords appear in the query context.
///
/// Each matched keyword contributes its weight above baseline, capped at
/// 0.5; the summed contribution is scaled by `(count + 1) / (count + 2)` so
/// additional matches keep helping but with diminishing returns. Disabled
/// keywords and user overrides are honoured through the chunk metadata.
pub fn apply_keyword_boost(results: &mut [ScoredResult], context: &str) {
    let context_lower = context.to_lowercase();

    for result in results.iter_mut() {
        let mut total = 0.0f32;
        let mut count = 0usize;

        for keyword in &result.metadata.keywords {
            let Some(weight) = result.metadata.keyword_weight(&keyword.text) else {
                continue;
            };
            if !context_lower.contains(&keyword.text.to_lowercase()) {
                continue;
            }
            total += (weight - 1.0).max(0.0).min(PER_KEYWORD_CAP);
            count += 1;
        }

        if count == 0 {
            continue;
        }
        let scale = (count as f32 + 1.0) / (count as f32 + 2.0);
        let boost = 1.0 + total * scale;
        result.score *= boost;
        result.keyword_boost = Some(boost);
    }
}

/// Drop results already present in the host's active injections, matching
/// by UID (the chunk hash) or by normalized (trimmed, lowercased) content.
pub fn deduplicate_against_active(
    results: Vec<ScoredResult>,
    active: &[ActiveInjection],
) -> Vec<ScoredResult> {
    if active.is_empty() {
        return results;
    }

    let uids: HashSet<&str> = active.iter().map(|a| a.uid.as_str()).collect();
    let contents: HashSet<String> = active
        .iter()
        .map(|a| normalize_content(&a.content))
        .collect();

    results
        .into_iter()
        .filter(|r| {
            !uids.contains(r.hash.to_string().as_str())
                && !contents.contains(&normalize_content(&r.text))
        })
        .collect()
}

fn normalize_content(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Format the final payload: optional context prefix, results separated by
/// blank lines, optional XML wrapping tag.
pub fn format_injection(
    results: &[ScoredResult],
    rag_context: &str,
    xml_tag: Option<&str>,
) -> String {
    let body = results
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let with_prefix = if rag_context.trim().is_empty() {
        body
    } else {
        format!("{}\n{}", rag_context.trim(), body)
    };

    match xml_tag {
        Some(tag) if !tag.trim().is_empty() => {
            let tag = tag.trim();
            format!("<{tag}>\n{with_prefix}\n</{tag}>")
        }
        _ => with_prefix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vecthare_domain::value_objects::Keyword;

    #[test]
    fn overfetch_clamps_both_ends() {
        assert_eq!(overfetch_count(1), 10);
        assert_eq!(overfetch_count(5), 10);
        assert_eq!(overfetch_count(12), 24);
        assert_eq!(overfetch_count(50), 100);
        assert_eq!(overfetch_count(500), 100);
    }

    #[test]
    fn keyword_boost_scales_with_diminishing_returns() {
        let mut one_match = ScoredResult::new(1, 1.0);
        one_match.metadata.keywords = vec![Keyword::new("dragon", 1.4)];

        let mut two_matches = ScoredResult::new(2, 1.0);
        two_matches.metadata.keywords =
            vec![Keyword::new("dragon", 1.4), Keyword::new("castle", 1.4)];

        let mut results = vec![one_match, two_matches];
        apply_keyword_boost(&mut results, "the dragon circles the castle");

        // one match: 0.4 * (2/3); two matches: 0.8 * (3/4)
        assert!((results[0].score - (1.0 + 0.4 * (2.0 / 3.0))).abs() < 1e-5);
        assert!((results[1].score - (1.0 + 0.8 * 0.75)).abs() < 1e-5);
        // second keyword helped, but less than double
        assert!(results[1].score < 2.0 * results[0].score);
        assert!(results[1].keyword_boost.unwrap() > results[0].keyword_boost.unwrap());
    }

    #[test]
    fn keyword_contribution_is_capped() {
        let mut result = ScoredResult::new(1, 1.0);
        result.metadata.keywords = vec![Keyword::new("dragon", 3.0)];
        let mut results = vec![result];
        apply_keyword_boost(&mut results, "dragon");
        // weight 3.0 would contribute 2.0 uncapped; the cap holds it at 0.5
        assert!((results[0].score - (1.0 + 0.5 * (2.0 / 3.0))).abs() < 1e-5);
    }

    #[test]
    fn unmatched_and_disabled_keywords_do_not_boost() {
        let mut result = ScoredResult::new(1, 1.0);
        result.metadata.keywords =
            vec![Keyword::new("dragon", 1.5), Keyword::new("kraken", 1.5)];
        result.metadata.disabled_keywords = vec!["dragon".to_string()];
        let mut results = vec![result];
        apply_keyword_boost(&mut results, "the dragon sleeps");
        assert_eq!(results[0].score, 1.0);
        assert!(results[0].keyword_boost.is_none());
    }

    #[test]
    fn dedup_drops_uid_and_content_matches() {
        let mut by_uid = ScoredResult::new(12345, 0.9);
        by_uid.text = "completely novel text".to_string();
        let mut by_content = ScoredResult::new(2, 0.8);
        by_content.text = "  The Dragon Sleeps  ".to_string();
        let mut kept = ScoredResult::new(3, 0.7);
        kept.text = "something new entirely".to_string();

        let active = vec![
            ActiveInjection {
                uid: "12345".to_string(),
                content: "other".to_string(),
            },
            ActiveInjection {
                uid: "x".to_string(),
                content: "the dragon sleeps".to_string(),
            },
        ];

        let out = deduplicate_against_active(vec![by_uid, by_content, kept], &active);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].hash, 3);
    }

    #[test]
    fn formatting_applies_prefix_and_xml_tag() {
        let mut a = ScoredResult::new(1, 0.9);
        a.text = "first".to_string();
        let mut b = ScoredResult::new(2, 0.8);
        b.text = "second".to_string();
        let results = vec![a, b];

        let plain = format_injection(&results, "Past events:", None);
        assert_eq!(plain, "Past events:\nfirst\n\nsecond");

        let wrapped = format_injection(&results, "", Some("memories"));
        assert_eq!(wrapped, "<memories>\nfirst\n\nsecond\n</memories>");
    }
}
