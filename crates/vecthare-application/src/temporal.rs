//! Temporal weighting
//!
//! Re-weights chat-sourced chunks by their age in messages. Decay pushes
//! old context down; nostalgia lifts it toward a configured ceiling.
//! Chunks flagged temporally blind keep their score untouched.

use std::collections::HashSet;

use vecthare_domain::error::Result;
use vecthare_domain::value_objects::{DecayMode, DecaySettings, DecayType, SceneRange};

use crate::results::ScoredResult;

/// Multiplier for a chunk of the given age under the settings.
///
/// Ages at or below zero always map to 1.0.
pub fn age_multiplier(settings: &DecaySettings, age: f32) -> f32 {
    if age <= 0.0 {
        return 1.0;
    }
    match settings.decay_type {
        DecayType::Decay => match settings.mode {
            DecayMode::Exponential => {
                let m = 0.5f32.powf(age / settings.half_life);
                m.max(settings.min_relevance)
            }
            DecayMode::Linear => (1.0 - age * settings.linear_rate).max(settings.min_relevance),
        },
        DecayType::Nostalgia => match settings.mode {
            DecayMode::Exponential => {
                1.0 + (settings.max_boost - 1.0) * (1.0 - 0.5f32.powf(age / settings.half_life))
            }
            DecayMode::Linear => (1.0 + age * settings.linear_rate).min(settings.max_boost),
        },
    }
}

/// Apply temporal weighting in place.
///
/// Only chunks whose metadata marks them as chat-sourced are weighted, and
/// only when they carry a message ordinal. Blind hashes keep their score and
/// are flagged. When `scenes` is given, a chunk outside the current scene
/// ages from its scene's closing boundary instead of its own message.
pub fn apply_temporal_weighting(
    results: &mut [ScoredResult],
    settings: &DecaySettings,
    current_message: i64,
    blind_hashes: &HashSet<u32>,
    scenes: Option<&[SceneRange]>,
) -> Result<()> {
    if !settings.enabled {
        return Ok(());
    }
    settings.validate()?;

    for result in results.iter_mut() {
        weight_result(result, settings, current_message, blind_hashes, scenes);
    }

    Ok(())
}

/// Weight one result in place. Settings are assumed validated; callers
/// re-weighting a merged list with per-collection settings use this
/// directly.
pub fn weight_result(
    result: &mut ScoredResult,
    settings: &DecaySettings,
    current_message: i64,
    blind_hashes: &HashSet<u32>,
    scenes: Option<&[SceneRange]>,
) {
    if !settings.enabled || !result.metadata.is_chat_source() {
        return;
    }
    let Some(message_id) = result.metadata.message_id else {
        return;
    };

    if blind_hashes.contains(&result.hash) {
        result.temporally_blind = true;
        result.decay_applied = false;
        result.nostalgia_applied = false;
        return;
    }

    let raw_age = (current_message - message_id).max(0);
    let effective_age = match scenes {
        Some(ranges) => {
            result.scene_aware_decay = true;
            scene_adjusted_age(ranges, message_id, current_message, raw_age)
        }
        None => raw_age,
    };

    let multiplier = age_multiplier(settings, effective_age as f32);
    result.original_score = Some(result.score);
    result.message_age = Some(raw_age);
    if scenes.is_some() {
        result.effective_age = Some(effective_age);
    }
    result.score *= multiplier;
    match settings.decay_type {
        DecayType::Decay => result.decay_applied = true,
        DecayType::Nostalgia => result.nostalgia_applied = true,
    }
}

/// Age of a chunk under scene-aware weighting.
///
/// Chunks inside the current scene keep their raw age. Chunks in an earlier
/// scene age from that scene's nearest boundary to now, so a whole closed
/// scene fades as one unit.
fn scene_adjusted_age(
    scenes: &[SceneRange],
    message_id: i64,
    current_message: i64,
    raw_age: i64,
) -> i64 {
    let containing = scenes
        .iter()
        .find(|s| message_id >= s.start && s.end.is_none_or(|end| message_id <= end));

    match containing {
        Some(scene) => {
            let in_current_scene =
                current_message >= scene.start && scene.end.is_none_or(|end| current_message <= end);
            if in_current_scene {
                raw_age
            } else {
                match scene.end {
                    Some(end) => (current_message - end).max(0),
                    None => raw_age,
                }
            }
        }
        None => raw_age,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vecthare_domain::value_objects::ChunkMetadata;

    fn chat_result(hash: u32, score: f32, message_id: i64) -> ScoredResult {
        let mut r = ScoredResult::new(hash, score);
        r.metadata = ChunkMetadata::with_source("chat");
        r.metadata.message_id = Some(message_id);
        r
    }

    fn decay_settings() -> DecaySettings {
        DecaySettings {
            enabled: true,
            decay_type: DecayType::Decay,
            mode: DecayMode::Exponential,
            half_life: 50.0,
            linear_rate: 0.01,
            min_relevance: 0.3,
            max_boost: 1.5,
        }
    }

    #[test]
    fn age_zero_multiplier_is_one() {
        assert_eq!(age_multiplier(&decay_settings(), 0.0), 1.0);
    }

    #[test]
    fn exponential_decay_halves_at_half_life() {
        // Score 1.0 at age 50 with halfLife 50 decays to 0.5; at age 100 the
        // 0.25 raw value floors at minRelevance 0.3
        let settings = decay_settings();
        let mut results = vec![chat_result(1, 1.0, 50), chat_result(2, 1.0, 0)];
        apply_temporal_weighting(&mut results, &settings, 100, &HashSet::new(), None).unwrap();

        assert!((results[0].score - 0.5).abs() < 1e-4);
        assert!((results[1].score - 0.3).abs() < 1e-4);
        assert!(results.iter().all(|r| r.decay_applied));
        assert_eq!(results[0].original_score, Some(1.0));
        assert_eq!(results[0].message_age, Some(50));
    }

    #[test]
    fn blind_chunk_keeps_score_and_carries_flag() {
        let settings = decay_settings();
        let mut results = vec![chat_result(1, 0.9, 0), chat_result(2, 0.9, 0)];
        let blind: HashSet<u32> = [1].into_iter().collect();
        apply_temporal_weighting(&mut results, &settings, 100, &blind, None).unwrap();

        assert_eq!(results[0].score, 0.9);
        assert!(results[0].temporally_blind);
        assert!(!results[0].decay_applied);

        assert!(results[1].score < 0.9);
        assert!(results[1].decay_applied);
    }

    #[test]
    fn disabled_settings_leave_scores_untouched() {
        let mut settings = decay_settings();
        settings.enabled = false;
        let mut results = vec![chat_result(1, 0.8, 0)];
        apply_temporal_weighting(&mut results, &settings, 500, &HashSet::new(), None).unwrap();
        assert_eq!(results[0].score, 0.8);
        assert!(!results[0].decay_applied);
        assert!(results[0].original_score.is_none());
    }

    #[test]
    fn non_chat_chunks_are_immune() {
        let settings = decay_settings();
        let mut r = ScoredResult::new(1, 0.7);
        r.metadata = ChunkMetadata::with_source("doc");
        r.metadata.message_id = Some(0);
        let mut results = vec![r];
        apply_temporal_weighting(&mut results, &settings, 1000, &HashSet::new(), None).unwrap();
        assert_eq!(results[0].score, 0.7);
    }

    #[test]
    fn decay_never_drops_below_min_relevance_of_original() {
        let settings = decay_settings();
        for age in [1_i64, 10, 100, 10_000] {
            let mut results = vec![chat_result(1, 0.8, 0)];
            apply_temporal_weighting(&mut results, &settings, age, &HashSet::new(), None).unwrap();
            assert!(results[0].score >= settings.min_relevance * 0.8 - 1e-6);
        }
    }

    #[test]
    fn linear_decay_floors() {
        let mut settings = decay_settings();
        settings.mode = DecayMode::Linear;
        settings.linear_rate = 0.02;
        assert!((age_multiplier(&settings, 10.0) - 0.8).abs() < 1e-6);
        assert!((age_multiplier(&settings, 1000.0) - settings.min_relevance).abs() < 1e-6);
    }

    #[test]
    fn exponential_nostalgia_approaches_max_boost() {
        let mut settings = decay_settings();
        settings.decay_type = DecayType::Nostalgia;
        let near = age_multiplier(&settings, 5000.0);
        assert!(near < settings.max_boost + 1e-6);
        assert!((settings.max_boost - near) < 1e-3);
        // monotonic toward the ceiling
        assert!(age_multiplier(&settings, 10.0) < age_multiplier(&settings, 100.0));
    }

    #[test]
    fn linear_nostalgia_caps_at_max_boost() {
        let mut settings = decay_settings();
        settings.decay_type = DecayType::Nostalgia;
        settings.mode = DecayMode::Linear;
        settings.linear_rate = 0.1;
        assert!((age_multiplier(&settings, 3.0) - 1.3).abs() < 1e-6);
        assert_eq!(age_multiplier(&settings, 100.0), settings.max_boost);
    }

    #[test]
    fn nostalgia_marks_its_own_flag() {
        let mut settings = decay_settings();
        settings.decay_type = DecayType::Nostalgia;
        let mut results = vec![chat_result(1, 0.5, 0)];
        apply_temporal_weighting(&mut results, &settings, 200, &HashSet::new(), None).unwrap();
        assert!(results[0].nostalgia_applied);
        assert!(!results[0].decay_applied);
        assert!(results[0].score > 0.5);
    }

    #[test]
    fn scene_aware_ages_from_scene_boundary() {
        let settings = decay_settings();
        let scenes = vec![
            SceneRange {
                start: 0,
                end: Some(40),
            },
            SceneRange {
                start: 41,
                end: None,
            },
        ];
        // Chunk at message 10 sits in the closed scene; with the cursor at
        // 100, it ages from the boundary at 40, not from 10
        let mut results = vec![chat_result(1, 1.0, 10), chat_result(2, 1.0, 50)];
        apply_temporal_weighting(&mut results, &settings, 100, &HashSet::new(), Some(&scenes))
            .unwrap();

        assert!(results[0].scene_aware_decay);
        assert_eq!(results[0].effective_age, Some(60));
        assert_eq!(results[0].message_age, Some(90));
        // Chunk in the open current scene keeps its raw age
        assert_eq!(results[1].effective_age, Some(50));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut settings = decay_settings();
        settings.half_life = -1.0;
        let mut results = vec![chat_result(1, 1.0, 0)];
        let err = apply_temporal_weighting(&mut results, &settings, 10, &HashSet::new(), None);
        assert!(err.is_err());
    }
}
