//! Temporal Weighting Settings

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Direction of temporal re-weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecayType {
    /// Older chunks score lower
    #[default]
    Decay,
    /// Older chunks are boosted toward `max_boost`
    Nostalgia,
}

/// Shape of the age curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecayMode {
    /// Half-life curve: `0.5 ^ (age / half_life)`
    #[default]
    Exponential,
    /// Straight line: `1 - age * linear_rate`
    Linear,
}

/// Value Object: Temporal Weighting Configuration
///
/// ## Business Rules
///
/// - `half_life > 0`
/// - `linear_rate` in `(0, 1]`
/// - `min_relevance` in `[0, 1]`
/// - `max_boost` in `[1, 3]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecaySettings {
    /// Whether temporal weighting runs at all
    pub enabled: bool,
    /// Decay or nostalgia
    #[serde(rename = "type")]
    pub decay_type: DecayType,
    /// Exponential or linear curve
    pub mode: DecayMode,
    /// Age in messages at which an exponential curve halves
    pub half_life: f32,
    /// Per-message decrement for linear curves
    pub linear_rate: f32,
    /// Floor multiplier for decay
    pub min_relevance: f32,
    /// Ceiling multiplier for nostalgia
    pub max_boost: f32,
}

impl Default for DecaySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            decay_type: DecayType::Decay,
            mode: DecayMode::Exponential,
            half_life: 50.0,
            linear_rate: 0.01,
            min_relevance: 0.3,
            max_boost: 1.5,
        }
    }
}

impl DecaySettings {
    /// Validate the configured ranges
    pub fn validate(&self) -> Result<()> {
        if self.half_life <= 0.0 {
            return Err(Error::invalid_argument(format!(
                "Decay half_life must be positive, got {}",
                self.half_life
            )));
        }
        if self.linear_rate <= 0.0 || self.linear_rate > 1.0 {
            return Err(Error::invalid_argument(format!(
                "Decay linear_rate must be in (0, 1], got {}",
                self.linear_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.min_relevance) {
            return Err(Error::invalid_argument(format!(
                "Decay min_relevance must be in [0, 1], got {}",
                self.min_relevance
            )));
        }
        if !(1.0..=3.0).contains(&self.max_boost) {
            return Err(Error::invalid_argument(format!(
                "Decay max_boost must be in [1, 3], got {}",
                self.max_boost
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        DecaySettings::default().validate().unwrap();
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut s = DecaySettings::default();
        s.half_life = 0.0;
        assert!(s.validate().is_err());

        let mut s = DecaySettings::default();
        s.linear_rate = 1.5;
        assert!(s.validate().is_err());

        let mut s = DecaySettings::default();
        s.min_relevance = -0.1;
        assert!(s.validate().is_err());

        let mut s = DecaySettings::default();
        s.max_boost = 4.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn wire_names_are_camel_case() {
        let s = DecaySettings::default();
        let json = serde_json::to_value(&s).unwrap();
        assert!(json.get("halfLife").is_some());
        assert!(json.get("minRelevance").is_some());
        assert_eq!(json["type"], "decay");
        assert_eq!(json["mode"], "exponential");
    }
}
