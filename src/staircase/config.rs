// StaircaseConfig - immutable parameters for one frequency run

use serde::{Deserialize, Serialize};

use crate::error::StaircaseError;

/// Parameters of one staircase run
///
/// Levels are in dB relative to the fixed reference (0 dB = reference gain).
/// Default values:
/// - initial_level = -20 dB
/// - step_down = 6 dB (after "heard")
/// - step_up = 3 dB (after "not heard")
/// - level bounds = [-60, 0] dB
/// - max_reversals = 4
/// - max_attempts = 20
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaircaseConfig {
    pub initial_level: f32,
    pub step_down: f32,
    pub step_up: f32,
    pub min_level: f32,
    pub max_level: f32,
    pub max_reversals: u32,
    pub max_attempts: u32,
}

impl Default for StaircaseConfig {
    fn default() -> Self {
        Self {
            initial_level: -20.0,
            step_down: 6.0,
            step_up: 3.0,
            min_level: -60.0,
            max_level: 0.0,
            max_reversals: 4,
            max_attempts: 20,
        }
    }
}

impl StaircaseConfig {
    /// Check the config invariants
    ///
    /// # Returns
    /// * `Ok(())` - `min_level <= initial_level <= max_level`, steps > 0, counts > 0
    /// * `Err(StaircaseError::InvalidConfig)` - First violated invariant
    pub fn validate(&self) -> Result<(), StaircaseError> {
        let levels = [
            ("initial_level", self.initial_level),
            ("min_level", self.min_level),
            ("max_level", self.max_level),
            ("step_down", self.step_down),
            ("step_up", self.step_up),
        ];
        if let Some((name, _)) = levels.iter().find(|(_, value)| !value.is_finite()) {
            return Err(invalid(format!("{} must be finite", name)));
        }

        if self.min_level > self.max_level {
            return Err(invalid(format!(
                "min_level ({}) exceeds max_level ({})",
                self.min_level, self.max_level
            )));
        }
        if self.initial_level < self.min_level || self.initial_level > self.max_level {
            return Err(invalid(format!(
                "initial_level ({}) outside [{}, {}]",
                self.initial_level, self.min_level, self.max_level
            )));
        }
        if self.step_down <= 0.0 {
            return Err(invalid("step_down must be > 0".to_string()));
        }
        if self.step_up <= 0.0 {
            return Err(invalid("step_up must be > 0".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts must be > 0".to_string()));
        }
        if self.max_reversals == 0 {
            return Err(invalid("max_reversals must be > 0".to_string()));
        }
        Ok(())
    }

    /// Clamp `level` into `[min_level, max_level]`.
    #[inline]
    pub fn clamp_level(&self, level: f32) -> f32 {
        level.max(self.min_level).min(self.max_level)
    }
}

fn invalid(reason: String) -> StaircaseError {
    StaircaseError::InvalidConfig { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = StaircaseConfig::default();
        assert_eq!(config.initial_level, -20.0);
        assert_eq!(config.step_down, 6.0);
        assert_eq!(config.step_up, 3.0);
        assert_eq!(config.min_level, -60.0);
        assert_eq!(config.max_level, 0.0);
        assert_eq!(config.max_reversals, 4);
        assert_eq!(config.max_attempts, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let config = StaircaseConfig {
            min_level: 10.0,
            max_level: -10.0,
            initial_level: 0.0,
            ..StaircaseConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StaircaseError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_initial_outside_bounds() {
        let config = StaircaseConfig {
            initial_level: 5.0,
            ..StaircaseConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_steps() {
        let down = StaircaseConfig {
            step_down: 0.0,
            ..StaircaseConfig::default()
        };
        let up = StaircaseConfig {
            step_up: -3.0,
            ..StaircaseConfig::default()
        };
        assert!(down.validate().is_err());
        assert!(up.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_nan() {
        let config = StaircaseConfig {
            initial_level: f32::NAN,
            ..StaircaseConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: StaircaseConfig = serde_json::from_str(r#"{"step_down": 10.0}"#).unwrap();
        assert_eq!(config.step_down, 10.0);
        assert_eq!(config.step_up, 3.0);
        assert_eq!(config.max_attempts, 20);
    }
}
