//! Hysteresis controller for the case heating element.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};

/// Default switch-on threshold in degrees Celsius.
pub const DEFAULT_TEMP_ON: f64 = 4.0;

/// Default switch-off threshold in degrees Celsius.
pub const DEFAULT_TEMP_OFF: f64 = 6.0;

/// Logical state of the heating element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaterState {
    Off,
    On,
}

impl HeaterState {
    /// Whether this state drives the output pin high.
    pub fn is_on(self) -> bool {
        matches!(self, HeaterState::On)
    }
}

/// Hysteresis thresholds. The band between `on_threshold` and
/// `off_threshold` is a dead band: no transition occurs inside it, which
/// keeps the relay from chattering around a single setpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HeaterConfig {
    /// Heater switches on strictly below this temperature
    pub on_threshold: f64,
    /// Heater switches off strictly above this temperature
    pub off_threshold: f64,
}

impl Default for HeaterConfig {
    fn default() -> Self {
        Self {
            on_threshold: DEFAULT_TEMP_ON,
            off_threshold: DEFAULT_TEMP_OFF,
        }
    }
}

/// Pure two-state hysteresis machine over the interior temperature.
///
/// The controller performs no I/O: [`evaluate`](HeaterController::evaluate)
/// returns the actuation command and the control loop applies it.
pub struct HeaterController {
    config: HeaterConfig,
    state: HeaterState,
}

impl HeaterController {
    /// Create a controller in the `Off` state, validating the threshold
    /// pair.
    pub fn new(config: HeaterConfig) -> Result<Self> {
        if !config.on_threshold.is_finite() || !config.off_threshold.is_finite() {
            return Err(MonitorError::config_error("heater thresholds must be finite"));
        }
        if config.on_threshold >= config.off_threshold {
            return Err(MonitorError::config_error(format!(
                "switch-on threshold {} must lie below switch-off threshold {}",
                config.on_threshold, config.off_threshold
            )));
        }
        Ok(Self {
            config,
            state: HeaterState::Off,
        })
    }

    /// Current logical state.
    pub fn state(&self) -> HeaterState {
        self.state
    }

    /// Evaluate one cycle against the interior temperature.
    ///
    /// Returns `Some(new_state)` when a transition occurred and the actuator
    /// must be driven, `None` otherwise. A missing temperature never changes
    /// state: the controller fail-safes by holding.
    pub fn evaluate(&mut self, interior_temp: Option<f64>) -> Option<HeaterState> {
        let temp = interior_temp?;

        let next = match self.state {
            HeaterState::Off if temp < self.config.on_threshold => HeaterState::On,
            HeaterState::On if temp > self.config.off_threshold => HeaterState::Off,
            current => current,
        };

        if next != self.state {
            self.state = next;
            Some(next)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> HeaterController {
        HeaterController::new(HeaterConfig::default()).unwrap()
    }

    #[test]
    fn starts_off() {
        assert_eq!(controller().state(), HeaterState::Off);
    }

    #[test]
    fn reference_temperature_sequence() {
        let mut ctrl = controller();
        let temps = [8.0, 5.0, 3.5, 4.5, 6.5, 5.0];
        let expected = [
            HeaterState::Off,
            HeaterState::Off,
            HeaterState::On,
            HeaterState::On,
            HeaterState::Off,
            HeaterState::Off,
        ];
        for (temp, want) in temps.iter().zip(expected) {
            ctrl.evaluate(Some(*temp));
            assert_eq!(ctrl.state(), want, "at {temp} degrees");
        }
    }

    #[test]
    fn turns_on_strictly_below_threshold() {
        let mut ctrl = controller();
        assert_eq!(ctrl.evaluate(Some(4.0)), None);
        assert_eq!(ctrl.state(), HeaterState::Off);
        assert_eq!(ctrl.evaluate(Some(3.999)), Some(HeaterState::On));
    }

    #[test]
    fn turns_off_strictly_above_threshold() {
        let mut ctrl = controller();
        ctrl.evaluate(Some(1.0));
        assert_eq!(ctrl.state(), HeaterState::On);
        assert_eq!(ctrl.evaluate(Some(6.0)), None);
        assert_eq!(ctrl.state(), HeaterState::On);
        assert_eq!(ctrl.evaluate(Some(6.001)), Some(HeaterState::Off));
    }

    #[test]
    fn dead_band_holds_state_from_both_sides() {
        let mut ctrl = controller();
        for temp in [4.0, 5.0, 6.0] {
            assert_eq!(ctrl.evaluate(Some(temp)), None);
            assert_eq!(ctrl.state(), HeaterState::Off);
        }

        ctrl.evaluate(Some(3.0));
        assert_eq!(ctrl.state(), HeaterState::On);
        for temp in [4.0, 5.0, 6.0] {
            assert_eq!(ctrl.evaluate(Some(temp)), None);
            assert_eq!(ctrl.state(), HeaterState::On);
        }
    }

    #[test]
    fn repeated_equal_input_is_idempotent() {
        let mut ctrl = controller();
        assert_eq!(ctrl.evaluate(Some(3.0)), Some(HeaterState::On));
        for _ in 0..10 {
            assert_eq!(ctrl.evaluate(Some(3.0)), None);
            assert_eq!(ctrl.state(), HeaterState::On);
        }
    }

    #[test]
    fn missing_temperature_holds_state() {
        let mut ctrl = controller();
        assert_eq!(ctrl.evaluate(None), None);
        assert_eq!(ctrl.state(), HeaterState::Off);

        ctrl.evaluate(Some(2.0));
        assert_eq!(ctrl.state(), HeaterState::On);
        assert_eq!(ctrl.evaluate(None), None);
        assert_eq!(ctrl.state(), HeaterState::On);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let result = HeaterController::new(HeaterConfig {
            on_threshold: 6.0,
            off_threshold: 4.0,
        });
        assert!(matches!(result, Err(MonitorError::Config(_))));
    }

    #[test]
    fn rejects_non_finite_thresholds() {
        let result = HeaterController::new(HeaterConfig {
            on_threshold: f64::NAN,
            off_threshold: 6.0,
        });
        assert!(matches!(result, Err(MonitorError::Config(_))));
    }
}
