//! Environmental facts consulted by the rule cascades.
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lit state of a labelled indicator on the casing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorState {
    #[default]
    Absent,
    Unlit,
    Lit,
}

impl IndicatorState {
    /// Whether the indicator is present and lit.
    #[must_use]
    pub const fn is_lit(self) -> bool {
        matches!(self, Self::Lit)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Unlit => "unlit",
            Self::Lit => "lit",
        }
    }
}

impl std::fmt::Display for IndicatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port kinds that can appear on the casing edgework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PortKind {
    StereoRca,
    Dvi,
    Parallel,
    Ps2,
    Rj45,
    Serial,
}

/// Fixed enumeration order for port sampling and display.
pub const PORT_ORDER: [PortKind; 6] = [
    PortKind::StereoRca,
    PortKind::Dvi,
    PortKind::Parallel,
    PortKind::Ps2,
    PortKind::Rj45,
    PortKind::Serial,
];

impl PortKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StereoRca => "stereo-rca",
            Self::Dvi => "dvi",
            Self::Parallel => "parallel",
            Self::Ps2 => "ps2",
            Self::Rj45 => "rj45",
            Self::Serial => "serial",
        }
    }
}

impl std::fmt::Display for PortKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of the live environment the cascades evaluate against.
///
/// The engine re-reads facts through this trait on every press; an
/// implementation must answer from current state on every call rather than
/// from a snapshot taken at arming time.
pub trait FactSource {
    /// Number of batteries on the casing.
    fn battery_count(&self) -> u32;

    /// State of the indicator carrying `label`, matched case-insensitively.
    fn indicator_state(&self, label: &str) -> IndicatorState;

    /// Whether at least one port of the given kind is present.
    fn port_present(&self, port: PortKind) -> bool;

    /// Letters of the serial number in printed order.
    fn serial_letters(&self) -> Vec<char>;

    /// Decimal digits of the serial number in printed order.
    fn serial_numerals(&self) -> Vec<u8>;

    /// Seconds left on the countdown timer.
    fn remaining_seconds(&self) -> f32;
}

/// Errors raised when an edgework snapshot violates its invariants.
#[derive(Debug, Error, PartialEq)]
pub enum EdgeworkError {
    #[error("serial character {found:?} is not alphanumeric")]
    SerialCharacter { found: char },
    #[error("timer_seconds must be finite and non-negative (got {value})")]
    TimerOutOfRange { value: f32 },
    #[error("JSON parse error: {0}")]
    Parse(String),
}

/// Labelled indicator entry in an edgework snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub label: String,
    #[serde(default)]
    pub lit: bool,
}

impl Indicator {
    /// Construct an indicator entry, keeping the label as printed.
    #[must_use]
    pub fn new(label: &str, lit: bool) -> Self {
        Self {
            label: label.to_string(),
            lit,
        }
    }
}

const fn default_timer_seconds() -> f32 {
    300.0
}

/// Static edgework snapshot backing `FactSource` for hosts without live data.
///
/// Tests and the sweep harness mutate `timer_seconds` between presses to
/// model the countdown; hosts with a real timer implement the trait directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edgework {
    #[serde(default)]
    pub serial: String,
    #[serde(default)]
    pub batteries: u32,
    #[serde(default)]
    pub indicators: Vec<Indicator>,
    #[serde(default)]
    pub ports: Vec<PortKind>,
    #[serde(default = "default_timer_seconds")]
    pub timer_seconds: f32,
}

impl Default for Edgework {
    fn default() -> Self {
        Self {
            serial: String::new(),
            batteries: 0,
            indicators: Vec::new(),
            ports: Vec::new(),
            timer_seconds: default_timer_seconds(),
        }
    }
}

impl Edgework {
    /// Parse a snapshot from JSON and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed or validation fails.
    pub fn from_json(json_str: &str) -> Result<Self, EdgeworkError> {
        let snapshot: Self =
            serde_json::from_str(json_str).map_err(|e| EdgeworkError::Parse(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Validate snapshot invariants.
    ///
    /// # Errors
    ///
    /// Returns an error when the serial contains non-alphanumeric characters
    /// or the timer is negative or non-finite.
    pub fn validate(&self) -> Result<(), EdgeworkError> {
        if let Some(found) = self.serial.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(EdgeworkError::SerialCharacter { found });
        }
        if !self.timer_seconds.is_finite() || self.timer_seconds < 0.0 {
            return Err(EdgeworkError::TimerOutOfRange {
                value: self.timer_seconds,
            });
        }
        Ok(())
    }

    /// Advance the countdown by `seconds`, clamping at zero.
    pub fn drain_timer(&mut self, seconds: f32) {
        self.timer_seconds = (self.timer_seconds - seconds).max(0.0);
    }
}

impl FactSource for Edgework {
    fn battery_count(&self) -> u32 {
        self.batteries
    }

    fn indicator_state(&self, label: &str) -> IndicatorState {
        match self
            .indicators
            .iter()
            .find(|ind| ind.label.eq_ignore_ascii_case(label))
        {
            Some(ind) if ind.lit => IndicatorState::Lit,
            Some(_) => IndicatorState::Unlit,
            None => IndicatorState::Absent,
        }
    }

    fn port_present(&self, port: PortKind) -> bool {
        self.ports.contains(&port)
    }

    fn serial_letters(&self) -> Vec<char> {
        self.serial
            .chars()
            .filter(char::is_ascii_alphabetic)
            .collect()
    }

    fn serial_numerals(&self) -> Vec<u8> {
        self.serial
            .chars()
            .filter_map(|c| c.to_digit(10).and_then(|d| u8::try_from(d).ok()))
            .collect()
    }

    fn remaining_seconds(&self) -> f32 {
        self.timer_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_lookup_is_case_insensitive() {
        let edgework = Edgework {
            indicators: vec![Indicator::new("BOB", false), Indicator::new("CAR", true)],
            ..Edgework::default()
        };
        assert_eq!(edgework.indicator_state("bob"), IndicatorState::Unlit);
        assert_eq!(edgework.indicator_state("CAR"), IndicatorState::Lit);
        assert_eq!(edgework.indicator_state("FRK"), IndicatorState::Absent);
    }

    #[test]
    fn serial_splits_into_letters_and_numerals() {
        let edgework = Edgework {
            serial: String::from("AB3CD5"),
            ..Edgework::default()
        };
        assert_eq!(edgework.serial_letters(), vec!['A', 'B', 'C', 'D']);
        assert_eq!(edgework.serial_numerals(), vec![3, 5]);
    }

    #[test]
    fn empty_json_parses_to_defaults() {
        let edgework = Edgework::from_json("{}").expect("defaults parse");
        assert_eq!(edgework, Edgework::default());
        assert!((edgework.timer_seconds - 300.0).abs() < f32::EPSILON);
    }

    #[test]
    fn validate_rejects_bad_serial_character() {
        let edgework = Edgework {
            serial: String::from("AB-3CD"),
            ..Edgework::default()
        };
        assert_eq!(
            edgework.validate(),
            Err(EdgeworkError::SerialCharacter { found: '-' })
        );
    }

    #[test]
    fn validate_rejects_negative_timer() {
        let edgework = Edgework {
            timer_seconds: -1.0,
            ..Edgework::default()
        };
        assert!(matches!(
            edgework.validate(),
            Err(EdgeworkError::TimerOutOfRange { .. })
        ));
    }

    #[test]
    fn drain_timer_clamps_at_zero() {
        let mut edgework = Edgework {
            timer_seconds: 5.0,
            ..Edgework::default()
        };
        edgework.drain_timer(8.0);
        assert!((edgework.remaining_seconds() - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn port_serde_uses_kebab_case() {
        let json = serde_json::to_string(&PortKind::StereoRca).expect("serialize");
        assert_eq!(json, "\"stereo-rca\"");
        let parsed: PortKind = serde_json::from_str("\"rj45\"").expect("deserialize");
        assert_eq!(parsed, PortKind::Rj45);
    }
}
