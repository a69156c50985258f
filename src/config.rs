// Transcription configuration
// Named, independently overridable parameters plus validation and TOML loading

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::contour::{OnsetStrategy, SmoothingStrategy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parameters for a single transcription run
///
/// Constructed once per invocation and passed by reference to every stage.
/// Nothing in the crate mutates it after `Transcriber::new` has validated it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Semitones spanned by a full pitch bend (must match the consuming synth)
    pub pitch_bend_range: f64,

    /// Semitone grid used to pick a note's root before integer rounding
    pub quantization_step: f64,

    /// Deviation from the reference pitch that counts as a slide
    pub slide_split_semitones: f64,

    /// Consecutive frames a slide must persist before the note is split
    pub slide_hold_frames: u32,

    /// Maximum deviation for an energy transient to count as a tremolo repeat
    pub tremolo_pitch_tolerance: f64,

    /// Normalized energy needed to open a note
    pub gate_on: f64,

    /// Normalized energy below which a frame counts toward release
    /// Must be strictly lower than `gate_on`
    pub gate_off: f64,

    /// Consecutive released frames that end a note
    pub release_frames: u32,

    pub min_note_duration_s: f64,

    pub min_gap_s: f64,

    /// Frames after a note opens during which onsets cannot split it
    pub cooldown_frames: u32,

    /// Median window width in frames (even widths round up to the next odd)
    pub pitch_median_window: usize,

    /// Bend change, in semitones, that forces a new bend event
    pub bend_semitone_step: f64,

    /// Longest run of frames allowed without a bend event
    pub bend_max_frame_skip: u32,

    pub smoothing: SmoothingStrategy,

    pub onsets: OnsetStrategy,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        TranscriptionConfig {
            pitch_bend_range: 2.0,
            quantization_step: 0.5,
            slide_split_semitones: 0.3,
            slide_hold_frames: 3,
            tremolo_pitch_tolerance: 0.3,
            gate_on: 0.05,
            gate_off: 0.035,
            release_frames: 5,
            min_note_duration_s: 0.03,
            min_gap_s: 0.01,
            cooldown_frames: 1,
            pitch_median_window: 3,
            bend_semitone_step: 0.03,
            bend_max_frame_skip: 3,
            smoothing: SmoothingStrategy::default(),
            onsets: OnsetStrategy::default(),
        }
    }
}

impl TranscriptionConfig {
    /// Check every parameter, returning the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("pitch_bend_range", self.pitch_bend_range)?;
        require_positive("quantization_step", self.quantization_step)?;
        require_non_negative("slide_split_semitones", self.slide_split_semitones)?;
        require_non_negative("tremolo_pitch_tolerance", self.tremolo_pitch_tolerance)?;
        require_non_negative("gate_on", self.gate_on)?;
        require_non_negative("gate_off", self.gate_off)?;
        require_non_negative("min_note_duration_s", self.min_note_duration_s)?;
        require_non_negative("min_gap_s", self.min_gap_s)?;
        require_non_negative("bend_semitone_step", self.bend_semitone_step)?;

        if self.gate_off >= self.gate_on {
            return Err(ConfigError::InvalidConfiguration(format!(
                "gate_off ({}) must be lower than gate_on ({})",
                self.gate_off, self.gate_on
            )));
        }

        for (name, frames) in [
            ("slide_hold_frames", self.slide_hold_frames),
            ("release_frames", self.release_frames),
            ("bend_max_frame_skip", self.bend_max_frame_skip),
        ] {
            if frames == 0 {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }

        self.onsets.validate()?;

        Ok(())
    }

    /// Median window coerced to an odd width of at least one frame
    pub fn odd_median_window(&self) -> usize {
        if self.pitch_median_window % 2 == 1 {
            self.pitch_median_window
        } else {
            self.pitch_median_window + 1
        }
    }
}

fn require_positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidConfiguration(format!(
            "{} must be a positive number, got {}",
            name, value
        )))
    }
}

fn require_non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidConfiguration(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )))
    }
}

/// Per-request settings as sent by the web front end
///
/// Only the three knobs exposed to end users; anything missing keeps the
/// value already in the config it is applied to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch_bend_range: Option<f64>,

    /// Slide split threshold in semitones
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift_threshold: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantization_step: Option<f64>,
}

impl SettingsOverrides {
    /// Parse settings JSON; malformed settings fall back to no overrides
    pub fn from_json_or_default(json: &str) -> Self {
        match serde_json::from_str(json) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring malformed settings ({}), using defaults", e);
                SettingsOverrides::default()
            }
        }
    }

    /// Return a copy of `config` with these overrides applied
    pub fn apply(&self, config: &TranscriptionConfig) -> TranscriptionConfig {
        let mut merged = config.clone();
        if let Some(range) = self.pitch_bend_range {
            merged.pitch_bend_range = range;
        }
        if let Some(drift) = self.drift_threshold {
            merged.slide_split_semitones = drift;
        }
        if let Some(step) = self.quantization_step {
            merged.quantization_step = step;
        }
        merged
    }
}

/// Load a config file; every field not present keeps its default
pub fn load_config(path: &Path) -> Result<TranscriptionConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: TranscriptionConfig = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TranscriptionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_quantization_step() {
        let config = TranscriptionConfig {
            quantization_step: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_nan_bend_range() {
        let config = TranscriptionConfig {
            pitch_bend_range: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TranscriptionConfig {
            pitch_bend_range: -2.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_gates() {
        let config = TranscriptionConfig {
            gate_on: 0.03,
            gate_off: 0.05,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gate_off"));

        // Equal thresholds leave no hysteresis
        let config = TranscriptionConfig {
            gate_on: 0.05,
            gate_off: 0.05,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_frame_skip() {
        let config = TranscriptionConfig {
            bend_max_frame_skip: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_hold_and_release_frames() {
        let config = TranscriptionConfig {
            slide_hold_frames: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("slide_hold_frames"));

        let config = TranscriptionConfig {
            release_frames: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("release_frames"));

        // One frame is the smallest usable count
        let config = TranscriptionConfig {
            slide_hold_frames: 1,
            release_frames: 1,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_odd_median_window() {
        let mut config = TranscriptionConfig::default();
        assert_eq!(config.odd_median_window(), 3);

        config.pitch_median_window = 4;
        assert_eq!(config.odd_median_window(), 5);

        config.pitch_median_window = 0;
        assert_eq!(config.odd_median_window(), 1);
    }

    #[test]
    fn test_settings_overrides() {
        let settings = SettingsOverrides::from_json_or_default(
            r#"{"pitchBendRange": 12, "driftThreshold": 0.5}"#,
        );
        let merged = settings.apply(&TranscriptionConfig::default());

        assert_eq!(merged.pitch_bend_range, 12.0);
        assert_eq!(merged.slide_split_semitones, 0.5);
        assert_eq!(merged.quantization_step, 0.5);
    }

    #[test]
    fn test_malformed_settings_fall_back() {
        let settings = SettingsOverrides::from_json_or_default("{not json");
        assert_eq!(settings, SettingsOverrides::default());
    }

    #[test]
    fn test_load_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pitch_bend_range = 12.0").unwrap();
        writeln!(file, "release_frames = 8").unwrap();
        writeln!(file, "[onsets]").unwrap();
        writeln!(file, "strategy = \"threshold_crossing\"").unwrap();
        writeln!(file, "percentile = 80.0").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.pitch_bend_range, 12.0);
        assert_eq!(config.release_frames, 8);
        assert_eq!(config.gate_on, 0.05);
        assert_eq!(
            config.onsets,
            OnsetStrategy::ThresholdCrossing { percentile: 80.0 }
        );
    }
}
