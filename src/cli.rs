use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use portamento_lib::config::{SettingsOverrides, TranscriptionConfig};
use portamento_lib::contour::{OnsetStrategy, SmoothingStrategy};

#[derive(Parser, Debug)]
#[command(
    name = "portamento",
    about = "Transcribe monophonic pitch tracks into MIDI notes with pitch bends"
)]
pub struct Cli {
    /// Frame track JSON files (times, pitch_semitone, voiced, energy)
    #[arg(required_unless_present = "print_config")]
    pub inputs: Vec<PathBuf>,

    /// Output MIDI file (single input only; default: <input stem>.mid)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for generated files (default: next to each input)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Config file (default: portamento.toml, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Settings JSON, e.g. '{"pitchBendRange":2,"driftThreshold":0.3}'
    #[arg(long)]
    pub settings: Option<String>,

    /// Pitch bend range in semitones
    #[arg(long)]
    pub bend_range: Option<f64>,

    /// Quantization step in semitones for picking note roots
    #[arg(long)]
    pub quantization_step: Option<f64>,

    /// Pitch drift in semitones that splits a note as a slide
    #[arg(long)]
    pub drift_threshold: Option<f64>,

    /// Onset detection algorithm
    #[arg(long, value_enum)]
    pub onsets: Option<OnsetMode>,

    /// Frame hop of the inputs in seconds; rescales the onset peak spacing
    #[arg(long)]
    pub hop: Option<f64>,

    /// Pitch smoothing algorithm
    #[arg(long, value_enum)]
    pub smoothing: Option<SmoothingMode>,

    /// Also write <stem>.report.json with notes, bends and counts
    #[arg(long)]
    pub report: bool,

    /// Append per-stage progress of every input to this JSONL file
    #[arg(long)]
    pub trace: Option<PathBuf>,

    /// General MIDI program for the exported track
    #[arg(long, default_value_t = 24)]
    pub program: u8,

    /// MIDI pulses per quarter note
    #[arg(long, default_value_t = 480)]
    pub ppq: u16,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnsetMode {
    /// Peaks of the energy rise (prominence filtered)
    Peaks,
    /// Crossings of the 75th energy percentile
    Threshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SmoothingMode {
    /// Interpolate gaps, median filter, re-mask
    Interpolate,
    /// Median over defined frames only
    MedianOnly,
}

impl Cli {
    /// Layer settings JSON and explicit flags over a file or default config
    pub fn apply_overrides(&self, config: &TranscriptionConfig) -> TranscriptionConfig {
        let mut config = match &self.settings {
            Some(json) => SettingsOverrides::from_json_or_default(json).apply(config),
            None => config.clone(),
        };

        let flags = SettingsOverrides {
            pitch_bend_range: self.bend_range,
            drift_threshold: self.drift_threshold,
            quantization_step: self.quantization_step,
        };
        config = flags.apply(&config);

        match self.onsets {
            Some(OnsetMode::Peaks) => config.onsets = OnsetStrategy::peak_picking(),
            Some(OnsetMode::Threshold) => config.onsets = OnsetStrategy::threshold_crossing(),
            None => {}
        }
        if let (Some(hop), OnsetStrategy::PeakPicking { min_prominence, .. }) =
            (self.hop, config.onsets)
        {
            config.onsets = match OnsetStrategy::peak_picking_for_hop(hop) {
                OnsetStrategy::PeakPicking {
                    min_distance_frames,
                    ..
                } => OnsetStrategy::PeakPicking {
                    min_prominence,
                    min_distance_frames,
                },
                other => other,
            };
        }
        match self.smoothing {
            Some(SmoothingMode::Interpolate) => {
                config.smoothing = SmoothingStrategy::InterpolateThenMedian
            }
            Some(SmoothingMode::MedianOnly) => config.smoothing = SmoothingStrategy::MedianOnly,
            None => {}
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_win_over_settings() {
        let cli = Cli::parse_from([
            "portamento",
            "take.json",
            "--settings",
            r#"{"pitchBendRange": 12, "driftThreshold": 0.5}"#,
            "--bend-range",
            "4",
            "--onsets",
            "threshold",
            "--smoothing",
            "median-only",
        ]);

        let config = cli.apply_overrides(&TranscriptionConfig::default());
        assert_eq!(config.pitch_bend_range, 4.0);
        assert_eq!(config.slide_split_semitones, 0.5);
        assert_eq!(config.onsets, OnsetStrategy::threshold_crossing());
        assert_eq!(config.smoothing, SmoothingStrategy::MedianOnly);
    }

    #[test]
    fn test_hop_rescales_peak_spacing() {
        let cli = Cli::parse_from(["portamento", "take.json", "--hop", "0.005"]);
        let config = cli.apply_overrides(&TranscriptionConfig::default());

        assert_eq!(config.onsets, OnsetStrategy::peak_picking_for_hop(0.005));

        // Threshold crossing has no spacing to rescale
        let cli = Cli::parse_from([
            "portamento",
            "take.json",
            "--hop",
            "0.005",
            "--onsets",
            "threshold",
        ]);
        let config = cli.apply_overrides(&TranscriptionConfig::default());
        assert_eq!(config.onsets, OnsetStrategy::threshold_crossing());
    }

    #[test]
    fn test_no_flags_keeps_config() {
        let cli = Cli::parse_from(["portamento", "a.json", "b.json"]);
        let base = TranscriptionConfig {
            gate_on: 0.1,
            ..Default::default()
        };

        assert_eq!(cli.inputs.len(), 2);
        assert_eq!(cli.apply_overrides(&base), base);
    }
}
