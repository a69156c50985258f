// Frame track ingestion
// Per-frame pitch / voicing / energy arrays produced by an upstream pitch tracker

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::contour::hz_to_semitone;
use crate::pipeline::TranscribeError;

#[derive(Debug, Error)]
pub enum FrameTrackError {
    #[error("Failed to read frame track: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse frame track JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] TranscribeError),
}

/// Equal-length per-frame analysis of a monophonic recording
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameTrack {
    /// Frame timestamps in seconds, non-decreasing
    pub times: Vec<f64>,

    /// Estimated pitch in fractional MIDI semitones; `null` where undefined
    pub pitch_semitone: Vec<Option<f64>>,

    /// Voicing decision from the pitch tracker
    pub voiced: Vec<bool>,

    /// Raw, non-negative frame energy (e.g. RMS)
    pub energy: Vec<f64>,
}

impl FrameTrack {
    /// Build a track, checking lengths and value ranges
    pub fn new(
        times: Vec<f64>,
        pitch_semitone: Vec<Option<f64>>,
        voiced: Vec<bool>,
        energy: Vec<f64>,
    ) -> Result<Self, TranscribeError> {
        let track = FrameTrack {
            times,
            pitch_semitone,
            voiced,
            energy,
        };
        track.validate()?;
        Ok(track)
    }

    /// Build a track on a fixed hop: frame `i` sits at `i * hop_s`
    pub fn from_hop(
        hop_s: f64,
        pitch_semitone: Vec<Option<f64>>,
        voiced: Vec<bool>,
        energy: Vec<f64>,
    ) -> Result<Self, TranscribeError> {
        if !hop_s.is_finite() || hop_s <= 0.0 {
            return Err(TranscribeError::InvalidInput(format!(
                "hop must be a positive number of seconds, got {}",
                hop_s
            )));
        }

        let times = (0..pitch_semitone.len()).map(|i| i as f64 * hop_s).collect();
        Self::new(times, pitch_semitone, voiced, energy)
    }

    /// Build a track from an f0 estimate in Hz
    ///
    /// Non-positive or NaN frequencies become undefined pitch.
    pub fn from_f0_hz(
        hop_s: f64,
        f0_hz: &[f64],
        voiced: Vec<bool>,
        energy: Vec<f64>,
    ) -> Result<Self, TranscribeError> {
        let pitch = f0_hz.iter().map(|&hz| hz_to_semitone(hz)).collect();
        Self::from_hop(hop_s, pitch, voiced, energy)
    }

    /// Check that all arrays line up and hold sane values
    pub fn validate(&self) -> Result<(), TranscribeError> {
        let n = self.times.len();
        for (name, len) in [
            ("pitch_semitone", self.pitch_semitone.len()),
            ("voiced", self.voiced.len()),
            ("energy", self.energy.len()),
        ] {
            if len != n {
                return Err(TranscribeError::InvalidInput(format!(
                    "{} has {} frames but times has {}",
                    name, len, n
                )));
            }
        }

        if let Some(i) = self.times.iter().position(|t| !t.is_finite()) {
            return Err(TranscribeError::InvalidInput(format!(
                "time at frame {} is not finite",
                i
            )));
        }

        if let Some(i) = self.times.windows(2).position(|w| w[1] < w[0]) {
            return Err(TranscribeError::InvalidInput(format!(
                "times decrease between frames {} and {}",
                i,
                i + 1
            )));
        }

        if let Some(i) = self.energy.iter().position(|e| !e.is_finite() || *e < 0.0) {
            return Err(TranscribeError::InvalidInput(format!(
                "energy at frame {} must be finite and non-negative, got {}",
                i, self.energy[i]
            )));
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Time of the last frame in seconds (0.0 for an empty track)
    pub fn duration_secs(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Parse and validate a JSON frame track
    pub fn from_json_bytes(data: &[u8]) -> Result<Self, FrameTrackError> {
        let track: FrameTrack = serde_json::from_slice(data)?;
        track.validate()?;
        Ok(track)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Read a JSON frame track from disk
pub fn read_frame_track(path: &Path) -> Result<FrameTrack, FrameTrackError> {
    let data = std::fs::read(path)?;
    FrameTrack::from_json_bytes(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hop_generates_clock() {
        let track = FrameTrack::from_hop(
            0.016,
            vec![Some(60.0); 4],
            vec![true; 4],
            vec![0.1; 4],
        )
        .unwrap();

        assert_eq!(track.len(), 4);
        assert!((track.times[3] - 0.048).abs() < 1e-12);
        assert!((track.duration_secs() - 0.048).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch_is_invalid_input() {
        let result = FrameTrack::new(
            vec![0.0, 0.1],
            vec![Some(60.0)],
            vec![true, true],
            vec![0.1, 0.1],
        );

        match result {
            Err(TranscribeError::InvalidInput(msg)) => assert!(msg.contains("pitch_semitone")),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_decreasing_times_rejected() {
        let result = FrameTrack::new(
            vec![0.0, 0.2, 0.1],
            vec![None; 3],
            vec![false; 3],
            vec![0.0; 3],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_energy_rejected() {
        let result = FrameTrack::new(vec![0.0], vec![None], vec![false], vec![-0.1]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_hop_rejected() {
        assert!(FrameTrack::from_hop(0.0, vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn test_from_f0_hz() {
        let track = FrameTrack::from_f0_hz(
            0.01,
            &[440.0, f64::NAN, 0.0, 880.0],
            vec![true, false, false, true],
            vec![0.5; 4],
        )
        .unwrap();

        assert!((track.pitch_semitone[0].unwrap() - 69.0).abs() < 1e-9);
        assert_eq!(track.pitch_semitone[1], None);
        assert_eq!(track.pitch_semitone[2], None);
        assert!((track.pitch_semitone[3].unwrap() - 81.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_null_pitch_is_undefined() {
        let json = br#"{
            "times": [0.0, 0.016, 0.032],
            "pitch_semitone": [60.1, null, 60.3],
            "voiced": [true, false, true],
            "energy": [0.2, 0.0, 0.3]
        }"#;

        let track = FrameTrack::from_json_bytes(json).unwrap();
        assert_eq!(track.pitch_semitone, vec![Some(60.1), None, Some(60.3)]);

        let bytes = track.to_json_bytes().unwrap();
        let back = FrameTrack::from_json_bytes(&bytes).unwrap();
        assert_eq!(back, track);
    }

    #[test]
    fn test_json_mismatch_reports_invalid() {
        let json = br#"{"times": [0.0], "pitch_semitone": [], "voiced": [true], "energy": [0.1]}"#;
        assert!(matches!(
            FrameTrack::from_json_bytes(json),
            Err(FrameTrackError::Invalid(_))
        ));
    }

    #[test]
    fn test_read_frame_track_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = read_frame_track(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(FrameTrackError::Io(_))));
    }
}
