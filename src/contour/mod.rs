// Signal conditioning module
// Pitch smoothing, energy normalization and onset picking ahead of segmentation

pub mod conditioner;
pub mod energy;
pub mod onsets;

pub use conditioner::{condition_pitch, hz_to_semitone, SmoothingStrategy};
pub use energy::{normalize_energy, percentile};
pub use onsets::{detect_onsets, OnsetSet, OnsetStrategy};
