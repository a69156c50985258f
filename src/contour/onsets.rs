// Energy onset detection
// Flags frames where normalized energy rises abruptly (candidate note splits)

use serde::{Deserialize, Serialize};

use super::energy::percentile;
use crate::config::ConfigError;

const DEFAULT_HOP_S: f64 = 0.016;
const MIN_PEAK_SPACING_S: f64 = 0.02;

/// Onset picking algorithm, selected at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum OnsetStrategy {
    /// Peaks of the rectified first difference of normalized energy
    PeakPicking {
        /// Minimum topographic prominence of a peak
        min_prominence: f64,

        /// Minimum spacing between kept peaks, in frames
        ///
        /// Counted in frames, not seconds: the default of 1 frame stands for
        /// 20 ms only at a 16 ms hop. Use `peak_picking_for_hop` for tracks
        /// on another hop.
        min_distance_frames: usize,
    },

    /// Upward crossings of a percentile threshold of normalized energy
    ThresholdCrossing {
        /// Percentile in [0, 100] used as the crossing threshold
        percentile: f64,
    },
}

impl Default for OnsetStrategy {
    fn default() -> Self {
        OnsetStrategy::peak_picking()
    }
}

impl OnsetStrategy {
    /// Peak picking tuned for the default 16 ms hop
    pub fn peak_picking() -> Self {
        OnsetStrategy::peak_picking_for_hop(DEFAULT_HOP_S)
    }

    /// Peak picking with a 20 ms minimum spacing expressed in frames of `hop_s`
    pub fn peak_picking_for_hop(hop_s: f64) -> Self {
        let frames = if hop_s.is_finite() && hop_s > 0.0 {
            (MIN_PEAK_SPACING_S / hop_s).round() as usize
        } else {
            1
        };

        OnsetStrategy::PeakPicking {
            min_prominence: 0.02,
            min_distance_frames: frames.max(1),
        }
    }

    /// Crossings of the 75th percentile
    pub fn threshold_crossing() -> Self {
        OnsetStrategy::ThresholdCrossing { percentile: 75.0 }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            OnsetStrategy::PeakPicking { min_prominence, .. } => {
                if !min_prominence.is_finite() || min_prominence < 0.0 {
                    return Err(ConfigError::InvalidConfiguration(format!(
                        "onset min_prominence must be non-negative, got {}",
                        min_prominence
                    )));
                }
            }
            OnsetStrategy::ThresholdCrossing { percentile } => {
                if !(0.0..=100.0).contains(&percentile) {
                    return Err(ConfigError::InvalidConfiguration(format!(
                        "onset percentile must be within [0, 100], got {}",
                        percentile
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Sorted, deduplicated set of onset frame indices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnsetSet {
    frames: Vec<usize>,
}

impl OnsetSet {
    pub fn from_frames(mut frames: Vec<usize>) -> Self {
        frames.sort_unstable();
        frames.dedup();
        OnsetSet { frames }
    }

    pub fn contains(&self, frame: usize) -> bool {
        self.frames.binary_search(&frame).is_ok()
    }

    pub fn frames(&self) -> &[usize] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Detect onsets in a normalized energy track
pub fn detect_onsets(energy: &[f64], strategy: &OnsetStrategy) -> OnsetSet {
    let frames = match *strategy {
        OnsetStrategy::PeakPicking {
            min_prominence,
            min_distance_frames,
        } => peak_picking(energy, min_prominence, min_distance_frames),
        OnsetStrategy::ThresholdCrossing { percentile } => {
            threshold_crossings(energy, percentile)
        }
    };

    OnsetSet::from_frames(frames)
}

fn peak_picking(energy: &[f64], min_prominence: f64, min_distance: usize) -> Vec<usize> {
    if energy.is_empty() {
        return Vec::new();
    }

    // Rectified first difference; frame 0 has no predecessor
    let rise: Vec<f64> = std::iter::once(0.0)
        .chain(energy.windows(2).map(|w| (w[1] - w[0]).max(0.0)))
        .collect();

    let peaks = local_maxima(&rise);
    let peaks = select_by_distance(&peaks, &rise, min_distance);

    peaks
        .into_iter()
        .filter(|&p| prominence(&rise, p) >= min_prominence)
        .collect()
}

/// Strict local maxima; a flat-topped peak resolves to its middle sample
///
/// The first and last samples are never peaks.
fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let last = x.len() - 1;
    let mut i = 1;

    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }

            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }

    peaks
}

/// Drop peaks closer than `distance` to a higher peak
///
/// Peaks are visited from highest to lowest; for equal heights the later
/// peak wins.
fn select_by_distance(peaks: &[usize], x: &[f64], distance: usize) -> Vec<usize> {
    let distance = distance.max(1);
    if distance == 1 || peaks.len() < 2 {
        return peaks.to_vec();
    }

    let mut keep = vec![true; peaks.len()];
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    for &i in order.iter().rev() {
        if !keep[i] {
            continue;
        }

        let mut j = i;
        while j > 0 && peaks[i] - peaks[j - 1] < distance {
            keep[j - 1] = false;
            j -= 1;
        }

        let mut j = i + 1;
        while j < peaks.len() && peaks[j] - peaks[i] < distance {
            keep[j] = false;
            j += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

/// Height of a peak above the higher of its two bases
fn prominence(x: &[f64], peak: usize) -> f64 {
    let height = x[peak];

    let mut left_min = height;
    for &v in x[..=peak].iter().rev() {
        if v > height {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = height;
    for &v in &x[peak..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }

    height - left_min.max(right_min)
}

fn threshold_crossings(energy: &[f64], q: f64) -> Vec<usize> {
    if energy.len() < 2 {
        return Vec::new();
    }

    let threshold = percentile(energy, q);

    energy
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] < threshold && w[1] >= threshold)
        .map(|(i, _)| i + 1)
        .collect()
}
