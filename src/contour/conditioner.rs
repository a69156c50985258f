// Pitch contour conditioning
// Gap interpolation and NaN-aware median smoothing of a per-frame semitone track

use serde::{Deserialize, Serialize};

/// How the raw pitch track is smoothed before segmentation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingStrategy {
    /// Fill gaps by linear interpolation, median-filter the filled track,
    /// then restore the original gaps
    ///
    /// Voiced frames next to a gap are smoothed against interpolated
    /// neighbours before the gap is re-masked, which softens pitch at
    /// voicing boundaries.
    #[default]
    InterpolateThenMedian,

    /// Median-filter the raw track directly, ignoring undefined frames
    MedianOnly,
}

/// Convert a frequency in Hz to fractional MIDI semitones (A4 = 69)
pub fn hz_to_semitone(hz: f64) -> Option<f64> {
    if hz.is_finite() && hz > 0.0 {
        Some(69.0 + 12.0 * (hz / 440.0).log2())
    } else {
        None
    }
}

/// Smooth a pitch track while keeping unvoiced frames undefined
///
/// A frame is valid when it is voiced and has a finite pitch. The output is
/// `None` exactly where the input frame is invalid.
pub fn condition_pitch(
    pitch: &[Option<f64>],
    voiced: &[bool],
    window: usize,
    strategy: SmoothingStrategy,
) -> Vec<Option<f64>> {
    debug_assert_eq!(pitch.len(), voiced.len());

    let valid: Vec<bool> = pitch
        .iter()
        .zip(voiced.iter())
        .map(|(p, &v)| v && p.map_or(false, f64::is_finite))
        .collect();

    let masked: Vec<Option<f64>> = pitch
        .iter()
        .zip(valid.iter())
        .map(|(&p, &ok)| if ok { p } else { None })
        .collect();

    let valid_count = valid.iter().filter(|&&ok| ok).count();

    let smoothed = match strategy {
        SmoothingStrategy::InterpolateThenMedian if valid_count >= 2 => {
            let filled: Vec<Option<f64>> =
                interpolate_gaps(&masked).into_iter().map(Some).collect();
            nan_median_smooth(&filled, window)
        }
        _ => nan_median_smooth(&masked, window),
    };

    smoothed
        .into_iter()
        .zip(valid.iter())
        .map(|(p, &ok)| if ok { p } else { None })
        .collect()
}

/// Sliding median over defined values only
///
/// The window is truncated at the track edges. A frame whose window holds no
/// defined value stays undefined.
fn nan_median_smooth(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let window = if window % 2 == 1 { window } else { window + 1 };
    if window <= 1 {
        return values.to_vec();
    }

    let half = window / 2;
    let n = values.len();
    let mut scratch = Vec::with_capacity(window);

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);

            scratch.clear();
            scratch.extend(values[lo..hi].iter().flatten().copied());

            median(&mut scratch).or(values[i])
        })
        .collect()
}

/// Median of a scratch buffer; even counts average the two middle values
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;

    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Fill undefined frames by linear interpolation between defined neighbours
///
/// Frames before the first (after the last) defined value take that value.
/// Callers must guarantee at least one defined value.
fn interpolate_gaps(values: &[Option<f64>]) -> Vec<f64> {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();

    let Some(&(first_idx, first_val)) = known.first() else {
        return vec![f64::NAN; values.len()];
    };
    let (last_idx, last_val) = known[known.len() - 1];

    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            if let Some(v) = v {
                return *v;
            }
            if i <= first_idx {
                return first_val;
            }
            if i >= last_idx {
                return last_val;
            }

            // First known sample to the right of i; the one before it is to the left
            let right = known.partition_point(|&(k, _)| k < i);
            let (i0, v0) = known[right - 1];
            let (i1, v1) = known[right];
            v0 + (v1 - v0) * (i - i0) as f64 / (i1 - i0) as f64
        })
        .collect()
}
