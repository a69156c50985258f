// Energy normalization
// Rescales a raw energy envelope into a bounded [0, 1] gating signal

const REFERENCE_PERCENTILE: f64 = 95.0;
const EPSILON: f64 = 1e-12;

/// Percentile with linear interpolation between order statistics
///
/// `q` is in [0, 100]. Returns 0.0 for an empty slice.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;

    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Normalize raw energy against its 95th percentile and clip to [0, 1]
///
/// A handful of extreme frames saturate at 1.0 instead of compressing the
/// rest of the envelope. Near-silent tracks fall back to the maximum.
pub fn normalize_energy(raw: &[f64]) -> Vec<f64> {
    if raw.is_empty() {
        return Vec::new();
    }

    let mut reference = percentile(raw, REFERENCE_PERCENTILE);
    if reference <= EPSILON {
        let max = raw.iter().copied().fold(0.0f64, f64::max);
        reference = max + EPSILON;
    }

    raw.iter()
        .map(|&e| (e / reference).clamp(0.0, 1.0))
        .collect()
}
