/// Exponentially-weighted moving average for signal samples.

/// Default decay weight: each new sample contributes 1/8.
pub const DEFAULT_WEIGHT: f32 = 0.125;

/// Blend a sample into a running average.
///
/// Returns `weight * sample + (1 - weight) * previous`. With no previous
/// value the average starts at the sample itself.
#[inline]
pub fn blend(previous: Option<f32>, sample: f32, weight: f32) -> f32 {
    match previous {
        Some(prev) => weight * sample + (1.0 - weight) * prev,
        None => sample,
    }
}
