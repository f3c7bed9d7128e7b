//! Time-axis tapering applied to raw frames before the forward transform.

use std::f64::consts::PI;

/// Raised-cosine taper over `floor(frames * percent / 100)` frames at each end.
///
/// The leading edge rises as `(1 - cos(pi * i / n)) / 2`; the trailing edge is
/// its mirror image, so `w[frames - 1] == w[1]`.
pub fn temporal_taper(frames: usize, percent: f64) -> Vec<f32> {
    let mut weights = vec![1.0f32; frames];
    let edge = ((frames as f64) * percent / 100.0) as usize;
    if edge == 0 || 2 * edge > frames {
        return weights;
    }

    for (i, weight) in weights.iter_mut().take(edge).enumerate() {
        *weight = ((1.0 - (PI * i as f64 / edge as f64).cos()) / 2.0) as f32;
    }
    for m in 0..edge {
        weights[frames - edge + m] = weights[edge - m];
    }
    weights
}
