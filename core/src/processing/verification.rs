//! Spectral checks comparing a raw cube with its filtered counterpart.

use crate::math::stats::StatsHelper;
use crate::prelude::{FilterError, FilterResult};
use ndarray::{s, ArrayView3};
use num_complex::Complex32;
use rustfft::FftPlanner;
use serde::Serialize;

/// 2–5 mHz, where solar p-modes carry most of their power.
pub const P_MODE_BAND: (f64, f64) = (2.0e-3, 5.0e-3);

/// Frequencies (Hz) of the non-negative bins of a `frames`-sample series.
pub fn frequency_axis(frames: usize, t_step: f64) -> Vec<f64> {
    (0..=frames / 2)
        .map(|k| k as f64 / (frames as f64 * t_step))
        .collect()
}

/// Orthonormal amplitude spectrum of the mean-removed series at `(y, x)`.
pub fn pixel_spectrum(cube: ArrayView3<f32>, y: usize, x: usize) -> FilterResult<Vec<f32>> {
    let (frames, height, width) = cube.dim();
    if y >= height || x >= width || frames == 0 {
        return Err(FilterError::Configuration(format!(
            "pixel ({}, {}) outside {}x{} frames",
            y, x, height, width
        )));
    }

    let series: Vec<f32> = cube.slice(s![.., y, x]).to_vec();
    let mean = StatsHelper::mean(&series);
    let mut buffer: Vec<Complex32> = series
        .iter()
        .map(|&value| Complex32::new(value - mean, 0.0))
        .collect();
    FftPlanner::new()
        .plan_fft_forward(frames)
        .process(&mut buffer);

    let norm = (frames as f32).sqrt();
    Ok(buffer[..=frames / 2]
        .iter()
        .map(|value| value.norm() / norm)
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandSuppression {
    pub raw_power: f64,
    pub filtered_power: f64,
    pub suppression_percent: f64,
}

/// Fraction of in-band power removed at one pixel.
///
/// `raw` may be longer than `filtered` (odd-length input); the extra trailing
/// frames are ignored.
pub fn band_suppression(
    raw: ArrayView3<f32>,
    filtered: ArrayView3<f32>,
    pixel: (usize, usize),
    t_step: f64,
    band: (f64, f64),
) -> FilterResult<BandSuppression> {
    let frames = filtered.dim().0;
    if raw.dim().0 < frames {
        return Err(FilterError::Configuration(format!(
            "raw cube has {} frames, filtered cube {}",
            raw.dim().0,
            frames
        )));
    }
    let raw = raw.slice(s![..frames, .., ..]);
    let (y, x) = pixel;

    let freq = frequency_axis(frames, t_step);
    let in_band = |spectrum: &[f32]| -> Vec<f32> {
        spectrum
            .iter()
            .zip(freq.iter())
            .filter(|(_, f)| **f >= band.0 && **f <= band.1)
            .map(|(&amplitude, _)| amplitude)
            .collect()
    };

    let raw_power = StatsHelper::power(&in_band(&pixel_spectrum(raw, y, x)?));
    let filtered_power = StatsHelper::power(&in_band(&pixel_spectrum(filtered, y, x)?));
    let suppression_percent = if raw_power > 0.0 {
        100.0 * (1.0 - filtered_power / raw_power)
    } else {
        0.0
    };

    Ok(BandSuppression {
        raw_power,
        filtered_power,
        suppression_percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;
    use std::f32::consts::PI;

    fn oscillating_cube(frames: usize, cycles: f32) -> Array3<f32> {
        Array3::from_shape_fn((frames, 2, 2), |(t, _, _)| {
            10.0 + (2.0 * PI * cycles * t as f32 / frames as f32).sin()
        })
    }

    #[test]
    fn frequency_axis_matches_cadence() {
        let axis = frequency_axis(8, 0.5);
        assert_eq!(axis.len(), 5);
        assert_abs_diff_eq!(axis[1], 0.25);
        assert_abs_diff_eq!(axis[4], 1.0);
    }

    #[test]
    fn spectrum_peaks_at_the_oscillation() {
        let cube = oscillating_cube(64, 10.0);
        let spectrum = pixel_spectrum(cube.view(), 1, 1).unwrap();
        assert_eq!(spectrum.len(), 33);
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        assert_eq!(peak, 10);
        // Mean removed: no DC left.
        assert!(spectrum[0] < 1e-3);
    }

    #[test]
    fn suppression_spans_zero_to_full() {
        // 10 cycles over 64 x 45 s is 3.47 mHz.
        let raw = oscillating_cube(64, 10.0);
        let untouched = band_suppression(raw.view(), raw.view(), (0, 0), 45.0, P_MODE_BAND).unwrap();
        assert_abs_diff_eq!(untouched.suppression_percent, 0.0, epsilon = 1e-9);

        let flat = Array3::from_elem((64, 2, 2), 10.0f32);
        let removed = band_suppression(raw.view(), flat.view(), (0, 0), 45.0, P_MODE_BAND).unwrap();
        assert!(removed.raw_power > 0.0);
        assert_abs_diff_eq!(removed.suppression_percent, 100.0, epsilon = 1e-6);
    }

    #[test]
    fn out_of_range_pixel_is_rejected() {
        let cube = oscillating_cube(8, 1.0);
        assert!(pixel_spectrum(cube.view(), 2, 0).is_err());
    }
}
