use crate::prelude::Direction;
use ndarray::{Array, Array2, Array3, Axis, Dimension};
use num_complex::Complex32;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

/// Applies `fft` to every lane of `data` along `axis`, scaling the result.
fn transform_lanes<D: Dimension>(
    data: &mut Array<Complex32, D>,
    axis: Axis,
    fft: &dyn Fft<f32>,
    scale: f32,
) {
    let len = data.len_of(axis);
    let mut buffer = vec![Complex32::zero(); len];
    let mut scratch = vec![Complex32::zero(); fft.get_inplace_scratch_len()];

    for mut lane in data.lanes_mut(axis) {
        for (dst, src) in buffer.iter_mut().zip(lane.iter()) {
            *dst = *src;
        }
        fft.process_with_scratch(&mut buffer, &mut scratch);
        for (dst, src) in lane.iter_mut().zip(buffer.iter()) {
            *dst = *src * scale;
        }
    }
}

/// Orthonormal 2-D transform of single frames, planned once per frame shape.
pub struct SpatialFft {
    height: usize,
    width: usize,
    rows: Arc<dyn Fft<f32>>,
    cols: Arc<dyn Fft<f32>>,
    scale: f32,
}

impl SpatialFft {
    pub fn new(height: usize, width: usize, direction: Direction) -> Self {
        let mut planner = FftPlanner::new();
        let (rows, cols) = match direction {
            Direction::Forward => (
                planner.plan_fft_forward(width),
                planner.plan_fft_forward(height),
            ),
            Direction::Inverse => (
                planner.plan_fft_inverse(width),
                planner.plan_fft_inverse(height),
            ),
        };
        let scale = 1.0 / ((height * width) as f32).sqrt();
        Self {
            height,
            width,
            rows,
            cols,
            scale,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Transforms `frame` in place; forward followed by inverse is the identity.
    pub fn process(&self, frame: &mut Array2<Complex32>) {
        transform_lanes(frame, Axis(1), self.rows.as_ref(), 1.0);
        transform_lanes(frame, Axis(0), self.cols.as_ref(), self.scale);
    }

    pub fn process_real(&self, frame: &Array2<f32>) -> Array2<Complex32> {
        let mut spectrum = frame.mapv(|value| Complex32::new(value, 0.0));
        self.process(&mut spectrum);
        spectrum
    }
}

/// 1-D transform along the time axis of a `(time, y, x)` block.
///
/// Forward is unnormalized; inverse carries the full `1/T` factor.
pub struct TemporalFft {
    len: usize,
    fft: Arc<dyn Fft<f32>>,
    scale: f32,
}

impl TemporalFft {
    pub fn new(len: usize, direction: Direction) -> Self {
        let mut planner = FftPlanner::new();
        let (fft, scale) = match direction {
            Direction::Forward => (planner.plan_fft_forward(len), 1.0),
            Direction::Inverse => (planner.plan_fft_inverse(len), 1.0 / len as f32),
        };
        Self { len, fft, scale }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn process_block(&self, block: &mut Array3<Complex32>) {
        debug_assert_eq!(block.len_of(Axis(0)), self.len);
        transform_lanes(block, Axis(0), self.fft.as_ref(), self.scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    #[test]
    fn spatial_round_trip_is_identity() {
        let frame = Array2::from_shape_fn((4, 6), |(y, x)| (y * 6 + x) as f32 * 0.25 - 1.0);
        let forward = SpatialFft::new(4, 6, Direction::Forward);
        let inverse = SpatialFft::new(4, 6, Direction::Inverse);

        let mut spectrum = forward.process_real(&frame);
        inverse.process(&mut spectrum);

        for (restored, original) in spectrum.iter().zip(frame.iter()) {
            assert_abs_diff_eq!(restored.re, *original, epsilon = 1e-5);
            assert_abs_diff_eq!(restored.im, 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn spatial_forward_is_orthonormal() {
        let frame = Array2::from_elem((4, 4), 2.0f32);
        let spectrum = SpatialFft::new(4, 4, Direction::Forward).process_real(&frame);
        // sum / sqrt(16) = 32 / 4
        assert_abs_diff_eq!(spectrum[[0, 0]].re, 8.0, epsilon = 1e-5);
        assert_abs_diff_eq!(spectrum[[1, 2]].norm(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn temporal_transform_acts_per_pixel() {
        let mut block = Array3::from_shape_fn((4, 2, 3), |(t, y, x)| {
            Complex32::new(if t == 0 { (y + x) as f32 } else { 0.0 }, 0.0)
        });
        let original = block.clone();

        TemporalFft::new(4, Direction::Forward).process_block(&mut block);
        // An impulse at t = 0 has a flat spectrum.
        for t in 0..4 {
            assert_abs_diff_eq!(block[[t, 1, 2]].re, 3.0, epsilon = 1e-6);
        }

        TemporalFft::new(4, Direction::Inverse).process_block(&mut block);
        for (restored, expected) in block.iter().zip(original.iter()) {
            assert_abs_diff_eq!(restored.re, expected.re, epsilon = 1e-6);
            assert_abs_diff_eq!(restored.im, expected.im, epsilon = 1e-6);
        }
    }
}
