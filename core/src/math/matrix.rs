use ndarray::{s, Array2, ArrayView2, Zip};
use num_complex::Complex32;

pub struct MatrixHelper;

impl MatrixHelper {
    /// Crops a frame to the leading `height x width` block.
    pub fn crop(frame: ArrayView2<f32>, height: usize, width: usize) -> Array2<f32> {
        frame.slice(s![..height, ..width]).to_owned()
    }

    /// Attenuates a spectral frame by a real mask of the same shape.
    pub fn apply_mask(spectrum: &mut Array2<Complex32>, mask: ArrayView2<f32>) {
        Zip::from(spectrum).and(mask).for_each(|value, &weight| {
            *value *= weight;
        });
    }

    pub fn real_part(spectrum: ArrayView2<Complex32>) -> Array2<f32> {
        spectrum.mapv(|value| value.re)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn crop_keeps_leading_block() {
        let frame = Array2::from_shape_fn((3, 5), |(y, x)| (y * 5 + x) as f32);
        let cropped = MatrixHelper::crop(frame.view(), 2, 4);
        assert_eq!(cropped, array![[0.0, 1.0, 2.0, 3.0], [5.0, 6.0, 7.0, 8.0]]);
    }

    #[test]
    fn mask_scales_each_element() {
        let mut spectrum = Array2::from_elem((2, 2), Complex32::new(2.0, -4.0));
        let mask = array![[1.0f32, 0.0], [0.5, 1.0]];
        MatrixHelper::apply_mask(&mut spectrum, mask.view());
        assert_eq!(spectrum[[0, 1]], Complex32::new(0.0, 0.0));
        assert_eq!(spectrum[[1, 0]], Complex32::new(1.0, -2.0));
        assert_eq!(MatrixHelper::real_part(spectrum.view())[[1, 1]], 2.0);
    }
}
