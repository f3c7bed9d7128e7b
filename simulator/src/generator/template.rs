use ndarray::Array2;
use std::f32::consts::PI;

/// Unit-amplitude plane wave over a `height x width` frame.
///
/// `wavelength` is in pixels, `angle` in radians from the x axis and `shift`
/// displaces the crests along the propagation direction, in pixels.
pub fn plane_wave(
    height: usize,
    width: usize,
    wavelength: f32,
    angle: f32,
    shift: f32,
) -> Array2<f32> {
    let (sin, cos) = angle.sin_cos();
    Array2::from_shape_fn((height, width), |(y, x)| {
        let along = x as f32 * cos + y as f32 * sin - shift;
        (2.0 * PI * along / wavelength).sin()
    })
}
