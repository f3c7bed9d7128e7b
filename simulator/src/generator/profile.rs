use crate::generator::template::plane_wave;
use anyhow::{ensure, Context};
use ndarray::{Array3, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use subsoniccore::InMemoryCube;

/// Configuration for a synthetic intensity cube.
///
/// The cube mixes a slowly drifting granulation-like pattern, which sits below
/// the cutoff phase velocity, with a spatially uniform oscillation that sits
/// far above it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub frames: usize,
    pub height: usize,
    pub width: usize,
    /// Global index of the first frame.
    pub first_index: usize,
    pub background: f32,
    /// Wavelength of the drifting pattern, in pixels.
    pub pattern_wavelength: f32,
    pub pattern_amplitude: f32,
    /// Drift speed of the pattern, in pixels per frame.
    pub drift: f32,
    /// Oscillation period, in frames.
    pub oscillation_period: f32,
    pub oscillation_amplitude: f32,
    pub noise: f32,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            frames: 64,
            height: 64,
            width: 64,
            first_index: 0,
            background: 1.0,
            pattern_wavelength: 12.0,
            pattern_amplitude: 0.2,
            drift: 0.05,
            // 3.3 mHz at a 45 s cadence.
            oscillation_period: 6.7,
            oscillation_amplitude: 0.5,
            noise: 0.01,
            seed: 0,
        }
    }
}

pub fn build_cube(config: &GeneratorConfig) -> anyhow::Result<Array3<f32>> {
    ensure!(
        config.frames > 0 && config.height > 0 && config.width > 0,
        "synthetic cube needs non-zero dimensions, got {}x{}x{}",
        config.frames,
        config.height,
        config.width
    );
    ensure!(
        config.pattern_wavelength > 0.0 && config.oscillation_period > 0.0,
        "pattern wavelength and oscillation period must be positive"
    );
    config
        .frames
        .checked_mul(config.height)
        .and_then(|n| n.checked_mul(config.width))
        .context("overflow computing synthetic cube size")?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut cube = Array3::<f32>::zeros((config.frames, config.height, config.width));

    for (t, mut frame) in cube.axis_iter_mut(Axis(0)).enumerate() {
        let shift = config.drift * t as f32;
        let pattern = plane_wave(
            config.height,
            config.width,
            config.pattern_wavelength,
            PI / 6.0,
            shift,
        ) + plane_wave(
            config.height,
            config.width,
            config.pattern_wavelength * 1.5,
            -PI / 3.0,
            shift,
        );
        let oscillation = config.oscillation_amplitude
            * (2.0 * PI * t as f32 / config.oscillation_period).sin();

        for (value, &structure) in frame.iter_mut().zip(pattern.iter()) {
            let jitter = if config.noise > 0.0 {
                rng.gen_range(-config.noise..config.noise)
            } else {
                0.0
            };
            *value = config.background
                + config.pattern_amplitude * structure
                + oscillation
                + jitter;
        }
    }

    Ok(cube)
}

pub fn build_source(config: &GeneratorConfig) -> anyhow::Result<InMemoryCube> {
    Ok(InMemoryCube::new(build_cube(config)?, config.first_index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use subsoniccore::FrameSource;

    fn small() -> GeneratorConfig {
        GeneratorConfig {
            frames: 8,
            height: 6,
            width: 10,
            ..Default::default()
        }
    }

    #[test]
    fn generator_builds_expected_shape() {
        let cube = build_cube(&small()).unwrap();
        assert_eq!(cube.dim(), (8, 6, 10));
        assert!(cube.iter().all(|value| value.is_finite()));
    }

    #[test]
    fn same_seed_repeats_the_cube() {
        let config = small();
        assert_eq!(build_cube(&config).unwrap(), build_cube(&config).unwrap());

        let reseeded = GeneratorConfig { seed: 7, ..small() };
        assert_ne!(build_cube(&config).unwrap(), build_cube(&reseeded).unwrap());
    }

    #[test]
    fn oscillation_is_spatially_uniform() {
        let config = GeneratorConfig {
            pattern_amplitude: 0.0,
            noise: 0.0,
            ..small()
        };
        let cube = build_cube(&config).unwrap();
        for frame in cube.outer_iter() {
            let first = frame[[0, 0]];
            assert!(frame.iter().all(|&value| (value - first).abs() < 1e-6));
        }
        assert!((cube[[0, 0, 0]] - config.background).abs() < 1e-6);
    }

    #[test]
    fn source_carries_first_index() {
        let config = GeneratorConfig {
            first_index: 100,
            ..small()
        };
        let source = build_source(&config).unwrap();
        assert_eq!(source.index_range(), 100..=107);
    }

    #[test]
    fn empty_cube_is_rejected() {
        let config = GeneratorConfig {
            frames: 0,
            ..small()
        };
        assert!(build_cube(&config).is_err());
    }
}
