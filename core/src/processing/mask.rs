//! Phase-velocity mask in `(temporal frequency, ky, kx)` space.
//!
//! Only the non-negative quadrant `k in [0, T/2]`, `j in [0, H/2]`,
//! `i in [0, W/2]` is computed. Full-plane slices are reflections of it and
//! slice `k` also serves temporal position `T - k`.

use crate::prelude::{CubeDims, EdgePolicy, FilterConfig, FilterError, FilterResult, FrameKind};
use crate::storage::FrameStore;
use log::{debug, info};
use ndarray::{s, Array2, Array3};
use std::f64::consts::PI;

/// Physical inputs of the cutoff: a wave passes when `omega <= |k| * v_ph`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterMaskBuilder {
    pub scale: f64,
    pub km_per_arcsec: f64,
    pub t_step: f64,
    pub v_ph: f64,
    pub edge: EdgePolicy,
}

impl FilterMaskBuilder {
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            scale: config.scale,
            km_per_arcsec: config.km_per_arcsec,
            t_step: config.t_step,
            v_ph: config.v_ph,
            edge: config.edge,
        }
    }

    fn validate(&self) -> FilterResult<()> {
        FilterConfig {
            scale: self.scale,
            km_per_arcsec: self.km_per_arcsec,
            t_step: self.t_step,
            v_ph: self.v_ph,
            edge: self.edge,
            ..Default::default()
        }
        .validate()
    }

    pub fn build(&self, dims: CubeDims) -> FilterResult<FilterMask> {
        self.validate()?;
        if dims.frames % 2 != 0 || dims.height % 2 != 0 || dims.width % 2 != 0 {
            return Err(FilterError::Configuration(format!(
                "mask needs even dimensions, got {:?}",
                dims
            )));
        }

        let (frames, height, width) = dims.shape();
        let nx = width / 2 + 1;
        let ny = height / 2 + 1;
        let nt = frames / 2 + 1;

        let km_per_pixel = self.scale * self.km_per_arcsec;
        let kx_step = 1.0 / (km_per_pixel * width as f64);
        let ky_step = 1.0 / (km_per_pixel * height as f64);
        let w_step = 1.0 / (self.t_step * frames as f64);
        debug!(
            "mask steps kx {:.3e} ky {:.3e} omega {:.3e}",
            kx_step, ky_step, w_step
        );

        let mut quadrant = Array3::<f32>::zeros((nt, ny, nx));
        quadrant.slice_mut(s![0, .., ..]).fill(1.0);

        for j in 0..ny {
            for i in 0..nx {
                let bound = (i as f64 * kx_step).hypot(j as f64 * ky_step) * self.v_ph;
                for k in 1..nt {
                    if k as f64 * w_step <= bound {
                        quadrant[[k, j, i]] = 1.0;
                    }
                }
            }
        }

        if let EdgePolicy::Apodized { percent } = self.edge {
            for j in 0..ny {
                for i in 0..nx {
                    let cutoff = (1..nt).find(|&k| quadrant[[k, j, i]] != 1.0);
                    if let Some(cutoff) = cutoff {
                        apodize_column(&mut quadrant, j, i, cutoff, percent);
                    }
                }
            }
        }

        info!(
            "built {} mask slices for {}x{}x{} cube ({:?} edge)",
            nt, frames, height, width, self.edge
        );
        Ok(FilterMask { dims, quadrant })
    }
}

/// Replaces the step at `cutoff` with a raised-cosine ramp.
///
/// The band is `2 * floor(percent * cutoff / 200)` indices wide, starting
/// half a band below the cutoff. A band narrower than two indices keeps the
/// sharp step.
fn apodize_column(quadrant: &mut Array3<f32>, j: usize, i: usize, cutoff: usize, percent: f64) {
    let nt = quadrant.dim().0;
    let half = (percent * cutoff as f64 / 100.0 / 2.0).floor() as usize;
    if half == 0 {
        return;
    }
    let band = 2 * half;
    let start = cutoff - half;
    for n in 0..band {
        let k = start + n;
        if k >= nt {
            break;
        }
        quadrant[[k, j, i]] = (0.5 + 0.5 * (PI * n as f64 / band as f64).cos()) as f32;
    }
}

/// Attenuation mask for one cube, stored as its computed quadrant.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterMask {
    dims: CubeDims,
    quadrant: Array3<f32>,
}

impl FilterMask {
    /// Mask that passes every frequency.
    pub fn all_pass(dims: CubeDims) -> Self {
        let shape = (dims.frames / 2 + 1, dims.height / 2 + 1, dims.width / 2 + 1);
        Self {
            dims,
            quadrant: Array3::ones(shape),
        }
    }

    pub fn dims(&self) -> CubeDims {
        self.dims
    }

    /// Number of distinct temporal-frequency slices, `T / 2 + 1`.
    pub fn num_slices(&self) -> usize {
        self.quadrant.dim().0
    }

    pub fn quadrant_value(&self, k: usize, j: usize, i: usize) -> f32 {
        self.quadrant[[k, j, i]]
    }

    /// Distinct slice used at cube position `t`.
    pub fn slice_index(&self, t: usize) -> FilterResult<usize> {
        if t >= self.dims.frames {
            return Err(FilterError::Configuration(format!(
                "cube position {} out of range (0..{})",
                t, self.dims.frames
            )));
        }
        Ok(t.min(self.dims.frames - t))
    }

    /// Full `(H, W)` slice for temporal-frequency index `k`.
    pub fn slice(&self, k: usize) -> FilterResult<Array2<f32>> {
        if k >= self.num_slices() {
            return Err(FilterError::Configuration(format!(
                "mask slice {} out of range (0..{})",
                k,
                self.num_slices()
            )));
        }
        let (height, width) = self.dims.frame_shape();
        Ok(Array2::from_shape_fn((height, width), |(r, c)| {
            self.quadrant[[k, r.min(height - r), c.min(width - c)]]
        }))
    }

    pub fn slice_for_position(&self, t: usize) -> FilterResult<Array2<f32>> {
        self.slice(self.slice_index(t)?)
    }

    /// Writes one `Mask` frame per cube position; slice `k` lands at `k` and `T - k`.
    pub fn persist(&self, store: &FrameStore) -> FilterResult<usize> {
        let frames = self.dims.frames;
        let mut written = 0;
        for k in 0..self.num_slices() {
            let slice = self.slice(k)?;
            store.store(FrameKind::Mask, k, slice.view())?;
            written += 1;
            let mirrored = frames - k;
            if k != 0 && mirrored != k {
                store.store(FrameKind::Mask, mirrored, slice.view())?;
                written += 1;
            }
        }
        info!("mask written to {} ({} slices)", store.root().display(), written);
        Ok(written)
    }
}
