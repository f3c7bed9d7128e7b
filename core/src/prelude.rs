use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shape of the cutoff edge in the temporal-frequency direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgePolicy {
    Sharp,
    /// Raised-cosine ramp whose width is `percent` of the cutoff index.
    Apodized { percent: f64 },
}

/// What to do when a frame cannot be loaded during the batched spatial pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFramePolicy {
    #[default]
    Fail,
    ZeroFill,
}

/// Shared configuration for a filtering run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Spatial sampling in arcsec per pixel.
    pub scale: f64,
    /// Physical length of one arcsec, in km.
    pub km_per_arcsec: f64,
    /// Cadence between frames, in seconds.
    pub t_step: f64,
    /// Cutoff phase velocity, in km/s.
    pub v_ph: f64,
    pub edge: EdgePolicy,
    /// Percentage of frames tapered at each end of the time axis.
    pub temporal_apodization: Option<f64>,
    pub tile_width: usize,
    pub tile_height: usize,
    pub batch_size: usize,
    /// Worker threads for tile jobs; zero lets rayon pick.
    pub workers: usize,
    pub scratch_dir: PathBuf,
    pub missing_frames: MissingFramePolicy,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            scale: 0.504,
            km_per_arcsec: 725.0,
            t_step: 45.0,
            v_ph: 4.0,
            edge: EdgePolicy::Sharp,
            temporal_apodization: None,
            tile_width: 216,
            tile_height: 216,
            batch_size: 8,
            workers: 0,
            scratch_dir: std::env::temp_dir(),
            missing_frames: MissingFramePolicy::Fail,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> FilterResult<()> {
        let physical = [
            ("scale", self.scale),
            ("km_per_arcsec", self.km_per_arcsec),
            ("t_step", self.t_step),
            ("v_ph", self.v_ph),
        ];
        for (name, value) in physical {
            if !value.is_finite() || value <= 0.0 {
                return Err(FilterError::Configuration(format!(
                    "{} must be a positive finite number, got {}",
                    name, value
                )));
            }
        }

        if let EdgePolicy::Apodized { percent } = self.edge {
            if !percent.is_finite() || percent <= 0.0 || percent > 100.0 {
                return Err(FilterError::Configuration(format!(
                    "edge percentage must lie in (0, 100], got {}",
                    percent
                )));
            }
        }

        if let Some(percent) = self.temporal_apodization {
            if !percent.is_finite() || percent <= 0.0 || percent > 50.0 {
                return Err(FilterError::Configuration(format!(
                    "temporal apodization must lie in (0, 50], got {}",
                    percent
                )));
            }
        }

        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(FilterError::Configuration(format!(
                "tile dimensions must be positive, got {}x{}",
                self.tile_width, self.tile_height
            )));
        }
        if self.batch_size == 0 {
            return Err(FilterError::Configuration(
                "batch size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Cube dimensions after forcing every axis to an even length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CubeDims {
    pub frames: usize,
    pub height: usize,
    pub width: usize,
}

impl CubeDims {
    /// Drops the final frame, row or column of any odd axis.
    pub fn even_truncated(frames: usize, height: usize, width: usize) -> FilterResult<Self> {
        let dims = Self {
            frames: frames - frames % 2,
            height: height - height % 2,
            width: width - width % 2,
        };
        if dims.frames < 2 || dims.height < 2 || dims.width < 2 {
            return Err(FilterError::Configuration(format!(
                "cube {}x{}x{} is too small to filter",
                frames, height, width
            )));
        }
        Ok(dims)
    }

    pub fn frame_shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.frames, self.height, self.width)
    }

    pub fn frame_len(&self) -> usize {
        self.height * self.width
    }

    pub fn len(&self) -> usize {
        self.frames * self.frame_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Direction of both the spatial and the temporal transform in an engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Inverse,
}

impl Direction {
    /// Frame kind read by the spatial pass.
    pub fn input_kind(self) -> FrameKind {
        match self {
            Direction::Forward => FrameKind::Raw,
            Direction::Inverse => FrameKind::Forward,
        }
    }

    /// Frame kind written by the spatial pass and by extraction.
    pub fn output_kind(self) -> FrameKind {
        match self {
            Direction::Forward => FrameKind::Forward,
            Direction::Inverse => FrameKind::Inverse,
        }
    }
}

/// Kinds of frames held by the frame store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Raw,
    Forward,
    Inverse,
    Mask,
}

impl FrameKind {
    pub fn dir_name(self) -> &'static str {
        match self {
            FrameKind::Raw => "raw",
            FrameKind::Forward => "forward",
            FrameKind::Inverse => "inverse",
            FrameKind::Mask => "mask",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Run-level cancellation flag shared between the caller and the workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> FilterResult<()> {
        if self.is_cancelled() {
            Err(FilterError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Common error type for the filtering core.
#[derive(thiserror::Error, Debug)]
pub enum FilterError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{kind} frame {index} not found")]
    NotFound { kind: FrameKind, index: usize },
    #[error("frame {index} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(String),
    #[error("frames could not be loaded: {0:?}")]
    MissingFrames(Vec<usize>),
    #[error("run cancelled")]
    Cancelled,
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("reading frame: {0}")]
    ReadFrame(#[from] ndarray_npy::ReadNpyError),
    #[error("writing frame: {0}")]
    WriteFrame(#[from] ndarray_npy::WriteNpyError),
    #[error("encoding report: {0}")]
    Report(#[from] serde_json::Error),
}

pub type FilterResult<T> = Result<T, FilterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_truncation_drops_odd_edges() {
        let dims = CubeDims::even_truncated(9, 101, 64).unwrap();
        assert_eq!(dims.shape(), (8, 100, 64));
        assert_eq!(dims.frame_len(), 6400);
    }

    #[test]
    fn even_truncation_rejects_degenerate_cubes() {
        assert!(matches!(
            CubeDims::even_truncated(1, 8, 8),
            Err(FilterError::Configuration(_))
        ));
        assert!(CubeDims::even_truncated(4, 3, 8).is_err());
    }

    #[test]
    fn default_config_is_valid() {
        FilterConfig::default().validate().unwrap();
    }

    #[test]
    fn config_rejects_bad_tiles_and_edges() {
        let cfg = FilterConfig {
            tile_width: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(FilterError::Configuration(_))));

        let cfg = FilterConfig {
            edge: EdgePolicy::Apodized { percent: 0.0 },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = FilterConfig {
            edge: EdgePolicy::Apodized { percent: f64::NAN },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = FilterConfig {
            v_ph: -1.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn direction_maps_frame_kinds() {
        assert_eq!(Direction::Forward.input_kind(), FrameKind::Raw);
        assert_eq!(Direction::Forward.output_kind(), FrameKind::Forward);
        assert_eq!(Direction::Inverse.input_kind(), FrameKind::Forward);
        assert_eq!(Direction::Inverse.output_kind(), FrameKind::Inverse);
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let worker = token.clone();
        assert!(worker.check().is_ok());
        token.cancel();
        assert!(matches!(worker.check(), Err(FilterError::Cancelled)));
    }
}
