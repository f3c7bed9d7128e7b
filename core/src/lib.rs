//! Subsonic phase-velocity filtering of solar image cubes.
//!
//! A cube of frames is transformed to the space-time frequency domain, every
//! component travelling faster than the cutoff phase velocity is attenuated
//! and the result is transformed back. Frames are staged on disk and the
//! temporal transform runs tile by tile over a memory-mapped volume, so peak
//! memory stays bounded by the batch and tile sizes rather than the cube.

pub mod interface;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod storage;
pub mod telemetry;

pub use interface::{FilterOutcome, FilterReport, FrameSource, InMemoryCube};
pub use prelude::{CancelToken, FilterConfig, FilterError, FilterResult};
pub use processing::{FilterMask, FilterMaskBuilder, FilterPipeline};
