pub mod batch;
pub mod cancellable;
pub mod engine;
pub mod mask;
pub mod pipeline;
pub mod tiling;
pub mod verification;

pub use batch::{plan_batches, BatchBuffer, BatchJob};
pub use engine::{CubeEngine, EngineRun};
pub use mask::{FilterMask, FilterMaskBuilder};
pub use pipeline::FilterPipeline;
pub use tiling::{Tile, TileGrid};
pub use verification::{band_suppression, BandSuppression, P_MODE_BAND};
