pub mod cube_volume;
pub mod frame_store;
pub mod scratch;

pub use cube_volume::CubeVolume;
pub use frame_store::FrameStore;
pub use scratch::ScratchSpace;
