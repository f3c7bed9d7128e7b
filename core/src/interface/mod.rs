pub mod cube;
pub mod report;

pub use cube::{FrameSource, InMemoryCube};
pub use report::{FilterOutcome, FilterReport};
