use crate::prelude::{FilterError, FilterResult};
use ndarray::{Array2, Array3, Axis};
use std::ops::RangeInclusive;

/// Producer of the raw frames to be filtered.
///
/// Frames share one shape and are addressed by a contiguous index range.
pub trait FrameSource {
    /// `(height, width)` of every frame.
    fn frame_shape(&self) -> (usize, usize);
    fn index_range(&self) -> RangeInclusive<usize>;
    fn frame(&self, index: usize) -> FilterResult<Array2<f32>>;
}

impl FrameSource for Array3<f32> {
    fn frame_shape(&self) -> (usize, usize) {
        let (_, height, width) = self.dim();
        (height, width)
    }

    fn index_range(&self) -> RangeInclusive<usize> {
        0..=self.len_of(Axis(0)).saturating_sub(1)
    }

    fn frame(&self, index: usize) -> FilterResult<Array2<f32>> {
        if index >= self.len_of(Axis(0)) {
            return Err(FilterError::Configuration(format!(
                "frame {} outside cube of {} frames",
                index,
                self.len_of(Axis(0))
            )));
        }
        Ok(self.index_axis(Axis(0), index).to_owned())
    }
}

/// In-memory cube whose first frame carries an arbitrary global index.
#[derive(Debug, Clone)]
pub struct InMemoryCube {
    data: Array3<f32>,
    first: usize,
}

impl InMemoryCube {
    pub fn new(data: Array3<f32>, first: usize) -> Self {
        Self { data, first }
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }
}

impl FrameSource for InMemoryCube {
    fn frame_shape(&self) -> (usize, usize) {
        self.data.frame_shape()
    }

    fn index_range(&self) -> RangeInclusive<usize> {
        let frames = self.data.len_of(Axis(0));
        self.first..=(self.first + frames).saturating_sub(1)
    }

    fn frame(&self, index: usize) -> FilterResult<Array2<f32>> {
        let local = index.checked_sub(self.first).ok_or_else(|| {
            FilterError::Configuration(format!("frame {} precedes first index {}", index, self.first))
        })?;
        self.data.frame(local)
    }
}
