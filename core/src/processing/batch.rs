use crate::prelude::{FilterError, FilterResult};
use ndarray::Array2;
use num_complex::Complex32;

/// Ordered group of frame indices transformed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub indices: Vec<usize>,
}

/// Splits `first..=last` into consecutive jobs of at most `batch_size` frames.
pub fn plan_batches(first: usize, last: usize, batch_size: usize) -> FilterResult<Vec<BatchJob>> {
    if batch_size == 0 {
        return Err(FilterError::Configuration(
            "batch size must be positive".into(),
        ));
    }
    if last < first {
        return Err(FilterError::Configuration(format!(
            "empty frame range {}..={}",
            first, last
        )));
    }
    let indices: Vec<usize> = (first..=last).collect();
    Ok(indices
        .chunks(batch_size)
        .map(|chunk| BatchJob {
            indices: chunk.to_vec(),
        })
        .collect())
}

/// Holds at most `capacity` spectral frames in memory at once.
pub struct BatchBuffer {
    frames: Vec<(usize, Array2<Complex32>)>,
    capacity: usize,
}

impl BatchBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Admits a frame, refusing once the batch budget is spent.
    pub fn push(&mut self, index: usize, frame: Array2<Complex32>) -> FilterResult<()> {
        if self.frames.len() >= self.capacity {
            return Err(FilterError::ResourceExhaustion(format!(
                "batch buffer full ({} frames)",
                self.capacity
            )));
        }
        self.frames.push((index, frame));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames_mut(&mut self) -> &mut [(usize, Array2<Complex32>)] {
        &mut self.frames
    }

    /// Hands back the held frames and frees the buffer for the next batch.
    pub fn drain(&mut self) -> std::vec::Drain<'_, (usize, Array2<Complex32>)> {
        self.frames.drain(..)
    }
}
