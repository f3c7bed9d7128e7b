use serde::Serialize;
use std::sync::Mutex;

/// Counters shared by the pipeline phases and the tile workers.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub frames_transformed: usize,
    pub frames_skipped: usize,
    pub batches: usize,
    pub tiles: usize,
    pub mask_slices: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_frames(&self, count: usize) {
        self.update(|m| m.frames_transformed += count);
    }

    pub fn record_skipped(&self, count: usize) {
        self.update(|m| m.frames_skipped += count);
    }

    pub fn record_batch(&self) {
        self.update(|m| m.batches += 1);
    }

    pub fn record_tile(&self) {
        self.update(|m| m.tiles += 1);
    }

    pub fn record_mask_slices(&self, count: usize) {
        self.update(|m| m.mask_slices += count);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_accumulates_counts() {
        let metrics = MetricsRecorder::new();
        metrics.record_frames(3);
        metrics.record_frames(2);
        metrics.record_tile();
        metrics.record_skipped(1);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_transformed, 5);
        assert_eq!(snapshot.tiles, 1);
        assert_eq!(snapshot.frames_skipped, 1);
        assert_eq!(snapshot.batches, 0);
    }
}
