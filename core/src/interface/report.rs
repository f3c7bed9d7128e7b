use crate::prelude::{CubeDims, FilterResult};
use crate::processing::mask::FilterMask;
use crate::telemetry::MetricsSnapshot;
use ndarray::Array3;
use serde::Serialize;

/// Run summary handed back to the caller alongside the filtered cube.
#[derive(Debug, Clone, Serialize)]
pub struct FilterReport {
    pub dims: CubeDims,
    pub first: usize,
    pub last: usize,
    /// Frames that could not be loaded and were zero-filled.
    pub skipped_frames: Vec<usize>,
    pub tiles: usize,
    pub batches: usize,
    pub workers: usize,
    pub metrics: MetricsSnapshot,
    pub elapsed_secs: f64,
    pub scratch_cleaned: bool,
}

impl FilterReport {
    pub fn has_warnings(&self) -> bool {
        !self.skipped_frames.is_empty() || !self.scratch_cleaned
    }

    pub fn to_json(&self) -> FilterResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Filtered cube plus the mask that produced it.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub cube: Array3<f32>,
    pub mask: FilterMask,
    pub report: FilterReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::FilterError;

    #[test]
    fn report_serializes_with_warnings() {
        let report = FilterReport {
            dims: CubeDims {
                frames: 4,
                height: 2,
                width: 2,
            },
            first: 0,
            last: 3,
            skipped_frames: vec![2],
            tiles: 1,
            batches: 1,
            workers: 1,
            metrics: MetricsSnapshot::default(),
            elapsed_secs: 0.5,
            scratch_cleaned: true,
        };
        assert!(report.has_warnings());
        let json = report.to_json().unwrap();
        assert!(json.contains("\"skipped_frames\": [\n    2\n  ]"));
        assert!(json.contains("\"frames\": 4"));
    }

    #[test]
    fn json_failures_are_report_errors() {
        let err: FilterError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, FilterError::Report(_)));
        assert!(err.to_string().starts_with("encoding report"));
    }
}
