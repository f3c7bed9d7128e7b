use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use subsoniccore::processing::verification::{band_suppression, BandSuppression, P_MODE_BAND};
use subsoniccore::{CancelToken, FilterOutcome, FilterPipeline, InMemoryCube};

pub struct WorkflowResult {
    pub outcome: FilterOutcome,
    /// P-mode band suppression at the central pixel.
    pub suppression: BandSuppression,
    pub pixel: (usize, usize),
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
    cancel: CancelToken,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn execute(&self, source: &InMemoryCube) -> anyhow::Result<WorkflowResult> {
        let pipeline = FilterPipeline::new(self.config.filter.clone())
            .context("validating filter configuration")?
            .with_cancel_token(self.cancel.clone());
        let outcome = pipeline
            .run(source)
            .context("running phase-velocity filter")?;

        let (_, height, width) = outcome.cube.dim();
        let pixel = (height / 2, width / 2);
        let suppression = band_suppression(
            source.data().view(),
            outcome.cube.view(),
            pixel,
            self.config.filter.t_step,
            P_MODE_BAND,
        )
        .context("measuring p-mode suppression")?;

        Ok(WorkflowResult {
            outcome,
            suppression,
            pixel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{build_source, GeneratorConfig};
    use subsoniccore::FilterError;
    use tempfile::tempdir;

    fn small_workflow(scratch: &std::path::Path) -> WorkflowConfig {
        let mut cfg = WorkflowConfig::default();
        cfg.filter.tile_width = 4;
        cfg.filter.tile_height = 4;
        cfg.filter.batch_size = 8;
        cfg.filter.workers = 2;
        cfg.filter.scratch_dir = scratch.to_path_buf();
        cfg.generator = GeneratorConfig {
            frames: 32,
            height: 8,
            width: 8,
            first_index: 5,
            pattern_amplitude: 0.05,
            oscillation_amplitude: 1.0,
            ..Default::default()
        };
        cfg
    }

    #[test]
    fn runner_filters_and_suppresses_oscillation() {
        let scratch = tempdir().unwrap();
        let cfg = small_workflow(scratch.path());
        let source = build_source(&cfg.generator).unwrap();
        let result = Runner::new(cfg).execute(&source).unwrap();

        assert_eq!(result.outcome.cube.dim(), (32, 8, 8));
        assert_eq!(result.outcome.report.first, 5);
        assert_eq!(result.pixel, (4, 4));
        assert!(result.suppression.raw_power > 0.0);
        assert!(result.suppression.suppression_percent > 50.0);
    }

    #[test]
    fn cancelled_runner_reports_cancellation() {
        let scratch = tempdir().unwrap();
        let cfg = small_workflow(scratch.path());
        let source = build_source(&cfg.generator).unwrap();
        let runner = Runner::new(cfg);
        runner.cancel_token().cancel();

        let err = runner.execute(&source).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<FilterError>(),
            Some(FilterError::Cancelled)
        ));
    }
}
