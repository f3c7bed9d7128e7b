use crate::interface::{FilterOutcome, FilterReport, FrameSource};
use crate::math::matrix::MatrixHelper;
use crate::math::window::temporal_taper;
use crate::prelude::{
    CancelToken, CubeDims, Direction, FilterConfig, FilterError, FilterResult, FrameKind,
};
use crate::processing::cancellable::for_each_cancellable;
use crate::processing::engine::{CubeEngine, EngineRun};
use crate::processing::mask::{FilterMask, FilterMaskBuilder};
use crate::storage::{FrameStore, ScratchSpace};
use crate::telemetry::{LogManager, MetricsRecorder};
use ndarray::{Array2, Array3, Axis};
use num_complex::Complex32;
use std::time::Instant;

struct Passes {
    cube: Array3<f32>,
    forward: EngineRun,
    inverse: EngineRun,
    workers: usize,
}

/// End-to-end phase-velocity filter of one cube.
pub struct FilterPipeline {
    config: FilterConfig,
    cancel: CancelToken,
    logger: LogManager,
}

impl FilterPipeline {
    pub fn new(config: FilterConfig) -> FilterResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancelToken::new(),
            logger: LogManager::new("pipeline"),
        })
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Even-truncated dimensions of the cube `source` will produce.
    pub fn dims_for<S: FrameSource + ?Sized>(&self, source: &S) -> FilterResult<CubeDims> {
        let range = source.index_range();
        let frames = (range.end() + 1).saturating_sub(*range.start());
        let (height, width) = source.frame_shape();
        CubeDims::even_truncated(frames, height, width)
    }

    /// Builds the phase-velocity mask from the configuration and filters.
    pub fn run<S: FrameSource + ?Sized>(&self, source: &S) -> FilterResult<FilterOutcome> {
        let dims = self.dims_for(source)?;
        let mask = FilterMaskBuilder::from_config(&self.config).build(dims)?;
        self.run_with_mask(source, mask)
    }

    /// Filters with a caller-supplied mask.
    pub fn run_with_mask<S: FrameSource + ?Sized>(
        &self,
        source: &S,
        mask: FilterMask,
    ) -> FilterResult<FilterOutcome> {
        let started = Instant::now();
        let dims = self.dims_for(source)?;
        if mask.dims() != dims {
            return Err(FilterError::Configuration(format!(
                "mask built for {:?}, cube is {:?}",
                mask.dims(),
                dims
            )));
        }
        let first = *source.index_range().start();
        let last = first + dims.frames - 1;
        self.logger.record(&format!(
            "filtering frames {}..={} at {}x{}",
            first, last, dims.height, dims.width
        ));

        let scratch = ScratchSpace::create(&self.config.scratch_dir)?;
        let metrics = MetricsRecorder::new();
        let result = self.execute(source, &mask, dims, first, &scratch, &metrics);
        let scratch_cleaned = scratch.close();
        let passes = result?;

        let mut skipped_frames = passes.forward.skipped.clone();
        skipped_frames.extend(passes.inverse.skipped.iter().copied());
        skipped_frames.sort_unstable();
        skipped_frames.dedup();

        let report = FilterReport {
            dims,
            first,
            last,
            skipped_frames,
            tiles: passes.forward.tiles,
            batches: passes.forward.batches + passes.inverse.batches,
            workers: passes.workers,
            metrics: metrics.snapshot(),
            elapsed_secs: started.elapsed().as_secs_f64(),
            scratch_cleaned,
        };
        if report.has_warnings() {
            self.logger.warn(&format!(
                "finished with warnings: skipped frames {:?}, scratch cleaned {}",
                report.skipped_frames, report.scratch_cleaned
            ));
        }
        self.logger
            .record(&format!("done in {:.2} s", report.elapsed_secs));

        Ok(FilterOutcome {
            cube: passes.cube,
            mask,
            report,
        })
    }

    fn execute<S: FrameSource + ?Sized>(
        &self,
        source: &S,
        mask: &FilterMask,
        dims: CubeDims,
        first: usize,
        scratch: &ScratchSpace,
        metrics: &MetricsRecorder,
    ) -> FilterResult<Passes> {
        let last = first + dims.frames - 1;
        let store = FrameStore::open(scratch.path().join("frames"))?;

        metrics.record_mask_slices(mask.persist(&store)?);
        self.stage_raw_frames(source, &store, dims, first)?;

        let engine = CubeEngine::new(
            &store,
            scratch.cube_path(),
            dims,
            &self.config,
            metrics,
            self.cancel.clone(),
        )?;
        let forward = engine.run(Direction::Forward, first, last)?;
        store.delete_all(FrameKind::Raw)?;

        self.apply_mask(&store, dims, first)?;

        let inverse = engine.run(Direction::Inverse, first, last)?;
        store.delete_all(FrameKind::Forward)?;

        let cube = self.assemble(&store, dims, first)?;
        Ok(Passes {
            cube,
            forward,
            inverse,
            workers: engine.workers(),
        })
    }

    fn source_frame<S: FrameSource + ?Sized>(
        &self,
        source: &S,
        dims: CubeDims,
        index: usize,
    ) -> FilterResult<Array2<f32>> {
        let frame = source.frame(index)?;
        if frame.dim() != source.frame_shape() {
            return Err(FilterError::ShapeMismatch {
                index,
                expected: source.frame_shape(),
                found: frame.dim(),
            });
        }
        Ok(MatrixHelper::crop(frame.view(), dims.height, dims.width))
    }

    /// Mean of the truncated cube, streamed one frame at a time.
    fn cube_mean<S: FrameSource + ?Sized>(
        &self,
        source: &S,
        dims: CubeDims,
        first: usize,
    ) -> FilterResult<f32> {
        let mut sum = 0.0f64;
        let mut counted = 0usize;
        for_each_cancellable(0..dims.frames, &self.cancel, |t| {
            match self.source_frame(source, dims, first + t) {
                Ok(frame) => {
                    sum += frame.mean().unwrap_or(0.0) as f64;
                    counted += 1;
                    Ok(())
                }
                Err(err @ FilterError::ShapeMismatch { .. }) => Err(err),
                Err(_) => Ok(()),
            }
        })?;
        Ok(if counted == 0 {
            0.0
        } else {
            (sum / counted as f64) as f32
        })
    }

    /// Copies the truncated (and optionally tapered) source frames into the store.
    fn stage_raw_frames<S: FrameSource + ?Sized>(
        &self,
        source: &S,
        store: &FrameStore,
        dims: CubeDims,
        first: usize,
    ) -> FilterResult<()> {
        let taper = match self.config.temporal_apodization {
            Some(percent) => {
                let mean = self.cube_mean(source, dims, first)?;
                self.logger.record(&format!(
                    "tapering {}% of frames at each end around mean {:.4}",
                    percent, mean
                ));
                Some((temporal_taper(dims.frames, percent), mean))
            }
            None => None,
        };

        for_each_cancellable(0..dims.frames, &self.cancel, |t| {
            let index = first + t;
            let mut frame = match self.source_frame(source, dims, index) {
                Ok(frame) => frame,
                Err(err @ FilterError::ShapeMismatch { .. }) => return Err(err),
                Err(err) => {
                    self.logger
                        .warn(&format!("source frame {} unavailable: {}", index, err));
                    return Ok(());
                }
            };
            if let Some((weights, mean)) = &taper {
                let weight = weights[t];
                frame.mapv_inplace(|value| (value - mean) * weight + mean);
            }
            store.store(FrameKind::Raw, index, frame.view())
        })
    }

    /// Multiplies every forward spectrum by the mask slice of its position.
    fn apply_mask(&self, store: &FrameStore, dims: CubeDims, first: usize) -> FilterResult<()> {
        for_each_cancellable(0..dims.frames, &self.cancel, |t| {
            let index = first + t;
            let mut spectrum: Array2<Complex32> = store.load(FrameKind::Forward, index)?;
            let mask: Array2<f32> = store.load(FrameKind::Mask, t)?;
            MatrixHelper::apply_mask(&mut spectrum, mask.view());
            store.store(FrameKind::Forward, index, spectrum.view())
        })
    }

    /// Real part of every inverse frame, stacked into the output cube.
    fn assemble(&self, store: &FrameStore, dims: CubeDims, first: usize) -> FilterResult<Array3<f32>> {
        let mut cube = Array3::<f32>::zeros(dims.shape());
        for_each_cancellable(0..dims.frames, &self.cancel, |t| {
            let frame: Array2<Complex32> = store.load(FrameKind::Inverse, first + t)?;
            cube.index_axis_mut(Axis(0), t)
                .assign(&MatrixHelper::real_part(frame.view()));
            Ok(())
        })?;
        Ok(cube)
    }
}
