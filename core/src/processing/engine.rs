use crate::math::fft::{SpatialFft, TemporalFft};
use crate::prelude::{
    CancelToken, CubeDims, Direction, FilterConfig, FilterError, FilterResult,
    MissingFramePolicy,
};
use crate::processing::batch::{plan_batches, BatchBuffer};
use crate::processing::cancellable::{for_each_cancellable, par_for_each_cancellable};
use crate::processing::tiling::{Tile, TileGrid};
use crate::storage::{CubeVolume, FrameStore};
use crate::telemetry::{LogManager, MetricsRecorder};
use ndarray::Array2;
use num_complex::Complex32;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of one engine pass over `[first, last]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineRun {
    pub skipped: Vec<usize>,
    pub batches: usize,
    pub tiles: usize,
}

/// Out-of-core transform of a whole cube held in a [`FrameStore`].
///
/// A run transforms frames spatially in bounded batches, gathers them into a
/// memory-mapped [`CubeVolume`], transforms every tile along time on a
/// private worker pool and writes the frames back out.
pub struct CubeEngine<'a> {
    store: &'a FrameStore,
    volume_path: PathBuf,
    dims: CubeDims,
    grid: TileGrid,
    batch_size: usize,
    missing_frames: MissingFramePolicy,
    pool: ThreadPool,
    cancel: CancelToken,
    metrics: &'a MetricsRecorder,
    logger: LogManager,
}

impl<'a> CubeEngine<'a> {
    pub fn new(
        store: &'a FrameStore,
        volume_path: impl Into<PathBuf>,
        dims: CubeDims,
        config: &FilterConfig,
        metrics: &'a MetricsRecorder,
        cancel: CancelToken,
    ) -> FilterResult<Self> {
        config.validate()?;
        let grid = TileGrid::new(
            dims.frame_shape(),
            (config.tile_height, config.tile_width),
        )?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("subsonic-tile-{}", i))
            .build()
            .map_err(|err| FilterError::ResourceExhaustion(format!("worker pool: {}", err)))?;

        Ok(Self {
            store,
            volume_path: volume_path.into(),
            dims,
            grid,
            batch_size: config.batch_size,
            missing_frames: config.missing_frames,
            pool,
            cancel,
            metrics,
            logger: LogManager::new("engine"),
        })
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn run(&self, direction: Direction, first: usize, last: usize) -> FilterResult<EngineRun> {
        self.run_with_progress(direction, first, last, |_| {})
    }

    /// Like [`CubeEngine::run`], calling `on_tile` from the worker that
    /// finished each tile.
    pub fn run_with_progress<F>(
        &self,
        direction: Direction,
        first: usize,
        last: usize,
        on_tile: F,
    ) -> FilterResult<EngineRun>
    where
        F: Fn(&Tile) + Sync,
    {
        let frames = last
            .checked_sub(first)
            .map(|span| span + 1)
            .ok_or_else(|| {
                FilterError::Configuration(format!("empty frame range {}..={}", first, last))
            })?;
        if frames != self.dims.frames {
            return Err(FilterError::Configuration(format!(
                "range {}..={} holds {} frames, cube expects {}",
                first, last, frames, self.dims.frames
            )));
        }

        self.logger.record(&format!(
            "{:?} run over frames {}..={} ({} tiles, {} workers)",
            direction,
            first,
            last,
            self.grid.len(),
            self.workers()
        ));

        let (skipped, batches) = self.spatial_pass(direction, first, last)?;
        if !skipped.is_empty() {
            self.metrics.record_skipped(skipped.len());
            self.logger.warn(&format!(
                "{} frame(s) could not be loaded: {:?}",
                skipped.len(),
                skipped
            ));
            if self.missing_frames == MissingFramePolicy::Fail {
                return Err(FilterError::MissingFrames(skipped));
            }
        }

        let mut volume = self.materialize(direction, first, &skipped)?;
        let tiles = self.temporal_pass(&mut volume, direction, &on_tile)?;
        self.extract(&volume, direction, first)?;
        drop(volume);

        self.logger.record(&format!("{:?} run complete", direction));
        Ok(EngineRun {
            skipped,
            batches,
            tiles,
        })
    }

    fn check_shape<A>(&self, index: usize, frame: &Array2<A>) -> FilterResult<()> {
        if frame.dim() != self.dims.frame_shape() {
            return Err(FilterError::ShapeMismatch {
                index,
                expected: self.dims.frame_shape(),
                found: frame.dim(),
            });
        }
        Ok(())
    }

    fn load_input(&self, direction: Direction, index: usize) -> FilterResult<Array2<Complex32>> {
        let kind = direction.input_kind();
        match direction {
            Direction::Forward => {
                let frame: Array2<f32> = self.store.load(kind, index)?;
                self.check_shape(index, &frame)?;
                Ok(frame.mapv(|value| Complex32::new(value, 0.0)))
            }
            Direction::Inverse => {
                let frame: Array2<Complex32> = self.store.load(kind, index)?;
                self.check_shape(index, &frame)?;
                Ok(frame)
            }
        }
    }

    /// Batched 2-D transforms; returns skipped indices and batch count.
    fn spatial_pass(
        &self,
        direction: Direction,
        first: usize,
        last: usize,
    ) -> FilterResult<(Vec<usize>, usize)> {
        let (height, width) = self.dims.frame_shape();
        let fft = SpatialFft::new(height, width, direction);
        let output = direction.output_kind();
        let jobs = plan_batches(first, last, self.batch_size)?;
        let mut buffer = BatchBuffer::with_capacity(self.batch_size);
        let mut skipped = Vec::new();

        for_each_cancellable(&jobs, &self.cancel, |job| {
            for &index in &job.indices {
                match self.load_input(direction, index) {
                    Ok(frame) => buffer.push(index, frame)?,
                    Err(err @ FilterError::ShapeMismatch { .. }) => return Err(err),
                    Err(err) => {
                        self.logger
                            .warn(&format!("excluding frame {} from its batch: {}", index, err));
                        skipped.push(index);
                    }
                }
            }

            self.pool.install(|| {
                buffer
                    .frames_mut()
                    .par_iter_mut()
                    .for_each(|(_, frame)| fft.process(frame));
            });

            let count = buffer.len();
            for (index, frame) in buffer.drain() {
                self.store.store(output, index, frame.view())?;
            }
            self.metrics.record_frames(count);
            self.metrics.record_batch();
            self.logger
                .detail(&format!("batch {:?} -> {} frames", job.indices, count));
            Ok(())
        })?;

        Ok((skipped, jobs.len()))
    }

    /// Gathers the spatial spectra into the disk-backed volume.
    fn materialize(
        &self,
        direction: Direction,
        first: usize,
        skipped: &[usize],
    ) -> FilterResult<CubeVolume> {
        let kind = direction.output_kind();
        let mut volume = CubeVolume::create(&self.volume_path, self.dims)?;
        for_each_cancellable(0..self.dims.frames, &self.cancel, |t| {
            let index = first + t;
            if skipped.contains(&index) {
                // Fresh volume pages read back as zeros.
                return Ok(());
            }
            let frame: Array2<Complex32> = self.store.load(kind, index)?;
            self.check_shape(index, &frame)?;
            volume.write_frame(t, frame.view())
        })?;
        volume.flush()?;
        Ok(volume)
    }

    /// Time-axis transform of every tile on the worker pool.
    fn temporal_pass<F>(
        &self,
        volume: &mut CubeVolume,
        direction: Direction,
        on_tile: &F,
    ) -> FilterResult<usize>
    where
        F: Fn(&Tile) + Sync,
    {
        let fft = TemporalFft::new(self.dims.frames, direction);
        let tiles = volume.tiles_mut(&self.grid)?;
        let count = tiles.len();

        self.pool.install(|| {
            par_for_each_cancellable(tiles, &self.cancel, |(tile, mut view)| {
                let mut block = view.to_owned();
                fft.process_block(&mut block);
                view.assign(&block);
                self.metrics.record_tile();
                self.logger.detail(&format!("tile {:?} done", tile));
                on_tile(&tile);
                Ok(())
            })
        })?;

        volume.flush()?;
        Ok(count)
    }

    /// Writes every time slice back to the store as a spectral frame.
    fn extract(&self, volume: &CubeVolume, direction: Direction, first: usize) -> FilterResult<()> {
        let kind = direction.output_kind();
        for_each_cancellable(0..self.dims.frames, &self.cancel, |t| {
            let frame = volume.read_frame(t)?;
            self.store.store(kind, first + t, frame.view())
        })
    }
}
