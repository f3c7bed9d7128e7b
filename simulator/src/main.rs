use anyhow::Context;
use clap::Parser;
use generator::profile::build_source;
use log::{info, warn};
use ndarray::Array3;
use ndarray_npy::{read_npy, write_npy};
use std::fs;
use std::path::PathBuf;
use subsoniccore::InMemoryCube;
use tokio::runtime::Builder as TokioBuilder;
use tokio::{signal, task};
use workflow::config::{Overrides, WorkflowConfig};
use workflow::runner::Runner;

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Offline driver for the subsonic phase-velocity filter")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Filter a cube stored as .npy (frames x height x width) instead of a synthetic one
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long, default_value = "filtered.npy")]
    output: PathBuf,
    /// Write the run report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
    #[arg(long)]
    frames: Option<usize>,
    #[arg(long)]
    height: Option<usize>,
    #[arg(long)]
    width: Option<usize>,
    #[arg(long)]
    tile_width: Option<usize>,
    #[arg(long)]
    tile_height: Option<usize>,
    #[arg(long)]
    batch_size: Option<usize>,
    /// Tile workers; 0 uses one per core
    #[arg(long)]
    workers: Option<usize>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            frames: self.frames,
            height: self.height,
            width: self.width,
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            batch_size: self.batch_size,
            workers: self.workers,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = match &args.workflow {
        Some(path) => {
            let mut config = WorkflowConfig::load(path)?;
            config.apply(&args.overrides());
            config
        }
        None => WorkflowConfig::from_args(&args.overrides()),
    };

    let source = match &args.input {
        Some(path) => {
            let data: Array3<f32> = read_npy(path)
                .with_context(|| format!("reading input cube {}", path.display()))?;
            InMemoryCube::new(data, 0)
        }
        None => build_source(&workflow_config.generator).context("synthesizing input cube")?,
    };
    info!("input cube {:?}", source.data().dim());

    let runner = Runner::new(workflow_config);
    let cancel = runner.cancel_token();
    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating runtime for signal handling")?;

    let result = runtime.block_on(async {
        let mut worker = task::spawn_blocking(move || runner.execute(&source));
        tokio::select! {
            joined = &mut worker => joined.context("joining filter task")?,
            interrupted = signal::ctrl_c() => {
                interrupted.context("awaiting Ctrl+C")?;
                warn!("interrupted, cancelling the run");
                cancel.cancel();
                worker.await.context("joining filter task")?
            }
        }
    })?;

    write_npy(&args.output, &result.outcome.cube)
        .with_context(|| format!("writing filtered cube {}", args.output.display()))?;

    let report = &result.outcome.report;
    if let Some(path) = &args.report {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, report.to_json()?)
            .with_context(|| format!("writing report {}", path.display()))?;
    }

    println!(
        "Filtered frames {}..={} -> {} ({} tiles, {} workers, {:.2} s)",
        report.first,
        report.last,
        args.output.display(),
        report.tiles,
        report.workers,
        report.elapsed_secs
    );
    println!(
        "p-mode power at pixel {:?}: raw {:.4e}, filtered {:.4e}, suppressed {:.1}%",
        result.pixel,
        result.suppression.raw_power,
        result.suppression.filtered_power,
        result.suppression.suppression_percent
    );
    if report.has_warnings() {
        warn!(
            "run finished with warnings: skipped frames {:?}, scratch cleaned {}",
            report.skipped_frames, report.scratch_cleaned
        );
    }

    Ok(())
}
