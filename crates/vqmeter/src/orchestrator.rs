//! Wires sources, metrics, heat-map sinks, and the comparator together for
//! one CLI invocation.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use vqmeter_compare::{Comparator, CompareError, FinalScores};
use vqmeter_metrics::{PlaneAbsDiff, Psnr, TemporalFlicker};
use vqmeter_sink::{HeatmapSink, HeatmapSinkConfig, HeatmapSinkError};
use vqmeter_sources::{Backend, Configuration};
use vqmeter_types::{Metric, Source, SourceError};

use crate::cli::{CliArgs, MetricKind};
use crate::output;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Compare(#[from] CompareError),

    #[error(transparent)]
    Sink(#[from] HeatmapSinkError),

    #[error("failed to write score table: {0}")]
    ScoreDump(#[from] std::io::Error),
}

impl RunError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

pub async fn run(args: CliArgs) -> Result<FinalScores, RunError> {
    let backend = match &args.backend {
        Some(name) => Some(Backend::from_str(name)?),
        None => None,
    };
    let reference = open_side(&args.reference, backend)?;
    let distortion = open_side(&args.distortion, backend)?;

    let reference_props = reference.color_props();
    let distortion_props = distortion.color_props();
    if (reference_props.width, reference_props.height)
        != (distortion_props.width, distortion_props.height)
    {
        return Err(RunError::configuration(format!(
            "source geometry mismatch: reference is {}x{}, distortion is {}x{}",
            reference_props.width,
            reference_props.height,
            distortion_props.width,
            distortion_props.height,
        )));
    }

    let num_frames = match args.frames {
        Some(frames) => frames as usize,
        None => reference.num_frames().min(distortion.num_frames()),
    };
    let frame_rate = args.fps.unwrap_or_else(|| reference.frame_rate());
    let frame_threads = args.frame_threads as usize;
    let display = args.display_model();

    let mut kinds: Vec<MetricKind> = Vec::new();
    for kind in &args.metrics {
        if !kinds.contains(kind) {
            kinds.push(*kind);
        }
    }

    // Reject impossible configurations before spawning encoders or
    // allocating frame pools.
    if frame_threads > 1 && kinds.contains(&MetricKind::Flicker) {
        return Err(RunError::configuration(
            "flicker is a temporal metric; rerun with --frame-threads 1",
        ));
    }

    let mut metrics: Vec<Arc<dyn Metric>> = Vec::new();
    let mut sinks: Vec<HeatmapSink> = Vec::new();
    for kind in kinds {
        match kind {
            MetricKind::Psnr => metrics.push(Arc::new(Psnr::new(&reference_props))),
            MetricKind::Absdiff => {
                let metric = Arc::new(PlaneAbsDiff::new(&reference_props, &display, frame_threads));
                if let Some(path) = &args.absdiff_video_path {
                    let config =
                        HeatmapSinkConfig::new(frame_rate, args.absdiff_clipping, path.clone());
                    sinks.push(HeatmapSink::attach(metric.as_ref(), config)?);
                }
                metrics.push(metric);
            }
            MetricKind::Flicker => metrics.push(Arc::new(TemporalFlicker::new(&reference_props))),
        }
    }
    let closers = metrics.clone();

    let mut comparator =
        Comparator::new(reference, distortion, metrics, frame_threads, num_frames)?;

    let bar = ProgressBar::new(num_frames as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "{bar:40.cyan/blue} {percent:>3}% {pos}/{len} frames [{elapsed_precise}<{eta_precise}]",
        )
        .unwrap(),
    );
    {
        let bar = bar.clone();
        comparator.set_progress_callback(Box::new(move |done, _total| {
            bar.set_position(done as u64);
        }));
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let outcome = comparator.run(&cancel).await;
    for metric in &closers {
        metric.close();
    }

    match outcome {
        Ok(scores) => {
            bar.finish();
            for sink in &mut sinks {
                sink.close()?;
            }
            if let Some(path) = &args.json {
                output::write_json(path, &scores).await?;
            }
            Ok(scores)
        }
        Err(error) => {
            bar.abandon();
            // Best-effort close; the pipeline error stays the result.
            for sink in &mut sinks {
                if let Err(sink_error) = sink.close() {
                    eprintln!(
                        "warning: failed to finalize {}: {sink_error}",
                        sink.output().display()
                    );
                }
            }
            Err(error.into())
        }
    }
}

fn open_side(path: &Path, backend: Option<Backend>) -> Result<Box<dyn Source>, RunError> {
    let mut config = Configuration::from_env(path.to_path_buf())?;
    if let Some(backend) = backend {
        config.backend = Some(backend);
    }
    Ok(config.create_source()?)
}
