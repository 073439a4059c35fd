use std::collections::HashMap;
use std::io;

use thiserror::Error;

use crate::frame::Frame;

pub type MetricResult<T> = Result<T, MetricError>;

/// Score key to value. A metric may emit several keys per comparison (for
/// example three norms) but must emit the same key set on every call so the
/// aggregated per-frame arrays are dense.
pub type ScoreMap = HashMap<String, f64>;

/// Whether a metric tolerates concurrent `compute` calls on one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    /// `compute` may run concurrently for distinct frame pairs.
    Safe,
    /// The metric carries state across frames and must see pairs one at a
    /// time, in presentation order. The comparator rejects more than one
    /// frame worker when such a metric participates.
    Sequential,
}

/// A named compute unit producing scalar scores for a frame pair.
pub trait Metric: Send + Sync {
    /// Stable identifier, used in error reporting and as a score-key prefix
    /// by convention.
    fn name(&self) -> &str;

    fn parallelism(&self) -> Parallelism {
        Parallelism::Safe
    }

    /// Compares one matched pair and returns its scores. Concurrent
    /// invocation on the same instance is only legal when
    /// [`Metric::parallelism`] is [`Parallelism::Safe`].
    fn compute(&self, reference: &Frame, distortion: &Frame) -> MetricResult<ScoreMap>;

    /// Releases backing resources. Called once after the run, on success or
    /// failure.
    fn close(&self) {}
}

/// Receives one per-pixel distortion map per `compute` call. Invoked
/// synchronously on the worker thread before `compute` returns; the borrowed
/// buffer is only valid for the duration of the call.
pub type DistMapCallback = Box<dyn FnMut(&[f32]) -> io::Result<()> + Send>;

/// Capability refinement for metrics that can render their error as a
/// per-pixel float map alongside the scalar scores.
pub trait HeatmapMetric: Metric {
    /// Width and height of the distortion map, in pixels.
    fn dist_map_resolution(&self) -> (u32, u32);

    /// Registers `callback` to run once per comparison. Only valid while the
    /// metric was built for a single frame worker; implementations must
    /// refuse otherwise. The callback's error is surfaced as the `compute`
    /// error of the comparison that triggered it.
    fn set_dist_map_callback(&self, callback: DistMapCallback) -> MetricResult<()>;
}

#[derive(Debug, Error)]
pub enum MetricError {
    #[error("{metric} computation failed: {message}")]
    Compute { metric: String, message: String },

    #[error("{metric} does not produce distortion maps")]
    HeatmapUnsupported { metric: String },

    #[error("distortion map callbacks require exactly one frame worker (metric was built for {workers})")]
    CallbackParallelism { workers: usize },

    #[error("distortion map callback failed: {0}")]
    DistMapWrite(#[source] io::Error),
}

impl MetricError {
    pub fn compute(metric: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compute {
            metric: metric.into(),
            message: message.into(),
        }
    }
}
