use thiserror::Error;

use vqmeter_types::{MetricError, SourceError};

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("at least one metric is required")]
    NoMetrics,

    #[error("at least one frame thread is required")]
    NoFrameThreads,

    #[error("cannot compare zero frames")]
    NoFrames,

    #[error("{side} source holds {available} frames but {requested} were requested")]
    NotEnoughFrames {
        side: &'static str,
        available: usize,
        requested: usize,
    },

    #[error("metric {name} requires sequential processing; use a single frame thread")]
    SequentialMetric { name: String },

    #[error("failed to read {side} frame {index}: {source}")]
    SourceRead {
        side: &'static str,
        index: usize,
        source: SourceError,
    },

    #[error("metric {name} failed: {source}")]
    Metric { name: String, source: MetricError },

    #[error("duplicate score key {key:?} produced by {metric}")]
    DuplicateScoreKey { key: String, metric: String },

    #[error("aggregated score index {index} is outside the {total}-frame run")]
    ScoreIndexOutOfRange { index: usize, total: usize },

    #[error("comparison cancelled")]
    Cancelled,

    #[error("pipeline stage panicked: {0}")]
    StagePanic(String),
}

impl CompareError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CompareError::Cancelled)
    }
}
