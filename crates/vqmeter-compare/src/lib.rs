//! Concurrent comparison pipeline for paired video sources.
//!
//! Two readers pull frames from recycled buffer pools, a pair assembler
//! matches them by index, a configurable number of workers fan every metric
//! out over each pair, and an aggregator folds the results into per-metric
//! score arrays. All stages run under one cancellation scope; the first
//! error anywhere tears the pipeline down without stranding a buffer.

pub mod comparator;
pub mod error;
pub mod pool;

pub use comparator::{Comparator, FinalScores, ProgressCallback};
pub use error::CompareError;
pub use pool::{BufferPool, Pooled};
