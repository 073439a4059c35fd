//! Shared domain models for the vqmeter workspace.
//!
//! This crate centralizes the data structures and trait contracts used across
//! the source, metric, comparator, and sink crates. Keep it backend-agnostic
//! and free of heavy dependencies so every crate can depend on it without
//! pulling native SDKs or an async runtime.

pub mod color;
pub mod frame;
pub mod metric;
pub mod source;

pub use color::{
    ChromaLocation, ColorMatrix, ColorPrimaries, ColorProperties, ColorRange, DisplayModel,
    PixelFormat, TransferCharacteristic,
};
pub use frame::{Frame, FrameError, PlaneLayout, PLANE_COUNT};
pub use metric::{
    DistMapCallback, HeatmapMetric, Metric, MetricError, MetricResult, Parallelism, ScoreMap,
};
pub use source::{Source, SourceError, SourceResult};
