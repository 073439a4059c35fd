use thiserror::Error;

use crate::color::ColorProperties;
use crate::frame::{Frame, FrameError, PlaneLayout};

pub type SourceResult<T> = Result<T, SourceError>;

/// A decoded-frame provider: one side of a comparison.
///
/// Implementations keep their own monotonic cursor starting at frame 0; the
/// pipeline calls [`Source::read_into`] at most [`Source::num_frames`] times
/// and never concurrently on the same instance (hence `&mut self`). A read
/// failure is terminal for that source.
pub trait Source: Send {
    /// Plane sizes and strides, stable for the life of the source. Frame
    /// buffers for this side are allocated from this layout.
    fn plane_layout(&self) -> PlaneLayout;

    /// Total frames this source will produce from index 0.
    fn num_frames(&self) -> usize;

    /// Nominal frame rate, used for encoder timestamp derivation.
    fn frame_rate(&self) -> f32;

    fn color_props(&self) -> ColorProperties;

    /// Fills all three planes of `frame` with the next frame and sets its
    /// strides, then advances the cursor.
    fn read_into(&mut self, frame: &mut Frame) -> SourceResult<()>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{backend} source failed: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("malformed stream: {reason}")]
    Malformed { reason: String },

    #[error("stream exhausted after {frames} frames")]
    Exhausted { frames: usize },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}
