//! Built-in quality metrics.
//!
//! Each metric implements [`vqmeter_types::Metric`] over borrowed frame
//! pairs; heat-map-capable metrics additionally implement
//! [`vqmeter_types::HeatmapMetric`].

pub mod absdiff;
pub mod psnr;
pub mod temporal;

pub use absdiff::PlaneAbsDiff;
pub use psnr::Psnr;
pub use temporal::TemporalFlicker;

use vqmeter_types::{Frame, MetricError, MetricResult};

/// Validates that `plane` of `frame` covers a `width` x `height` grid at its
/// declared stride, returning the plane data and stride.
pub(crate) fn checked_plane<'frame>(
    metric: &str,
    frame: &'frame Frame,
    plane: usize,
    width: usize,
    height: usize,
) -> MetricResult<(&'frame [u8], usize)> {
    if width == 0 || height == 0 {
        return Err(MetricError::compute(
            metric,
            format!("plane {plane} has degenerate dimensions {width}x{height}"),
        ));
    }
    let data = frame.plane(plane);
    let stride = frame.line_size(plane);
    if stride < width {
        return Err(MetricError::compute(
            metric,
            format!("plane {plane} stride {stride} is smaller than width {width}"),
        ));
    }
    let required = (height - 1) * stride + width;
    if data.len() < required {
        return Err(MetricError::compute(
            metric,
            format!(
                "plane {plane} holds {} bytes but {required} are required",
                data.len()
            ),
        ));
    }
    Ok((data, stride))
}
