use std::collections::HashMap;

use parking_lot::Mutex;

use vqmeter_types::{
    ColorProperties, DisplayModel, DistMapCallback, Frame, HeatmapMetric, Metric, MetricError,
    MetricResult, ScoreMap,
};

use crate::checked_plane;

/// Mean absolute luma difference, reported in display-referred nits.
///
/// Emits `absdiff_mean` and `absdiff_peak`, both scaled by the display
/// model's peak luminance so a full-swing 8-bit error maps to the display's
/// brightest output. When a distortion-map callback is registered, every
/// comparison also renders the per-pixel error as a float map at the luma
/// resolution; the internal map buffer is reused across calls, which is why
/// callbacks are only legal for single-worker configurations.
pub struct PlaneAbsDiff {
    width: usize,
    height: usize,
    nits_per_code: f32,
    workers: usize,
    callback: Mutex<Option<DistMapCallback>>,
    map_buffer: Mutex<Vec<f32>>,
}

impl PlaneAbsDiff {
    /// `workers` is the number of frame threads this instance will serve;
    /// distortion-map callbacks are refused when it exceeds one.
    pub fn new(props: &ColorProperties, display: &DisplayModel, workers: usize) -> Self {
        Self {
            width: props.width as usize,
            height: props.height as usize,
            nits_per_code: display.max_luminance / 255.0,
            workers,
            callback: Mutex::new(None),
            map_buffer: Mutex::new(Vec::new()),
        }
    }
}

impl Metric for PlaneAbsDiff {
    fn name(&self) -> &str {
        "absdiff"
    }

    fn compute(&self, reference: &Frame, distortion: &Frame) -> MetricResult<ScoreMap> {
        let (ref_data, ref_stride) =
            checked_plane("absdiff", reference, 0, self.width, self.height)?;
        let (dist_data, dist_stride) =
            checked_plane("absdiff", distortion, 0, self.width, self.height)?;

        // Map rendering only happens in single-worker runs (callbacks are
        // refused otherwise), so taking the buffer lock after the check is
        // race-free; parallel map-less runs skip both locks entirely.
        let wants_map = self.callback.lock().is_some();
        let mut map = wants_map.then(|| {
            let mut map = self.map_buffer.lock();
            map.clear();
            map.reserve(self.width * self.height);
            map
        });

        let mut sum = 0.0f64;
        let mut peak = 0.0f64;
        for row in 0..self.height {
            let ref_row = &ref_data[row * ref_stride..row * ref_stride + self.width];
            let dist_row = &dist_data[row * dist_stride..row * dist_stride + self.width];
            for (&a, &b) in ref_row.iter().zip(dist_row) {
                let nits = (a as i16 - b as i16).abs() as f32 * self.nits_per_code;
                sum += nits as f64;
                if nits as f64 > peak {
                    peak = nits as f64;
                }
                if let Some(map) = map.as_mut() {
                    map.push(nits);
                }
            }
        }

        if let Some(map) = map {
            if let Some(callback) = self.callback.lock().as_mut() {
                callback(&map).map_err(MetricError::DistMapWrite)?;
            }
        }

        let pixels = (self.width * self.height) as f64;
        Ok(HashMap::from([
            ("absdiff_mean".to_string(), sum / pixels),
            ("absdiff_peak".to_string(), peak),
        ]))
    }
}

impl HeatmapMetric for PlaneAbsDiff {
    fn dist_map_resolution(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    fn set_dist_map_callback(&self, callback: DistMapCallback) -> MetricResult<()> {
        if self.workers > 1 {
            return Err(MetricError::CallbackParallelism {
                workers: self.workers,
            });
        }
        *self.callback.lock() = Some(callback);
        Ok(())
    }
}
