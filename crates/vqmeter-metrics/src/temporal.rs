use std::collections::HashMap;

use parking_lot::Mutex;

use vqmeter_types::{
    ColorProperties, Frame, Metric, MetricResult, Parallelism, ScoreMap,
};

use crate::checked_plane;

/// Frame-to-frame flicker: how much the brightness gap between the two
/// streams moved since the previous pair.
///
/// Carries the previous pair's luma delta across calls, so it declares
/// itself [`Parallelism::Sequential`] and must see pairs in presentation
/// order. The first pair of a run scores 0.
pub struct TemporalFlicker {
    width: usize,
    height: usize,
    previous_delta: Mutex<Option<f64>>,
}

impl TemporalFlicker {
    pub fn new(props: &ColorProperties) -> Self {
        Self {
            width: props.width as usize,
            height: props.height as usize,
            previous_delta: Mutex::new(None),
        }
    }

    fn mean_luma(&self, frame: &Frame) -> MetricResult<f64> {
        let (data, stride) = checked_plane("flicker", frame, 0, self.width, self.height)?;
        let mut sum = 0u64;
        for row in 0..self.height {
            let row = &data[row * stride..row * stride + self.width];
            sum += row.iter().map(|&value| value as u64).sum::<u64>();
        }
        Ok(sum as f64 / (self.width * self.height) as f64)
    }
}

impl Metric for TemporalFlicker {
    fn name(&self) -> &str {
        "flicker"
    }

    fn parallelism(&self) -> Parallelism {
        Parallelism::Sequential
    }

    fn compute(&self, reference: &Frame, distortion: &Frame) -> MetricResult<ScoreMap> {
        let delta = self.mean_luma(reference)? - self.mean_luma(distortion)?;
        let mut previous = self.previous_delta.lock();
        let flicker = match *previous {
            Some(previous_delta) => (delta - previous_delta).abs(),
            None => 0.0,
        };
        *previous = Some(delta);
        Ok(HashMap::from([("flicker".to_string(), flicker)]))
    }
}
