use std::collections::HashMap;

use vqmeter_types::{ColorProperties, Frame, Metric, MetricResult, ScoreMap};

use crate::checked_plane;

/// Upper bound reported for identical planes, where the true ratio diverges.
const PSNR_CAP_DB: f64 = 100.0;

const KEYS: [&str; 3] = ["psnr_y", "psnr_u", "psnr_v"];

/// Per-plane peak signal-to-noise ratio over 8-bit planar frames.
///
/// Emits one score per plane (`psnr_y`, `psnr_u`, `psnr_v`). Stateless, so
/// any number of workers may share one instance.
pub struct Psnr {
    planes: [(usize, usize); 3],
}

impl Psnr {
    pub fn new(props: &ColorProperties) -> Self {
        let planes = [0, 1, 2].map(|plane| {
            let (width, height) = props.plane_dimensions(plane);
            (width as usize, height as usize)
        });
        Self { planes }
    }

    fn plane_psnr(&self, plane: usize, reference: &Frame, distortion: &Frame) -> MetricResult<f64> {
        let (width, height) = self.planes[plane];
        let (ref_data, ref_stride) = checked_plane("psnr", reference, plane, width, height)?;
        let (dist_data, dist_stride) = checked_plane("psnr", distortion, plane, width, height)?;

        let mut squared_error = 0u64;
        for row in 0..height {
            let ref_row = &ref_data[row * ref_stride..row * ref_stride + width];
            let dist_row = &dist_data[row * dist_stride..row * dist_stride + width];
            for (&a, &b) in ref_row.iter().zip(dist_row) {
                let diff = a as i64 - b as i64;
                squared_error += (diff * diff) as u64;
            }
        }

        let mse = squared_error as f64 / (width * height) as f64;
        if mse == 0.0 {
            return Ok(PSNR_CAP_DB);
        }
        Ok((10.0 * (255.0f64 * 255.0 / mse).log10()).min(PSNR_CAP_DB))
    }
}

impl Metric for Psnr {
    fn name(&self) -> &str {
        "psnr"
    }

    fn compute(&self, reference: &Frame, distortion: &Frame) -> MetricResult<ScoreMap> {
        let mut scores = HashMap::with_capacity(KEYS.len());
        for (plane, key) in KEYS.iter().enumerate() {
            scores.insert((*key).to_string(), self.plane_psnr(plane, reference, distortion)?);
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vqmeter_types::{PixelFormat, PlaneLayout};

    fn props() -> ColorProperties {
        ColorProperties::new(4, 4, PixelFormat::Yuv420p)
    }

    fn frame_filled(luma: u8, chroma: u8) -> Frame {
        let layout = PlaneLayout {
            sizes: [16, 4, 4],
            strides: [4, 2, 2],
        };
        let mut frame = Frame::with_layout(&layout);
        frame.plane_mut(0).fill(luma);
        frame.plane_mut(1).fill(chroma);
        frame.plane_mut(2).fill(chroma);
        frame
    }

    #[test]
    fn identical_frames_hit_the_cap() {
        let psnr = Psnr::new(&props());
        let a = frame_filled(120, 128);
        let b = frame_filled(120, 128);
        let scores = psnr.compute(&a, &b).unwrap();
        assert_eq!(scores.len(), 3);
        for key in KEYS {
            assert_eq!(scores[key], PSNR_CAP_DB);
        }
    }

    #[test]
    fn uniform_offset_matches_closed_form() {
        let psnr = Psnr::new(&props());
        let a = frame_filled(100, 128);
        let b = frame_filled(110, 128);
        let scores = psnr.compute(&a, &b).unwrap();
        // MSE is exactly 100, so PSNR = 10 * log10(255^2 / 100).
        let expected = 10.0 * (255.0f64 * 255.0 / 100.0).log10();
        assert!((scores["psnr_y"] - expected).abs() < 1e-9);
        assert_eq!(scores["psnr_u"], PSNR_CAP_DB);
    }

    #[test]
    fn undersized_plane_is_reported() {
        let psnr = Psnr::new(&ColorProperties::new(8, 8, PixelFormat::Yuv420p));
        let a = frame_filled(0, 0);
        let b = frame_filled(0, 0);
        assert!(psnr.compute(&a, &b).is_err());
    }
}
