//! Full-stack runs over real sources and real metrics.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use vqmeter_compare::Comparator;
use vqmeter_metrics::{PlaneAbsDiff, Psnr};
use vqmeter_sources::{SyntheticSource, Y4mSource};
use vqmeter_types::{DisplayModel, Metric, Source};

fn write_y4m(name: &str, luma: u8, frames: usize) -> PathBuf {
    // 4x2 C420: 8 luma + 2 + 2 chroma bytes per frame.
    let mut data = b"YUV4MPEG2 W4 H2 F25:1 Ip A1:1 C420\n".to_vec();
    for _ in 0..frames {
        data.extend_from_slice(b"FRAME\n");
        data.extend(std::iter::repeat(luma).take(8));
        data.extend_from_slice(&[128, 128]);
        data.extend_from_slice(&[64, 64]);
    }
    let path = std::env::temp_dir().join(format!(
        "vqmeter-e2e-{}-{name}.y4m",
        std::process::id()
    ));
    let mut file = File::create(&path).unwrap();
    file.write_all(&data).unwrap();
    path
}

#[tokio::test(flavor = "multi_thread")]
async fn identical_synthetic_clips_score_perfectly() {
    let reference = Box::new(SyntheticSource::new(16, 8, 5, 24.0));
    let distortion = Box::new(SyntheticSource::new(16, 8, 5, 24.0));
    let props = reference.color_props();

    let display = DisplayModel::standard_4k();
    let metrics: Vec<Arc<dyn Metric>> = vec![
        Arc::new(Psnr::new(&props)),
        Arc::new(PlaneAbsDiff::new(&props, &display, 2)),
    ];

    let comparator = Comparator::new(reference, distortion, metrics, 2, 5).unwrap();
    let scores = comparator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(scores.len(), 5);
    for key in ["psnr_y", "psnr_u", "psnr_v"] {
        assert_eq!(scores[key], vec![100.0; 5]);
    }
    assert_eq!(scores["absdiff_mean"], vec![0.0; 5]);
    assert_eq!(scores["absdiff_peak"], vec![0.0; 5]);
}

#[tokio::test(flavor = "multi_thread")]
async fn y4m_pair_produces_closed_form_psnr() {
    let reference_path = write_y4m("reference", 10, 3);
    let distortion_path = write_y4m("distortion", 20, 3);

    let reference = Box::new(Y4mSource::open(&reference_path).unwrap());
    let distortion = Box::new(Y4mSource::open(&distortion_path).unwrap());
    let props = reference.color_props();

    let metrics: Vec<Arc<dyn Metric>> = vec![Arc::new(Psnr::new(&props))];
    let comparator = Comparator::new(reference, distortion, metrics, 2, 3).unwrap();
    let scores = comparator.run(&CancellationToken::new()).await.unwrap();

    // Luma differs by exactly 10 everywhere: MSE 100.
    let expected = 10.0 * (255.0f64 * 255.0 / 100.0).log10();
    for value in &scores["psnr_y"] {
        assert!((value - expected).abs() < 1e-9);
    }
    assert_eq!(scores["psnr_u"], vec![100.0; 3]);

    std::fs::remove_file(reference_path).unwrap();
    std::fs::remove_file(distortion_path).unwrap();
}
