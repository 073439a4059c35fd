//! Streams per-frame distortion maps into an external video encoder.
//!
//! A [`HeatmapSink`] spawns the encoder (ffmpeg by default) configured for
//! raw little-endian float32 grayscale input, registers itself as the
//! distortion-map callback of a [`HeatmapMetric`], and forwards one
//! normalised frame per comparison over the encoder's standard input. The
//! callback runs synchronously on the metric worker thread, so all process
//! I/O here is plain blocking `std` I/O.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use vqmeter_types::{HeatmapMetric, MetricError};

/// Codec arguments used when the caller supplies none.
const DEFAULT_CODEC_ARGS: [&str; 6] = ["-c:v", "libx264", "-preset", "fast", "-crf", "18"];

#[derive(Debug, Clone)]
pub struct HeatmapSinkConfig {
    /// Frame rate stamped on the encoded heat-map stream.
    pub frame_rate: f32,
    /// Distortion values are clamped to `[0, clipping]` and divided by it;
    /// must be positive.
    pub clipping: f32,
    pub output: PathBuf,
    /// Encoder binary; `ffmpeg` unless overridden.
    pub encoder: PathBuf,
    /// Replacement for the default codec arguments.
    pub codec_args: Option<Vec<String>>,
}

impl HeatmapSinkConfig {
    pub fn new(frame_rate: f32, clipping: f32, output: PathBuf) -> Self {
        Self {
            frame_rate,
            clipping,
            output,
            encoder: PathBuf::from("ffmpeg"),
            codec_args: None,
        }
    }
}

/// One running encoder process wired to one metric.
#[derive(Debug)]
pub struct HeatmapSink {
    child: Option<Child>,
    pipe: Arc<Mutex<Option<ChildStdin>>>,
    output: PathBuf,
}

impl HeatmapSink {
    /// Spawns the encoder for `metric`'s distortion-map resolution and
    /// registers the forwarding callback on it. The metric must have been
    /// built for a single frame worker or registration fails and the
    /// half-started encoder is reaped.
    pub fn attach(
        metric: &dyn HeatmapMetric,
        config: HeatmapSinkConfig,
    ) -> Result<Self, HeatmapSinkError> {
        if !(config.clipping > 0.0) {
            return Err(HeatmapSinkError::InvalidClipping {
                clipping: config.clipping,
            });
        }
        let (width, height) = metric.dist_map_resolution();
        if width == 0 || height == 0 {
            return Err(HeatmapSinkError::InvalidResolution { width, height });
        }

        let codec_args: Vec<String> = match &config.codec_args {
            Some(args) => args.clone(),
            None => DEFAULT_CODEC_ARGS.iter().map(|arg| arg.to_string()).collect(),
        };
        let args = encoder_args(width, height, config.frame_rate, &codec_args, &config.output);

        let mut child = Command::new(&config.encoder)
            .args(&args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|source| HeatmapSinkError::Spawn {
                encoder: config.encoder.display().to_string(),
                source,
            })?;
        let stdin = child.stdin.take().ok_or_else(|| HeatmapSinkError::Spawn {
            encoder: config.encoder.display().to_string(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, "no stdin pipe"),
        })?;

        let pipe = Arc::new(Mutex::new(Some(stdin)));
        let mut sink = Self {
            child: Some(child),
            pipe: Arc::clone(&pipe),
            output: config.output,
        };

        let clipping = config.clipping;
        let mut byte_buffer: Vec<u8> = Vec::new();
        let callback = Box::new(move |values: &[f32]| -> io::Result<()> {
            if values.is_empty() {
                return Ok(());
            }
            normalize_frame(values, clipping, &mut byte_buffer);
            let mut pipe = pipe.lock();
            match pipe.as_mut() {
                Some(stdin) => stdin.write_all(&byte_buffer),
                None => Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "heat-map sink is closed",
                )),
            }
        });
        if let Err(error) = metric.set_dist_map_callback(callback) {
            // Reap the encoder we just started; the registration failure is
            // the error to surface.
            let _ = sink.close();
            return Err(HeatmapSinkError::Callback(error));
        }

        Ok(sink)
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Signals end-of-stream by closing the pipe and waits for the encoder
    /// to flush and exit. Safe to call more than once.
    pub fn close(&mut self) -> Result<(), HeatmapSinkError> {
        self.pipe.lock().take();
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
        if !status.success() {
            return Err(HeatmapSinkError::EncoderExit { status });
        }
        Ok(())
    }
}

/// Full encoder argument list: raw grayf32le frames on stdin, colourised
/// through the heat palette, encoded to `output`.
fn encoder_args(
    width: u32,
    height: u32,
    frame_rate: f32,
    codec_args: &[String],
    output: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pixel_format".into(),
        "grayf32le".into(),
        "-s".into(),
        format!("{width}x{height}").into(),
        "-r".into(),
        frame_rate.to_string().into(),
        "-i".into(),
        "-".into(),
        "-vf".into(),
        "format=rgb24,pseudocolor=p=heat".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
    ];
    args.extend(codec_args.iter().map(OsString::from));
    args.push(output.as_os_str().to_os_string());
    args
}

/// Clamps every value to `[0, clipping]`, scales into `[0, 1]`, and encodes
/// the result as little-endian IEEE-754 float32 bytes in row order.
fn normalize_frame(values: &[f32], clipping: f32, out: &mut Vec<u8>) {
    out.clear();
    out.reserve(values.len() * 4);
    let scale = 1.0 / clipping;
    for value in values {
        let normalized = value.clamp(0.0, clipping) * scale;
        out.extend_from_slice(&normalized.to_le_bytes());
    }
}

#[derive(Debug, Error)]
pub enum HeatmapSinkError {
    #[error("clipping must be positive, got {clipping}")]
    InvalidClipping { clipping: f32 },

    #[error("invalid distortion map resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    #[error("failed to launch {encoder}: {source}")]
    Spawn {
        encoder: String,
        source: io::Error,
    },

    #[error("could not register distortion map callback: {0}")]
    Callback(#[source] MetricError),

    #[error("encoder exited with {status}")]
    EncoderExit { status: ExitStatus },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_clamps_both_ends() {
        let mut out = Vec::new();
        normalize_frame(&[0.0, 5.0, 10.0, 20.0, -3.0], 10.0, &mut out);
        let floats: Vec<f32> = out
            .chunks_exact(4)
            .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect();
        assert_eq!(floats, vec![0.0, 0.5, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn byte_order_is_little_endian() {
        let mut out = Vec::new();
        normalize_frame(&[1.0], 1.0, &mut out);
        assert_eq!(out, 1.0f32.to_le_bytes());
    }

    #[test]
    fn encoder_args_follow_the_rawvideo_contract() {
        let codec: Vec<String> = DEFAULT_CODEC_ARGS.iter().map(|s| s.to_string()).collect();
        let args = encoder_args(2, 2, 24.0, &codec, Path::new("out.mkv"));
        let rendered: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            rendered,
            vec![
                "-y",
                "-f",
                "rawvideo",
                "-pixel_format",
                "grayf32le",
                "-s",
                "2x2",
                "-r",
                "24",
                "-i",
                "-",
                "-vf",
                "format=rgb24,pseudocolor=p=heat",
                "-pix_fmt",
                "yuv420p",
                "-c:v",
                "libx264",
                "-preset",
                "fast",
                "-crf",
                "18",
                "out.mkv",
            ]
        );
    }

    #[test]
    fn custom_codec_args_replace_the_defaults() {
        let codec = vec!["-c:v".to_string(), "libx265".to_string()];
        let args = encoder_args(4, 4, 30.0, &codec, Path::new("x.mkv"));
        let rendered: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert!(rendered.contains(&"libx265".to_string()));
        assert!(!rendered.contains(&"libx264".to_string()));
    }
}
