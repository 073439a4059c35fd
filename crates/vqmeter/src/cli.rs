use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use vqmeter_types::DisplayModel;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum MetricKind {
    /// Per-plane peak signal-to-noise ratio
    Psnr,
    /// Mean absolute luma difference in display nits (heat-map capable)
    Absdiff,
    /// Frame-to-frame flicker (requires --frame-threads 1)
    Flicker,
}

#[derive(Debug, Parser)]
#[command(
    name = "vqmeter",
    about = "Compare two videos with perceptual quality metrics",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Reference video the distorted video is compared against
    #[arg(short = 'r', long = "reference", value_name = "FILE")]
    pub reference: PathBuf,

    /// Distorted video to score
    #[arg(short = 'd', long = "distortion", value_name = "FILE")]
    pub distortion: PathBuf,

    /// Comma separated list of metrics to compute
    #[arg(
        long = "metrics",
        value_enum,
        value_delimiter = ',',
        default_value = "psnr"
    )]
    pub metrics: Vec<MetricKind>,

    /// Lock both sources to a specific backend implementation
    #[arg(short = 'b', long = "backend")]
    pub backend: Option<String>,

    /// Number of frame pairs processed in parallel
    #[arg(
        long = "frame-threads",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub frame_threads: u32,

    /// Override the frame rate used for heat-map timestamps (default: the
    /// reference source's rate)
    #[arg(short = 'f', long = "fps")]
    pub fps: Option<f32>,

    /// Compare only the first N frame pairs
    #[arg(long = "frames", value_parser = clap::value_parser!(u64).range(1..))]
    pub frames: Option<u64>,

    /// Write the per-frame score table as JSON
    #[arg(long = "json", value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Output path for the absdiff heat-map video; empty disables output
    #[arg(long = "absdiff-video-path", value_name = "FILE")]
    pub absdiff_video_path: Option<PathBuf>,

    /// Clipping value for the absdiff distortion map, in nits
    #[arg(long = "absdiff-clipping", default_value_t = 50.0)]
    pub absdiff_clipping: f32,

    /// Target display brightness in nits
    #[arg(long = "display-nits", default_value_t = 203.0)]
    pub display_nits: f32,

    /// Target display horizontal resolution in pixels
    #[arg(long = "display-width", default_value_t = 3840)]
    pub display_width: u32,

    /// Target display vertical resolution in pixels
    #[arg(long = "display-height", default_value_t = 2160)]
    pub display_height: u32,

    /// Target display diagonal size in inches
    #[arg(long = "display-size", default_value_t = 32.0)]
    pub display_size: f32,

    /// Viewing distance in meters
    #[arg(long = "display-distance", default_value_t = 0.7472)]
    pub display_distance: f32,

    /// Target display contrast ratio
    #[arg(long = "display-contrast", default_value_t = 10_000)]
    pub display_contrast: u32,

    /// Ambient light level in lux
    #[arg(long = "room-brightness", default_value_t = 250)]
    pub room_brightness: u32,
}

impl CliArgs {
    pub fn display_model(&self) -> DisplayModel {
        DisplayModel {
            max_luminance: self.display_nits,
            display_width: self.display_width,
            display_height: self.display_height,
            diagonal_inches: self.display_size,
            viewing_distance_meters: self.display_distance,
            contrast_ratio: self.display_contrast,
            ambient_lux: self.room_brightness,
        }
    }
}
