//! Color description attached to a video stream and the display model used
//! by viewing-condition-aware metrics.

/// Planar pixel layouts the comparator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    #[default]
    Yuv420p,
    Yuv422p,
    Yuv444p,
}

impl PixelFormat {
    /// Log2 chroma subsampling as `(horizontal, vertical)` shifts.
    pub fn chroma_shift(self) -> (u32, u32) {
        match self {
            PixelFormat::Yuv420p => (1, 1),
            PixelFormat::Yuv422p => (1, 0),
            PixelFormat::Yuv444p => (0, 0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PixelFormat::Yuv420p => "yuv420p",
            PixelFormat::Yuv422p => "yuv422p",
            PixelFormat::Yuv444p => "yuv444p",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorRange {
    #[default]
    Limited,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMatrix {
    #[default]
    Bt709,
    Bt470bg,
    Smpte170m,
    Bt2020Ncl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferCharacteristic {
    #[default]
    Bt709,
    Srgb,
    Linear,
    Pq,
    Hlg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorPrimaries {
    #[default]
    Bt709,
    Bt470bg,
    Bt2020,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChromaLocation {
    #[default]
    Left,
    Center,
    TopLeft,
    Top,
}

/// Everything a source knows about how its pixels should be interpreted.
///
/// The comparator itself is colorspace-agnostic; these properties are
/// consumed by metric constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorProperties {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub color_range: ColorRange,
    pub color_matrix: ColorMatrix,
    pub transfer: TransferCharacteristic,
    pub primaries: ColorPrimaries,
    pub chroma_location: ChromaLocation,
}

impl ColorProperties {
    /// Properties for a stream of `width` x `height` in `pixel_format`, with
    /// every other attribute at its BT.709 default.
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            width,
            height,
            pixel_format,
            color_range: ColorRange::default(),
            color_matrix: ColorMatrix::default(),
            transfer: TransferCharacteristic::default(),
            primaries: ColorPrimaries::default(),
            chroma_location: ChromaLocation::default(),
        }
    }

    /// Pixel dimensions of one plane after chroma subsampling.
    pub fn plane_dimensions(&self, plane: usize) -> (u32, u32) {
        if plane == 0 {
            return (self.width, self.height);
        }
        let (shift_x, shift_y) = self.pixel_format.chroma_shift();
        (
            (self.width + (1 << shift_x) - 1) >> shift_x,
            (self.height + (1 << shift_y) - 1) >> shift_y,
        )
    }
}

/// Physical description of the display the distorted content is judged on.
///
/// Opaque to the pipeline; forwarded to metrics that weight errors by viewing
/// conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayModel {
    /// Peak luminance in nits.
    pub max_luminance: f32,
    pub display_width: u32,
    pub display_height: u32,
    pub diagonal_inches: f32,
    pub viewing_distance_meters: f32,
    pub contrast_ratio: u32,
    pub ambient_lux: u32,
}

impl DisplayModel {
    /// Reference SDR 4K viewing setup.
    pub fn standard_4k() -> Self {
        Self {
            max_luminance: 203.0,
            display_width: 3840,
            display_height: 2160,
            diagonal_inches: 32.0,
            viewing_distance_meters: 0.7472,
            contrast_ratio: 10_000,
            ambient_lux: 250,
        }
    }
}

impl Default for DisplayModel {
    fn default() -> Self {
        Self::standard_4k()
    }
}
