use vqmeter_types::{
    ColorProperties, Frame, PixelFormat, PlaneLayout, Source, SourceError, SourceResult,
};

/// Deterministic generated clip, used as a fixture backend and in tests.
///
/// Luma rows ramp with `(row + index) % 256` and chroma planes hold a flat
/// per-frame value, so any frame's content can be predicted from its index.
pub struct SyntheticSource {
    props: ColorProperties,
    layout: PlaneLayout,
    frame_count: usize,
    frame_rate: f32,
    cursor: usize,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, frame_count: usize, frame_rate: f32) -> Self {
        let props = ColorProperties::new(width, height, PixelFormat::Yuv420p);
        let (chroma_w, chroma_h) = props.plane_dimensions(1);
        let luma = width as usize * height as usize;
        let chroma = chroma_w as usize * chroma_h as usize;
        let layout = PlaneLayout {
            sizes: [luma, chroma, chroma],
            strides: [width as usize, chroma_w as usize, chroma_w as usize],
        };
        Self {
            props,
            layout,
            frame_count,
            frame_rate,
            cursor: 0,
        }
    }

    /// The default clip produced when the backend is selected without
    /// further configuration.
    pub fn default_clip() -> Self {
        Self::new(640, 360, 120, 30.0)
    }
}

impl Source for SyntheticSource {
    fn plane_layout(&self) -> PlaneLayout {
        self.layout
    }

    fn num_frames(&self) -> usize {
        self.frame_count
    }

    fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    fn color_props(&self) -> ColorProperties {
        self.props
    }

    fn read_into(&mut self, frame: &mut Frame) -> SourceResult<()> {
        if self.cursor >= self.frame_count {
            return Err(SourceError::Exhausted {
                frames: self.frame_count,
            });
        }
        let index = self.cursor;

        let stride = self.layout.strides[0];
        for (row, chunk) in frame.plane_mut(0).chunks_mut(stride).enumerate() {
            chunk.fill(((row + index) % 256) as u8);
        }
        let chroma = ((index * 3 + 64) % 256) as u8;
        frame.plane_mut(1).fill(chroma);
        frame.plane_mut(2).fill(chroma.wrapping_add(1));
        frame.set_line_sizes(self.layout.strides);

        self.cursor += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_color_props() {
        let source = SyntheticSource::new(12, 6, 4, 24.0);
        let layout = source.plane_layout();
        assert_eq!(layout.sizes, [72, 18, 18]);
        assert_eq!(layout.strides, [12, 6, 6]);
        assert_eq!(source.color_props().width, 12);
    }

    #[test]
    fn frames_are_deterministic_per_index() {
        let mut source = SyntheticSource::new(8, 4, 2, 24.0);
        let mut frame = Frame::with_layout(&source.plane_layout());

        source.read_into(&mut frame).unwrap();
        assert_eq!(frame.plane(0)[0], 0);
        assert_eq!(frame.plane(0)[8], 1);

        source.read_into(&mut frame).unwrap();
        assert_eq!(frame.plane(0)[0], 1);
        assert_eq!(frame.plane(1)[0], 67);
    }

    #[test]
    fn exhausted_after_advertised_count() {
        let mut source = SyntheticSource::new(4, 4, 1, 24.0);
        let mut frame = Frame::with_layout(&source.plane_layout());
        source.read_into(&mut frame).unwrap();
        let err = source.read_into(&mut frame).unwrap_err();
        assert!(matches!(err, SourceError::Exhausted { frames: 1 }));
    }
}
