use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use vqmeter_types::{
    ChromaLocation, ColorProperties, ColorRange, Frame, PixelFormat, PlaneLayout, Source,
    SourceError, SourceResult, PLANE_COUNT,
};

const MAGIC: &str = "YUV4MPEG2";

/// YUV4MPEG2 file reader.
///
/// The stream is scanned once at open to learn the total frame count, then
/// rewound; `read_into` serves frames in order from the scanned positions.
/// Only progressive 4:2:0 / 4:2:2 / 4:4:4 8-bit streams are accepted.
#[derive(Debug)]
pub struct Y4mSource {
    reader: BufReader<File>,
    layout: PlaneLayout,
    props: ColorProperties,
    frame_rate: f32,
    frame_count: usize,
    cursor: usize,
}

impl Y4mSource {
    pub fn open(path: &Path) -> SourceResult<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut header = String::new();
        reader.read_line(&mut header)?;
        let (props, frame_rate) = parse_header(header.trim_end())?;

        let layout = plane_layout(&props);
        let frame_bytes: usize = layout.sizes.iter().sum();
        let data_offset = header.len() as u64;

        let frame_count = scan_frames(&mut reader, file_len, frame_bytes)?;
        if frame_count == 0 {
            return Err(SourceError::malformed("stream contains no frames"));
        }
        reader.seek(SeekFrom::Start(data_offset))?;

        Ok(Self {
            reader,
            layout,
            props,
            frame_rate,
            frame_count,
            cursor: 0,
        })
    }
}

impl Source for Y4mSource {
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

        let mut marker = String::new();
        let read = self.reader.read_line(&mut marker)?;
        if read == 0 || !marker.starts_with("FRAME") {
            return Err(SourceError::malformed(format!(
                "expected FRAME marker before frame {}",
                self.cursor
            )));
        }
        for plane in 0..PLANE_COUNT {
            self.reader.read_exact(frame.plane_mut(plane))?;
        }
        frame.set_line_sizes(self.layout.strides);

        self.cursor += 1;
        Ok(())
    }
}

fn plane_layout(props: &ColorProperties) -> PlaneLayout {
    let (chroma_w, chroma_h) = props.plane_dimensions(1);
    let luma = props.width as usize * props.height as usize;
    let chroma = chroma_w as usize * chroma_h as usize;
    PlaneLayout {
        sizes: [luma, chroma, chroma],
        strides: [props.width as usize, chroma_w as usize, chroma_w as usize],
    }
}

fn parse_header(header: &str) -> SourceResult<(ColorProperties, f32)> {
    let mut tokens = header.split_ascii_whitespace();
    if tokens.next() != Some(MAGIC) {
        return Err(SourceError::malformed("missing YUV4MPEG2 signature"));
    }

    let mut width = None;
    let mut height = None;
    let mut frame_rate = None;
    let mut colorspace = "420";
    let mut color_range = ColorRange::default();

    for token in tokens {
        let (tag, value) = token.split_at(1);
        match tag {
            "W" => width = Some(parse_dimension(value, "width")?),
            "H" => height = Some(parse_dimension(value, "height")?),
            "F" => frame_rate = Some(parse_frame_rate(value)?),
            "I" => {
                if value != "p" {
                    return Err(SourceError::malformed(
                        "interlaced input is not supported",
                    ));
                }
            }
            "C" => colorspace = value,
            "X" => {
                if let Some(range) = value.strip_prefix("COLORRANGE=") {
                    color_range = match range {
                        "FULL" => ColorRange::Full,
                        _ => ColorRange::Limited,
                    };
                }
            }
            // Pixel aspect and unknown extensions carry no pixel data.
            _ => {}
        }
    }

    let width = width.ok_or_else(|| SourceError::malformed("header is missing W"))?;
    let height = height.ok_or_else(|| SourceError::malformed("header is missing H"))?;
    let frame_rate = frame_rate.ok_or_else(|| SourceError::malformed("header is missing F"))?;

    let (pixel_format, chroma_location) = match colorspace {
        "420" | "420jpeg" => (PixelFormat::Yuv420p, ChromaLocation::Center),
        "420mpeg2" => (PixelFormat::Yuv420p, ChromaLocation::Left),
        "420paldv" => (PixelFormat::Yuv420p, ChromaLocation::TopLeft),
        "422" => (PixelFormat::Yuv422p, ChromaLocation::Left),
        "444" => (PixelFormat::Yuv444p, ChromaLocation::Left),
        other => {
            return Err(SourceError::malformed(format!(
                "unsupported colorspace C{other}"
            )))
        }
    };

    let mut props = ColorProperties::new(width, height, pixel_format);
    props.color_range = color_range;
    props.chroma_location = chroma_location;
    Ok((props, frame_rate))
}

fn parse_dimension(value: &str, what: &str) -> SourceResult<u32> {
    match value.parse::<u32>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(SourceError::malformed(format!("invalid {what} '{value}'"))),
    }
}

fn parse_frame_rate(value: &str) -> SourceResult<f32> {
    let (numerator, denominator) = value
        .split_once(':')
        .ok_or_else(|| SourceError::malformed(format!("invalid frame rate '{value}'")))?;
    let numerator: u32 = numerator
        .parse()
        .map_err(|_| SourceError::malformed(format!("invalid frame rate '{value}'")))?;
    let denominator: u32 = denominator
        .parse()
        .map_err(|_| SourceError::malformed(format!("invalid frame rate '{value}'")))?;
    if denominator == 0 {
        return Err(SourceError::malformed("frame rate denominator is zero"));
    }
    Ok(numerator as f32 / denominator as f32)
}

/// Counts frames by hopping over the pixel payload of each FRAME section.
fn scan_frames(
    reader: &mut BufReader<File>,
    file_len: u64,
    frame_bytes: usize,
) -> SourceResult<usize> {
    let mut count = 0usize;
    let mut marker = String::new();
    loop {
        marker.clear();
        let read = reader.read_line(&mut marker)?;
        if read == 0 {
            break;
        }
        if !marker.starts_with("FRAME") {
            return Err(SourceError::malformed(format!(
                "expected FRAME marker, found {:?}",
                marker.trim_end()
            )));
        }
        let position = reader.stream_position()?;
        if file_len.saturating_sub(position) < frame_bytes as u64 {
            return Err(SourceError::malformed(format!(
                "frame {count} is truncated"
            )));
        }
        reader.seek_relative(frame_bytes as i64)?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "vqmeter-y4m-{}-{name}.y4m",
            std::process::id()
        ));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    fn tiny_clip(frames: usize) -> Vec<u8> {
        // 4x2 C420: 8 luma + 2 + 2 chroma bytes per frame.
        let mut data = b"YUV4MPEG2 W4 H2 F25:1 Ip A1:1 C420\n".to_vec();
        for index in 0..frames {
            data.extend_from_slice(b"FRAME\n");
            data.extend(std::iter::repeat(index as u8).take(8));
            data.extend_from_slice(&[128, 128]);
            data.extend_from_slice(&[64, 64]);
        }
        data
    }

    #[test]
    fn open_reports_geometry_and_count() {
        let path = temp_file("geometry", &tiny_clip(3));
        let source = Y4mSource::open(&path).unwrap();
        assert_eq!(source.num_frames(), 3);
        assert_eq!(source.frame_rate(), 25.0);
        assert_eq!(source.plane_layout().sizes, [8, 2, 2]);
        assert_eq!(source.color_props().pixel_format, PixelFormat::Yuv420p);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn frames_are_served_in_order() {
        let path = temp_file("order", &tiny_clip(2));
        let mut source = Y4mSource::open(&path).unwrap();
        let mut frame = Frame::with_layout(&source.plane_layout());

        source.read_into(&mut frame).unwrap();
        assert!(frame.plane(0).iter().all(|&b| b == 0));
        source.read_into(&mut frame).unwrap();
        assert!(frame.plane(0).iter().all(|&b| b == 1));
        assert_eq!(frame.plane(1), &[128, 128]);

        let err = source.read_into(&mut frame).unwrap_err();
        assert!(matches!(err, SourceError::Exhausted { frames: 2 }));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn truncated_payload_is_rejected_at_open() {
        let mut data = tiny_clip(2);
        data.truncate(data.len() - 4);
        let path = temp_file("truncated", &data);
        let err = Y4mSource::open(&path).unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn bad_signature_is_rejected() {
        let path = temp_file("signature", b"JPEG4MPEG2 W4 H2 F25:1\n");
        let err = Y4mSource::open(&path).unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn interlaced_streams_are_rejected() {
        let path = temp_file("interlaced", b"YUV4MPEG2 W4 H2 F25:1 It C420\n");
        let err = Y4mSource::open(&path).unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
        std::fs::remove_file(path).unwrap();
    }
}
