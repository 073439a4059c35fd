use thiserror::Error;

/// Number of pixel planes carried by every [`Frame`] (typically Y, U, V).
pub const PLANE_COUNT: usize = 3;

/// Byte sizes and line strides for the three planes of one video stream.
///
/// A source advertises its layout once; every frame buffer allocated for that
/// source is sized from it and keeps that shape for its whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub sizes: [usize; PLANE_COUNT],
    pub strides: [usize; PLANE_COUNT],
}

impl PlaneLayout {
    pub fn new(sizes: [usize; PLANE_COUNT], strides: [usize; PLANE_COUNT]) -> Result<Self, FrameError> {
        for (plane, &size) in sizes.iter().enumerate() {
            if size == 0 {
                return Err(FrameError::EmptyPlane { plane });
            }
        }
        Ok(Self { sizes, strides })
    }
}

/// One decoded video image: three plane buffers plus their line strides.
///
/// A frame owns its backing storage. Plane sizes are fixed at construction;
/// contents are overwritten on every read. At rest a frame lives in a buffer
/// pool, in flight it is held by exactly one pipeline stage, and the current
/// holder is the sole writer.
pub struct Frame {
    data: [Vec<u8>; PLANE_COUNT],
    line_size: [usize; PLANE_COUNT],
}

impl Frame {
    /// Allocates a frame sized exactly to `layout`.
    pub fn with_layout(layout: &PlaneLayout) -> Self {
        Self {
            data: [
                vec![0; layout.sizes[0]],
                vec![0; layout.sizes[1]],
                vec![0; layout.sizes[2]],
            ],
            line_size: layout.strides,
        }
    }

    pub fn layout(&self) -> PlaneLayout {
        PlaneLayout {
            sizes: [self.data[0].len(), self.data[1].len(), self.data[2].len()],
            strides: self.line_size,
        }
    }

    /// Read-only view of one plane. `plane` must be below [`PLANE_COUNT`].
    pub fn plane(&self, plane: usize) -> &[u8] {
        &self.data[plane]
    }

    /// Mutable view of one plane for the current holder to fill.
    pub fn plane_mut(&mut self, plane: usize) -> &mut [u8] {
        &mut self.data[plane]
    }

    pub fn line_size(&self, plane: usize) -> usize {
        self.line_size[plane]
    }

    pub fn line_sizes(&self) -> [usize; PLANE_COUNT] {
        self.line_size
    }

    pub fn set_line_sizes(&mut self, line_sizes: [usize; PLANE_COUNT]) {
        self.line_size = line_sizes;
    }

    /// Copies pixel data and strides from borrowed plane slices, preserving
    /// this frame's allocations. Every source plane must match the
    /// destination plane's size exactly.
    pub fn copy_planes(
        &mut self,
        planes: [&[u8]; PLANE_COUNT],
        strides: [usize; PLANE_COUNT],
    ) -> Result<(), FrameError> {
        for (plane, src) in planes.iter().enumerate() {
            if src.len() != self.data[plane].len() {
                return Err(FrameError::PlaneSize {
                    plane,
                    expected: self.data[plane].len(),
                    actual: src.len(),
                });
            }
        }
        for (plane, src) in planes.iter().enumerate() {
            self.data[plane].copy_from_slice(src);
            self.line_size[plane] = strides[plane];
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("plane {plane} size mismatch: expected {expected} bytes, got {actual}")]
    PlaneSize {
        plane: usize,
        expected: usize,
        actual: usize,
    },
    #[error("plane {plane} must not be zero-length")]
    EmptyPlane { plane: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> PlaneLayout {
        PlaneLayout::new([16, 4, 4], [4, 2, 2]).unwrap()
    }

    #[test]
    fn with_layout_allocates_all_planes() {
        let frame = Frame::with_layout(&layout());
        assert_eq!(frame.plane(0).len(), 16);
        assert_eq!(frame.plane(1).len(), 4);
        assert_eq!(frame.plane(2).len(), 4);
        assert_eq!(frame.line_sizes(), [4, 2, 2]);
    }

    #[test]
    fn copy_planes_rejects_size_mismatch() {
        let mut frame = Frame::with_layout(&layout());
        let y = [1u8; 16];
        let u = [2u8; 4];
        let v = [3u8; 3];
        let err = frame.copy_planes([&y, &u, &v], [4, 2, 2]).unwrap_err();
        assert!(matches!(err, FrameError::PlaneSize { plane: 2, .. }));
        // Nothing was written on the failed call.
        assert!(frame.plane(0).iter().all(|&b| b == 0));
    }

    #[test]
    fn copy_planes_overwrites_data_and_strides() {
        let mut frame = Frame::with_layout(&layout());
        let y = [9u8; 16];
        let u = [8u8; 4];
        let v = [7u8; 4];
        frame.copy_planes([&y, &u, &v], [8, 4, 4]).unwrap();
        assert_eq!(frame.plane(0), &y);
        assert_eq!(frame.line_size(1), 4);
    }

    #[test]
    fn zero_sized_plane_is_rejected() {
        let err = PlaneLayout::new([16, 0, 4], [4, 0, 2]).unwrap_err();
        assert!(matches!(err, FrameError::EmptyPlane { plane: 1 }));
    }
}
