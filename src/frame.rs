//! Camera frames and the pixel buffers backing them.

use std::{fmt, time::Duration};

use crate::{error::FrameError, resolution::Resolution};

/// Memory layout of the pixels in a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit blue, green, red and alpha, in that byte order.
    Bgra8,
    /// 8-bit red, green, blue and alpha, in that byte order.
    Rgba8,
    /// Packed 8-bit red, green and blue.
    Rgb8,
    /// 8-bit luminance.
    Gray8,
    /// Full-resolution luma plane followed by an interleaved, half-resolution chroma plane.
    Nv12,
    /// A format identified by its FourCC code that the pipeline cannot read.
    Other(u32),
}

impl PixelFormat {
    /// Returns the number of bytes an image of `res` needs in this format, or [`None`] if the
    /// format is not supported.
    pub fn frame_size(&self, res: Resolution) -> Option<usize> {
        let (w, h) = (res.width() as usize, res.height() as usize);
        let size = match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => w * h * 4,
            PixelFormat::Rgb8 => w * h * 3,
            PixelFormat::Gray8 => w * h,
            PixelFormat::Nv12 => w * h + 2 * ((w + 1) / 2) * ((h + 1) / 2),
            PixelFormat::Other(_) => return None,
        };
        Some(size)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, PixelFormat::Other(_))
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Bgra8 => f.write_str("BGRA8"),
            PixelFormat::Rgba8 => f.write_str("RGBA8"),
            PixelFormat::Rgb8 => f.write_str("RGB8"),
            PixelFormat::Gray8 => f.write_str("GRAY8"),
            PixelFormat::Nv12 => f.write_str("NV12"),
            PixelFormat::Other(fourcc) => {
                let bytes = fourcc.to_le_bytes();
                if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
                    write!(f, "{}", String::from_utf8_lossy(&bytes))
                } else {
                    write!(f, "{fourcc:#010x}")
                }
            }
        }
    }
}

/// Storage of a camera image, typically owned by the capture system.
///
/// [`PixelBuffer::release`] is invoked exactly once, when the [`Frame`] wrapping the buffer has
/// been processed or discarded, and gives the memory back to its owner.
pub trait PixelBuffer: Send {
    fn resolution(&self) -> Resolution;

    fn pixel_format(&self) -> PixelFormat;

    /// Returns the raw pixel data.
    fn data(&self) -> &[u8];

    /// Returns the buffer to its owner.
    fn release(&mut self) {}
}

/// A pixel buffer backed by a heap allocation.
#[derive(Debug, Clone)]
pub struct OwnedBuffer {
    resolution: Resolution,
    format: PixelFormat,
    data: Vec<u8>,
}

impl OwnedBuffer {
    pub fn new(resolution: Resolution, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            resolution,
            format,
            data,
        }
    }

    /// Creates a buffer filled with zeroes, sized for `resolution` and `format`.
    ///
    /// Unsupported formats get an empty buffer.
    pub fn zeroed(resolution: Resolution, format: PixelFormat) -> Self {
        let len = format.frame_size(resolution).unwrap_or(0);
        Self::new(resolution, format, vec![0; len])
    }
}

impl PixelBuffer for OwnedBuffer {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A timestamped camera image.
///
/// The underlying [`PixelBuffer`] is released when the frame is dropped, which happens after it
/// was processed, or immediately if it was not admitted.
pub struct Frame {
    buffer: Box<dyn PixelBuffer>,
    timestamp: Duration,
}

impl Frame {
    /// Wraps `buffer` in a frame captured at `timestamp`.
    ///
    /// The timestamp is relative to an arbitrary, but fixed, origin. It is used to compute the
    /// time between frames for time-based smoothing.
    pub fn new<B: PixelBuffer + 'static>(buffer: B, timestamp: Duration) -> Self {
        Self {
            buffer: Box::new(buffer),
            timestamp,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.buffer.resolution()
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.buffer.pixel_format()
    }

    pub fn data(&self) -> &[u8] {
        self.buffer.data()
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Checks that the frame is non-empty and that its buffer holds a supported pixel format.
    pub fn validate(&self) -> Result<(), FrameError> {
        let resolution = self.resolution();
        if resolution.is_empty() {
            return Err(FrameError::ZeroSize(resolution));
        }

        let format = self.pixel_format();
        let expected = format
            .frame_size(resolution)
            .ok_or(FrameError::UnsupportedFormat(format))?;
        let actual = self.data().len();
        if actual < expected {
            return Err(FrameError::BufferTooSmall {
                resolution,
                format,
                expected,
                actual,
            });
        }

        Ok(())
    }

    /// Releases the frame's buffer back to its owner.
    ///
    /// Equivalent to dropping the frame.
    pub fn release(self) {}
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.buffer.release();
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("resolution", &self.resolution())
            .field("pixel_format", &self.pixel_format())
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    struct Counted {
        inner: OwnedBuffer,
        released: Arc<AtomicUsize>,
    }

    impl PixelBuffer for Counted {
        fn resolution(&self) -> Resolution {
            self.inner.resolution()
        }

        fn pixel_format(&self) -> PixelFormat {
            self.inner.pixel_format()
        }

        fn data(&self) -> &[u8] {
            self.inner.data()
        }

        fn release(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn frame_sizes() {
        let res = Resolution::new(3, 3);
        assert_eq!(PixelFormat::Bgra8.frame_size(res), Some(36));
        assert_eq!(PixelFormat::Rgb8.frame_size(res), Some(27));
        assert_eq!(PixelFormat::Gray8.frame_size(res), Some(9));
        assert_eq!(PixelFormat::Nv12.frame_size(res), Some(9 + 8));
        assert_eq!(PixelFormat::Other(0).frame_size(res), None);
    }

    #[test]
    fn validation() {
        let res = Resolution::new(4, 2);
        let ok = Frame::new(OwnedBuffer::zeroed(res, PixelFormat::Bgra8), Duration::ZERO);
        ok.validate().unwrap();

        let empty = Frame::new(
            OwnedBuffer::zeroed(Resolution::new(0, 2), PixelFormat::Bgra8),
            Duration::ZERO,
        );
        assert!(matches!(empty.validate(), Err(FrameError::ZeroSize(_))));

        let yuyv = u32::from_le_bytes(*b"YUYV");
        let other = Frame::new(
            OwnedBuffer::new(res, PixelFormat::Other(yuyv), vec![0; 16]),
            Duration::ZERO,
        );
        let err = other.validate().unwrap_err();
        assert_eq!(err, FrameError::UnsupportedFormat(PixelFormat::Other(yuyv)));
        assert!(err.to_string().contains("YUYV"), "{err}");

        let short = Frame::new(
            OwnedBuffer::new(res, PixelFormat::Rgb8, vec![0; 5]),
            Duration::ZERO,
        );
        assert_eq!(
            short.validate(),
            Err(FrameError::BufferTooSmall {
                resolution: res,
                format: PixelFormat::Rgb8,
                expected: 24,
                actual: 5,
            })
        );
    }

    #[test]
    fn released_exactly_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let frame = Frame::new(
            Counted {
                inner: OwnedBuffer::zeroed(Resolution::new(1, 1), PixelFormat::Gray8),
                released: released.clone(),
            },
            Duration::from_millis(5),
        );
        assert_eq!(released.load(Ordering::SeqCst), 0);
        frame.release();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
