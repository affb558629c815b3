//! Frame geometry, frame buffers and pattern selection.

use std::fmt;
use std::str::FromStr;

use enumn::N;
use thiserror::Error;

/// Number of bytes used by a single RGB24 pixel.
pub const BYTES_PER_PIXEL: usize = 3;

/// Size of the frames of a session. Fixed for the whole lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub const fn new(width: u32, height: u32) -> Self {
        FrameGeometry { width, height }
    }

    /// Size in bytes of a frame of this geometry.
    ///
    /// ```
    /// # use vcam::FrameGeometry;
    /// assert_eq!(FrameGeometry::new(640, 480).frame_size(), 921600);
    /// assert_eq!(FrameGeometry::new(0, 480).frame_size(), 0);
    /// ```
    pub const fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// Size in bytes of a frame of this geometry, or `None` if it does not fit
    /// in a `usize`.
    ///
    /// ```
    /// # use vcam::FrameGeometry;
    /// assert_eq!(FrameGeometry::new(4, 2).checked_frame_size(), Some(24));
    /// assert_eq!(FrameGeometry::new(u32::MAX, u32::MAX).checked_frame_size(), None);
    /// ```
    pub fn checked_frame_size(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(BYTES_PER_PIXEL)
    }

    /// Whether frames of this geometry have pixels, and a size the device
    /// format can describe.
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self
                .checked_frame_size()
                .map_or(false, |size| u32::try_from(size).is_ok())
    }

    /// Offset of pixel `(x, y)` in a frame, or `None` if the pixel lies
    /// outside of the frame.
    pub fn pixel_offset(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }

        Some((y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL)
    }
}

impl Default for FrameGeometry {
    fn default() -> Self {
        FrameGeometry::new(640, 480)
    }
}

impl fmt::Display for FrameGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseGeometryError {
    #[error("expected WIDTHxHEIGHT, got {0:?}")]
    Malformed(String),
}

/// ```
/// # use vcam::FrameGeometry;
/// let g: FrameGeometry = "1280x720".parse().unwrap();
/// assert_eq!(g, FrameGeometry::new(1280, 720));
/// assert!("1280".parse::<FrameGeometry>().is_err());
/// ```
impl FromStr for FrameGeometry {
    type Err = ParseGeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseGeometryError::Malformed(s.to_string());
        let (width, height) = s.split_once('x').ok_or_else(malformed)?;

        Ok(FrameGeometry::new(
            width.trim().parse().map_err(|_| malformed())?,
            height.trim().parse().map_err(|_| malformed())?,
        ))
    }
}

/// A geometry no output device can be configured with.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid frame geometry {0}")]
pub struct InvalidGeometry(pub FrameGeometry);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid frame size: expected {expected} bytes, got {actual}")]
pub struct InvalidFrameSize {
    pub expected: usize,
    pub actual: usize,
}

/// An owned RGB24 frame whose size is guaranteed to match the geometry it was
/// created for.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    geometry: FrameGeometry,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Allocate a black frame.
    pub fn new(geometry: FrameGeometry) -> Self {
        FrameBuffer {
            geometry,
            data: vec![0u8; geometry.frame_size()],
        }
    }

    /// Take ownership of `data` as a frame of `geometry`, provided its length
    /// matches.
    pub fn from_vec(geometry: FrameGeometry, data: Vec<u8>) -> Result<Self, InvalidFrameSize> {
        let expected = geometry.frame_size();
        if data.len() != expected {
            return Err(InvalidFrameSize {
                expected,
                actual: data.len(),
            });
        }

        Ok(FrameBuffer { geometry, data })
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the RGB value of pixel `(x, y)`, if it is inside the frame.
    pub fn pixel(&self, x: i64, y: i64) -> Option<[u8; 3]> {
        let offset = self.geometry.pixel_offset(x, y)?;
        let mut rgb = [0u8; 3];
        rgb.copy_from_slice(&self.data[offset..offset + BYTES_PER_PIXEL]);
        Some(rgb)
    }

    /// Sets pixel `(x, y)`. Writes outside of the frame are ignored.
    pub fn set_pixel(&mut self, x: i64, y: i64, rgb: [u8; 3]) {
        if let Some(offset) = self.geometry.pixel_offset(x, y) {
            self.data[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&rgb);
        }
    }

    /// Sets every pixel of the frame to `rgb`.
    pub fn fill(&mut self, rgb: [u8; 3]) {
        self.data
            .chunks_exact_mut(BYTES_PER_PIXEL)
            .for_each(|pixel| pixel.copy_from_slice(&rgb));
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("geometry", &self.geometry)
            .field("len", &self.data.len())
            .finish()
    }
}

impl AsRef<[u8]> for FrameBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl AsMut<[u8]> for FrameBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Content a session produces. The numeric values are the codes used by the
/// C interface.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, N)]
pub enum Pattern {
    /// Diagonal gradient scrolling by one step per frame.
    #[default]
    TestPattern = 0,
    /// The 8 classic color bars.
    ColorBars = 1,
    /// Checkerboard standing in for a still image.
    ImageFilePlaceholder = 2,
    /// Orbiting highlight standing in for a video file.
    VideoFilePlaceholder = 3,
    /// Frames are supplied from outside through the frame queue.
    ExternalSource = 4,
}

impl Pattern {
    /// Where frames of a session using this pattern come from.
    pub fn source_mode(self) -> SourceMode {
        match self {
            Pattern::ExternalSource => SourceMode::Queue,
            _ => SourceMode::Generator,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown pattern {0:?}")]
pub struct UnknownPattern(pub String);

/// Parses a pattern from its short name or numeric code.
///
/// ```
/// # use vcam::Pattern;
/// assert_eq!("bars".parse(), Ok(Pattern::ColorBars));
/// assert_eq!("4".parse(), Ok(Pattern::ExternalSource));
/// assert!("plaid".parse::<Pattern>().is_err());
/// ```
impl FromStr for Pattern {
    type Err = UnknownPattern;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test" => Ok(Pattern::TestPattern),
            "bars" => Ok(Pattern::ColorBars),
            "image" => Ok(Pattern::ImageFilePlaceholder),
            "video" => Ok(Pattern::VideoFilePlaceholder),
            "external" => Ok(Pattern::ExternalSource),
            code => code
                .parse::<u32>()
                .ok()
                .and_then(Pattern::n)
                .ok_or_else(|| UnknownPattern(s.to_string())),
        }
    }
}

/// Origin of the frames of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// Frames are synthesized by the frame generator.
    Generator,
    /// Frames are popped from the external frame queue.
    Queue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_buffer_size_check() {
        let geometry = FrameGeometry::new(4, 2);

        assert_eq!(FrameBuffer::new(geometry).len(), 24);
        assert!(FrameBuffer::from_vec(geometry, vec![0; 24]).is_ok());
        assert_eq!(
            FrameBuffer::from_vec(geometry, vec![0; 23]),
            Err(InvalidFrameSize {
                expected: 24,
                actual: 23
            })
        );
    }

    #[test]
    fn test_geometry_validity() {
        assert!(FrameGeometry::default().is_valid());
        assert!(FrameGeometry::new(1, 1).is_valid());
        assert!(!FrameGeometry::new(0, 480).is_valid());
        assert!(!FrameGeometry::new(640, 0).is_valid());
        // Line size overflows 32 bits.
        assert!(!FrameGeometry::new(2_000_000_000, 1).is_valid());
        // Frame size overflows 32 bits.
        assert!(!FrameGeometry::new(65536, 65536).is_valid());
        assert!(!FrameGeometry::new(u32::MAX, u32::MAX).is_valid());
        assert_eq!(FrameGeometry::new(u32::MAX, u32::MAX).checked_frame_size(), None);
    }

    #[test]
    fn test_out_of_bounds_pixels_are_ignored() {
        let mut frame = FrameBuffer::new(FrameGeometry::new(2, 2));

        frame.set_pixel(-1, 0, [255, 255, 255]);
        frame.set_pixel(0, 2, [255, 255, 255]);
        frame.set_pixel(2, 1, [255, 255, 255]);
        assert!(frame.as_ref().iter().all(|&b| b == 0));
        assert_eq!(frame.pixel(2, 0), None);

        frame.set_pixel(1, 1, [1, 2, 3]);
        assert_eq!(frame.pixel(1, 1), Some([1, 2, 3]));
        assert_eq!(&frame.as_ref()[9..], &[1, 2, 3]);
    }

    #[test]
    fn test_pattern_codes() {
        for code in 0..5 {
            let pattern = Pattern::n(code).unwrap();
            assert_eq!(pattern as u32, code);
        }
        assert_eq!(Pattern::n(5), None);
        assert_eq!(Pattern::ExternalSource.source_mode(), SourceMode::Queue);
        assert_eq!(Pattern::ColorBars.source_mode(), SourceMode::Generator);
    }
}
