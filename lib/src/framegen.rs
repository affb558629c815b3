//! Synthesis of the built-in frame patterns.
//!
//! A [`FrameGenerator`] renders one pattern into caller-owned frames. Rendering
//! is a pure function of the frame index and the time elapsed since the
//! session started, so the same inputs always produce the same frame.

use std::time::Duration;

use log::trace;
use thiserror::Error;

use crate::frame::{FrameBuffer, FrameGeometry, Pattern, BYTES_PER_PIXEL};

/// Colors of the color bars pattern, left to right.
const COLOR_BARS: [[u8; 3]; 8] = [
    [255, 255, 255], // White
    [255, 255, 0],   // Yellow
    [0, 255, 255],   // Cyan
    [0, 255, 0],     // Green
    [255, 0, 255],   // Magenta
    [255, 0, 0],     // Red
    [0, 0, 255],     // Blue
    [0, 0, 0],       // Black
];

const CHECKER_SIZE: usize = 32;
const CHECKER_LIGHT: u8 = 255;
const CHECKER_DARK: u8 = 64;

const ORBIT_RADIUS: f64 = 50.0;
const DISK_RADIUS: f64 = 30.0;

/// Half-extents of the block glyph drawn by the external source placeholder.
const GLYPH_HALF_WIDTH: i64 = 60;
const GLYPH_HALF_HEIGHT: i64 = 20;
const GLYPH_COLUMN_WIDTH: i64 = 30;
const GLYPH_ROW_PERIOD: i64 = 10;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerateFrameError {
    #[error("frame has geometry {actual}, generator expects {expected}")]
    GeometryMismatch {
        expected: FrameGeometry,
        actual: FrameGeometry,
    },
}

pub struct FrameGenerator {
    geometry: FrameGeometry,
    pattern: Pattern,
}

impl FrameGenerator {
    pub fn new(geometry: FrameGeometry, pattern: Pattern) -> Self {
        FrameGenerator { geometry, pattern }
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    pub fn frame_size(&self) -> usize {
        self.geometry.frame_size()
    }

    /// Render frame number `frame_index`, `elapsed` after the start of the
    /// session, into `frame`.
    ///
    /// With [`Pattern::ExternalSource`] this renders the placeholder shown
    /// while no external frame is available.
    pub fn fill(
        &self,
        frame: &mut FrameBuffer,
        frame_index: u64,
        elapsed: Duration,
    ) -> Result<(), GenerateFrameError> {
        if frame.geometry() != self.geometry {
            return Err(GenerateFrameError::GeometryMismatch {
                expected: self.geometry,
                actual: frame.geometry(),
            });
        }

        let t = elapsed.as_secs_f64();
        match self.pattern {
            Pattern::TestPattern => self.gen_test_pattern(frame, frame_index),
            Pattern::ColorBars => self.gen_color_bars(frame),
            Pattern::ImageFilePlaceholder => self.gen_checkerboard(frame),
            Pattern::VideoFilePlaceholder => self.gen_orbiting_disk(frame, t),
            Pattern::ExternalSource => self.gen_external_placeholder(frame, t),
        }

        if frame_index % 30 == 0 {
            trace!("Generated {} frame {}", self.pattern, frame_index);
        }

        Ok(())
    }

    fn rows<'a>(&self, frame: &'a mut FrameBuffer) -> impl Iterator<Item = (usize, &'a mut [u8])> {
        // `max(1)` keeps `chunks_exact_mut` happy with zero-width frames, which
        // have no data to iterate over anyway.
        let stride = (self.geometry.width as usize * BYTES_PER_PIXEL).max(1);
        frame.as_mut().chunks_exact_mut(stride).enumerate()
    }

    fn gen_test_pattern(&self, frame: &mut FrameBuffer, frame_index: u64) {
        let phase = (frame_index % 255) as usize;

        self.rows(frame).for_each(|(y, line)| {
            line.chunks_exact_mut(BYTES_PER_PIXEL)
                .enumerate()
                .for_each(|(x, pixel)| {
                    let value = (x + y + phase) % 255;
                    pixel[0] = value as u8;
                    pixel[1] = ((value + 85) % 255) as u8;
                    pixel[2] = ((value + 170) % 255) as u8;
                });
        });
    }

    fn gen_color_bars(&self, frame: &mut FrameBuffer) {
        let bar_width = (self.geometry.width as usize / COLOR_BARS.len()).max(1);

        self.rows(frame).for_each(|(_, line)| {
            line.chunks_exact_mut(BYTES_PER_PIXEL)
                .enumerate()
                .for_each(|(x, pixel)| {
                    let bar = (x / bar_width).min(COLOR_BARS.len() - 1);
                    pixel.copy_from_slice(&COLOR_BARS[bar]);
                });
        });
    }

    fn gen_checkerboard(&self, frame: &mut FrameBuffer) {
        self.rows(frame).for_each(|(y, line)| {
            line.chunks_exact_mut(BYTES_PER_PIXEL)
                .enumerate()
                .for_each(|(x, pixel)| {
                    let value = if (x / CHECKER_SIZE + y / CHECKER_SIZE) % 2 == 0 {
                        CHECKER_LIGHT
                    } else {
                        CHECKER_DARK
                    };
                    pixel.fill(value);
                });
        });
    }

    fn gen_orbiting_disk(&self, frame: &mut FrameBuffer, t: f64) {
        frame.fill([0, 0, 0]);

        let center_x = (self.geometry.width / 2) as i64 + (ORBIT_RADIUS * t.cos()) as i64;
        let center_y = (self.geometry.height / 2) as i64 + (ORBIT_RADIUS * t.sin()) as i64;
        let radius = DISK_RADIUS as i64;

        for y in center_y - radius..=center_y + radius {
            for x in center_x - radius..=center_x + radius {
                let dx = (x - center_x) as f64;
                let dy = (y - center_y) as f64;
                let distance = (dx * dx + dy * dy).sqrt();
                if distance > DISK_RADIUS {
                    continue;
                }

                let intensity = (255.0 * (1.0 - distance / DISK_RADIUS)) as u8;
                frame.set_pixel(x, y, [intensity, intensity / 2, intensity / 4]);
            }
        }
    }

    fn gen_external_placeholder(&self, frame: &mut FrameBuffer, t: f64) {
        let intensity = (128.0 + 127.0 * (t * 2.0).sin()) as u8;
        frame.fill([intensity, 0, 0]);

        let center_x = (self.geometry.width / 2) as i64;
        let center_y = (self.geometry.height / 2) as i64;

        for y in center_y - GLYPH_HALF_HEIGHT..center_y + GLYPH_HALF_HEIGHT {
            for x in center_x - GLYPH_HALF_WIDTH..center_x + GLYPH_HALF_WIDTH {
                let column = (x - center_x + GLYPH_HALF_WIDTH) / GLYPH_COLUMN_WIDTH;
                let row = (y - center_y + GLYPH_HALF_HEIGHT) % GLYPH_ROW_PERIOD;
                if column % 2 == 0 && row < GLYPH_ROW_PERIOD / 2 {
                    frame.set_pixel(x, y, [255, 255, 255]);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PATTERNS: [Pattern; 5] = [
        Pattern::TestPattern,
        Pattern::ColorBars,
        Pattern::ImageFilePlaceholder,
        Pattern::VideoFilePlaceholder,
        Pattern::ExternalSource,
    ];

    fn render(geometry: FrameGeometry, pattern: Pattern, index: u64, elapsed: Duration) -> FrameBuffer {
        let mut frame = FrameBuffer::new(geometry);
        FrameGenerator::new(geometry, pattern)
            .fill(&mut frame, index, elapsed)
            .unwrap();
        frame
    }

    #[test]
    fn test_all_patterns_any_geometry() {
        let geometries = [
            FrameGeometry::new(0, 0),
            FrameGeometry::new(0, 10),
            FrameGeometry::new(10, 0),
            FrameGeometry::new(1, 1),
            FrameGeometry::new(3, 5),
            FrameGeometry::new(7, 3),
            FrameGeometry::new(64, 48),
            FrameGeometry::new(200, 100),
        ];

        for geometry in geometries {
            for pattern in ALL_PATTERNS {
                for elapsed in [0.0, 0.8, 2.5, 4.0] {
                    let frame = render(geometry, pattern, 42, Duration::from_secs_f64(elapsed));
                    assert_eq!(frame.len(), geometry.frame_size(), "{pattern} {geometry}");
                }
            }
        }
    }

    #[test]
    fn test_geometry_mismatch() {
        let generator = FrameGenerator::new(FrameGeometry::new(4, 2), Pattern::ColorBars);
        let mut frame = FrameBuffer::new(FrameGeometry::new(2, 4));

        assert_eq!(
            generator.fill(&mut frame, 0, Duration::ZERO),
            Err(GenerateFrameError::GeometryMismatch {
                expected: FrameGeometry::new(4, 2),
                actual: FrameGeometry::new(2, 4),
            })
        );
    }

    #[test]
    fn test_test_pattern_phase() {
        let geometry = FrameGeometry::new(4, 2);
        let first = render(geometry, Pattern::TestPattern, 0, Duration::ZERO);
        let later = render(geometry, Pattern::TestPattern, 30, Duration::ZERO);

        assert_ne!(first, later);
        assert_eq!(first.pixel(0, 0), Some([0, 85, 170]));
        assert_eq!(later.pixel(0, 0), Some([30, 115, 200]));

        for (frame, counter) in [(&first, 0), (&later, 30)] {
            for (x, y) in [(1, 0), (3, 0), (0, 1), (3, 1)] {
                let value = (x + y + counter) % 255;
                assert_eq!(
                    frame.pixel(x as i64, y as i64),
                    Some([value as u8, ((value + 85) % 255) as u8, ((value + 170) % 255) as u8])
                );
            }
        }
    }

    #[test]
    fn test_test_pattern_wraps() {
        let geometry = FrameGeometry::new(300, 1);
        let frame = render(geometry, Pattern::TestPattern, u64::MAX, Duration::ZERO);

        // u64::MAX % 255 == 0
        assert_eq!(frame.pixel(0, 0), Some([0, 85, 170]));
        assert_eq!(frame.pixel(254, 0), Some([254, 84, 169]));
        assert_eq!(frame.pixel(255, 0), Some([0, 85, 170]));
    }

    #[test]
    fn test_color_bars() {
        let frame = render(FrameGeometry::new(800, 1), Pattern::ColorBars, 0, Duration::ZERO);

        for x in 0..100 {
            assert_eq!(frame.pixel(x, 0), Some([255, 255, 255]));
        }
        assert_eq!(frame.pixel(100, 0), Some([255, 255, 0]));
        assert_eq!(frame.pixel(650, 0), Some([0, 0, 255]));
        for x in 700..800 {
            assert_eq!(frame.pixel(x, 0), Some([0, 0, 0]));
        }
    }

    #[test]
    fn test_color_bars_remainder() {
        // 8-pixel bars, the last one absorbs the 3 remaining columns.
        let frame = render(FrameGeometry::new(67, 2), Pattern::ColorBars, 0, Duration::ZERO);
        for x in 56..67 {
            assert_eq!(frame.pixel(x, 1), Some([0, 0, 0]));
        }
        assert_eq!(frame.pixel(55, 1), Some([0, 0, 255]));

        // Narrower than 8 bars: one column per bar.
        let frame = render(FrameGeometry::new(3, 1), Pattern::ColorBars, 0, Duration::ZERO);
        assert_eq!(frame.pixel(0, 0), Some([255, 255, 255]));
        assert_eq!(frame.pixel(1, 0), Some([255, 255, 0]));
        assert_eq!(frame.pixel(2, 0), Some([0, 255, 255]));
    }

    #[test]
    fn test_checkerboard() {
        let frame = render(
            FrameGeometry::new(96, 64),
            Pattern::ImageFilePlaceholder,
            0,
            Duration::ZERO,
        );

        assert_eq!(frame.pixel(0, 0), Some([255; 3]));
        assert_eq!(frame.pixel(31, 31), Some([255; 3]));
        assert_eq!(frame.pixel(32, 0), Some([64; 3]));
        assert_eq!(frame.pixel(0, 32), Some([64; 3]));
        assert_eq!(frame.pixel(32, 32), Some([255; 3]));
        assert_eq!(frame.pixel(95, 63), Some([64; 3]));
    }

    #[test]
    fn test_orbiting_disk() {
        let geometry = FrameGeometry::new(320, 240);

        // At t = 0 the disk is centered 50 pixels right of the frame center.
        let frame = render(geometry, Pattern::VideoFilePlaceholder, 0, Duration::ZERO);
        assert_eq!(frame.pixel(210, 120), Some([255, 127, 63]));
        assert_eq!(frame.pixel(160, 120), Some([0, 0, 0]));
        assert_eq!(frame.pixel(0, 0), Some([0, 0, 0]));
        // Intensity falls off with the distance to the center.
        let [r, g, b] = frame.pixel(225, 120).unwrap();
        assert_eq!((r, g, b), (127, 63, 31));
        assert_eq!(frame.pixel(241, 120), Some([0, 0, 0]));

        // The disk moves over time.
        let later = render(
            geometry,
            Pattern::VideoFilePlaceholder,
            0,
            Duration::from_secs_f64(std::f64::consts::FRAC_PI_2),
        );
        assert_eq!(later.pixel(210, 120), Some([0, 0, 0]));
        assert_eq!(later.pixel(160, 170), Some([255, 127, 63]));
    }

    #[test]
    fn test_orbiting_disk_clipped() {
        // The disk goes past the frame edges, which must simply be ignored.
        let frame = render(
            FrameGeometry::new(20, 10),
            Pattern::VideoFilePlaceholder,
            0,
            Duration::from_secs(3),
        );
        assert_eq!(frame.len(), 20 * 10 * 3);
    }

    #[test]
    fn test_external_placeholder() {
        let geometry = FrameGeometry::new(320, 240);
        let frame = render(geometry, Pattern::ExternalSource, 0, Duration::ZERO);

        // sin(0) == 0: mid-intensity red background.
        assert_eq!(frame.pixel(0, 0), Some([128, 0, 0]));
        // First glyph column, first stripe.
        assert_eq!(frame.pixel(100, 100), Some([255, 255, 255]));
        // Gap between stripes.
        assert_eq!(frame.pixel(100, 105), Some([128, 0, 0]));
        // Second glyph column is empty.
        assert_eq!(frame.pixel(130, 100), Some([128, 0, 0]));
        // Outside of the glyph area.
        assert_eq!(frame.pixel(220, 100), Some([128, 0, 0]));
        assert_eq!(frame.pixel(100, 140), Some([128, 0, 0]));

        // sin(2t) == 1 at t = pi/4.
        let bright = render(
            geometry,
            Pattern::ExternalSource,
            0,
            Duration::from_secs_f64(std::f64::consts::FRAC_PI_4),
        );
        assert_eq!(bright.pixel(0, 0), Some([255, 0, 0]));
    }

    #[test]
    fn test_external_placeholder_small_frame() {
        // The glyph area is larger than the frame and must be clipped.
        let frame = render(FrameGeometry::new(8, 4), Pattern::ExternalSource, 0, Duration::ZERO);
        assert_eq!(frame.pixel(0, 0), Some([128, 0, 0]));
        assert_eq!(frame.pixel(4, 2), Some([255, 255, 255]));
        assert_eq!(frame.pixel(7, 3), Some([255, 255, 255]));
        assert_eq!(frame.len(), 8 * 4 * 3);
    }
}
