//! Pixel buffer shared by render workers, and image output.
//!
//! The buffer is one flat row-major arena. Workers never see the arena
//! itself: [`PixelBuffer::bands_mut`] hands out disjoint `&mut` row bands,
//! so two workers writing the same pixel is a borrow error, not a race.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::Path;

use lumen_math::Interval;

use crate::error::RenderResult;
use crate::Color;

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a linear color to 8-bit sRGB-ish triplet.
///
/// Each gamma-corrected channel maps to `floor(256 * clamp(x, 0, 0.999))`,
/// so the 256 output levels are equally wide.
pub fn color_to_rgb(color: Color) -> [u8; 3] {
    const INTENSITY: Interval = Interval {
        min: 0.0,
        max: 0.999,
    };
    let channel = |x: f32| (256.0 * INTENSITY.clamp(linear_to_gamma(x))) as u8;
    [channel(color.x), channel(color.y), channel(color.z)]
}

/// Flat row-major image of linear colors.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl PixelBuffer {
    /// Create a new buffer filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::ZERO; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    #[inline]
    fn index(&self, col: u32, row: u32) -> usize {
        row as usize * self.width as usize + col as usize
    }

    /// Get the pixel at (col, row).
    pub fn get(&self, col: u32, row: u32) -> Color {
        self.pixels[self.index(col, row)]
    }

    pub fn set(&mut self, col: u32, row: u32, color: Color) {
        let i = self.index(col, row);
        self.pixels[i] = color;
    }

    pub fn row(&self, row: u32) -> &[Color] {
        let start = self.index(0, row);
        &self.pixels[start..start + self.width as usize]
    }

    /// Split the buffer into one mutable band per row range.
    ///
    /// # Panics
    ///
    /// Panics if the ranges are not sorted, overlap, or run past the last row.
    pub fn bands_mut(&mut self, ranges: &[Range<u32>]) -> Vec<RowBand<'_>> {
        let width = self.width;
        let row_len = width as usize;
        let mut rest: &mut [Color] = &mut self.pixels;
        let mut next_row = 0u32;
        let mut bands = Vec::with_capacity(ranges.len());

        for rows in ranges {
            assert!(
                rows.start >= next_row && rows.start <= rows.end && rows.end <= self.height,
                "row range {rows:?} overlaps a previous band or exceeds height {}",
                self.height
            );

            let skip = (rows.start - next_row) as usize * row_len;
            let take = rows.len() * row_len;
            let (_, tail) = std::mem::take(&mut rest).split_at_mut(skip);
            let (band, tail) = tail.split_at_mut(take);
            rest = tail;
            next_row = rows.end;

            bands.push(RowBand {
                rows: rows.clone(),
                width,
                pixels: band,
            });
        }

        bands
    }

    /// Convert to packed RGB bytes with gamma correction.
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|&c| color_to_rgb(c)).collect()
    }

    /// Write as plain-text PPM (`P3`).
    pub fn write_ppm<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "P3")?;
        writeln!(writer, "{} {}", self.width, self.height)?;
        writeln!(writer, "255")?;

        for color in &self.pixels {
            let [r, g, b] = color_to_rgb(*color);
            writeln!(writer, "{r} {g} {b}")?;
        }

        writer.flush()
    }

    /// Save to disk. `.ppm` files are written as plain PPM, anything else is
    /// handed to the `image` crate (PNG).
    pub fn save(&self, path: impl AsRef<Path>) -> RenderResult<()> {
        let path = path.as_ref();
        let is_ppm = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("ppm"));

        if is_ppm {
            let mut writer = BufWriter::new(File::create(path)?);
            self.write_ppm(&mut writer)?;
        } else {
            ::image::save_buffer(
                path,
                &self.to_rgb8(),
                self.width,
                self.height,
                ::image::ColorType::Rgb8,
            )?;
        }

        log::info!("Saved {}x{} image to {}", self.width, self.height, path.display());
        Ok(())
    }
}

/// Exclusive write access to a contiguous range of image rows.
#[derive(Debug)]
pub struct RowBand<'a> {
    rows: Range<u32>,
    width: u32,
    pixels: &'a mut [Color],
}

impl RowBand<'_> {
    /// Absolute image rows covered by this band.
    pub fn rows(&self) -> Range<u32> {
        self.rows.clone()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mutable pixels of absolute image row `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row` is outside this band.
    pub fn row_mut(&mut self, row: u32) -> &mut [Color] {
        assert!(self.rows.contains(&row), "row {row} outside band {:?}", self.rows);
        let row_len = self.width as usize;
        let start = (row - self.rows.start) as usize * row_len;
        &mut self.pixels[start..start + row_len]
    }

    /// Fill every row from `first_row` to the end of the band with `color`.
    pub fn fill_from(&mut self, first_row: u32, color: Color) {
        let first_row = first_row.clamp(self.rows.start, self.rows.end);
        let start = (first_row - self.rows.start) as usize * self.width as usize;
        self.pixels[start..].fill(color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_to_gamma() {
        assert_eq!(linear_to_gamma(0.0), 0.0);
        assert_eq!(linear_to_gamma(-1.0), 0.0);
        assert!((linear_to_gamma(1.0) - 1.0).abs() < 0.0001);
        assert!((linear_to_gamma(0.25) - 0.5).abs() < 0.0001);
    }

    #[test]
    fn test_color_to_rgb_clamps() {
        assert_eq!(color_to_rgb(Color::ZERO), [0, 0, 0]);
        assert_eq!(color_to_rgb(Color::ONE), [255, 255, 255]);
        assert_eq!(color_to_rgb(Color::new(4.0, -2.0, f32::NAN)), [255, 0, 0]);
        assert_eq!(color_to_rgb(Color::new(0.25, 0.0, 0.0)), [128, 0, 0]);
    }

    #[test]
    fn test_color_to_rgb_equal_width_levels() {
        // Gamma-space 0.5 lands on level 128; just below 1/256 stays at 0
        assert_eq!(color_to_rgb(Color::splat(0.25)), [128; 3]);
        let just_below_one_level = (0.99 / 256.0f32).powi(2);
        assert_eq!(color_to_rgb(Color::splat(just_below_one_level)), [0; 3]);
        let top = Color::splat(0.999f32.powi(2));
        assert_eq!(color_to_rgb(top), [255; 3]);
    }

    #[test]
    fn test_get_set_row_major() {
        let mut buf = PixelBuffer::new(3, 2);
        buf.set(2, 1, Color::ONE);

        assert_eq!(buf.get(2, 1), Color::ONE);
        assert_eq!(buf.pixels()[5], Color::ONE);
        assert_eq!(buf.row(0), &[Color::ZERO; 3]);
    }

    #[test]
    fn test_bands_cover_disjoint_rows() {
        let mut buf = PixelBuffer::new(2, 5);
        {
            let mut bands = buf.bands_mut(&[0..2, 2..5]);
            assert_eq!(bands.len(), 2);
            bands[0].row_mut(1).fill(Color::X);
            bands[1].row_mut(2).fill(Color::Y);
            bands[1].row_mut(4).fill(Color::Z);
        }

        assert_eq!(buf.row(0), &[Color::ZERO; 2]);
        assert_eq!(buf.row(1), &[Color::X; 2]);
        assert_eq!(buf.row(2), &[Color::Y; 2]);
        assert_eq!(buf.row(3), &[Color::ZERO; 2]);
        assert_eq!(buf.row(4), &[Color::Z; 2]);
    }

    #[test]
    fn test_bands_may_skip_rows() {
        let mut buf = PixelBuffer::new(1, 4);
        let mut bands = buf.bands_mut(&[1..2, 3..4]);
        bands[0].row_mut(1)[0] = Color::ONE;
        bands[1].row_mut(3)[0] = Color::ONE;
        drop(bands);

        let values: Vec<f32> = buf.pixels().iter().map(|c| c.x).collect();
        assert_eq!(values, vec![0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    #[should_panic]
    fn test_overlapping_bands_panic() {
        let mut buf = PixelBuffer::new(1, 4);
        let _ = buf.bands_mut(&[0..3, 2..4]);
    }

    #[test]
    #[should_panic]
    fn test_row_outside_band_panics() {
        let mut buf = PixelBuffer::new(1, 4);
        let mut bands = buf.bands_mut(&[0..2]);
        bands[0].row_mut(2);
    }

    #[test]
    fn test_fill_from() {
        let mut buf = PixelBuffer::new(2, 4);
        let mut bands = buf.bands_mut(&[1..4]);
        bands[0].fill_from(2, Color::ONE);
        drop(bands);

        assert_eq!(buf.row(1), &[Color::ZERO; 2]);
        assert_eq!(buf.row(2), &[Color::ONE; 2]);
        assert_eq!(buf.row(3), &[Color::ONE; 2]);
    }

    #[test]
    fn test_write_ppm() {
        let mut buf = PixelBuffer::new(2, 1);
        buf.set(0, 0, Color::new(1.0, 0.0, 0.0));
        buf.set(1, 0, Color::new(0.0, 0.0, 1.0));

        let mut out = Vec::new();
        buf.write_ppm(&mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "P3\n2 1\n255\n255 0 0\n0 0 255\n");
    }

    #[test]
    fn test_to_rgb8_layout() {
        let mut buf = PixelBuffer::new(2, 1);
        buf.set(1, 0, Color::ONE);
        assert_eq!(buf.to_rgb8(), vec![0, 0, 0, 255, 255, 255]);
    }
}
