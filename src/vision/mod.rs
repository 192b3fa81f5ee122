//! Pixel-level primitives for screen captures
//!
//! Captures arrive as packed RGB frames. Everything the environment derives
//! from them (grayscale observations, frame deltas, color-mask counts and
//! template scores) is computed here with deterministic integer or
//! fixed-order floating point arithmetic, so identical input always yields
//! identical output.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

pub mod template;

pub use template::{MatchResult, NccMatcher, Template, TemplateMatcher};

/// Rectangular region of interest in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Width in pixels
    pub w: u32,
    /// Height in pixels
    pub h: u32,
}

impl Roi {
    /// Create a new region
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Intersect with a `width` x `height` image.
    ///
    /// Returns `(x0, y0, x1, y1)` with exclusive upper bounds, or `None` when
    /// the intersection is empty.
    pub fn clip(&self, width: usize, height: usize) -> Option<(usize, usize, usize, usize)> {
        let x0 = (self.x as usize).min(width);
        let y0 = (self.y as usize).min(height);
        let x1 = (self.x as usize + self.w as usize).min(width);
        let y1 = (self.y as usize + self.h as usize).min(height);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0, y0, x1, y1))
    }
}

/// Captured color frame (packed RGB, row-major)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a packed RGB buffer
    pub fn from_rgb(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("frame dimensions must be positive, got {}x{}", width, height);
        }
        if data.len() != width * height * 3 {
            bail!(
                "RGB buffer has {} bytes, expected {} for {}x{}",
                data.len(),
                width * height * 3,
                width,
                height
            );
        }
        Ok(Self { width, height, data })
    }

    /// Convert a BGRA capture buffer (the layout most screen grabbers return)
    pub fn from_bgra(width: usize, height: usize, bgra: &[u8]) -> Result<Self> {
        if bgra.len() != width * height * 4 {
            bail!(
                "BGRA buffer has {} bytes, expected {} for {}x{}",
                bgra.len(),
                width * height * 4,
                width,
                height
            );
        }
        let data = bgra.chunks_exact(4).flat_map(|px| [px[2], px[1], px[0]]).collect();
        Self::from_rgb(width, height, data)
    }

    /// Frame of a single solid color
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let data = rgb.iter().copied().cycle().take(width * height * 3).collect();
        Self { width, height, data }
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw RGB bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// RGB value at `(x, y)`
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Overwrite the pixel at `(x, y)`
    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    /// Paint a rectangle (clipped to the frame)
    pub fn fill_rect(&mut self, roi: Roi, rgb: [u8; 3]) {
        if let Some((x0, y0, x1, y1)) = roi.clip(self.width, self.height) {
            for y in y0..y1 {
                for x in x0..x1 {
                    self.set_pixel(x, y, rgb);
                }
            }
        }
    }

    /// Copy out a region, clipped to the frame bounds
    pub fn crop(&self, roi: Roi) -> Option<Frame> {
        let (x0, y0, x1, y1) = roi.clip(self.width, self.height)?;
        let mut data = Vec::with_capacity((x1 - x0) * (y1 - y0) * 3);
        for y in y0..y1 {
            let start = (y * self.width + x0) * 3;
            let end = (y * self.width + x1) * 3;
            data.extend_from_slice(&self.data[start..end]);
        }
        Some(Frame { width: x1 - x0, height: y1 - y0, data })
    }

    /// Single-channel intensity image
    pub fn to_gray(&self) -> GrayFrame {
        let data = self.data.chunks_exact(3).map(|px| luma(px[0], px[1], px[2])).collect();
        GrayFrame { width: self.width, height: self.height, data }
    }
}

/// ITU-R 601 luma in 14-bit fixed point, rounded
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + 8192;
    (y >> 14).min(255) as u8
}

/// Single-channel 8-bit image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl GrayFrame {
    /// Wrap a row-major intensity buffer
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("image dimensions must be positive, got {}x{}", width, height);
        }
        if data.len() != width * height {
            bail!("buffer has {} bytes, expected {}", data.len(), width * height);
        }
        Ok(Self { width, height, data })
    }

    /// All-black image
    pub fn zeros(width: usize, height: usize) -> Self {
        Self { width, height, data: vec![0; width * height] }
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw intensities
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Intensity at `(x, y)`
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Copy out a region, clipped to the image bounds
    pub fn crop(&self, roi: Roi) -> Option<GrayFrame> {
        let (x0, y0, x1, y1) = roi.clip(self.width, self.height)?;
        let mut data = Vec::with_capacity((x1 - x0) * (y1 - y0));
        for y in y0..y1 {
            data.extend_from_slice(&self.data[y * self.width + x0..y * self.width + x1]);
        }
        Some(GrayFrame { width: x1 - x0, height: y1 - y0, data })
    }

    /// Bilinear resize using pixel-centre alignment
    pub fn resize(&self, width: usize, height: usize) -> GrayFrame {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let scale_x = self.width as f32 / width as f32;
        let scale_y = self.height as f32 / height as f32;
        let xs: Vec<(usize, usize, f32)> =
            (0..width).map(|x| sample_coord(x, scale_x, self.width)).collect();

        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            let (y0, y1, fy) = sample_coord(y, scale_y, self.height);
            for &(x0, x1, fx) in &xs {
                let top = self.get(x0, y0) as f32 * (1.0 - fx) + self.get(x1, y0) as f32 * fx;
                let bottom = self.get(x0, y1) as f32 * (1.0 - fx) + self.get(x1, y1) as f32 * fx;
                let value = top * (1.0 - fy) + bottom * fy;
                data.push(value.round().clamp(0.0, 255.0) as u8);
            }
        }
        GrayFrame { width, height, data }
    }
}

/// Source indices and blend weight for destination coordinate `dst`
fn sample_coord(dst: usize, scale: f32, src_len: usize) -> (usize, usize, f32) {
    let pos = (dst as f32 + 0.5) * scale - 0.5;
    if pos <= 0.0 {
        return (0, 0, 0.0);
    }
    let base = pos.floor() as usize;
    if base >= src_len - 1 {
        return (src_len - 1, src_len - 1, 0.0);
    }
    (base, base + 1, pos - base as f32)
}

/// Inclusive HSV window in the 8-bit convention (hue in `0..=180`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    /// Lower bound `[h, s, v]`
    pub lower: [u8; 3],
    /// Upper bound `[h, s, v]`
    pub upper: [u8; 3],
}

impl HsvRange {
    /// Create a new range
    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// Whether an HSV triple lies inside the window
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.lower[i] && hsv[i] <= self.upper[i])
    }
}

/// Convert RGB to 8-bit HSV (hue halved to fit in `0..=180`)
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(|c| c as f32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;
    let s = if v > 0.0 { diff * 255.0 / v } else { 0.0 };
    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }
    [(h / 2.0).round() as u8, s.round() as u8, v as u8]
}

/// Count pixels inside `roi` whose HSV value falls in any of `ranges`.
///
/// A region entirely outside the frame counts zero pixels.
pub fn count_in_ranges(frame: &Frame, roi: Roi, ranges: &[HsvRange]) -> u64 {
    let Some((x0, y0, x1, y1)) = roi.clip(frame.width(), frame.height()) else {
        return 0;
    };
    let mut count = 0;
    for y in y0..y1 {
        for x in x0..x1 {
            let hsv = rgb_to_hsv(frame.pixel(x, y));
            if ranges.iter().any(|range| range.contains(hsv)) {
                count += 1;
            }
        }
    }
    count
}

/// Mean absolute per-channel difference, normalised to `[0, 1]`
pub fn mean_abs_diff(a: &Frame, b: &Frame) -> Result<f64> {
    if a.width() != b.width() || a.height() != b.height() {
        bail!(
            "cannot diff frames of different sizes: {}x{} vs {}x{}",
            a.width(),
            a.height(),
            b.width(),
            b.height()
        );
    }
    let total: u64 = a.data().iter().zip(b.data()).map(|(&x, &y)| x.abs_diff(y) as u64).sum();
    Ok(total as f64 / a.data().len() as f64 / 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bgra_swaps_channels() {
        let frame = Frame::from_bgra(1, 1, &[10, 20, 30, 255]).unwrap();
        assert_eq!(frame.pixel(0, 0), [30, 20, 10]);
    }

    #[test]
    fn test_from_rgb_rejects_bad_length() {
        assert!(Frame::from_rgb(2, 2, vec![0; 11]).is_err());
        assert!(Frame::from_rgb(0, 2, vec![]).is_err());
    }

    #[test]
    fn test_gray_weights() {
        let white = Frame::filled(2, 2, [255, 255, 255]).to_gray();
        assert!(white.data().iter().all(|&v| v == 255));

        let red = Frame::filled(1, 1, [255, 0, 0]).to_gray();
        assert_eq!(red.get(0, 0), 76);

        let green = Frame::filled(1, 1, [0, 255, 0]).to_gray();
        assert_eq!(green.get(0, 0), 150);
    }

    #[test]
    fn test_resize_constant_image_stays_constant() {
        let gray = GrayFrame::new(10, 6, vec![77; 60]).unwrap();
        let resized = gray.resize(4, 3);
        assert_eq!(resized.width(), 4);
        assert_eq!(resized.height(), 3);
        assert!(resized.data().iter().all(|&v| v == 77));
    }

    #[test]
    fn test_resize_upscale_interpolates() {
        let gray = GrayFrame::new(2, 1, vec![0, 100]).unwrap();
        let resized = gray.resize(4, 1);
        // Edge samples clamp, inner samples blend
        assert_eq!(resized.data(), &[0, 25, 75, 100]);
    }

    #[test]
    fn test_resize_is_deterministic() {
        let data: Vec<u8> = (0..64 * 48).map(|i| (i * 7 % 251) as u8).collect();
        let gray = GrayFrame::new(64, 48, data).unwrap();
        assert_eq!(gray.resize(21, 13), gray.resize(21, 13));
    }

    #[test]
    fn test_roi_clip() {
        let roi = Roi::new(8, 8, 10, 10);
        assert_eq!(roi.clip(12, 10), Some((8, 8, 12, 10)));
        assert_eq!(Roi::new(20, 0, 5, 5).clip(12, 10), None);
        assert_eq!(Roi::new(0, 0, 0, 5).clip(12, 10), None);
    }

    #[test]
    fn test_crop_clipped() {
        let mut frame = Frame::filled(4, 4, [0, 0, 0]);
        frame.set_pixel(3, 3, [9, 9, 9]);
        let crop = frame.crop(Roi::new(2, 2, 10, 10)).unwrap();
        assert_eq!((crop.width(), crop.height()), (2, 2));
        assert_eq!(crop.pixel(1, 1), [9, 9, 9]);
    }

    #[test]
    fn test_hsv_conversion() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
        // Pure yellow sits at hue 30
        assert_eq!(rgb_to_hsv([255, 255, 0]), [30, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 0]), [0, 0, 0]);
    }

    #[test]
    fn test_count_in_ranges() {
        let mut frame = Frame::filled(10, 4, [0, 0, 0]);
        frame.fill_rect(Roi::new(0, 0, 3, 2), [255, 220, 0]);
        let yellow = HsvRange::new([20, 100, 100], [30, 255, 255]);

        assert_eq!(count_in_ranges(&frame, Roi::new(0, 0, 10, 4), &[yellow]), 6);
        assert_eq!(count_in_ranges(&frame, Roi::new(1, 0, 1, 4), &[yellow]), 2);
        assert_eq!(count_in_ranges(&frame, Roi::new(50, 50, 4, 4), &[yellow]), 0);
    }

    #[test]
    fn test_mean_abs_diff() {
        let a = Frame::filled(4, 4, [0, 0, 0]);
        let b = Frame::filled(4, 4, [255, 255, 255]);
        assert_eq!(mean_abs_diff(&a, &a).unwrap(), 0.0);
        assert!((mean_abs_diff(&a, &b).unwrap() - 1.0).abs() < 1e-12);

        let c = Frame::filled(5, 4, [0, 0, 0]);
        assert!(mean_abs_diff(&a, &c).is_err());
    }
}
