//! Template matching by normalised cross-correlation
//!
//! Scores follow the mean-subtracted (`CCOEFF_NORMED`) formulation:
//!
//! ```text
//! score(x, y) = Σ T'(i, j) · I'(x + i, y + j)
//!               / sqrt(Σ T'(i, j)² · Σ I'(x + i, y + j)²)
//! ```
//!
//! where `T'` and `I'` are the template and the image window with their means
//! removed. Window sums come from integral images; rows are scored in
//! parallel with Rayon.

use std::path::Path;

use anyhow::{Context, Result, bail};
use rayon::prelude::*;

use super::{Frame, GrayFrame, Roi};

/// Reference image searched for in captured frames
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    image: GrayFrame,
    /// Template pixels with the mean removed
    centered: Vec<f64>,
    /// Σ T'²
    energy: f64,
}

impl Template {
    /// Build a template from an intensity image
    pub fn new(name: impl Into<String>, image: GrayFrame) -> Result<Self> {
        let name = name.into();
        if image.data().is_empty() {
            bail!("template '{}' is empty", name);
        }
        let n = image.data().len() as f64;
        let mean = image.data().iter().map(|&v| v as f64).sum::<f64>() / n;
        let centered: Vec<f64> = image.data().iter().map(|&v| v as f64 - mean).collect();
        let energy = centered.iter().map(|v| v * v).sum();
        if energy == 0.0 {
            tracing::warn!("template '{}' has no contrast; every match will score 0", name);
        }
        Ok(Self { name, image, centered, energy })
    }

    /// Build a template from a color image
    pub fn from_frame(name: impl Into<String>, frame: &Frame) -> Result<Self> {
        Self::new(name, frame.to_gray())
    }

    /// Decode an image file (PNG) into a template.
    ///
    /// Pixels go through the same luma conversion as captured frames, so a
    /// screenshot crop matches the screen it was cut from exactly.
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let rgb = image::open(path)
            .with_context(|| format!("failed to decode template image {}", path.display()))?
            .to_rgb8();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        let frame = Frame::from_rgb(width, height, rgb.into_raw())?;
        Self::from_frame(name, &frame)
    }

    /// Template name (used in logs)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Template width in pixels
    pub fn width(&self) -> usize {
        self.image.width()
    }

    /// Template height in pixels
    pub fn height(&self) -> usize {
        self.image.height()
    }
}

/// Best match of a template inside a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Correlation score in `[-1, 1]`
    pub score: f64,
    /// Left edge of the matched box in frame coordinates
    pub x: usize,
    /// Top edge of the matched box in frame coordinates
    pub y: usize,
    /// Box width
    pub width: usize,
    /// Box height
    pub height: usize,
}

impl MatchResult {
    /// Centre of the matched bounding box
    pub fn centroid(&self) -> (i32, i32) {
        ((self.x + self.width / 2) as i32, (self.y + self.height / 2) as i32)
    }
}

/// Strategy for locating a template in a frame
pub trait TemplateMatcher: Send {
    /// Best match of `template` in `frame`, optionally restricted to `region`.
    ///
    /// Returns `None` when the template does not fit in the searched area.
    fn best_match(
        &self,
        frame: &GrayFrame,
        template: &Template,
        region: Option<Roi>,
    ) -> Option<MatchResult>;
}

/// Exhaustive normalised cross-correlation search
#[derive(Debug, Clone, Copy, Default)]
pub struct NccMatcher;

impl TemplateMatcher for NccMatcher {
    fn best_match(
        &self,
        frame: &GrayFrame,
        template: &Template,
        region: Option<Roi>,
    ) -> Option<MatchResult> {
        match region {
            Some(roi) => {
                let (x0, y0, _, _) = roi.clip(frame.width(), frame.height())?;
                let window = frame.crop(roi)?;
                search(&window, template).map(|m| MatchResult { x: m.x + x0, y: m.y + y0, ..m })
            }
            None => search(frame, template),
        }
    }
}

/// Summed-area tables for window sums and sums of squares
struct Integral {
    stride: usize,
    sum: Vec<f64>,
    sq: Vec<f64>,
}

impl Integral {
    fn new(image: &GrayFrame) -> Self {
        let (w, h) = (image.width(), image.height());
        let stride = w + 1;
        let mut sum = vec![0.0; stride * (h + 1)];
        let mut sq = vec![0.0; stride * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = image.get(x, y) as f64;
                row_sum += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row_sum;
                sq[(y + 1) * stride + x + 1] = sq[y * stride + x + 1] + row_sq;
            }
        }
        Self { stride, sum, sq }
    }

    fn window(&self, table: &[f64], x: usize, y: usize, w: usize, h: usize) -> f64 {
        let s = self.stride;
        table[(y + h) * s + x + w] - table[y * s + x + w] - table[(y + h) * s + x] + table[y * s + x]
    }
}

fn search(image: &GrayFrame, template: &Template) -> Option<MatchResult> {
    let (tw, th) = (template.width(), template.height());
    if tw > image.width() || th > image.height() {
        return None;
    }
    let integral = Integral::new(image);
    let n = (tw * th) as f64;

    let score_at = |x: usize, y: usize| -> f64 {
        if template.energy == 0.0 {
            return 0.0;
        }
        let sum = integral.window(&integral.sum, x, y, tw, th);
        let sq = integral.window(&integral.sq, x, y, tw, th);
        let variance = sq - sum * sum / n;
        if variance <= f64::EPSILON {
            return 0.0;
        }
        // Σ T'·I equals Σ T'·I' because T' sums to zero
        let mut cross = 0.0;
        for j in 0..th {
            let row = &image.data()[(y + j) * image.width() + x..][..tw];
            let trow = &template.centered[j * tw..][..tw];
            cross += row.iter().zip(trow).map(|(&p, &t)| p as f64 * t).sum::<f64>();
        }
        (cross / (variance * template.energy).sqrt()).clamp(-1.0, 1.0)
    };

    let (score, x, y) = (0..=image.height() - th)
        .into_par_iter()
        .map(|y| {
            let mut best = (f64::NEG_INFINITY, 0, y);
            for x in 0..=image.width() - tw {
                let score = score_at(x, y);
                if score > best.0 {
                    best = (score, x, y);
                }
            }
            best
        })
        .reduce(
            || (f64::NEG_INFINITY, usize::MAX, usize::MAX),
            |a, b| {
                // Highest score wins; ties go to the top-most, then left-most box
                if b.0 > a.0 || (b.0 == a.0 && (b.2, b.1) < (a.2, a.1)) { b } else { a }
            },
        );

    if !score.is_finite() {
        return None;
    }
    Some(MatchResult { score, x, y, width: tw, height: th })
}
