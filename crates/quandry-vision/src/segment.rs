//! Piece segmentation and outline tracing.
//!
//! The piece is separated from the background with a single global
//! threshold, either fixed or Otsu's level for the image. The outline
//! is the longest outer border of the resulting mask, traced with
//! Suzuki-Abe border following via `imageproc::contours::find_contours`.

use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, Contour};
use log::debug;
use quandry_pipeline::{PipelineError, Point, Polyline};

use crate::types::{Polarity, VisionConfig};

/// Mask value for piece pixels.
pub const FOREGROUND: u8 = 255;

/// Threshold level used for `gray`: the fixed level if configured,
/// otherwise Otsu's level.
#[must_use]
pub fn threshold_level(gray: &GrayImage, config: &VisionConfig) -> u8 {
    config
        .threshold
        .unwrap_or_else(|| imageproc::contrast::otsu_level(gray))
}

/// Binary mask with piece pixels set to [`FOREGROUND`] and background
/// pixels set to zero.
///
/// Pixels at or below `level` are dark; which side is the piece
/// depends on `polarity`.
#[must_use = "returns the piece mask"]
pub fn segment(gray: &GrayImage, level: u8, polarity: Polarity) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let dark = gray.get_pixel(x, y).0[0] <= level;
        let piece = match polarity {
            Polarity::DarkOnLight => dark,
            Polarity::LightOnDark => !dark,
        };
        Luma([if piece { FOREGROUND } else { 0 }])
    })
}

/// Trace the piece outline: the outer border of the mask with the most
/// points.
///
/// # Errors
///
/// Returns [`PipelineError::NoOutlineFound`] when the mask has no outer
/// border of at least three points.
pub fn trace_outline(mask: &GrayImage) -> Result<Polyline, PipelineError> {
    let contours: Vec<Contour<u32>> = imageproc::contours::find_contours(mask);
    let outer = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .count();

    // First of equally long borders wins.
    let mut best: Option<Contour<u32>> = None;
    for contour in contours {
        if contour.border_type != BorderType::Outer {
            continue;
        }
        if contour.points.len() > best.as_ref().map_or(0, |b| b.points.len()) {
            best = Some(contour);
        }
    }

    let best = best
        .filter(|c| c.points.len() >= 3)
        .ok_or(PipelineError::NoOutlineFound)?;
    debug!(
        "outline: {} points, longest of {outer} outer borders",
        best.points.len()
    );

    Ok(Polyline::new(
        best.points
            .into_iter()
            .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
            .collect(),
    ))
}
