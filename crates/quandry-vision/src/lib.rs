//! quandry-vision: image primitives for jigsaw piece analysis.
//!
//! Turns a photo of a single piece into the inputs `quandry-pipeline`
//! needs: decode -> grayscale -> threshold segmentation -> outline
//! tracing -> FAST corner candidates (with a bounded sensitivity
//! search) -> per-piece geometry.

use std::collections::BTreeMap;

use image::GrayImage;
use log::{debug, warn};
use quandry_pipeline::{
    PieceAnalysis, PieceId, PieceInput, PipelineConfig, SidePool, analyze_piece,
    search_candidate_density,
};
use serde::{Deserialize, Serialize};

pub mod corners;
pub mod decode;
pub mod segment;
pub mod types;

pub use corners::FastCornerDetector;
pub use types::{Polarity, VisionConfig, VisionError};

/// Outline and corner candidates extracted from one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitives {
    /// Piece outline and raw corner candidates.
    pub input: PieceInput,
    /// Segmentation threshold level used.
    pub threshold: u8,
    /// FAST sensitivity the density search settled on.
    pub sensitivity: f64,
    /// Detector calls the density search made.
    pub iterations: usize,
}

/// Result of analyzing one piece image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    /// Image width and height in pixels.
    pub dimensions: (u32, u32),
    /// FAST sensitivity the density search settled on.
    pub sensitivity: f64,
    /// Outline and candidates handed to the geometry pipeline.
    pub input: PieceInput,
    /// Corners and classified sides.
    pub analysis: PieceAnalysis,
}

/// Segment `gray`, trace the piece outline and find corner candidates.
///
/// # Errors
///
/// Returns [`VisionError::Pipeline`] wrapping
/// [`InvalidConfig`](quandry_pipeline::PipelineError::InvalidConfig),
/// [`NoOutlineFound`](quandry_pipeline::PipelineError::NoOutlineFound), or
/// [`CornerDensityOutOfRange`](quandry_pipeline::PipelineError::CornerDensityOutOfRange).
pub fn extract_primitives(gray: &GrayImage, config: &VisionConfig) -> Result<Primitives, VisionError> {
    config.validate()?;

    let threshold = segment::threshold_level(gray, config);
    let mask = segment::segment(gray, threshold, config.polarity);
    let outline = segment::trace_outline(&mask)?;

    let detector = FastCornerDetector::new(&mask, config.blur_sigma);
    let outcome = search_candidate_density(&detector, &config.density)?;
    debug!(
        "primitives: threshold {threshold}, {} outline points, {} candidates",
        outline.len(),
        outcome.candidates.len()
    );

    Ok(Primitives {
        input: PieceInput {
            outline,
            candidates: outcome.candidates,
        },
        threshold,
        sensitivity: outcome.sensitivity,
        iterations: outcome.iterations,
    })
}

/// Decode one piece image and run the full analysis.
///
/// # Errors
///
/// Returns [`VisionError::EmptyInput`] or [`VisionError::ImageDecode`]
/// for unreadable bytes, and [`VisionError::Pipeline`] for any
/// segmentation, corner or geometry failure.
pub fn analyze_image(
    bytes: &[u8],
    vision: &VisionConfig,
    pipeline: &PipelineConfig,
) -> Result<ImageAnalysis, VisionError> {
    let gray = decode::decode_grayscale(bytes)?;
    let primitives = extract_primitives(&gray, vision)?;
    let analysis = analyze_piece(primitives.input.clone(), pipeline)?;
    Ok(ImageAnalysis {
        dimensions: gray.dimensions(),
        sensitivity: primitives.sensitivity,
        input: primitives.input,
        analysis,
    })
}

/// Analyze many piece images independently.
///
/// A failure is recorded for its own piece and never affects the
/// others.
pub fn analyze_images<I, B>(
    images: I,
    vision: &VisionConfig,
    pipeline: &PipelineConfig,
) -> BTreeMap<PieceId, Result<ImageAnalysis, VisionError>>
where
    I: IntoIterator<Item = (PieceId, B)>,
    B: AsRef<[u8]>,
{
    images
        .into_iter()
        .map(|(id, bytes)| {
            let result = analyze_image(bytes.as_ref(), vision, pipeline);
            if let Err(e) = &result {
                warn!("{id}: {e}");
            }
            (id, result)
        })
        .collect()
}

/// Pool the sides of every successfully analyzed image.
#[must_use]
pub fn side_pool(results: &BTreeMap<PieceId, Result<ImageAnalysis, VisionError>>) -> SidePool {
    let mut pool = SidePool::new();
    for (id, image) in results
        .iter()
        .filter_map(|(id, result)| Some((id, result.as_ref().ok()?)))
    {
        pool.add_piece(id, &image.analysis);
    }
    pool
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;
    use quandry_pipeline::PipelineError;

    use super::*;

    #[test]
    fn blank_image_has_no_outline() {
        let gray = GrayImage::from_pixel(30, 30, Luma([200]));
        let config = VisionConfig {
            threshold: Some(100),
            ..VisionConfig::default()
        };
        let err = extract_primitives(&gray, &config).unwrap_err();
        assert!(matches!(
            err,
            VisionError::Pipeline(PipelineError::NoOutlineFound)
        ));
    }

    #[test]
    fn invalid_config_is_checked_first() {
        let gray = GrayImage::from_pixel(30, 30, Luma([200]));
        let config = VisionConfig {
            blur_sigma: f32::NAN,
            ..VisionConfig::default()
        };
        assert!(matches!(
            extract_primitives(&gray, &config),
            Err(VisionError::Pipeline(PipelineError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn empty_bytes_fail_before_decoding() {
        let result = analyze_image(&[], &VisionConfig::default(), &PipelineConfig::default());
        assert!(matches!(result, Err(VisionError::EmptyInput)));
    }
}
