//! Configuration and error types for the vision primitives.

use quandry_pipeline::{DensitySearch, PipelineError};
use serde::{Deserialize, Serialize};

/// Which side of the threshold the piece lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Dark piece photographed on a light background.
    #[default]
    DarkOnLight,
    /// Light piece photographed on a dark background.
    LightOnDark,
}

/// Parameters for segmentation and corner candidate detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Whether the piece is darker or lighter than the background.
    pub polarity: Polarity,

    /// Fixed segmentation threshold. `None` uses Otsu's level for the
    /// image.
    pub threshold: Option<u8>,

    /// Gaussian blur sigma applied to the mask before FAST corner
    /// detection. Zero disables the blur.
    pub blur_sigma: f32,

    /// Candidate-density window and sensitivity search.
    pub density: DensitySearch,
}

impl VisionConfig {
    /// Default blur sigma for the corner mask.
    pub const DEFAULT_BLUR_SIGMA: f32 = 1.0;

    /// Check every parameter.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for a negative or
    /// non-finite blur sigma or an invalid density search.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.blur_sigma.is_finite() || self.blur_sigma < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "blur_sigma must be finite and non-negative, got {}",
                self.blur_sigma
            )));
        }
        self.density.validate()
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            polarity: Polarity::default(),
            threshold: None,
            blur_sigma: Self::DEFAULT_BLUR_SIGMA,
            density: DensitySearch::default(),
        }
    }
}

/// Errors from image-level piece analysis.
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Segmentation, corner detection or piece geometry failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
