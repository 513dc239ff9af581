//! Approximate piece center.

use crate::types::{CenterStrategy, PieceInput, PipelineError, Point, mean_point};

/// Locate the piece center used by corner selection and classification.
///
/// # Errors
///
/// Returns [`PipelineError::NoOutlineFound`] when the outline strategy
/// sees fewer than three outline points, and
/// [`PipelineError::NoCornersFound`] when the candidate strategy sees no
/// candidates.
pub fn locate_center(input: &PieceInput, strategy: CenterStrategy) -> Result<Point, PipelineError> {
    match strategy {
        CenterStrategy::OutlineMean => {
            if input.outline.len() < 3 {
                return Err(PipelineError::NoOutlineFound);
            }
            input.outline.mean_point().ok_or(PipelineError::NoOutlineFound)
        }
        CenterStrategy::CandidateMean => {
            mean_point(&input.candidates).ok_or(PipelineError::NoCornersFound)
        }
    }
}
