//! quandry-pipeline: Jigsaw piece geometry (sans-IO).
//!
//! Turns a traced piece outline and a noisy set of candidate corner
//! points into four ordered, classified sides:
//! center -> corner selection -> side extraction -> side classification.
//!
//! Sides pooled from many pieces can then be ranked against each other
//! with a reflection-aware shape score to find tabs that fit sockets.
//!
//! This crate has **no image or I/O dependencies**. Outlines and
//! candidates come from `quandry-vision` or any other source.

use std::collections::BTreeMap;

use log::{debug, warn};

pub mod center;
pub mod classify;
pub mod corners;
pub mod density;
pub mod diagnostics;
pub mod matching;
pub mod pipeline;
pub mod pool;
pub mod sides;
pub mod types;

pub use density::{CornerDetector, DensityOutcome, DensitySearch, search_candidate_density};
pub use matching::{MatchCandidate, MatchConfig, SideMatches, rank_matches, shape_score};
pub use pipeline::Pipeline;
pub use pool::{PooledSide, SidePool};
pub use types::{
    BoundingBox, CenterStrategy, Corners, Direction, PieceAnalysis, PieceId, PieceInput,
    PipelineConfig, PipelineError, Point, Polyline, Side, SideKey, SideKind,
};

/// Analyze one piece.
///
/// Validates `config`, then locates the center, selects the four
/// corners, cuts the outline into sides and classifies them.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for an invalid
/// configuration, [`PipelineError::NoOutlineFound`] for an unusable
/// outline, [`PipelineError::NoCornersFound`] or
/// [`PipelineError::DegenerateQuadrilateral`] when no corner set can be
/// chosen, and [`PipelineError::SideExtractionFailed`] when the outline
/// cannot be split at the chosen corners.
pub fn analyze_piece(input: PieceInput, config: &PipelineConfig) -> Result<PieceAnalysis, PipelineError> {
    Ok(Pipeline::new(input, config.clone())
        .locate_center()?
        .select_corners()?
        .extract_sides()?
        .classify()?
        .into_analysis())
}

/// Analyze many pieces independently.
///
/// Every piece gets its own result; a failure is recorded for that
/// piece and never affects the others.
pub fn analyze_pieces<I>(
    pieces: I,
    config: &PipelineConfig,
) -> BTreeMap<PieceId, Result<PieceAnalysis, PipelineError>>
where
    I: IntoIterator<Item = (PieceId, PieceInput)>,
{
    pieces
        .into_iter()
        .map(|(id, input)| {
            let result = analyze_piece(input, config);
            match &result {
                Ok(analysis) => debug!(
                    "{id}: sides {}",
                    analysis
                        .sides
                        .iter()
                        .map(|s| format!("{}={}", s.direction, s.kind))
                        .collect::<Vec<_>>()
                        .join(" ")
                ),
                Err(e) => warn!("{id}: {e}"),
            }
            (id, result)
        })
        .collect()
}
