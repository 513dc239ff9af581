//! Incremental per-piece pipeline: advance stage-by-stage, inspecting
//! each intermediate result before continuing.
//!
//! ```rust
//! # use quandry_pipeline::{Pipeline, PipelineConfig, PipelineError, PieceInput};
//! # fn run(input: PieceInput) -> Result<(), PipelineError> {
//! let analysis = Pipeline::new(input, PipelineConfig::default())
//!     .locate_center()?
//!     .select_corners()?
//!     .extract_sides()?
//!     .classify()?
//!     .into_analysis();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state, so a
//! later stage can never run on data an earlier stage failed to
//! produce. Every stage carries the complete output of the stages
//! before it.

use crate::classify::classify_sides;
use crate::corners::{CornerSelection, select_corners};
use crate::diagnostics::StageMetrics;
use crate::sides::extract_sides;
use crate::types::{
    Corners, PieceAnalysis, PieceInput, PipelineConfig, PipelineError, Point, Polyline, Side,
    SideKind,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`locate_center`](Self::locate_center) to advance.
#[must_use = "pipeline stages are consumed by advancing, call .locate_center() to continue"]
pub struct Pending {
    config: PipelineConfig,
    input: PieceInput,
}

impl Pending {
    /// The raw outline and candidates.
    #[must_use]
    pub const fn input(&self) -> &PieceInput {
        &self.input
    }

    /// Validate the configuration and locate the piece center.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for an invalid
    /// configuration, otherwise whatever
    /// [`locate_center`](crate::center::locate_center) returns.
    pub fn locate_center(self) -> Result<Centered, PipelineError> {
        self.config.validate()?;
        let center = crate::center::locate_center(&self.input, self.config.center)?;
        Ok(Centered {
            config: self.config,
            input: self.input,
            center,
        })
    }
}

// ───────────────────────── Stage 1: Centered ─────────────────────────

/// Pipeline state after the piece center is known.
#[must_use = "pipeline stages are consumed by advancing, call .select_corners() to continue"]
pub struct Centered {
    config: PipelineConfig,
    input: PieceInput,
    center: Point,
}

impl Centered {
    /// Metrics describing the work done to reach this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Center {
            strategy: self.config.center,
            outline_points: self.input.outline.len(),
            candidate_count: self.input.candidates.len(),
        }
    }

    /// The approximate piece center.
    #[must_use]
    pub const fn center(&self) -> Point {
        self.center
    }

    /// Select the four true corners from the candidates.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoCornersFound`] or
    /// [`PipelineError::DegenerateQuadrilateral`].
    pub fn select_corners(self) -> Result<CornersSelected, PipelineError> {
        let selection = select_corners(&self.input.candidates, self.center, &self.config)?;
        Ok(CornersSelected {
            config: self.config,
            outline: self.input.outline,
            candidate_count: self.input.candidates.len(),
            center: self.center,
            selection,
        })
    }
}

// ───────────────────────── Stage 2: CornersSelected ──────────────────

/// Pipeline state after corner selection.
#[must_use = "pipeline stages are consumed by advancing, call .extract_sides() to continue"]
pub struct CornersSelected {
    config: PipelineConfig,
    outline: Polyline,
    candidate_count: usize,
    center: Point,
    selection: CornerSelection,
}

impl CornersSelected {
    /// Metrics describing the work done to reach this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::CornerSelection {
            candidate_count: self.candidate_count,
            outliers_removed: self.selection.outliers_removed,
            rectangles_scored: self.selection.rectangles_scored,
            area: self.selection.area,
        }
    }

    /// The selected corners, clockwise from the top-left.
    #[must_use]
    pub const fn corners(&self) -> &Corners {
        &self.selection.corners
    }

    /// Full corner selection record.
    #[must_use]
    pub const fn selection(&self) -> &CornerSelection {
        &self.selection
    }

    /// Cut the outline into four sides at the corners.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SideExtractionFailed`].
    pub fn extract_sides(self) -> Result<SidesExtracted, PipelineError> {
        let sides = extract_sides(&self.outline, &self.selection.corners, self.config.wrap_fraction)?;
        Ok(SidesExtracted {
            config: self.config,
            outline: self.outline,
            candidate_count: self.candidate_count,
            center: self.center,
            selection: self.selection,
            sides,
        })
    }
}

// ───────────────────────── Stage 3: SidesExtracted ───────────────────

/// Pipeline state after the outline is split into sides.
#[must_use = "pipeline stages are consumed by advancing, call .classify() to continue"]
pub struct SidesExtracted {
    config: PipelineConfig,
    outline: Polyline,
    candidate_count: usize,
    center: Point,
    selection: CornerSelection,
    sides: [Polyline; 4],
}

impl SidesExtracted {
    /// Metrics describing the work done to reach this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::SideExtraction {
            outline_points: self.outline.len(),
            side_points: std::array::from_fn(|i| self.sides[i].len()),
        }
    }

    /// The four unclassified side polylines.
    #[must_use]
    pub const fn sides(&self) -> &[Polyline; 4] {
        &self.sides
    }

    /// Measure and classify every side.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SideExtractionFailed`] if a side is empty.
    pub fn classify(self) -> Result<Classified, PipelineError> {
        let sides = classify_sides(
            self.sides,
            &self.selection.corners,
            self.center,
            self.config.flat_threshold,
        )?;
        Ok(Classified {
            outline: self.outline,
            candidate_count: self.candidate_count,
            center: self.center,
            selection: self.selection,
            sides,
        })
    }
}

// ───────────────────────── Stage 4: Classified ───────────────────────

/// Final pipeline state: every field of the analysis is populated.
#[must_use = "call .into_analysis() to extract the PieceAnalysis"]
pub struct Classified {
    outline: Polyline,
    candidate_count: usize,
    center: Point,
    selection: CornerSelection,
    sides: [Side; 4],
}

impl Classified {
    /// Metrics describing the work done to reach this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let count = |kind| self.sides.iter().filter(|s| s.kind == kind).count();
        StageMetrics::Classification {
            flat_sides: count(SideKind::Flat),
            out_sides: count(SideKind::Out),
            in_sides: count(SideKind::In),
            total_length: self.sides.iter().map(|s| s.length).sum(),
        }
    }

    /// The classified sides.
    #[must_use]
    pub const fn sides(&self) -> &[Side; 4] {
        &self.sides
    }

    /// Consume the pipeline and return the finished analysis.
    #[must_use]
    pub fn into_analysis(self) -> PieceAnalysis {
        PieceAnalysis {
            outline: self.outline,
            center: self.center,
            candidates: self.selection.inliers,
            corners: self.selection.corners,
            sides: self.sides,
        }
    }
}

// ──────────────────────────── PipelineStage ──────────────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 5;

/// Trait implemented by every pipeline stage.
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage.
    const NAME: &str;

    /// Zero-based index of this stage.
    const INDEX: usize;

    /// Run all remaining stages.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure.
    fn complete(self) -> Result<PieceAnalysis, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "input";
    const INDEX: usize = 0;

    fn complete(self) -> Result<PieceAnalysis, PipelineError> {
        self.locate_center()?.complete()
    }
}

impl PipelineStage for Centered {
    const NAME: &str = "center";
    const INDEX: usize = 1;

    fn complete(self) -> Result<PieceAnalysis, PipelineError> {
        self.select_corners()?.complete()
    }
}

impl PipelineStage for CornersSelected {
    const NAME: &str = "corners";
    const INDEX: usize = 2;

    fn complete(self) -> Result<PieceAnalysis, PipelineError> {
        self.extract_sides()?.complete()
    }
}

impl PipelineStage for SidesExtracted {
    const NAME: &str = "sides";
    const INDEX: usize = 3;

    fn complete(self) -> Result<PieceAnalysis, PipelineError> {
        Ok(self.classify()?.into_analysis())
    }
}

impl PipelineStage for Classified {
    const NAME: &str = "classify";
    const INDEX: usize = 4;

    fn complete(self) -> Result<PieceAnalysis, PipelineError> {
        Ok(self.into_analysis())
    }
}

// ──────────────────────────── Entry point ────────────────────────────

/// Entry point for the incremental pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline for one piece.
    ///
    /// No processing is performed until
    /// [`.locate_center()`](Pending::locate_center) is called.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(input: PieceInput, config: PipelineConfig) -> Pending {
        Pending { config, input }
    }
}
