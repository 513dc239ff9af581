//! Per-piece diagnostics: timing and counts for each pipeline stage.
//!
//! Intended for parameter tuning. Time is read through the [`Clock`]
//! trait so this crate stays free of platform timer dependencies; the
//! caller supplies a clock backed by whatever timer it has.
//!
//! Durations are serialized as fractional seconds (`f64`), since
//! `std::time::Duration` does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Centered, Classified, CornersSelected, Pipeline, SidesExtracted};
use crate::types::{CenterStrategy, PieceAnalysis, PieceInput, PipelineConfig, PipelineError};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// A monotonic time source.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Center location.
    Center {
        /// Strategy used.
        strategy: CenterStrategy,
        /// Points in the input outline.
        outline_points: usize,
        /// Raw candidate corners.
        candidate_count: usize,
    },
    /// Corner selection.
    CornerSelection {
        /// Raw candidate corners.
        candidate_count: usize,
        /// Candidates dropped as outliers.
        outliers_removed: usize,
        /// Rectangle candidates scored.
        rectangles_scored: usize,
        /// Area of the chosen quadrilateral.
        area: f64,
    },
    /// Side extraction.
    SideExtraction {
        /// Points in the outline.
        outline_points: usize,
        /// Points in each side, in corner order.
        side_points: [usize; 4],
    },
    /// Side classification.
    Classification {
        /// Number of flat sides.
        flat_sides: usize,
        /// Number of tabs.
        out_sides: usize,
        /// Number of sockets.
        in_sides: usize,
        /// Sum of all side lengths.
        total_length: f64,
    },
}

/// Diagnostics collected from one per-piece pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceDiagnostics {
    /// Stage 1: center location.
    pub center: StageDiagnostics,
    /// Stage 2: corner selection.
    pub corner_selection: StageDiagnostics,
    /// Stage 3: side extraction.
    pub side_extraction: StageDiagnostics,
    /// Stage 4: classification.
    pub classification: StageDiagnostics,
    /// Total wall-clock duration (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

impl PieceDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Piece Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration)
        ));
        lines.push(String::new());
        lines.push(format!(
            "{:<20} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Center", &self.center),
            ("Corner Selection", &self.corner_selection),
            ("Side Extraction", &self.side_extraction),
            ("Classification", &self.classification),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<20} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }
        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Center {
            strategy,
            outline_points,
            candidate_count,
        } => format!("{strategy:?} outline={outline_points} candidates={candidate_count}"),
        StageMetrics::CornerSelection {
            candidate_count,
            outliers_removed,
            rectangles_scored,
            area,
        } => format!(
            "{candidate_count} candidates, -{outliers_removed} outliers, {rectangles_scored} rects, area={area:.1}"
        ),
        StageMetrics::SideExtraction {
            outline_points,
            side_points,
        } => format!("{outline_points} pts -> {side_points:?}"),
        StageMetrics::Classification {
            flat_sides,
            out_sides,
            in_sides,
            total_length,
        } => format!("flat={flat_sides} out={out_sides} in={in_sides} length={total_length:.1}"),
    }
}

/// Time one stage transition and record the metrics of its result.
fn timed<C, S, F>(
    clock: &C,
    advance: F,
    measure: fn(&S) -> StageMetrics,
) -> Result<(S, StageDiagnostics), PipelineError>
where
    C: Clock,
    F: FnOnce() -> Result<S, PipelineError>,
{
    let start = clock.now();
    let stage = advance()?;
    let duration = clock.elapsed(&start);
    let metrics = measure(&stage);
    Ok((stage, StageDiagnostics { duration, metrics }))
}

/// Run the per-piece pipeline, collecting per-stage diagnostics.
///
/// # Errors
///
/// Returns the first stage failure, exactly as
/// [`analyze_piece`](crate::analyze_piece) would.
pub fn analyze_piece_with_diagnostics<C: Clock>(
    input: PieceInput,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(PieceAnalysis, PieceDiagnostics), PipelineError> {
    let total_start = clock.now();
    let pending = Pipeline::new(input, config.clone());

    let (centered, center) = timed(clock, || pending.locate_center(), Centered::metrics)?;
    let (selected, corner_selection) =
        timed(clock, || centered.select_corners(), CornersSelected::metrics)?;
    let (extracted, side_extraction) =
        timed(clock, || selected.extract_sides(), SidesExtracted::metrics)?;
    let (classified, classification) =
        timed(clock, || extracted.classify(), Classified::metrics)?;
    let analysis = classified.into_analysis();

    let diagnostics = PieceDiagnostics {
        center,
        corner_selection,
        side_extraction,
        classification,
        total_duration: clock.elapsed(&total_start),
    };
    Ok((analysis, diagnostics))
}
