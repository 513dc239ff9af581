//! Shared types for the quandry piece analysis pipeline.

use std::fmt;

use geo::BoundingRect;
use serde::{Deserialize, Serialize};

/// A 2D point in image coordinates.
///
/// The y axis grows downward, so increasing bearings sweep clockwise
/// on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// The origin `(0, 0)`.
    pub const ORIGIN: Self = Self::new(0.0, 0.0);

    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Signed bearing of this point as seen from `origin`, in radians.
    ///
    /// Computed as `atan2(dy, dx)`, so the result lies in `(-π, π]`.
    #[must_use]
    pub fn bearing_from(self, origin: Self) -> f64 {
        (self.y - origin.y).atan2(self.x - origin.x)
    }

    /// This point expressed relative to `origin` (i.e. `self - origin`).
    #[must_use]
    pub fn relative_to(self, origin: Self) -> Self {
        Self::new(self.x - origin.x, self.y - origin.y)
    }

    /// This point shifted by `offset`.
    #[must_use]
    pub fn translate(self, offset: Self) -> Self {
        Self::new(self.x + offset.x, self.y + offset.y)
    }

    /// Rotate about the origin by `angle` radians.
    #[must_use]
    pub fn rotate(self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(
            self.x.mul_add(cos, -(self.y * sin)),
            self.x.mul_add(sin, self.y * cos),
        )
    }

    /// Reflect across the line through the origin with direction `axis`.
    ///
    /// A zero-length axis has no direction; the point is returned
    /// unchanged.
    #[must_use]
    pub fn reflect_across(self, axis: Self) -> Self {
        let len_sq = axis.x.mul_add(axis.x, axis.y * axis.y);
        if len_sq == 0.0 {
            return self;
        }
        let dot = self.x.mul_add(axis.x, self.y * axis.y);
        let scale = 2.0 * dot / len_sq;
        Self::new(
            scale.mul_add(axis.x, -self.x),
            scale.mul_add(axis.y, -self.y),
        )
    }

    /// Perpendicular distance to the infinite line through `a` and `b`.
    ///
    /// Uses `|cross(b-a, p-a)| / |b-a|`. When `a` and `b` coincide,
    /// returns the distance to `a`.
    #[must_use]
    pub fn distance_to_line(self, a: Self, b: Self) -> f64 {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let length_sq = dx.mul_add(dx, dy * dy);
        if length_sq == 0.0 {
            return self.distance(a);
        }
        let cross = dx.mul_add(a.y - self.y, -(dy * (a.x - self.x)));
        cross.abs() / length_sq.sqrt()
    }

    /// Midpoint between this point and `other`.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new(f64::midpoint(self.x, other.x), f64::midpoint(self.y, other.y))
    }
}

/// Arithmetic mean of a set of points, or `None` when empty.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn mean_point(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

/// A sequence of connected points forming a path.
///
/// Order is significant: it defines the path length and direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Sum of the distances between consecutive points.
    #[must_use]
    pub fn path_length(&self) -> f64 {
        self.0.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// Arithmetic mean of all points, or `None` when empty.
    #[must_use]
    pub fn mean_point(&self) -> Option<Point> {
        mean_point(&self.0)
    }

    /// Axis-aligned bounding box, or `None` when empty.
    #[must_use]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let line: geo::LineString<f64> = self
            .0
            .iter()
            .map(|p| geo::Coord { x: p.x, y: p.y })
            .collect();
        line.bounding_rect().map(|rect| BoundingBox {
            min: Point::new(rect.min().x, rect.min().y),
            max: Point::new(rect.max().x, rect.max().y),
        })
    }
}

/// An axis-aligned rectangle given by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Corner with the smallest coordinates.
    pub min: Point,
    /// Corner with the largest coordinates.
    pub max: Point,
}

impl BoundingBox {
    /// Horizontal extent.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Vertical extent.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/// Identifies one analyzed piece (typically its source file name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PieceId(String);

impl PieceId {
    /// Create a new identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PieceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifies one side of one piece: `(piece, index 0..3)`.
///
/// Displays as `piece+index`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SideKey {
    /// The owning piece.
    pub piece: PieceId,
    /// Side index in clockwise order, 0 = the side leaving the first corner.
    pub index: usize,
}

impl SideKey {
    /// Create a new side key.
    #[must_use]
    pub const fn new(piece: PieceId, index: usize) -> Self {
        Self { piece, index }
    }
}

impl fmt::Display for SideKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.piece, self.index)
    }
}

/// Shape class of a side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideKind {
    /// No protrusion: the side stays near its corner-to-corner chord.
    Flat,
    /// A tab protruding away from the piece center.
    Out,
    /// A socket recessed toward the piece center.
    In,
}

impl SideKind {
    /// Lowercase label (`"flat"`, `"out"`, `"in"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Out => "out",
            Self::In => "in",
        }
    }
}

impl fmt::Display for SideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compass label for a side index, assuming the first corner is top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Side 0: top-left to top-right.
    N,
    /// Side 1: top-right to bottom-right.
    E,
    /// Side 2: bottom-right to bottom-left.
    S,
    /// Side 3: bottom-left to top-left.
    W,
}

impl Direction {
    /// All directions in side-index order.
    pub const ALL: [Self; 4] = [Self::N, Self::E, Self::S, Self::W];

    /// Direction for a side index (taken modulo 4).
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self::ALL[index % 4]
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::N => "N",
            Self::E => "E",
            Self::S => "S",
            Self::W => "W",
        };
        f.write_str(label)
    }
}

/// The four true corners of a piece, clockwise from the top-left-most.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corners(pub [Point; 4]);

impl Corners {
    /// Corner points in order.
    #[must_use]
    pub const fn points(&self) -> &[Point; 4] {
        &self.0
    }

    /// The `(start, end)` corners bounding side `index` (modulo 4).
    #[must_use]
    pub const fn side_bounds(&self, index: usize) -> (Point, Point) {
        (self.0[index % 4], self.0[(index + 1) % 4])
    }
}

/// One classified side of a piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Side {
    /// Side index 0..3, clockwise from the first corner.
    pub index: usize,
    /// Compass label derived from `index`.
    pub direction: Direction,
    /// Outline points from the start corner to the end corner.
    pub polyline: Polyline,
    /// Path length along `polyline`.
    pub length: f64,
    /// Straight-line distance between the bounding corners.
    pub chord_length: f64,
    /// Shape class.
    pub kind: SideKind,
    /// Mean of the side's points.
    pub mean_point: Point,
    /// Largest distance of any side point from the corner chord line.
    pub depth: f64,
    /// Bounding box of the side, present only for non-flat sides.
    pub bounding_box: Option<BoundingBox>,
}

/// Raw per-piece input supplied by the vision primitives layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceInput {
    /// Closed, ordered outline of the piece silhouette.
    pub outline: Polyline,
    /// Unordered candidate corner points, possibly with outliers.
    pub candidates: Vec<Point>,
}

/// Fully analyzed piece: every field is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceAnalysis {
    /// Closed outline the sides were cut from.
    pub outline: Polyline,
    /// Approximate piece center.
    pub center: Point,
    /// Candidates that survived outlier removal.
    pub candidates: Vec<Point>,
    /// The four true corners.
    pub corners: Corners,
    /// The four sides, in corner order.
    pub sides: [Side; 4],
}

/// How the approximate piece center is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CenterStrategy {
    /// Mean of all outline points.
    #[default]
    OutlineMean,
    /// Mean of all candidate corner points.
    CandidateMean,
}

/// Configuration for the per-piece pipeline.
///
/// All thresholds are externally tuned; the defaults match the values
/// used on the reference photographs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Where the piece center comes from.
    pub center: CenterStrategy,

    /// Candidates farther from the center than
    /// `mean + outlier_stdev_multiplier * stdev` of all center distances
    /// are discarded.
    pub outlier_stdev_multiplier: f64,

    /// Bound on `|cos Δ|` (90° neighbors) and `|sin Δ|` (180° neighbors)
    /// for candidate bearing differences `Δ`.
    pub angle_threshold: f64,

    /// Maximum relative difference between two candidates' center
    /// distances for them to be related.
    pub center_dist_threshold: f64,

    /// If the index span between two corners exceeds this fraction of
    /// the outline, the side wraps around the array boundary.
    pub wrap_fraction: f64,

    /// Sides whose mean point differs from the chord midpoint by less
    /// than this relative amount (in center distance) are flat.
    pub flat_threshold: f64,
}

impl PipelineConfig {
    /// Default outlier standard deviation multiplier.
    pub const DEFAULT_OUTLIER_STDEV_MULTIPLIER: f64 = 1.5;
    /// Default angle threshold.
    pub const DEFAULT_ANGLE_THRESHOLD: f64 = 0.2;
    /// Default center distance threshold.
    pub const DEFAULT_CENTER_DIST_THRESHOLD: f64 = 0.2;
    /// Default side wrap fraction.
    pub const DEFAULT_WRAP_FRACTION: f64 = 0.4;
    /// Default flat side threshold.
    pub const DEFAULT_FLAT_THRESHOLD: f64 = 0.08;

    /// Check that every parameter is finite and in range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let checks = [
            (
                "outlier_stdev_multiplier",
                self.outlier_stdev_multiplier,
                0.0,
                f64::MAX,
            ),
            ("angle_threshold", self.angle_threshold, 0.0, 1.0),
            (
                "center_dist_threshold",
                self.center_dist_threshold,
                0.0,
                f64::MAX,
            ),
            ("wrap_fraction", self.wrap_fraction, 0.0, 1.0),
            ("flat_threshold", self.flat_threshold, 0.0, f64::MAX),
        ];
        for (name, value, min, max) in checks {
            if !value.is_finite() || value < min || value > max {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite and within [{min}, {max}], got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            center: CenterStrategy::default(),
            outlier_stdev_multiplier: Self::DEFAULT_OUTLIER_STDEV_MULTIPLIER,
            angle_threshold: Self::DEFAULT_ANGLE_THRESHOLD,
            center_dist_threshold: Self::DEFAULT_CENTER_DIST_THRESHOLD,
            wrap_fraction: Self::DEFAULT_WRAP_FRACTION,
            flat_threshold: Self::DEFAULT_FLAT_THRESHOLD,
        }
    }
}

/// Errors that can occur while analyzing a piece.
///
/// Each error is scoped to the piece being analyzed.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// The outline was missing or too short to use.
    #[error("no usable outline found")]
    NoOutlineFound,

    /// No plausible 4-corner candidate could be formed.
    #[error("no corners found")]
    NoCornersFound,

    /// Every rectangle candidate had zero area.
    #[error("all corner quadrilaterals are degenerate")]
    DegenerateQuadrilateral,

    /// The outline could not be partitioned between the corners.
    #[error("side extraction failed: {0}")]
    SideExtractionFailed(String),

    /// The candidate-density search exhausted its iteration budget.
    #[error(
        "corner candidate count {last_count} still outside the target window after {iterations} iterations"
    )]
    CornerDensityOutOfRange {
        /// Number of detector invocations made.
        iterations: usize,
        /// Candidate count returned by the final invocation.
        last_count: usize,
    },

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    /// Whether this error means the corner stage found nothing usable.
    ///
    /// A degenerate quadrilateral is reported separately but is treated
    /// the same as no corners at all.
    #[must_use]
    pub const fn is_no_corners(&self) -> bool {
        matches!(self, Self::NoCornersFound | Self::DegenerateQuadrilateral)
    }
}
