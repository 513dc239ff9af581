//! Side classification: flat, out (tab) or in (socket).
//!
//! A side is compared against the straight chord between its two
//! corners. If its mean point sits noticeably farther from the piece
//! center than the chord midpoint, the side protrudes; if nearer, it is
//! recessed.

use log::trace;

use crate::types::{Corners, Direction, PipelineError, Point, Polyline, Side, SideKind};

/// Relative difference between the center distances of a side's mean
/// point and its chord midpoint.
///
/// Computed as `|side_dist - chord_dist| / side_dist`. A mean point that
/// coincides with the center yields infinity.
#[must_use]
pub fn center_distance_ratio(side_mean: Point, chord_mid: Point, center: Point) -> f64 {
    let side_dist = side_mean.distance(center);
    let chord_dist = chord_mid.distance(center);
    if side_dist == 0.0 {
        return f64::INFINITY;
    }
    (side_dist - chord_dist).abs() / side_dist
}

/// Classify a side from its mean point and chord midpoint.
#[must_use]
pub fn side_kind(side_mean: Point, chord_mid: Point, center: Point, flat_threshold: f64) -> SideKind {
    if center_distance_ratio(side_mean, chord_mid, center) < flat_threshold {
        SideKind::Flat
    } else if side_mean.distance(center) > chord_mid.distance(center) {
        SideKind::Out
    } else {
        SideKind::In
    }
}

/// Build a fully classified [`Side`] for side `index` of a piece.
///
/// # Errors
///
/// Returns [`PipelineError::SideExtractionFailed`] if `polyline` is
/// empty.
pub fn classify_side(
    index: usize,
    polyline: Polyline,
    corners: &Corners,
    center: Point,
    flat_threshold: f64,
) -> Result<Side, PipelineError> {
    let mean_point = polyline.mean_point().ok_or_else(|| {
        PipelineError::SideExtractionFailed(format!("side {index} has no points"))
    })?;
    let (start, end) = corners.side_bounds(index);
    let chord_mid = start.midpoint(end);
    let kind = side_kind(mean_point, chord_mid, center, flat_threshold);

    let depth = polyline
        .points()
        .iter()
        .map(|p| p.distance_to_line(start, end))
        .fold(0.0, f64::max);
    let bounding_box = match kind {
        SideKind::Flat => None,
        SideKind::Out | SideKind::In => polyline.bounding_box(),
    };

    let side = Side {
        index,
        direction: Direction::from_index(index),
        length: polyline.path_length(),
        chord_length: start.distance(end),
        kind,
        mean_point,
        depth,
        bounding_box,
        polyline,
    };
    trace!(
        "side {} ({}): {} length={:.2} depth={:.2}",
        side.index, side.direction, side.kind, side.length, side.depth
    );
    Ok(side)
}

/// Classify all four sides of a piece, in corner order.
///
/// # Errors
///
/// Propagates the first [`classify_side`] failure.
pub fn classify_sides(
    sides: [Polyline; 4],
    corners: &Corners,
    center: Point,
    flat_threshold: f64,
) -> Result<[Side; 4], PipelineError> {
    let [s0, s1, s2, s3] = sides;
    Ok([
        classify_side(0, s0, corners, center, flat_threshold)?,
        classify_side(1, s1, corners, center, flat_threshold)?,
        classify_side(2, s2, corners, center, flat_threshold)?,
        classify_side(3, s3, corners, center, flat_threshold)?,
    ])
}
