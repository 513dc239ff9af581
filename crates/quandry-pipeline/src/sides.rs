//! Side extraction: cut the closed outline into four sides at the corners.
//!
//! Corners come from a corner-response routine and rarely sit exactly on
//! the traced outline, so each corner is first snapped to its nearest
//! outline point. The outline is a closed loop stored as a linear array;
//! a side whose endpoints are far apart in index space is taken to wrap
//! around the array boundary instead.

use log::trace;

use crate::types::{Corners, PipelineError, Point, Polyline};

/// Index of the point in `points` nearest to `target`.
///
/// Ties resolve to the lowest index. Returns `None` for an empty slice.
#[must_use]
pub fn nearest_index(points: &[Point], target: Point) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, p) in points.iter().enumerate() {
        let d = p.distance_squared(target);
        if best.is_none_or(|(_, best_d)| d < best_d) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

/// Outline points with a repeated closing point removed.
fn ring(outline: &Polyline) -> &[Point] {
    let points = outline.points();
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() > 1 && first == last => {
            &points[..points.len() - 1]
        }
        _ => points,
    }
}

/// Outline indices covered by the side running from `start` to `end`.
///
/// Both endpoints are included. The direct slice is used unless its span
/// exceeds `wrap_fraction` of the outline, in which case the side runs
/// through the end of the array and back around from index 0. The
/// result always begins at `start`.
#[allow(clippy::cast_precision_loss)]
fn side_indices(start: usize, end: usize, len: usize, wrap_fraction: f64) -> Vec<usize> {
    let (lo, hi) = (start.min(end), start.max(end));
    let mut indices: Vec<usize> = if (hi - lo) as f64 / len as f64 > wrap_fraction {
        (hi..len).chain(0..=lo).collect()
    } else {
        (lo..=hi).collect()
    };
    if indices.first() != Some(&start) {
        indices.reverse();
    }
    indices
}

/// Split `outline` into four sides between consecutive `corners`.
///
/// Side `i` runs from the outline point nearest `corners[i]` to the one
/// nearest `corners[i + 1]`, both included, so neighboring sides share
/// their corner point. Dropping each side's last point and concatenating
/// the four reproduces every outline point exactly once.
///
/// # Errors
///
/// Returns [`PipelineError::SideExtractionFailed`] when the outline has
/// fewer than four distinct points, when two corners snap to the same
/// outline point, or when the four sides do not partition the outline.
pub fn extract_sides(
    outline: &Polyline,
    corners: &Corners,
    wrap_fraction: f64,
) -> Result<[Polyline; 4], PipelineError> {
    let points = ring(outline);
    let len = points.len();
    if len < 4 {
        return Err(PipelineError::SideExtractionFailed(format!(
            "outline has only {len} points"
        )));
    }

    let mut anchors = [0usize; 4];
    for (anchor, &corner) in anchors.iter_mut().zip(corners.points()) {
        *anchor = nearest_index(points, corner).ok_or_else(|| {
            PipelineError::SideExtractionFailed("nearest outline point lookup failed".to_string())
        })?;
    }
    trace!("side extraction: corner anchors {anchors:?} on {len} outline points");

    for (i, a) in anchors.iter().enumerate() {
        if anchors[i + 1..].contains(a) {
            return Err(PipelineError::SideExtractionFailed(format!(
                "two corners snap to outline index {a}"
            )));
        }
    }

    let sides: Vec<Vec<usize>> = (0..4)
        .map(|i| side_indices(anchors[i], anchors[(i + 1) % 4], len, wrap_fraction))
        .collect();

    // Each side owns every index but its last, which starts the next side.
    let mut visited = vec![false; len];
    for (side, indices) in sides.iter().enumerate() {
        let owned = indices.split_last().map_or(&[][..], |(_, rest)| rest);
        for &i in owned {
            if std::mem::replace(&mut visited[i], true) {
                return Err(PipelineError::SideExtractionFailed(format!(
                    "side {side} revisits outline index {i}"
                )));
            }
        }
    }
    if let Some(gap) = visited.iter().position(|&v| !v) {
        return Err(PipelineError::SideExtractionFailed(format!(
            "outline index {gap} belongs to no side"
        )));
    }

    let sides: Vec<Polyline> = sides
        .into_iter()
        .map(|indices| Polyline::new(indices.into_iter().map(|i| points[i]).collect()))
        .collect();
    sides.try_into().map_err(|_: Vec<Polyline>| {
        PipelineError::SideExtractionFailed("expected exactly four sides".to_string())
    })
}
