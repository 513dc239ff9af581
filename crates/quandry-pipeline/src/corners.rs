//! Corner selection: pick the four true corners out of noisy candidates.
//!
//! Candidate corners come from a generic corner-response routine and
//! contain plenty of noise: responses along tabs and sockets, and
//! spurious hits near the image border. Solving for the corners
//! directly is unreliable, so the selector generates every plausible
//! rectangle and scores it instead:
//!
//! 1. Drop candidates unusually far from the piece center.
//! 2. For each candidate, collect the others that sit roughly 90° and
//!    roughly 180° away from it as seen from the center.
//! 3. Form every (pivot, two 90° neighbors, one 180° neighbor)
//!    quadrilateral and score it by area (Bretschneider's formula).
//! 4. Keep the largest, then order it clockwise from the top-left.

use log::{debug, trace};

use crate::types::{Corners, PipelineConfig, PipelineError, Point};

/// Per-candidate neighbor sets used to build rectangle candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CornerRelations {
    /// Indices of candidates roughly perpendicular as seen from the center.
    pub perpendicular: Vec<usize>,
    /// Indices of candidates roughly diametrically opposite.
    pub opposite: Vec<usize>,
}

/// Four candidate indices in polygon order, plus the quadrilateral area.
///
/// Order is `[pivot, first 90° neighbor, 180° neighbor, second 90° neighbor]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectangleCandidate {
    /// Candidate indices in polygon order.
    pub indices: [usize; 4],
    /// Quadrilateral area, 0.0 when degenerate.
    pub area: f64,
}

/// Summary of one corner selection run.
#[derive(Debug, Clone, PartialEq)]
pub struct CornerSelection {
    /// The chosen corners, clockwise from the top-left.
    pub corners: Corners,
    /// Candidates kept after outlier removal.
    pub inliers: Vec<Point>,
    /// Number of candidates removed as outliers.
    pub outliers_removed: usize,
    /// Number of rectangle candidates that were scored.
    pub rectangles_scored: usize,
    /// Area of the winning quadrilateral.
    pub area: f64,
}

/// Relative slack on the outlier cutoff so equidistant candidates
/// (zero stdev) survive rounding in the mean.
const CUTOFF_TOLERANCE: f64 = 1e-9;

/// Remove candidates whose center distance exceeds `mean + k·stdev`.
///
/// Uses the population standard deviation.
#[allow(clippy::cast_precision_loss)]
#[must_use = "returns the candidates that survived outlier removal"]
pub fn remove_outliers(candidates: &[Point], center: Point, stdev_multiplier: f64) -> Vec<Point> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let distances: Vec<f64> = candidates.iter().map(|c| c.distance(center)).collect();
    let n = distances.len() as f64;
    let mean = distances.iter().sum::<f64>() / n;
    let variance = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    let cutoff = stdev_multiplier.mul_add(variance.sqrt(), mean) + CUTOFF_TOLERANCE * mean.max(1.0);

    candidates
        .iter()
        .zip(&distances)
        .filter(|&(_, &d)| d <= cutoff)
        .map(|(&c, _)| c)
        .collect()
}

/// Group candidates into 90° and 180° neighbor sets relative to `center`.
///
/// A pair `(i, k)` is only considered when the two center distances agree
/// within `center_dist_threshold` (relative to `i`'s distance) and the
/// two points are at least `i`'s center distance apart. The second
/// condition keeps clusters of responses around one physical corner
/// from relating to each other.
#[must_use = "returns the neighbor sets for each candidate"]
pub fn find_relations(
    candidates: &[Point],
    center: Point,
    angle_threshold: f64,
    center_dist_threshold: f64,
) -> Vec<CornerRelations> {
    let bearings: Vec<f64> = candidates.iter().map(|c| c.bearing_from(center)).collect();
    let center_dists: Vec<f64> = candidates.iter().map(|c| c.distance(center)).collect();

    candidates
        .iter()
        .enumerate()
        .map(|(i, &one)| {
            let mut relations = CornerRelations::default();
            let dist_one = center_dists[i];
            if dist_one == 0.0 {
                return relations;
            }
            for (k, &two) in candidates.iter().enumerate() {
                if i == k {
                    continue;
                }
                if (center_dists[k] - dist_one).abs() / dist_one > center_dist_threshold {
                    continue;
                }
                if one.distance(two) < dist_one {
                    continue;
                }
                let delta = bearings[i] - bearings[k];
                if delta.cos().abs() < angle_threshold {
                    relations.perpendicular.push(k);
                }
                if delta.sin().abs() < angle_threshold {
                    relations.opposite.push(k);
                }
            }
            relations
        })
        .collect()
}

/// Area of a quadrilateral via Bretschneider's formula.
///
/// `quad` must be in polygon order. Uses the four side lengths and two
/// diagonals: `0.25·sqrt(4p²q² − (b² + d² − a² − c²)²)`. A negative
/// radicand (self-intersecting or degenerate quadrilateral) yields 0.0.
#[must_use]
pub fn quadrilateral_area(quad: [Point; 4]) -> f64 {
    let a = quad[0].distance(quad[3]);
    let b = quad[1].distance(quad[0]);
    let c = quad[2].distance(quad[1]);
    let d = quad[3].distance(quad[2]);
    let p = quad[0].distance(quad[2]);
    let q = quad[1].distance(quad[3]);

    let skew = b.mul_add(b, d * d) - a.mul_add(a, c * c);
    let radicand = (4.0 * p * p * q * q) - skew * skew;
    if radicand <= 0.0 || !radicand.is_finite() {
        return 0.0;
    }
    0.25 * radicand.sqrt()
}

/// Visit every rectangle candidate, scored, without storing them.
///
/// A candidate qualifies as a pivot when it has at least two 90°
/// neighbors and one 180° neighbor. Each (180° neighbor, unordered pair
/// of 90° neighbors) combination yields one rectangle.
pub fn for_each_rectangle<F>(candidates: &[Point], relations: &[CornerRelations], mut visit: F)
where
    F: FnMut(RectangleCandidate),
{
    for (pivot, rel) in relations.iter().enumerate() {
        if rel.perpendicular.len() < 2 || rel.opposite.is_empty() {
            continue;
        }
        for &opposite in &rel.opposite {
            for (n, &first) in rel.perpendicular.iter().enumerate() {
                for &second in &rel.perpendicular[n + 1..] {
                    let indices = [pivot, first, opposite, second];
                    let area = quadrilateral_area(indices.map(|i| candidates[i]));
                    visit(RectangleCandidate { indices, area });
                }
            }
        }
    }
}

/// Enumerate and score every rectangle candidate into a `Vec`.
///
/// The count grows quickly with dense candidate clusters; selection
/// streams through [`for_each_rectangle`] instead.
#[must_use = "returns the scored rectangle candidates"]
pub fn rectangle_candidates(
    candidates: &[Point],
    relations: &[CornerRelations],
) -> Vec<RectangleCandidate> {
    let mut rects = Vec::new();
    for_each_rectangle(candidates, relations, |rect| rects.push(rect));
    rects
}

/// Order four points clockwise (in image coordinates) by bearing from
/// `center`, starting at the smallest bearing.
///
/// Bearings lie in `(-π, π]`, so for an upright piece the first point
/// is the top-left corner.
#[must_use]
pub fn order_clockwise(points: [Point; 4], center: Point) -> Corners {
    let mut ordered = points;
    ordered.sort_by(|a, b| a.bearing_from(center).total_cmp(&b.bearing_from(center)));
    Corners(ordered)
}

/// Select the four true corners from `candidates`.
///
/// # Errors
///
/// Returns [`PipelineError::NoCornersFound`] when fewer than two
/// candidates survive outlier removal or no rectangle candidate can be
/// formed, and [`PipelineError::DegenerateQuadrilateral`] when every
/// rectangle candidate has zero area.
pub fn select_corners(
    candidates: &[Point],
    center: Point,
    config: &PipelineConfig,
) -> Result<CornerSelection, PipelineError> {
    let inliers = remove_outliers(candidates, center, config.outlier_stdev_multiplier);
    let outliers_removed = candidates.len() - inliers.len();
    debug!(
        "corner selection: {} candidates, {outliers_removed} outliers removed",
        candidates.len()
    );
    if inliers.len() < 2 {
        return Err(PipelineError::NoCornersFound);
    }

    let relations = find_relations(
        &inliers,
        center,
        config.angle_threshold,
        config.center_dist_threshold,
    );
    // Strict comparison keeps the first of equally large candidates.
    let mut scored = 0usize;
    let mut best: Option<RectangleCandidate> = None;
    for_each_rectangle(&inliers, &relations, |rect| {
        scored += 1;
        if rect.area > best.map_or(0.0, |b| b.area) {
            best = Some(rect);
        }
    });
    trace!("corner selection: {scored} rectangle candidates");
    if scored == 0 {
        return Err(PipelineError::NoCornersFound);
    }
    let Some(best) = best else {
        return Err(PipelineError::DegenerateQuadrilateral);
    };

    debug!(
        "corner selection: best of {scored} rectangles has area {:.1}",
        best.area
    );

    let corners = order_clockwise(best.indices.map(|i| inliers[i]), center);
    Ok(CornerSelection {
        corners,
        outliers_removed,
        rectangles_scored: scored,
        area: best.area,
        inliers,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn square() -> [Point; 4] {
        [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]
    }

    #[test]
    fn area_of_square() {
        assert!((quadrilateral_area(square()) - 100.0).abs() < EPS);
    }

    #[test]
    fn area_of_rectangle() {
        let quad = [
            Point::new(0.0, 0.0),
            Point::new(8.0, 0.0),
            Point::new(8.0, 3.0),
            Point::new(0.0, 3.0),
        ];
        assert!((quadrilateral_area(quad) - 24.0).abs() < 1e-6);
    }

    #[test]
    fn area_of_collinear_points_is_zero() {
        let quad = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(3.0, 0.0),
        ];
        assert!(quadrilateral_area(quad).abs() < EPS);
    }

    #[test]
    fn outliers_beyond_cutoff_are_removed() {
        let center = Point::new(0.0, 0.0);
        let mut candidates: Vec<Point> = (0..10)
            .map(|i| Point::new(10.0, 0.0).rotate(f64::from(i) * 0.6))
            .collect();
        candidates.push(Point::new(100.0, 0.0));
        let kept = remove_outliers(&candidates, center, 1.5);
        assert_eq!(kept.len(), 10);
        assert!(kept.iter().all(|p| p.distance(center) < 11.0));
    }

    #[test]
    fn uniform_distances_keep_everything() {
        let center = Point::new(5.0, 5.0);
        let kept = remove_outliers(&square(), center, 1.5);
        assert_eq!(kept.len(), 4);
        let three = &square()[..3];
        assert_eq!(remove_outliers(three, center, 1.5).len(), 3);
    }

    #[test]
    fn relations_of_square_corners() {
        let center = Point::new(5.0, 5.0);
        let relations = find_relations(&square(), center, 0.2, 0.2);
        assert_eq!(relations[0].perpendicular, vec![1, 3]);
        assert_eq!(relations[0].opposite, vec![2]);
        assert_eq!(relations[2].perpendicular, vec![1, 3]);
        assert_eq!(relations[2].opposite, vec![0]);
    }

    #[test]
    fn nearby_points_are_not_related() {
        let center = Point::new(0.0, 0.0);
        let candidates = [Point::new(10.0, 0.0), Point::new(-10.0, 0.5)];
        let relations = find_relations(&candidates, center, 0.2, 0.2);
        assert_eq!(relations[0].opposite, vec![1]);

        // Same bearing, but a cluster around one corner.
        let cluster = [Point::new(10.0, 0.0), Point::new(10.5, 0.2)];
        let relations = find_relations(&cluster, center, 0.2, 0.2);
        assert!(relations[0].opposite.is_empty());
    }

    #[test]
    fn mismatched_center_distances_are_not_related() {
        let center = Point::new(0.0, 0.0);
        let candidates = [Point::new(10.0, 0.0), Point::new(0.0, 30.0)];
        let relations = find_relations(&candidates, center, 0.2, 0.2);
        assert!(relations[0].perpendicular.is_empty());
    }

    #[test]
    fn rectangle_candidates_for_square() {
        let center = Point::new(5.0, 5.0);
        let pts = square();
        let relations = find_relations(&pts, center, 0.2, 0.2);
        let rects = rectangle_candidates(&pts, &relations);
        // Every corner is a pivot with exactly one combination.
        assert_eq!(rects.len(), 4);
        for rect in &rects {
            assert!((rect.area - 100.0).abs() < 1e-6);
        }
    }

    #[test]
    fn order_clockwise_starts_top_left() {
        let center = Point::new(5.0, 5.0);
        let shuffled = [
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 0.0),
        ];
        let corners = order_clockwise(shuffled, center);
        assert_eq!(*corners.points(), square());
    }

    #[test]
    fn select_corners_of_clean_square() {
        let mut candidates = square().to_vec();
        // A noise response on a side, close to the square center distance.
        candidates.push(Point::new(5.0, -1.0));
        let selection =
            select_corners(&candidates, Point::new(5.0, 5.0), &PipelineConfig::default()).unwrap();
        assert_eq!(*selection.corners.points(), square());
        assert!((selection.area - 100.0).abs() < 1e-6);
    }

    #[test]
    fn selected_area_dominates_all_candidates() {
        let center = Point::new(50.0, 50.0);
        let candidates = vec![
            Point::new(10.0, 10.0),
            Point::new(90.0, 12.0),
            Point::new(88.0, 91.0),
            Point::new(11.0, 89.0),
            Point::new(20.0, 18.0),
            Point::new(80.0, 20.0),
            Point::new(82.0, 79.0),
            Point::new(19.0, 81.0),
            Point::new(50.0, 8.0),
        ];
        let config = PipelineConfig::default();
        let selection = select_corners(&candidates, center, &config).unwrap();
        let relations = find_relations(
            &selection.inliers,
            center,
            config.angle_threshold,
            config.center_dist_threshold,
        );
        let rects = rectangle_candidates(&selection.inliers, &relations);
        assert_eq!(rects.len(), selection.rectangles_scored);
        for rect in rects {
            assert!(selection.area >= rect.area);
        }
    }

    #[test]
    fn too_few_candidates_fails() {
        let result = select_corners(
            &[Point::new(1.0, 1.0)],
            Point::new(0.0, 0.0),
            &PipelineConfig::default(),
        );
        assert_eq!(result.unwrap_err(), PipelineError::NoCornersFound);
    }

    #[test]
    fn no_rectangle_fails() {
        // Three corners of a square: no 180° partner with two 90° partners.
        let candidates = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
        ];
        let result = select_corners(&candidates, Point::new(5.0, 5.0), &PipelineConfig::default());
        assert_eq!(result.unwrap_err(), PipelineError::NoCornersFound);
    }

    #[test]
    fn dense_clusters_are_scored_without_collecting() {
        // Three-by-three response clusters inside each corner of a
        // 200x200 square.
        let truth = [
            Point::new(0.0, 0.0),
            Point::new(200.0, 0.0),
            Point::new(200.0, 200.0),
            Point::new(0.0, 200.0),
        ];
        let center = Point::new(100.0, 100.0);
        let mut candidates = Vec::new();
        for corner in truth {
            let sx: f64 = if corner.x < center.x { 2.0 } else { -2.0 };
            let sy: f64 = if corner.y < center.y { 2.0 } else { -2.0 };
            for i in 0..3 {
                for j in 0..3 {
                    candidates.push(Point::new(
                        sx.mul_add(f64::from(i), corner.x),
                        sy.mul_add(f64::from(j), corner.y),
                    ));
                }
            }
        }

        let config = PipelineConfig::default();
        let selection = select_corners(&candidates, center, &config).unwrap();

        let relations = find_relations(
            &selection.inliers,
            center,
            config.angle_threshold,
            config.center_dist_threshold,
        );
        let expected: usize = relations
            .iter()
            .filter(|r| r.perpendicular.len() >= 2 && !r.opposite.is_empty())
            .map(|r| {
                let p = r.perpendicular.len();
                r.opposite.len() * p * (p - 1) / 2
            })
            .sum();
        assert!(expected > 1000, "only {expected} rectangles");
        assert_eq!(selection.rectangles_scored, expected);

        assert!(selection.area > 190.0 * 190.0);
        for (found, want) in selection.corners.points().iter().zip(truth) {
            assert!(found.distance(want) <= 6.0, "{found:?} vs {want:?}");
        }
    }

    #[test]
    fn collinear_rectangle_candidate_scores_zero() {
        let relations = vec![
            CornerRelations {
                perpendicular: vec![1, 2],
                opposite: vec![3],
            },
            CornerRelations::default(),
            CornerRelations::default(),
            CornerRelations::default(),
        ];
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(3.0, 0.0),
        ];
        let rects = rectangle_candidates(&pts, &relations);
        assert_eq!(rects.len(), 1);
        assert!(rects[0].area.abs() < EPS);
    }
}
