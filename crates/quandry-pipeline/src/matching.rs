//! Side shape matching.
//!
//! Two sides are compared after normalizing away their position and
//! orientation: both are translated so their first point is the origin,
//! and the second is rotated so its start-to-end axis lies along the
//! first's. The second side is also mirrored across that axis, since a
//! tab and the socket it fits are mirror images of each other. The
//! score is the better of the two alignments.
//!
//! Nearest-neighbor lookups use an R-tree over the target side's points.

use log::debug;
use rstar::RTree;
use serde::{Deserialize, Serialize};

use crate::pool::SidePool;
use crate::types::{PipelineError, Point, Polyline, SideKey, SideKind};

/// A side's points translated so its first point is the origin, plus
/// the bearing and vector of its start-to-end axis.
struct Normalized {
    points: Vec<Point>,
    axis_angle: f64,
    axis: Point,
}

impl Normalized {
    fn new(polyline: &Polyline) -> Option<Self> {
        let first = *polyline.first()?;
        let last = *polyline.last()?;
        Some(Self {
            points: polyline.points().iter().map(|p| p.relative_to(first)).collect(),
            axis_angle: last.bearing_from(first),
            axis: last.relative_to(first),
        })
    }
}

/// Mean distance from each point of `from` to its nearest point in `to`.
#[allow(clippy::cast_precision_loss)]
fn mean_nearest_distance(from: &[Point], to: &RTree<[f64; 2]>) -> f64 {
    if from.is_empty() {
        return 0.0;
    }
    let total: f64 = from
        .iter()
        .map(|p| {
            to.nearest_neighbor(&[p.x, p.y])
                .map_or(f64::INFINITY, |&[x, y]| p.distance(Point::new(x, y)))
        })
        .sum();
    total / from.len() as f64
}

fn tree(points: &[Point]) -> RTree<[f64; 2]> {
    RTree::bulk_load(points.iter().map(|p| [p.x, p.y]).collect())
}

/// Symmetric mean nearest-neighbor distance between two point sets.
///
/// Averages the one-sided mean in both directions, so swapping the
/// arguments gives the same value.
#[must_use]
pub fn mean_hausdorff(a: &[Point], b: &[Point]) -> f64 {
    let (tree_a, tree_b) = (tree(a), tree(b));
    f64::midpoint(
        mean_nearest_distance(a, &tree_b),
        mean_nearest_distance(b, &tree_a),
    )
}

/// Shape dissimilarity between two sides. Lower is a better fit.
///
/// Independent of each side's position and orientation, and of which
/// side is passed first. Returns `None` if either side is empty.
#[must_use]
pub fn shape_score(a: &Polyline, b: &Polyline) -> Option<f64> {
    let a = Normalized::new(a)?;
    let b = Normalized::new(b)?;
    let turn = a.axis_angle - b.axis_angle;

    let rotated: Vec<Point> = b.points.iter().map(|p| p.rotate(turn)).collect();
    let mirrored: Vec<Point> = rotated.iter().map(|p| p.reflect_across(a.axis)).collect();

    let direct = mean_hausdorff(&a.points, &rotated);
    let mirror = mean_hausdorff(&a.points, &mirrored);
    Some(direct.min(mirror))
}

/// Length difference of `other` relative to `reference`, in percent.
///
/// Infinite when `reference` is zero.
#[must_use]
pub fn percent_diff(reference: f64, other: f64) -> f64 {
    if reference == 0.0 {
        return f64::INFINITY;
    }
    (reference - other).abs() / reference * 100.0
}

/// Parameters for cross-piece match ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Candidates whose length differs from the `in` side's by more than
    /// this percentage are not scored.
    pub length_tolerance_percent: f64,
}

impl MatchConfig {
    /// Default length tolerance in percent.
    pub const DEFAULT_LENGTH_TOLERANCE_PERCENT: f64 = 10.0;

    /// Check that the tolerance is finite and non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] otherwise.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let t = self.length_tolerance_percent;
        if !t.is_finite() || t < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "length_tolerance_percent must be finite and non-negative, got {t}"
            )));
        }
        Ok(())
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            length_tolerance_percent: Self::DEFAULT_LENGTH_TOLERANCE_PERCENT,
        }
    }
}

/// One scored candidate for an `in` side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// The candidate `out` side.
    pub side: SideKey,
    /// Shape score against the `in` side.
    pub score: f64,
    /// Length difference relative to the `in` side, in percent.
    pub length_diff_percent: f64,
}

/// Ranked candidates for one `in` side, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideMatches {
    /// The `in` side being matched.
    pub side: SideKey,
    /// Surviving candidates by ascending score.
    pub candidates: Vec<MatchCandidate>,
}

impl SideMatches {
    /// The lowest-scoring candidate, if any survived.
    #[must_use]
    pub fn best(&self) -> Option<&MatchCandidate> {
        self.candidates.first()
    }
}

/// Rank `out` sides of other pieces against every `in` side in `pool`.
///
/// For each `in` side, in key order, every `out` side belonging to a
/// different piece whose length is within
/// [`MatchConfig::length_tolerance_percent`] is scored with
/// [`shape_score`]. Candidates are sorted by ascending score, ties
/// broken by key.
#[must_use]
pub fn rank_matches(pool: &SidePool, config: &MatchConfig) -> Vec<SideMatches> {
    let outs: Vec<_> = pool.of_kind(SideKind::Out).collect();

    pool.of_kind(SideKind::In)
        .map(|(in_key, in_side)| {
            let mut candidates: Vec<MatchCandidate> = outs
                .iter()
                .filter(|(out_key, _)| out_key.piece != in_key.piece)
                .filter_map(|(out_key, out_side)| {
                    let diff = percent_diff(in_side.length, out_side.length);
                    if diff > config.length_tolerance_percent {
                        return None;
                    }
                    shape_score(&in_side.polyline, &out_side.polyline).map(|score| {
                        MatchCandidate {
                            side: (*out_key).clone(),
                            score,
                            length_diff_percent: diff,
                        }
                    })
                })
                .collect();
            candidates.sort_by(|a, b| a.score.total_cmp(&b.score).then_with(|| a.side.cmp(&b.side)));
            debug!("{in_key}: {} candidate(s) after length filter", candidates.len());
            SideMatches {
                side: in_key.clone(),
                candidates,
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pool::PooledSide;

    /// A side along +x from the origin with a rectangular bump of height
    /// `bump` between x = 3 and x = 7, sampled every half unit.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn tab(bump: f64) -> Polyline {
        let mut points = Vec::new();
        let mut push_line = |from: Point, to: Point| {
            let steps = (from.distance(to) / 0.5).round().max(1.0);
            for i in 0..steps as u32 {
                let t = f64::from(i) / steps;
                points.push(Point::new(
                    (to.x - from.x).mul_add(t, from.x),
                    (to.y - from.y).mul_add(t, from.y),
                ));
            }
        };
        push_line(Point::new(0.0, 0.0), Point::new(3.0, 0.0));
        push_line(Point::new(3.0, 0.0), Point::new(3.0, bump));
        push_line(Point::new(3.0, bump), Point::new(7.0, bump));
        push_line(Point::new(7.0, bump), Point::new(7.0, 0.0));
        push_line(Point::new(7.0, 0.0), Point::new(10.0, 0.0));
        points.push(Point::new(10.0, 0.0));
        Polyline::new(points)
    }

    fn moved(side: &Polyline, angle: f64, offset: Point) -> Polyline {
        Polyline::new(
            side.points()
                .iter()
                .map(|p| p.rotate(angle).translate(offset))
                .collect(),
        )
    }

    fn mirrored(side: &Polyline) -> Polyline {
        Polyline::new(
            side.points()
                .iter()
                .map(|p| Point::new(p.x, -p.y))
                .collect(),
        )
    }

    #[test]
    fn identical_sides_score_zero() {
        let a = tab(-3.0);
        assert!(shape_score(&a, &a).unwrap() < 1e-9);
    }

    #[test]
    fn score_ignores_position_and_orientation() {
        let a = tab(-3.0);
        let b = moved(&a, 1.1, Point::new(120.0, -45.0));
        assert!(shape_score(&a, &b).unwrap() < 1e-9);
    }

    #[test]
    fn tab_and_fitting_socket_score_near_zero() {
        let tab_side = tab(-3.0);
        let socket = moved(&mirrored(&tab_side), -0.6, Point::new(30.0, 8.0));
        let fit = shape_score(&tab_side, &socket).unwrap();
        assert!(fit < 1e-9, "fit score {fit}");

        let dissimilar = [tab(-6.0), tab(0.0), moved(&tab(1.5), 2.0, Point::new(5.0, 5.0))];
        for other in &dissimilar {
            let score = shape_score(&tab_side, other).unwrap();
            assert!(score > fit + 0.1, "dissimilar score {score}");
        }
    }

    #[test]
    fn score_is_symmetric() {
        let a = moved(&tab(-3.0), 0.3, Point::new(2.0, 9.0));
        let b = moved(&tab(2.0), -2.4, Point::new(-7.0, 1.0));
        let ab = shape_score(&a, &b).unwrap();
        let ba = shape_score(&b, &a).unwrap();
        assert!((ab - ba).abs() < 1e-9, "{ab} vs {ba}");
        assert!(ab > 0.0);
    }

    #[test]
    fn empty_side_has_no_score() {
        assert!(shape_score(&Polyline::new(Vec::new()), &tab(1.0)).is_none());
    }

    #[test]
    fn percent_diff_is_relative_to_reference() {
        assert!((percent_diff(10.0, 11.0) - 10.0).abs() < 1e-9);
        assert!((percent_diff(20.0, 18.0) - 10.0).abs() < 1e-9);
        assert!(percent_diff(0.0, 1.0).is_infinite());
    }

    #[test]
    fn match_config_validation() {
        assert!(MatchConfig::default().validate().is_ok());
        let bad = MatchConfig {
            length_tolerance_percent: -1.0,
        };
        assert!(bad.validate().is_err());
    }

    fn pooled(kind: SideKind, polyline: Polyline) -> PooledSide {
        PooledSide {
            kind,
            length: polyline.path_length(),
            polyline,
        }
    }

    #[test]
    fn ranking_filters_and_orders_candidates() {
        let socket = tab(3.0);
        let pool: SidePool = [
            // The in side being matched.
            (SideKey::new("a".into(), 1), pooled(SideKind::In, socket.clone())),
            // Same piece: never a candidate.
            (SideKey::new("a".into(), 2), pooled(SideKind::Out, mirrored(&socket))),
            // Exact fit.
            (
                SideKey::new("b".into(), 0),
                pooled(SideKind::Out, moved(&mirrored(&socket), 0.5, Point::new(9.0, 9.0))),
            ),
            // Similar length, worse shape.
            (SideKey::new("c".into(), 3), pooled(SideKind::Out, tab(-2.5))),
            // Far too long.
            (SideKey::new("d".into(), 0), pooled(SideKind::Out, tab(-9.0))),
            // Flat sides are not candidates.
            (SideKey::new("e".into(), 0), pooled(SideKind::Flat, tab(0.0))),
        ]
        .into_iter()
        .collect();

        let ranked = rank_matches(&pool, &MatchConfig::default());
        assert_eq!(ranked.len(), 1);
        let matches = &ranked[0];
        assert_eq!(matches.side, SideKey::new("a".into(), 1));
        let keys: Vec<String> = matches.candidates.iter().map(|c| c.side.to_string()).collect();
        assert_eq!(keys, ["b+0", "c+3"]);
        assert!(matches.best().unwrap().score < 1e-9);
        assert!(matches.candidates[1].length_diff_percent <= 10.0);
    }

    #[test]
    fn ranking_with_no_out_sides_is_empty_per_in_side() {
        let pool: SidePool = [
            (SideKey::new("a".into(), 0), pooled(SideKind::In, tab(2.0))),
            (SideKey::new("b".into(), 0), pooled(SideKind::In, tab(2.0))),
        ]
        .into_iter()
        .collect();
        let ranked = rank_matches(&pool, &MatchConfig::default());
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|m| m.best().is_none()));
    }
}
