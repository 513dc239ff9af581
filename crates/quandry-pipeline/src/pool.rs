//! Cross-piece side pool.
//!
//! Matching only needs each side's class, length and polyline, keyed by
//! [`SideKey`]. Pieces whose analysis failed contribute nothing: they
//! are absent from the pool rather than present with empty sides.

use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::types::{PieceAnalysis, PieceId, PipelineError, Polyline, SideKey, SideKind};

/// The per-side data matching works from.
#[derive(Debug, Clone, PartialEq)]
pub struct PooledSide {
    /// Shape class.
    pub kind: SideKind,
    /// Path length along the side.
    pub length: f64,
    /// The side's points, first corner to second.
    pub polyline: Polyline,
}

/// Sides of many pieces, ordered by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SidePool {
    sides: BTreeMap<SideKey, PooledSide>,
}

impl SidePool {
    /// An empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool every side of every analysis.
    #[must_use]
    pub fn from_analyses(analyses: &BTreeMap<PieceId, PieceAnalysis>) -> Self {
        let mut pool = Self::new();
        for (id, analysis) in analyses {
            pool.add_piece(id, analysis);
        }
        pool
    }

    /// Pool the sides of every successful analysis, skipping failures.
    #[must_use]
    pub fn from_results(results: &BTreeMap<PieceId, Result<PieceAnalysis, PipelineError>>) -> Self {
        let mut pool = Self::new();
        for (id, analysis) in results
            .iter()
            .filter_map(|(id, result)| Some((id, result.as_ref().ok()?)))
        {
            pool.add_piece(id, analysis);
        }
        pool
    }

    /// Add the four sides of one analyzed piece.
    pub fn add_piece(&mut self, id: &PieceId, analysis: &PieceAnalysis) {
        for side in &analysis.sides {
            self.sides.insert(
                SideKey::new(id.clone(), side.index),
                PooledSide {
                    kind: side.kind,
                    length: side.length,
                    polyline: side.polyline.clone(),
                },
            );
        }
    }

    /// Insert one side, returning the side previously stored under `key`.
    pub fn insert(&mut self, key: SideKey, side: PooledSide) -> Option<PooledSide> {
        self.sides.insert(key, side)
    }

    /// Look up a side.
    #[must_use]
    pub fn get(&self, key: &SideKey) -> Option<&PooledSide> {
        self.sides.get(key)
    }

    /// Number of pooled sides.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sides.len()
    }

    /// Returns `true` if the pool holds no sides.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sides.is_empty()
    }

    /// All sides in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, SideKey, PooledSide> {
        self.sides.iter()
    }

    /// Sides of one class, in key order.
    pub fn of_kind(&self, kind: SideKind) -> impl Iterator<Item = (&SideKey, &PooledSide)> {
        self.sides.iter().filter(move |(_, side)| side.kind == kind)
    }
}

impl FromIterator<(SideKey, PooledSide)> for SidePool {
    fn from_iter<I: IntoIterator<Item = (SideKey, PooledSide)>>(iter: I) -> Self {
        Self {
            sides: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a SidePool {
    type Item = (&'a SideKey, &'a PooledSide);
    type IntoIter = btree_map::Iter<'a, SideKey, PooledSide>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
