//! Bounded search for a corner-detector sensitivity that yields a usable
//! number of candidates.
//!
//! Higher sensitivity means a stricter detector and fewer candidates.
//! Too many candidates raises the sensitivity, too few lowers it, and
//! every reversal halves the step so the search settles instead of
//! oscillating. The search gives up after a fixed number of detector
//! calls.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::types::{PipelineError, Point};

/// Something that produces candidate corners at a given sensitivity.
pub trait CornerDetector {
    /// Detect candidate corners. Higher `sensitivity` should yield fewer.
    fn detect(&self, sensitivity: f64) -> Vec<Point>;
}

impl<F> CornerDetector for F
where
    F: Fn(f64) -> Vec<Point>,
{
    fn detect(&self, sensitivity: f64) -> Vec<Point> {
        self(sensitivity)
    }
}

/// Parameters for [`search_candidate_density`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensitySearch {
    /// Fewest acceptable candidates (inclusive).
    pub min_count: usize,
    /// Most acceptable candidates (inclusive).
    pub max_count: usize,
    /// Sensitivity of the first detector call.
    pub initial_sensitivity: f64,
    /// Initial sensitivity adjustment between calls.
    pub step: f64,
    /// Lower sensitivity bound.
    pub min_sensitivity: f64,
    /// Upper sensitivity bound.
    pub max_sensitivity: f64,
    /// Maximum number of detector calls.
    pub max_iterations: usize,
}

impl DensitySearch {
    /// Default minimum candidate count.
    pub const DEFAULT_MIN_COUNT: usize = 4;
    /// Default maximum candidate count.
    pub const DEFAULT_MAX_COUNT: usize = 400;
    /// Default starting sensitivity.
    pub const DEFAULT_INITIAL_SENSITIVITY: f64 = 20.0;
    /// Default sensitivity step.
    pub const DEFAULT_STEP: f64 = 5.0;
    /// Default lower sensitivity bound.
    pub const DEFAULT_MIN_SENSITIVITY: f64 = 1.0;
    /// Default upper sensitivity bound.
    pub const DEFAULT_MAX_SENSITIVITY: f64 = 255.0;
    /// Default detector call budget.
    pub const DEFAULT_MAX_ITERATIONS: usize = 20;

    /// Whether `count` lies inside the acceptable window.
    #[must_use]
    pub const fn accepts(&self, count: usize) -> bool {
        count >= self.min_count && count <= self.max_count
    }

    /// Check the window, bounds and budget.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the problem.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));
        if self.min_count > self.max_count {
            return invalid(format!(
                "min_count {} exceeds max_count {}",
                self.min_count, self.max_count
            ));
        }
        if self.max_iterations == 0 {
            return invalid("max_iterations must be at least 1".to_string());
        }
        let finite = [
            self.initial_sensitivity,
            self.step,
            self.min_sensitivity,
            self.max_sensitivity,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return invalid("sensitivity parameters must be finite".to_string());
        }
        if self.step <= 0.0 {
            return invalid(format!("step must be positive, got {}", self.step));
        }
        if self.min_sensitivity > self.max_sensitivity {
            return invalid(format!(
                "min_sensitivity {} exceeds max_sensitivity {}",
                self.min_sensitivity, self.max_sensitivity
            ));
        }
        Ok(())
    }
}

impl Default for DensitySearch {
    fn default() -> Self {
        Self {
            min_count: Self::DEFAULT_MIN_COUNT,
            max_count: Self::DEFAULT_MAX_COUNT,
            initial_sensitivity: Self::DEFAULT_INITIAL_SENSITIVITY,
            step: Self::DEFAULT_STEP,
            min_sensitivity: Self::DEFAULT_MIN_SENSITIVITY,
            max_sensitivity: Self::DEFAULT_MAX_SENSITIVITY,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Result of a successful density search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityOutcome {
    /// Candidates from the accepted detector call.
    pub candidates: Vec<Point>,
    /// Sensitivity of the accepted call.
    pub sensitivity: f64,
    /// Number of detector calls made, including the accepted one.
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nudge {
    Raise,
    Lower,
}

/// Call `detector` until it returns an acceptable number of candidates.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `search` is invalid, or
/// [`PipelineError::CornerDensityOutOfRange`] when
/// [`DensitySearch::max_iterations`] calls all fall outside the window.
pub fn search_candidate_density<D: CornerDetector + ?Sized>(
    detector: &D,
    search: &DensitySearch,
) -> Result<DensityOutcome, PipelineError> {
    search.validate()?;

    let mut sensitivity = search
        .initial_sensitivity
        .clamp(search.min_sensitivity, search.max_sensitivity);
    let mut step = search.step;
    let mut last_nudge = None;
    let mut last_count = 0;

    for iteration in 1..=search.max_iterations {
        let candidates = detector.detect(sensitivity);
        let count = candidates.len();
        trace!("density search {iteration}: sensitivity {sensitivity:.3} -> {count} candidates");

        if search.accepts(count) {
            debug!(
                "density search settled on sensitivity {sensitivity:.3} ({count} candidates, {iteration} iteration(s))"
            );
            return Ok(DensityOutcome {
                candidates,
                sensitivity,
                iterations: iteration,
            });
        }
        let nudge = if count > search.max_count {
            Nudge::Raise
        } else {
            Nudge::Lower
        };

        if last_nudge.is_some_and(|prev| prev != nudge) {
            step /= 2.0;
        }
        last_nudge = Some(nudge);
        last_count = count;

        let delta = match nudge {
            Nudge::Raise => step,
            Nudge::Lower => -step,
        };
        sensitivity = (sensitivity + delta).clamp(search.min_sensitivity, search.max_sensitivity);
    }

    debug!(
        "density search gave up after {} iterations with {last_count} candidates",
        search.max_iterations
    );
    Err(PipelineError::CornerDensityOutOfRange {
        iterations: search.max_iterations,
        last_count,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Detector whose candidate count falls linearly with sensitivity,
    /// recording every sensitivity it is called with.
    struct Linear {
        calls: RefCell<Vec<f64>>,
        count_at_zero: f64,
        slope: f64,
    }

    impl Linear {
        fn new(count_at_zero: f64, slope: f64) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                count_at_zero,
                slope,
            }
        }
    }

    impl CornerDetector for Linear {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        fn detect(&self, sensitivity: f64) -> Vec<Point> {
            self.calls.borrow_mut().push(sensitivity);
            let n = self.slope.mul_add(-sensitivity, self.count_at_zero).max(0.0) as usize;
            vec![Point::ORIGIN; n]
        }
    }

    fn search(min_count: usize, max_count: usize) -> DensitySearch {
        DensitySearch {
            min_count,
            max_count,
            initial_sensitivity: 10.0,
            step: 4.0,
            min_sensitivity: 0.0,
            max_sensitivity: 100.0,
            max_iterations: 10,
        }
    }

    #[test]
    fn accepts_first_call_inside_window() {
        let detector = Linear::new(100.0, 5.0);
        let outcome = search_candidate_density(&detector, &search(10, 60)).unwrap();
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.candidates.len(), 50);
        assert!((outcome.sensitivity - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn raises_sensitivity_when_too_many() {
        // 100 - 5s must drop to at most 20: s >= 16.
        let detector = Linear::new(100.0, 5.0);
        let outcome = search_candidate_density(&detector, &search(10, 20)).unwrap();
        assert_eq!(*detector.calls.borrow(), vec![10.0, 14.0, 18.0]);
        assert_eq!(outcome.candidates.len(), 10);
        assert_eq!(outcome.iterations, 3);
    }

    #[test]
    fn lowers_sensitivity_when_too_few() {
        let detector = Linear::new(100.0, 5.0);
        let outcome = search_candidate_density(&detector, &search(70, 90)).unwrap();
        assert_eq!(*detector.calls.borrow(), vec![10.0, 6.0]);
        assert_eq!(outcome.candidates.len(), 70);
    }

    #[test]
    fn halves_step_on_reversal() {
        // Window 40..=44 needs s in [11.2, 12]: 10 -> 14 overshoots,
        // back by 2 lands on 12.
        let detector = Linear::new(100.0, 5.0);
        let outcome = search_candidate_density(&detector, &search(40, 44)).unwrap();
        assert_eq!(*detector.calls.borrow(), vec![10.0, 14.0, 12.0]);
        assert_eq!(outcome.candidates.len(), 40);
    }

    #[test]
    fn fails_after_budget_exhausted() {
        let detector = |_: f64| vec![Point::ORIGIN; 1000];
        let err = search_candidate_density(&detector, &search(4, 400)).unwrap_err();
        assert_eq!(
            err,
            PipelineError::CornerDensityOutOfRange {
                iterations: 10,
                last_count: 1000,
            }
        );
    }

    #[test]
    fn sensitivity_stays_within_bounds() {
        let detector = Linear::new(0.0, 1.0);
        assert!(search_candidate_density(&detector, &search(4, 400)).is_err());
        let calls = detector.calls.borrow();
        assert_eq!(calls.len(), 10);
        assert!(calls.iter().all(|s| (0.0..=100.0).contains(s)));
    }

    #[test]
    fn invalid_search_is_rejected() {
        let detector = |_: f64| Vec::new();
        let mut bad = search(10, 5);
        assert!(matches!(
            search_candidate_density(&detector, &bad),
            Err(PipelineError::InvalidConfig(_))
        ));
        bad = search(1, 5);
        bad.max_iterations = 0;
        assert!(bad.validate().is_err());
        bad = search(1, 5);
        bad.step = f64::NAN;
        assert!(bad.validate().is_err());
        assert!(DensitySearch::default().validate().is_ok());
    }
}
