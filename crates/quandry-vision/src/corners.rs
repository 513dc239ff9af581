//! Corner candidates from FAST-9 on the piece mask.
//!
//! The mask is blurred once up front; each detection pass runs
//! `imageproc::corners::corners_fast9` with the sensitivity as the FAST
//! intensity threshold. A higher threshold yields fewer candidates.

use image::GrayImage;
use quandry_pipeline::{CornerDetector, Point};

/// FAST-9 detector over a (blurred) piece mask.
#[derive(Debug, Clone)]
pub struct FastCornerDetector {
    image: GrayImage,
}

impl FastCornerDetector {
    /// Prepare a detector for `mask`, blurring it with `blur_sigma`.
    ///
    /// Non-positive sigma values leave the mask unchanged, since
    /// `imageproc`'s blur panics on `sigma <= 0.0`.
    #[must_use]
    pub fn new(mask: &GrayImage, blur_sigma: f32) -> Self {
        let image = if blur_sigma > 0.0 {
            imageproc::filter::gaussian_blur_f32(mask, blur_sigma)
        } else {
            mask.clone()
        };
        Self { image }
    }

    /// The image corners are detected on.
    #[must_use]
    pub const fn image(&self) -> &GrayImage {
        &self.image
    }
}

/// FAST threshold for a sensitivity: clamped to `0..=255` and rounded.
#[must_use]
pub fn fast_threshold(sensitivity: f64) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let threshold = sensitivity.clamp(0.0, 255.0).round() as u8;
    threshold
}

impl CornerDetector for FastCornerDetector {
    fn detect(&self, sensitivity: f64) -> Vec<Point> {
        imageproc::corners::corners_fast9(&self.image, fast_threshold(sensitivity))
            .into_iter()
            .map(|c| Point::new(f64::from(c.x), f64::from(c.y)))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;

    fn square_mask() -> GrayImage {
        GrayImage::from_fn(40, 40, |x, y| {
            if (10..30).contains(&x) && (10..30).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    fn true_corners() -> [Point; 4] {
        [
            Point::new(10.0, 10.0),
            Point::new(29.0, 10.0),
            Point::new(29.0, 29.0),
            Point::new(10.0, 29.0),
        ]
    }

    fn near_a_corner(p: Point, tolerance: f64) -> bool {
        true_corners().iter().any(|c| c.distance(p) <= tolerance)
    }

    #[test]
    fn threshold_is_clamped_and_rounded() {
        assert_eq!(fast_threshold(-4.0), 0);
        assert_eq!(fast_threshold(19.6), 20);
        assert_eq!(fast_threshold(400.0), 255);
    }

    #[test]
    fn zero_sigma_keeps_mask() {
        let mask = square_mask();
        let detector = FastCornerDetector::new(&mask, 0.0);
        assert_eq!(detector.image(), &mask);
    }

    #[test]
    fn sharp_mask_candidates_hug_the_corners() {
        let detector = FastCornerDetector::new(&square_mask(), 0.0);
        let candidates = detector.detect(20.0);
        assert!(!candidates.is_empty());
        for p in &candidates {
            assert!(near_a_corner(*p, 3.0), "stray candidate {p:?}");
        }
        for c in true_corners() {
            assert!(candidates.iter().any(|p| p.distance(c) <= 3.0), "no candidate at {c:?}");
        }
    }

    #[test]
    fn blurred_mask_candidates_hug_the_corners() {
        let detector = FastCornerDetector::new(&square_mask(), 1.0);
        let candidates = detector.detect(20.0);
        for p in &candidates {
            assert!(near_a_corner(*p, 4.5), "stray candidate {p:?}");
        }
        for c in true_corners() {
            assert!(candidates.iter().any(|p| p.distance(c) <= 4.5), "no candidate at {c:?}");
        }
    }

    #[test]
    fn empty_mask_has_no_candidates() {
        let detector = FastCornerDetector::new(&GrayImage::new(20, 20), 1.0);
        assert!(detector.detect(1.0).is_empty());
    }
}
