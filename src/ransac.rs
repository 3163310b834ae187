use log::{debug, trace};
use rand::seq::index::sample;
use rand::Rng;

use crate::config::{RansacConfig, MIN_CORRESPONDENCES};
use crate::error::{Result, StitchError};
use crate::homography::{Homography, PointPair};

/// Accepted range for the determinant of a sampled model.
const MIN_DETERMINANT: f64 = 1e-4;
const MAX_DETERMINANT: f64 = 1e4;

/// Sine of the smallest angle three sample points may span.
const MIN_SAMPLE_SINE: f64 = 1e-3;

/// Result of a robust homography fit.
#[derive(Debug, Clone, PartialEq)]
pub struct HomographyEstimate {
    pub homography: Homography,
    /// One flag per input pair.
    pub inlier_mask: Vec<bool>,
    pub inlier_count: usize,
    /// Hypotheses drawn before termination.
    pub iterations: usize,
}

impl HomographyEstimate {
    pub fn inlier_ratio(&self) -> f64 {
        if self.inlier_mask.is_empty() {
            0.0
        } else {
            self.inlier_count as f64 / self.inlier_mask.len() as f64
        }
    }
}

fn validate(config: &RansacConfig) -> Result<()> {
    if !(config.threshold.is_finite() && config.threshold > 0.0) {
        return Err(StitchError::InvalidInput(format!(
            "inlier threshold must be positive, got {}",
            config.threshold
        )));
    }
    if !(config.confidence > 0.0 && config.confidence < 1.0) {
        return Err(StitchError::InvalidInput(format!(
            "confidence must be within (0, 1), got {}",
            config.confidence
        )));
    }
    if config.max_iterations == 0 {
        return Err(StitchError::InvalidInput("iteration cap must be positive".into()));
    }
    Ok(())
}

fn nearly_collinear(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> bool {
    let (ux, uy) = (b.0 - a.0, b.1 - a.1);
    let (vx, vy) = (c.0 - a.0, c.1 - a.1);
    let cross = ux * vy - uy * vx;
    let norms = (ux * ux + uy * uy).sqrt() * (vx * vx + vy * vy).sqrt();
    cross.abs() <= MIN_SAMPLE_SINE * norms
}

/// True when any three source or any three destination points of the
/// sample are (nearly) collinear or coincide.
pub fn is_degenerate_sample(sample: &[PointPair; 4]) -> bool {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLES.iter().any(|&[i, j, k]| {
        nearly_collinear(sample[i].src, sample[j].src, sample[k].src)
            || nearly_collinear(sample[i].dst, sample[j].dst, sample[k].dst)
    })
}

fn is_valid_model(h: &Homography) -> bool {
    let det = h.determinant().abs();
    h.is_finite() && det > MIN_DETERMINANT && det < MAX_DETERMINANT
}

/// Flags pairs whose transfer error is within `threshold` pixels.
pub fn inlier_mask(h: &Homography, pairs: &[PointPair], threshold: f64) -> (Vec<bool>, usize) {
    let mask: Vec<bool> = pairs.iter().map(|p| h.transfer_error(p) <= threshold).collect();
    let count = mask.iter().filter(|&&inlier| inlier).count();
    (mask, count)
}

/// Number of samples needed to draw one all-inlier sample with probability
/// `confidence`, given the current inlier ratio. Never exceeds `cap`.
pub fn required_iterations(confidence: f64, inlier_ratio: f64, sample_size: usize, cap: usize) -> usize {
    let all_inliers = inlier_ratio.powi(sample_size as i32);
    if all_inliers >= 1.0 {
        return 1usize.min(cap);
    }
    let denom = (1.0 - all_inliers).ln();
    if denom >= 0.0 || !denom.is_finite() {
        return cap;
    }
    let needed = ((1.0 - confidence).ln() / denom).ceil();
    if needed.is_finite() && needed < cap as f64 {
        (needed as usize).max(1)
    } else {
        cap
    }
}

/// Fit a homography mapping `pair.src` onto `pair.dst` with random-sample
/// consensus, then refine it by least squares over the consensus set.
///
/// Randomness comes only from `rng`; the same seed and input give the same
/// estimate bit for bit.
pub fn estimate_homography<R>(pairs: &[PointPair], config: &RansacConfig, rng: &mut R) -> Result<HomographyEstimate>
where
    R: Rng + ?Sized,
{
    if pairs.len() < MIN_CORRESPONDENCES {
        return Err(StitchError::InsufficientMatches {
            found: pairs.len(),
            required: MIN_CORRESPONDENCES,
        });
    }
    validate(config)?;

    let min_inliers = config.min_inliers.max(MIN_CORRESPONDENCES);
    let mut best: Option<(Homography, usize)> = None;
    let mut max_iterations = config.max_iterations;
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;

        let idx = sample(&mut *rng, pairs.len(), MIN_CORRESPONDENCES);
        let minimal = [pairs[idx.index(0)], pairs[idx.index(1)], pairs[idx.index(2)], pairs[idx.index(3)]];
        if is_degenerate_sample(&minimal) {
            continue;
        }
        let h = match Homography::from_four_points(&minimal) {
            Some(h) if is_valid_model(&h) => h,
            _ => continue,
        };

        let (_, count) = inlier_mask(&h, pairs, config.threshold);
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((h, count));
            max_iterations = required_iterations(
                config.confidence,
                count as f64 / pairs.len() as f64,
                MIN_CORRESPONDENCES,
                config.max_iterations,
            )
            .max(iterations);
            trace!("ransac: iteration {} found {} inliers, cap now {}", iterations, count, max_iterations);
        }
    }

    let (sampled, sampled_count) = match best {
        Some((h, count)) if count >= min_inliers => (h, count),
        Some((_, count)) => {
            return Err(StitchError::DegenerateGeometry(format!(
                "best model has {} inliers, need {}",
                count, min_inliers
            )))
        }
        None => {
            return Err(StitchError::DegenerateGeometry(format!(
                "no valid model in {} samples",
                iterations
            )))
        }
    };

    let (sampled_mask, _) = inlier_mask(&sampled, pairs, config.threshold);
    let consensus: Vec<PointPair> = pairs
        .iter()
        .zip(&sampled_mask)
        .filter(|(_, inlier)| **inlier)
        .map(|(p, _)| *p)
        .collect();

    let refined = Homography::from_correspondences(&consensus)
        .filter(is_valid_model)
        .map(|h| {
            let (mask, count) = inlier_mask(&h, pairs, config.threshold);
            (h, mask, count)
        })
        .filter(|(_, _, count)| *count >= sampled_count);

    let (homography, inlier_mask, inlier_count) = match refined {
        Some(refined) => refined,
        None => (sampled, sampled_mask, sampled_count),
    };

    debug!(
        "ransac: {}/{} inliers after {} iterations",
        inlier_count,
        pairs.len(),
        iterations
    );

    Ok(HomographyEstimate {
        homography,
        inlier_mask,
        inlier_count,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Grid of correspondences under a translation, every `outlier_every`-th
    /// destination scrambled.
    fn translated_pairs(tx: f64, ty: f64, outlier_every: usize) -> Vec<PointPair> {
        let mut pairs = Vec::new();
        for i in 0..10 {
            for j in 0..6 {
                let src = (10.0 + i as f64 * 37.0, 8.0 + j as f64 * 41.0);
                let n = pairs.len();
                let dst = if outlier_every > 0 && n % outlier_every == 0 {
                    ((n * 97 % 400) as f64, (n * 53 % 300) as f64)
                } else {
                    (src.0 + tx, src.1 + ty)
                };
                pairs.push(PointPair::new(src, dst));
            }
        }
        pairs
    }

    #[test]
    fn too_few_pairs_is_insufficient() {
        let pairs = translated_pairs(5.0, 0.0, 0);
        let mut rng = StdRng::seed_from_u64(1);
        for n in 0..4 {
            match estimate_homography(&pairs[..n], &RansacConfig::default(), &mut rng) {
                Err(StitchError::InsufficientMatches { found, required }) => {
                    assert_eq!(found, n);
                    assert_eq!(required, 4);
                }
                other => panic!("expected InsufficientMatches, got {:?}", other),
            }
        }
    }

    /// Grid under `truth` with up to one pixel of uniform noise on every
    /// destination; every fourth destination is replaced by a random point.
    fn jittered_pairs(truth: &Homography, seed: u64) -> Vec<PointPair> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..60)
            .map(|i| {
                let src = (10.0 + (i % 10) as f64 * 37.0, 8.0 + (i / 10) as f64 * 41.0);
                let dst = if i % 4 == 0 {
                    (rng.gen_range(0.0..400.0), rng.gen_range(0.0..300.0))
                } else {
                    let (x, y) = truth.project(src).unwrap();
                    (x + rng.gen_range(-1.0..1.0), y + rng.gen_range(-1.0..1.0))
                };
                PointPair::new(src, dst)
            })
            .collect()
    }

    fn summed_error(h: &Homography, pairs: &[PointPair]) -> f64 {
        pairs.iter().map(|p| h.transfer_error(p)).sum()
    }

    #[test]
    fn noisy_inliers_are_refined_by_least_squares() {
        let truth = Homography::from_matrix(Matrix3::new(1.02, 0.01, 40.0, -0.015, 0.98, 6.0, 2e-5, -1e-5, 1.0));
        let pairs = jittered_pairs(&truth, 11);
        let est = estimate_homography(&pairs, &RansacConfig::default(), &mut StdRng::seed_from_u64(8)).unwrap();

        let consensus: Vec<PointPair> = pairs
            .iter()
            .zip(&est.inlier_mask)
            .filter(|(_, inlier)| **inlier)
            .map(|(p, _)| *p)
            .collect();
        assert!(consensus.len() >= 45, "{} inliers", consensus.len());

        // the returned model is the least squares fit over its consensus set
        let refit = Homography::from_correspondences(&consensus).unwrap();
        for p in [(0.0, 0.0), (400.0, 0.0), (400.0, 300.0), (0.0, 300.0)] {
            let (ex, ey) = est.homography.project(p).unwrap();
            let (rx, ry) = refit.project(p).unwrap();
            assert!((ex - rx).abs() < 0.1 && (ey - ry).abs() < 0.1, "{:?}: {:?} vs {:?}", p, (ex, ey), (rx, ry));

            let (tx, ty) = truth.project(p).unwrap();
            assert!((ex - tx).abs() < 1.0 && (ey - ty).abs() < 1.0, "{:?} drifted from truth", p);
        }

        // and it fits the inliers better than an exact four point model
        let true_inliers: Vec<PointPair> = pairs
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 4 != 0)
            .map(|(_, p)| *p)
            .collect();
        let four = Homography::from_four_points(&[pairs[1], pairs[9], pairs[51], pairs[59]]).unwrap();
        assert!(summed_error(&est.homography, &true_inliers) < summed_error(&four, &true_inliers));
    }

    #[test]
    fn clean_set_terminates_early() {
        let pairs = translated_pairs(12.0, -7.0, 0);
        let config = RansacConfig::default();
        let est = estimate_homography(&pairs, &config, &mut StdRng::seed_from_u64(4)).unwrap();
        assert_eq!(est.inlier_count, pairs.len());
        assert!(est.iterations < 100, "{} iterations", est.iterations);
        assert!(est.iterations < config.max_iterations);
    }

    #[test]
    fn too_few_pairs_win_over_bad_config() {
        let pairs = translated_pairs(1.0, 1.0, 0);
        let config = RansacConfig {
            threshold: -1.0,
            ..RansacConfig::default()
        };
        let result = estimate_homography(&pairs[..3], &config, &mut StdRng::seed_from_u64(0));
        assert!(matches!(result, Err(StitchError::InsufficientMatches { found: 3, required: 4 })));
    }

    #[test]
    fn recovers_translation_despite_outliers() {
        let pairs = translated_pairs(50.0, 4.0, 3);
        let mut rng = StdRng::seed_from_u64(7);
        let est = estimate_homography(&pairs, &RansacConfig::default(), &mut rng).unwrap();

        let expected = Homography::translation(50.0, 4.0);
        assert!((est.homography.matrix() - expected.matrix()).abs().max() < 1e-6);
        for (i, &inlier) in est.inlier_mask.iter().enumerate() {
            assert_eq!(inlier, i % 3 != 0, "pair {}", i);
        }
        assert_eq!(est.inlier_count, 40);
        assert_eq!(est.inlier_mask.len(), pairs.len());
    }

    #[test]
    fn same_seed_same_estimate() {
        let pairs = translated_pairs(-20.0, 3.0, 4);
        let config = RansacConfig::default();
        let a = estimate_homography(&pairs, &config, &mut StdRng::seed_from_u64(99)).unwrap();
        let b = estimate_homography(&pairs, &config, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let pairs: Vec<PointPair> = (0..20)
            .map(|i| PointPair::new((i as f64 * 10.0, 5.0), (i as f64 * 10.0 + 3.0, 5.0)))
            .collect();
        let mut rng = StdRng::seed_from_u64(3);
        let result = estimate_homography(&pairs, &RansacConfig::default(), &mut rng);
        assert!(matches!(result, Err(StitchError::DegenerateGeometry(_))));
    }

    #[test]
    fn unrelated_points_fail_minimum_consensus() {
        let mut rng = StdRng::seed_from_u64(5);
        let pairs: Vec<PointPair> = (0..40)
            .map(|_| {
                PointPair::new(
                    (rng.gen_range(0.0..400.0), rng.gen_range(0.0..300.0)),
                    (rng.gen_range(0.0..400.0), rng.gen_range(0.0..300.0)),
                )
            })
            .collect();
        let config = RansacConfig {
            min_inliers: 15,
            ..RansacConfig::default()
        };
        let result = estimate_homography(&pairs, &config, &mut StdRng::seed_from_u64(5));
        assert!(matches!(result, Err(StitchError::DegenerateGeometry(_))));
    }

    #[test]
    fn iteration_count_shrinks_with_inlier_ratio() {
        assert_eq!(required_iterations(0.995, 1.0, 4, 2000), 1);
        assert_eq!(required_iterations(0.995, 0.0, 4, 2000), 2000);
        let high = required_iterations(0.995, 0.9, 4, 2000);
        let low = required_iterations(0.995, 0.5, 4, 2000);
        assert!(high < low);
        // ln(0.005) / ln(1 - 0.5^4) = 82.1
        assert_eq!(low, 83);
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let pairs = translated_pairs(1.0, 1.0, 0);
        let config = RansacConfig {
            threshold: 0.0,
            ..RansacConfig::default()
        };
        let result = estimate_homography(&pairs, &config, &mut StdRng::seed_from_u64(0));
        assert!(matches!(result, Err(StitchError::InvalidInput(_))));
    }
}
