//! Two-image panorama stitching: ORB features, cross-checked Hamming
//! matching, a RANSAC homography and a perspective warp.
//!
//! ```no_run
//! use bye_stitch_rs::{stitch, StitchConfig};
//!
//! let left = image::open("left.jpg").unwrap();
//! let right = image::open("right.jpg").unwrap();
//! // `right` is warped into the frame of `left`
//! let panorama = stitch(&right, &left, &StitchConfig::default()).unwrap();
//! panorama.image.save("panorama.png").unwrap();
//! ```

use image::{DynamicImage, RgbImage};
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

// BRIEF sampling pattern and descriptors
pub mod brief;
// Shared point types, Matchable and suppression helpers
pub mod common;
// Warping and pasting into the output canvas
pub mod compositor;
// Tunables and their defaults
pub mod config;
// Keypoint and match visualization
pub mod draw;
// Error taxonomy
pub mod error;
// FAST corner detection
pub mod fast;
// Projective transform type and DLT solvers
pub mod homography;
// Cross-checked descriptor matching
pub mod matcher;
// ORB feature extraction
pub mod orb;
// Robust homography estimation
pub mod ransac;

#[cfg(test)]
mod testing;

pub use compositor::composite;
pub use config::{MatcherConfig, OrbConfig, RansacConfig, StitchConfig};
pub use error::{Result, StitchError};
pub use homography::{Homography, PointPair};
pub use matcher::{match_descriptors, Match};
pub use orb::{orb, Feature, Keypoint};
pub use ransac::{estimate_homography, HomographyEstimate};

/// Output of [`stitch`] together with the intermediate results that
/// produced it.
#[derive(Debug, Clone)]
pub struct Panorama {
    pub image: RgbImage,
    /// Maps pixels of the first input into the frame of the second.
    pub homography: Homography,
    /// Aligned with `matches`.
    pub inlier_mask: Vec<bool>,
    /// Ascending distance.
    pub matches: Vec<Match>,
    pub keypoints_a: Vec<Keypoint>,
    pub keypoints_b: Vec<Keypoint>,
}

impl Panorama {
    pub fn inlier_count(&self) -> usize {
        self.inlier_mask.iter().filter(|&&inlier| inlier).count()
    }

    pub fn inlier_ratio(&self) -> f64 {
        if self.matches.is_empty() {
            0.0
        } else {
            self.inlier_count() as f64 / self.matches.len() as f64
        }
    }
}

/// Point pairs for `matches`, source from `features_a`, destination from
/// `features_b`. Matches indexing past either feature list are skipped.
pub fn correspondences(features_a: &[Feature], features_b: &[Feature], matches: &[Match]) -> Vec<PointPair> {
    matches
        .iter()
        .filter_map(|m| {
            let a = features_a.get(m.query_idx)?;
            let b = features_b.get(m.train_idx)?;
            Some(PointPair::new(
                (a.keypoint.x as f64, a.keypoint.y as f64),
                (b.keypoint.x as f64, b.keypoint.y as f64),
            ))
        })
        .collect()
}

/// Stitch `a` onto `b`: `a` is warped into the frame of `b`, and `b` is
/// pasted unwarped at the top-left of a canvas twice as wide.
///
/// Each stage fails with a [`StitchError`] instead of passing degenerate
/// data on. The RANSAC sampler is seeded from `config.ransac.seed`, so equal
/// inputs always produce the same panorama.
pub fn stitch(a: &DynamicImage, b: &DynamicImage, config: &StitchConfig) -> Result<Panorama> {
    let features_a = orb(a, &config.orb)?;
    let features_b = orb(b, &config.orb)?;

    let matches = match_descriptors(&features_a, &features_b, &config.matcher);
    let required = config.required_matches();
    if matches.len() < required {
        return Err(StitchError::InsufficientMatches {
            found: matches.len(),
            required,
        });
    }

    let pairs = correspondences(&features_a, &features_b, &matches);
    let mut rng = StdRng::seed_from_u64(config.ransac.seed);
    let estimate = estimate_homography(&pairs, &config.ransac, &mut rng)?;

    let image = composite(&a.to_rgb8(), &b.to_rgb8(), &estimate.homography)?;

    debug!(
        "stitch: {} + {} features, {} matches, {} inliers, {}x{} panorama",
        features_a.len(),
        features_b.len(),
        matches.len(),
        estimate.inlier_count,
        image.width(),
        image.height()
    );

    Ok(Panorama {
        image,
        homography: estimate.homography,
        inlier_mask: estimate.inlier_mask,
        matches,
        keypoints_a: features_a.iter().map(|f| f.keypoint).collect(),
        keypoints_b: features_b.iter().map(|f| f.keypoint).collect(),
    })
}
