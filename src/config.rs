#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::fast::FastType;

// Feature extraction defaults
pub const DEFAULT_N_FEATURES: usize = 500;
pub const DEFAULT_N_LEVELS: usize = 8;
pub const DEFAULT_SCALE_FACTOR: f32 = 1.2;
pub const DEFAULT_FAST_THRESHOLD: i32 = 20;
pub const DEFAULT_EDGE_THRESHOLD: u32 = 20;
pub const DEFAULT_BLUR_SIGMA: f32 = 2.0;
pub const DEFAULT_BRIEF_LENGTH: usize = 256;
pub const DEFAULT_MIN_KEYPOINTS: usize = 10;

// Matching defaults
pub const DEFAULT_MAX_HAMMING_DISTANCE: Option<usize> = Some(64);

// RANSAC defaults
pub const DEFAULT_RANSAC_THRESHOLD: f64 = 5.0;
pub const DEFAULT_RANSAC_MAX_ITERATIONS: usize = 2000;
pub const DEFAULT_RANSAC_CONFIDENCE: f64 = 0.995;
pub const DEFAULT_RANSAC_MIN_INLIERS: usize = 4;
pub const DEFAULT_RANSAC_SEED: u64 = 0;

/// Minimum number of correspondences a homography can be fitted from.
pub const MIN_CORRESPONDENCES: usize = 4;

/// Keypoint detection and description parameters.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct OrbConfig {
    /// Total keypoint budget, split across pyramid levels.
    pub n_features: usize,
    pub n_levels: usize,
    pub scale_factor: f32,
    pub fast_type: FastType,
    pub fast_threshold: i32,
    /// Keypoints closer than this to a level border are dropped.
    pub edge_threshold: u32,
    /// Gaussian sigma applied before sampling descriptor pairs.
    pub blur_sigma: f32,
    /// Descriptor length in bits, at most 256.
    pub descriptor_bits: usize,
    /// Fewer keypoints than this is reported as `InsufficientFeatures`.
    pub min_keypoints: usize,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            n_features: DEFAULT_N_FEATURES,
            n_levels: DEFAULT_N_LEVELS,
            scale_factor: DEFAULT_SCALE_FACTOR,
            fast_type: FastType::TYPE_9_16,
            fast_threshold: DEFAULT_FAST_THRESHOLD,
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
            blur_sigma: DEFAULT_BLUR_SIGMA,
            descriptor_bits: DEFAULT_BRIEF_LENGTH,
            min_keypoints: DEFAULT_MIN_KEYPOINTS,
        }
    }
}

/// Descriptor matching parameters.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherConfig {
    /// Matches further apart than this many bits are discarded. `None` keeps
    /// every cross-checked pair, as a plain cross-checked brute-force
    /// matcher does.
    ///
    /// The default departs from that and caps at 64 of 256 bits.
    pub max_distance: Option<usize>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_MAX_HAMMING_DISTANCE,
        }
    }
}

/// Random-sample consensus parameters for homography fitting.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct RansacConfig {
    /// Maximum reprojection error, in pixels, for a pair to count as an inlier.
    pub threshold: f64,
    pub max_iterations: usize,
    /// Probability of drawing at least one all-inlier sample; drives the
    /// adaptive iteration count.
    pub confidence: f64,
    pub min_inliers: usize,
    /// Seed for the sampler used by [`crate::stitch`].
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_RANSAC_THRESHOLD,
            max_iterations: DEFAULT_RANSAC_MAX_ITERATIONS,
            confidence: DEFAULT_RANSAC_CONFIDENCE,
            min_inliers: DEFAULT_RANSAC_MIN_INLIERS,
            seed: DEFAULT_RANSAC_SEED,
        }
    }
}

/// Full pipeline configuration.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct StitchConfig {
    pub orb: OrbConfig,
    pub matcher: MatcherConfig,
    pub ransac: RansacConfig,
    /// Minimum matches required before estimation; never below 4.
    pub min_matches: usize,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            orb: OrbConfig::default(),
            matcher: MatcherConfig::default(),
            ransac: RansacConfig::default(),
            min_matches: MIN_CORRESPONDENCES,
        }
    }
}

impl StitchConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.ransac.seed = seed;
        self
    }

    pub fn with_ransac_threshold(mut self, threshold: f64) -> Self {
        self.ransac.threshold = threshold;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.ransac.max_iterations = max_iterations;
        self
    }

    pub fn with_descriptor_bits(mut self, bits: usize) -> Self {
        self.orb.descriptor_bits = bits;
        self
    }

    pub fn with_n_features(mut self, n_features: usize) -> Self {
        self.orb.n_features = n_features;
        self
    }

    pub fn with_min_keypoints(mut self, min_keypoints: usize) -> Self {
        self.orb.min_keypoints = min_keypoints;
        self
    }

    pub fn with_min_matches(mut self, min_matches: usize) -> Self {
        self.min_matches = min_matches;
        self
    }

    /// Effective match floor used by the pipeline.
    pub fn required_matches(&self) -> usize {
        self.min_matches.max(MIN_CORRESPONDENCES)
    }
}
