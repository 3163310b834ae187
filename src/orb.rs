use image::imageops::{blur, resize, FilterType};
use image::{DynamicImage, GrayImage};
use log::{debug, trace};
use rayon::prelude::*;

use crate::brief::{brief, Descriptor, MAX_BRIEF_LENGTH};
use crate::common::{adaptive_nonmax_suppression, Matchable};
use crate::config::OrbConfig;
use crate::error::{Result, StitchError};
use crate::fast::{fast, moment_centroid, nonmax_suppression, FastKeypoint};

/// Corners kept per level before adaptive suppression, as a multiple of the
/// level budget.
const CANDIDATE_FACTOR: usize = 20;

/// A keypoint in full resolution pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Pyramid level the keypoint was detected on.
    pub octave: u8,
    /// Downscale factor of that level.
    pub scale: f32,
    /// Orientation in radians.
    pub angle: f32,
    /// FAST score.
    pub response: f32,
}

#[derive(Debug)]
pub struct Feature {
    pub keypoint: Keypoint,
    pub descriptor: Descriptor,
}

impl Matchable for Feature {
    fn distance(&self, other: &Self) -> usize {
        self.descriptor.distance(&other.descriptor)
    }
}

fn validate(config: &OrbConfig) -> Result<()> {
    if config.descriptor_bits == 0 || config.descriptor_bits > MAX_BRIEF_LENGTH {
        return Err(StitchError::InvalidInput(format!(
            "descriptor length must be within 1..={}, got {}",
            MAX_BRIEF_LENGTH, config.descriptor_bits
        )));
    }
    if config.n_levels == 0 {
        return Err(StitchError::InvalidInput("pyramid needs at least one level".into()));
    }
    if config.n_levels > 1 && !(config.scale_factor > 1.0) {
        return Err(StitchError::InvalidInput(format!(
            "pyramid scale factor must exceed 1.0, got {}",
            config.scale_factor
        )));
    }
    if !config.blur_sigma.is_finite() || config.blur_sigma < 0.0 {
        return Err(StitchError::InvalidInput(format!(
            "blur sigma must be a non-negative number, got {}",
            config.blur_sigma
        )));
    }
    Ok(())
}

/// Split the feature budget across levels geometrically, coarser levels
/// getting proportionally fewer keypoints.
pub fn level_budgets(n_features: usize, n_levels: usize, scale_factor: f32) -> Vec<usize> {
    if n_levels <= 1 {
        return vec![n_features];
    }

    let factor = 1.0 / scale_factor as f64;
    let mut per_level = n_features as f64 * (1.0 - factor) / (1.0 - factor.powi(n_levels as i32));
    let mut budgets = Vec::with_capacity(n_levels);
    let mut assigned = 0;
    for _ in 0..n_levels - 1 {
        let budget = (per_level.round() as usize).min(n_features - assigned);
        budgets.push(budget);
        assigned += budget;
        per_level *= factor;
    }
    budgets.push(n_features - assigned);
    budgets
}

/// Scale pyramid, finest level first. Each level is resampled from the full
/// resolution image; levels too small to hold a descriptor patch are left out.
pub fn build_pyramid(gray: &GrayImage, config: &OrbConfig) -> Vec<(GrayImage, f32)> {
    let min_side = 2 * config.edge_threshold + 1;
    let mut pyramid = vec![(gray.clone(), 1.0f32)];

    for level in 1..config.n_levels {
        let scale = config.scale_factor.powi(level as i32);
        let width = (gray.width() as f32 / scale).round() as u32;
        let height = (gray.height() as f32 / scale).round() as u32;
        if width < min_side || height < min_side {
            break;
        }
        pyramid.push((resize(gray, width, height, FilterType::Triangle), scale));
    }

    pyramid
}

fn detect_level(img: &GrayImage, octave: usize, scale: f32, budget: usize, full_size: (u32, u32), config: &OrbConfig) -> Vec<Feature> {
    let (width, height) = img.dimensions();
    let edge = config.edge_threshold as i32;
    if budget == 0 || width as i32 <= 2 * edge || height as i32 <= 2 * edge {
        return Vec::new();
    }

    let corners = fast(img, Some(config.fast_type), Some(config.fast_threshold));
    let mut corners: Vec<FastKeypoint> = nonmax_suppression(&corners, width, height)
        .into_iter()
        .filter(|k| {
            let (x, y) = k.location;
            x >= edge && y >= edge && x < width as i32 - edge && y < height as i32 - edge
        })
        .collect();
    corners.truncate(budget.saturating_mul(CANDIDATE_FACTOR));

    let mut keypoints = adaptive_nonmax_suppression(&corners, budget);
    for k in keypoints.iter_mut() {
        k.moment = moment_centroid(img, &k.location, None);
    }

    let blurred = if config.blur_sigma > 0.0 {
        blur(img, config.blur_sigma)
    } else {
        img.clone()
    };
    let descriptors = brief(&blurred, &keypoints, config.descriptor_bits);

    trace!(
        "orb level {} ({}x{}): {} corners, kept {}",
        octave,
        width,
        height,
        corners.len(),
        keypoints.len()
    );

    let sx = full_size.0 as f32 / width as f32;
    let sy = full_size.1 as f32 / height as f32;
    keypoints
        .iter()
        .zip(descriptors)
        .map(|(k, descriptor)| Feature {
            keypoint: Keypoint {
                x: k.location.0 as f32 * sx,
                y: k.location.1 as f32 * sy,
                octave: octave as u8,
                scale,
                angle: k.moment.rotation as f32,
                response: k.score as f32,
            },
            descriptor,
        })
        .collect()
}

/// Detect oriented FAST keypoints over a scale pyramid and describe them
/// with steered BRIEF.
///
/// Features come out grouped by pyramid level (finest first), strongest
/// first within a level.
pub fn orb(img: &DynamicImage, config: &OrbConfig) -> Result<Vec<Feature>> {
    if img.width() == 0 || img.height() == 0 {
        return Err(StitchError::InvalidInput(format!(
            "image has zero size ({}x{})",
            img.width(),
            img.height()
        )));
    }
    orb_gray(&img.to_luma8(), config)
}

/// [`orb`] on an already converted grayscale image.
pub fn orb_gray(gray: &GrayImage, config: &OrbConfig) -> Result<Vec<Feature>> {
    if gray.width() == 0 || gray.height() == 0 {
        return Err(StitchError::InvalidInput(format!(
            "image has zero size ({}x{})",
            gray.width(),
            gray.height()
        )));
    }
    validate(config)?;

    let pyramid = build_pyramid(gray, config);
    let budgets = level_budgets(config.n_features, config.n_levels, config.scale_factor);
    let full_size = gray.dimensions();

    let features: Vec<Feature> = pyramid
        .par_iter()
        .zip(budgets.par_iter())
        .enumerate()
        .map(|(octave, ((level, scale), &budget))| detect_level(level, octave, *scale, budget, full_size, config))
        .collect::<Vec<Vec<Feature>>>()
        .into_iter()
        .flatten()
        .collect();

    debug!(
        "orb: {} features on {} pyramid levels of a {}x{} image",
        features.len(),
        pyramid.len(),
        full_size.0,
        full_size.1
    );

    if features.len() < config.min_keypoints {
        return Err(StitchError::InsufficientFeatures {
            found: features.len(),
            required: config.min_keypoints,
        });
    }

    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::textured_gray;
    use image::{ImageBuffer, Luma};

    fn blocks(width: u32, height: u32) -> GrayImage {
        textured_gray(width, height, 7)
    }

    #[test]
    fn budgets_sum_to_total() {
        let budgets = level_budgets(500, 8, 1.2);
        assert_eq!(budgets.len(), 8);
        assert_eq!(budgets.iter().sum::<usize>(), 500);
        assert!(budgets[0] > budgets[7]);
        assert_eq!(level_budgets(100, 1, 1.2), vec![100]);
    }

    #[test]
    fn pyramid_stops_before_patch_no_longer_fits() {
        let img = blocks(120, 90);
        let config = OrbConfig::default();
        let pyramid = build_pyramid(&img, &config);
        assert!(pyramid.len() < config.n_levels);
        for (level, _) in &pyramid {
            assert!(level.height() >= 2 * config.edge_threshold + 1);
        }
    }

    #[test]
    fn textured_image_yields_features_inside_bounds() {
        let img = blocks(200, 160);
        let features = orb_gray(&img, &OrbConfig::default()).unwrap();
        assert!(features.len() >= 10);
        assert!(features.len() <= OrbConfig::default().n_features);
        for f in &features {
            assert!(f.keypoint.x >= 0.0 && f.keypoint.x < 200.0);
            assert!(f.keypoint.y >= 0.0 && f.keypoint.y < 160.0);
            assert_eq!(f.descriptor.bits(), 256);
        }
    }

    #[test]
    fn blank_image_reports_insufficient_features() {
        let img: GrayImage = ImageBuffer::from_pixel(200, 160, Luma([90u8]));
        match orb_gray(&img, &OrbConfig::default()) {
            Err(StitchError::InsufficientFeatures { found, required }) => {
                assert_eq!(found, 0);
                assert_eq!(required, 10);
            }
            other => panic!("unexpected result {:?}", other.map(|f| f.len())),
        }
    }

    #[test]
    fn zero_sized_image_is_invalid() {
        let img = DynamicImage::new_luma8(0, 10);
        assert!(matches!(orb(&img, &OrbConfig::default()), Err(StitchError::InvalidInput(_))));
    }

    #[test]
    fn oversized_descriptor_is_invalid() {
        let config = OrbConfig {
            descriptor_bits: 512,
            ..OrbConfig::default()
        };
        assert!(matches!(orb_gray(&blocks(100, 100), &config), Err(StitchError::InvalidInput(_))));
    }

    #[test]
    fn extraction_is_deterministic() {
        let img = blocks(160, 160);
        let a = orb_gray(&img, &OrbConfig::default()).unwrap();
        let b = orb_gray(&img, &OrbConfig::default()).unwrap();
        assert_eq!(a.len(), b.len());
        for (fa, fb) in a.iter().zip(&b) {
            assert_eq!(fa.keypoint, fb.keypoint);
            assert_eq!(fa.distance(fb), 0);
        }
    }
}
