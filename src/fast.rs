use image::GrayImage;
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::common::{Matchable, Point};
use crate::config::DEFAULT_FAST_THRESHOLD;

/// Radius of the patch used for the intensity centroid.
pub const MOMENT_RADIUS: i32 = 15;

/// A FAST corner on one pyramid level.
#[derive(Debug, Clone, Copy)]
pub struct FastKeypoint {
    pub location: Point,
    pub score: i32,
    pub moment: Moment,
}

impl Matchable for FastKeypoint {
    /// Euclidean pixel distance between the two locations.
    fn distance(&self, other: &FastKeypoint) -> usize {
        let ((ax, ay), (bx, by)) = (self.location, other.location);
        ((ax - bx).pow(2) as f32 + (ay - by).pow(2) as f32).sqrt() as usize
    }
}

/// Intensity centroid of the patch around a keypoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct Moment {
    pub centroid: Point,
    /// First order moments (m10, m01).
    pub moment: Point,
    /// Orientation in radians, `atan2(m01, m10)`.
    pub rotation: f64,
}

#[derive(Debug)]
pub struct FastContext {
    offsets: Vec<Point>,
    /// Test order; the first four entries are the compass points.
    idx: Vec<usize>,
    radius: u32,
    /// Required length of the contiguous arc.
    n: usize,
}

#[allow(non_camel_case_types)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastType {
    /// 7 contiguous pixels on a 12 pixel circle of radius 2.
    TYPE_7_12,
    /// 9 contiguous pixels on a 16 pixel circle of radius 3.
    TYPE_9_16,
}

impl FastType {
    #[rustfmt::skip]
    pub fn get_context(&self) -> FastContext {
        match self {
            FastType::TYPE_7_12 => FastContext {
                offsets: vec![
                    ( 0, -2), ( 1, -2), ( 2, -1), ( 2,  0),
                    ( 2,  1), ( 1,  2), ( 0,  2), (-1,  2),
                    (-2,  1), (-2,  0), (-2, -1), (-1, -2)
                ],
                idx: vec![0, 6, 3, 9, 1, 2, 4, 5, 7, 8, 10, 11],
                radius: 2,
                n: 7
            },
            FastType::TYPE_9_16 => FastContext {
                offsets: vec![
                    ( 0, -3), ( 1, -3), ( 2, -2), ( 3, -1),
                    ( 3,  0), ( 3,  1), ( 2,  2), ( 1,  3),
                    ( 0,  3), (-1,  3), (-2,  2), (-3,  1),
                    (-3,  0), (-3, -1), (-2, -2), (-1, -3)
                ],
                idx: vec![0, 8, 4, 12, 1, 2, 3, 5, 6, 7, 9, 10, 11, 13, 14, 15],
                radius: 3,
                n: 9
            }
        }
    }
}

/// Length of the longest run of `value` in the circular slice.
fn longest_circular_run(classes: &[i8], value: i8) -> usize {
    let len = classes.len();
    let mut best = 0;
    let mut run = 0;
    for i in 0..2 * len {
        if classes[i % len] == value {
            run += 1;
            best = best.max(run.min(len));
        } else {
            run = 0;
        }
    }
    best
}

/// Segment test for one pixel; returns the corner score when it passes.
fn segment_test(img: &GrayImage, ctx: &FastContext, x: i32, y: i32, threshold: i32) -> Option<i32> {
    let center = img.get_pixel(x as u32, y as u32).0[0] as i32;
    let sample = |k: usize| {
        let (dx, dy) = ctx.offsets[k];
        img.get_pixel((x + dx) as u32, (y + dy) as u32).0[0] as i32
    };

    // any qualifying arc covers at least two compass points
    let (mut brighter, mut darker) = (0, 0);
    for &k in &ctx.idx[..4] {
        let px = sample(k);
        if px > center + threshold {
            brighter += 1;
        } else if px < center - threshold {
            darker += 1;
        }
    }
    if brighter < 2 && darker < 2 {
        return None;
    }

    let mut classes = vec![0i8; ctx.offsets.len()];
    let mut score = 0;
    for (k, class) in classes.iter_mut().enumerate() {
        let diff = sample(k) - center;
        if diff > threshold {
            *class = 1;
        } else if diff < -threshold {
            *class = -1;
        }
        score += (diff.abs() - threshold).max(0);
    }

    if longest_circular_run(&classes, 1) >= ctx.n || longest_circular_run(&classes, -1) >= ctx.n {
        Some(score)
    } else {
        None
    }
}

/// Detect FAST corners, strongest first.
///
/// Ties keep raster order so the output is identical however rows are
/// scheduled across threads. Orientation is not computed here; see
/// [`moment_centroid`].
pub fn fast(img: &GrayImage, fast_type: Option<FastType>, threshold: Option<i32>) -> Vec<FastKeypoint> {
    let threshold = threshold.unwrap_or(DEFAULT_FAST_THRESHOLD);
    let fast_type = fast_type.unwrap_or(FastType::TYPE_9_16);
    let ctx = fast_type.get_context();

    if img.width() <= 2 * ctx.radius || img.height() <= 2 * ctx.radius {
        return Vec::new();
    }

    let (width, height) = (img.width(), img.height());
    let mut keypoints: Vec<FastKeypoint> = (ctx.radius..height - ctx.radius)
        .into_par_iter()
        .flat_map_iter(|y| {
            let ctx = &ctx;
            (ctx.radius..width - ctx.radius).filter_map(move |x| {
                let (x, y) = (x as i32, y as i32);
                segment_test(img, ctx, x, y, threshold).map(|score| FastKeypoint {
                    location: (x, y),
                    score,
                    moment: Moment::default(),
                })
            })
        })
        .collect();

    keypoints.sort_by(|a, b| b.score.cmp(&a.score));
    keypoints
}

/// 3x3 non-maximum suppression on corner scores.
///
/// On a plateau the first corner in raster order survives. The input order
/// is preserved.
pub fn nonmax_suppression(keypoints: &[FastKeypoint], width: u32, height: u32) -> Vec<FastKeypoint> {
    let (w, h) = (width as i32, height as i32);
    let mut scores = vec![0i32; (width * height) as usize];
    for k in keypoints {
        let (x, y) = k.location;
        scores[(y * w + x) as usize] = k.score;
    }

    keypoints
        .iter()
        .filter(|k| {
            let (x, y) = k.location;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let (nx, ny) = (x + dx, y + dy);
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    let neighbour = scores[(ny * w + nx) as usize];
                    let before = dy < 0 || (dy == 0 && dx < 0);
                    if neighbour > k.score || (before && neighbour == k.score) {
                        return false;
                    }
                }
            }
            true
        })
        .copied()
        .collect()
}

/// Intensity centroid over a disc of `radius` (default [`MOMENT_RADIUS`])
/// around `point`. Pixels outside the image are skipped.
pub fn moment_centroid(img: &GrayImage, point: &Point, radius: Option<i32>) -> Moment {
    let radius = radius.unwrap_or(MOMENT_RADIUS);
    let (x, y) = *point;
    let (width, height) = (img.width() as i32, img.height() as i32);

    let (mut m00, mut m10, mut m01) = (0i64, 0i64, 0i64);
    for dy in -radius..=radius {
        let py = y + dy;
        if py < 0 || py >= height {
            continue;
        }
        for dx in -radius..=radius {
            let px = x + dx;
            if px < 0 || px >= width || dx * dx + dy * dy > radius * radius {
                continue;
            }
            let value = img.get_pixel(px as u32, py as u32).0[0] as i64;
            m00 += value;
            m10 += dx as i64 * value;
            m01 += dy as i64 * value;
        }
    }

    let centroid = if m00 > 0 {
        (
            x + (m10 as f64 / m00 as f64).round() as i32,
            y + (m01 as f64 / m00 as f64).round() as i32,
        )
    } else {
        (x, y)
    };

    Moment {
        centroid,
        moment: (m10 as i32, m01 as i32),
        rotation: (m01 as f64).atan2(m10 as f64),
    }
}
