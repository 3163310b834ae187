use image::imageops::replace;
use image::{ImageBuffer, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};

use crate::matcher::Match;
use crate::orb::Keypoint;

const KEYPOINT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const INLIER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const OUTLIER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Marker radius for a keypoint, growing with its pyramid scale.
fn marker_radius(k: &Keypoint) -> f32 {
    4.0 * k.scale.max(1.0)
}

/// Circle around each keypoint with a tick showing its orientation.
pub fn draw_keypoints(img: &RgbImage, keypoints: &[Keypoint]) -> RgbImage {
    let mut out = img.clone();
    for k in keypoints {
        let r = marker_radius(k);
        draw_hollow_circle_mut(&mut out, (k.x.round() as i32, k.y.round() as i32), r.round() as i32, KEYPOINT_COLOR);
        let tip = (k.x + r * k.angle.cos(), k.y + r * k.angle.sin());
        draw_line_segment_mut(&mut out, (k.x, k.y), tip, KEYPOINT_COLOR);
    }
    out
}

/// Both images side by side with a line per match, best matches first.
///
/// At most `max_lines` matches are drawn. With an inlier mask, inliers are
/// green and outliers red; without one every line is green. The keypoint
/// lists of a [`Panorama`](crate::Panorama) can be passed as they are.
pub fn draw_matches(
    a: &RgbImage,
    b: &RgbImage,
    keypoints_a: &[Keypoint],
    keypoints_b: &[Keypoint],
    matches: &[Match],
    inlier_mask: Option<&[bool]>,
    max_lines: usize,
) -> RgbImage {
    let width = a.width() + b.width();
    let height = a.height().max(b.height());
    let mut canvas: RgbImage = ImageBuffer::new(width, height);
    replace(&mut canvas, a, 0, 0);
    replace(&mut canvas, b, a.width() as i64, 0);

    let offset = a.width() as f32;
    for (i, m) in matches.iter().enumerate().take(max_lines) {
        let (Some(ka), Some(kb)) = (keypoints_a.get(m.query_idx), keypoints_b.get(m.train_idx)) else {
            continue;
        };
        let color = match inlier_mask.and_then(|mask| mask.get(i).copied()) {
            Some(false) => OUTLIER_COLOR,
            _ => INLIER_COLOR,
        };
        let start = (ka.x, ka.y);
        let end = (kb.x + offset, kb.y);
        draw_line_segment_mut(&mut canvas, start, end, color);
        draw_hollow_circle_mut(&mut canvas, (start.0 as i32, start.1 as i32), 3, color);
        draw_hollow_circle_mut(&mut canvas, (end.0 as i32, end.1 as i32), 3, color);
    }
    canvas
}
