use bitvector::BitVector;
use cgmath::{Angle, Deg, Rad};
use image::GrayImage;

use crate::common::Matchable;
use crate::fast::FastKeypoint;

/// Number of test pairs in [`OFFSETS`], the longest supported descriptor.
pub const MAX_BRIEF_LENGTH: usize = 256;

/// Orientation bins are this many degrees wide.
pub const ANGLE_INCREMENT: i32 = 12;

/// Binary test locations relative to the keypoint, drawn once from an
/// isotropic Gaussian (sigma = 31 / 5) clipped to a 27x27 window.
#[rustfmt::skip]
pub const OFFSETS: [((f32, f32), (f32, f32)); MAX_BRIEF_LENGTH] = [
    ((4.0, 11.0), (-4.0, 1.0)), ((-1.0, -7.0), (3.0, 1.0)), ((-4.0, 5.0), (3.0, -5.0)), ((-5.0, 0.0), (-5.0, -2.0)),
    ((1.0, -8.0), (-2.0, 10.0)), ((-6.0, -2.0), (4.0, -3.0)), ((-6.0, 9.0), (-5.0, -4.0)), ((6.0, 11.0), (13.0, -1.0)),
    ((-10.0, 0.0), (-5.0, -2.0)), ((-11.0, -11.0), (2.0, -13.0)), ((-2.0, -8.0), (-10.0, -1.0)), ((-1.0, -2.0), (0.0, -9.0)),
    ((7.0, 2.0), (-8.0, -9.0)), ((5.0, -9.0), (-1.0, -8.0)), ((6.0, -5.0), (-8.0, -9.0)), ((-13.0, 8.0), (-7.0, 1.0)),
    ((-3.0, 11.0), (-12.0, 2.0)), ((8.0, -4.0), (-9.0, -1.0)), ((5.0, 1.0), (2.0, -2.0)), ((-1.0, 5.0), (-3.0, 8.0)),
    ((-7.0, -9.0), (5.0, 4.0)), ((4.0, -5.0), (2.0, 3.0)), ((5.0, -6.0), (7.0, -3.0)), ((0.0, 4.0), (4.0, 5.0)),
    ((-2.0, -5.0), (8.0, -4.0)), ((1.0, 0.0), (0.0, -1.0)), ((-9.0, 1.0), (7.0, 7.0)), ((2.0, 1.0), (2.0, -3.0)),
    ((-2.0, 5.0), (11.0, 2.0)), ((2.0, -1.0), (2.0, -3.0)), ((-10.0, 3.0), (9.0, -10.0)), ((-9.0, 2.0), (-1.0, 2.0)),
    ((1.0, 1.0), (-2.0, -1.0)), ((-2.0, 7.0), (2.0, -8.0)), ((5.0, 9.0), (-11.0, -5.0)), ((0.0, 1.0), (7.0, -3.0)),
    ((-5.0, -1.0), (-9.0, 0.0)), ((-1.0, -6.0), (-5.0, 4.0)), ((-8.0, -7.0), (2.0, 11.0)), ((5.0, -5.0), (10.0, -6.0)),
    ((12.0, 1.0), (-5.0, -8.0)), ((4.0, -1.0), (2.0, -7.0)), ((1.0, -1.0), (-3.0, -10.0)), ((-1.0, -2.0), (-2.0, 0.0)),
    ((9.0, -7.0), (-10.0, 5.0)), ((-1.0, -2.0), (2.0, 6.0)), ((5.0, -4.0), (13.0, -7.0)), ((-1.0, -11.0), (-7.0, -1.0)),
    ((-4.0, 0.0), (-9.0, -10.0)), ((5.0, -5.0), (-2.0, 8.0)), ((-1.0, 0.0), (10.0, 1.0)), ((1.0, -5.0), (0.0, -3.0)),
    ((-3.0, 2.0), (6.0, -4.0)), ((6.0, 1.0), (-7.0, -7.0)), ((2.0, 3.0), (-1.0, -3.0)), ((11.0, -1.0), (5.0, 7.0)),
    ((1.0, 0.0), (7.0, -1.0)), ((3.0, 3.0), (-5.0, 6.0)), ((6.0, 4.0), (0.0, 4.0)), ((6.0, -2.0), (9.0, 5.0)),
    ((-7.0, 3.0), (3.0, 3.0)), ((4.0, -6.0), (-1.0, 6.0)), ((6.0, 8.0), (4.0, -2.0)), ((4.0, 4.0), (6.0, 2.0)),
    ((2.0, 3.0), (-12.0, 1.0)), ((-11.0, 3.0), (-1.0, -2.0)), ((-1.0, 3.0), (-4.0, 9.0)), ((-3.0, -1.0), (-6.0, -2.0)),
    ((-3.0, -1.0), (10.0, -1.0)), ((3.0, 8.0), (-9.0, 4.0)), ((12.0, -3.0), (9.0, 11.0)), ((-2.0, -12.0), (9.0, 3.0)),
    ((-7.0, 0.0), (-4.0, -2.0)), ((-8.0, -5.0), (8.0, 1.0)), ((-9.0, 0.0), (2.0, 4.0)), ((-11.0, -3.0), (-1.0, -4.0)),
    ((3.0, 4.0), (3.0, 2.0)), ((-11.0, 10.0), (5.0, -3.0)), ((-1.0, 6.0), (0.0, -3.0)), ((1.0, -6.0), (9.0, 2.0)),
    ((1.0, 7.0), (-7.0, 0.0)), ((-2.0, -9.0), (0.0, 4.0)), ((7.0, -3.0), (-6.0, 1.0)), ((-6.0, -9.0), (-8.0, 4.0)),
    ((-4.0, -3.0), (-2.0, -3.0)), ((6.0, 8.0), (-9.0, 2.0)), ((6.0, -3.0), (7.0, -2.0)), ((3.0, -8.0), (-6.0, 3.0)),
    ((7.0, 3.0), (-1.0, 4.0)), ((1.0, 7.0), (-1.0, -3.0)), ((-7.0, 7.0), (-1.0, 4.0)), ((-13.0, -8.0), (-11.0, 2.0)),
    ((1.0, 0.0), (1.0, 7.0)), ((-5.0, 12.0), (6.0, 7.0)), ((-7.0, -4.0), (-2.0, -6.0)), ((5.0, 5.0), (-7.0, 4.0)),
    ((-1.0, -2.0), (-7.0, -4.0)), ((-3.0, 9.0), (-13.0, 6.0)), ((-9.0, 9.0), (-3.0, -1.0)), ((-10.0, 5.0), (-12.0, 7.0)),
    ((-4.0, -7.0), (4.0, -2.0)), ((7.0, -1.0), (-5.0, -5.0)), ((11.0, 7.0), (-2.0, 0.0)), ((7.0, 4.0), (4.0, 0.0)),
    ((-7.0, -4.0), (4.0, -6.0)), ((-4.0, 9.0), (2.0, 1.0)), ((6.0, 3.0), (-6.0, -2.0)), ((6.0, -5.0), (9.0, -3.0)),
    ((12.0, 8.0), (-13.0, 4.0)), ((2.0, -2.0), (-1.0, 3.0)), ((0.0, -4.0), (2.0, 9.0)), ((-2.0, -5.0), (-1.0, 7.0)),
    ((-6.0, 2.0), (3.0, -1.0)), ((7.0, -4.0), (0.0, -9.0)), ((-1.0, 2.0), (2.0, -3.0)), ((3.0, 9.0), (3.0, -11.0)),
    ((6.0, -3.0), (12.0, -2.0)), ((-3.0, -6.0), (-11.0, 2.0)), ((3.0, 2.0), (4.0, -6.0)), ((5.0, 11.0), (-1.0, -2.0)),
    ((-4.0, -3.0), (-3.0, 8.0)), ((-8.0, 0.0), (5.0, 12.0)), ((-8.0, -7.0), (-4.0, 3.0)), ((-1.0, 3.0), (9.0, -10.0)),
    ((-4.0, -8.0), (-2.0, -6.0)), ((-1.0, 1.0), (-7.0, -2.0)), ((5.0, -6.0), (-8.0, 0.0)), ((2.0, 1.0), (-9.0, -4.0)),
    ((1.0, 6.0), (-1.0, 5.0)), ((-6.0, -8.0), (-10.0, -2.0)), ((0.0, -3.0), (5.0, -6.0)), ((4.0, 5.0), (-7.0, 9.0)),
    ((-1.0, -5.0), (-5.0, -4.0)), ((-4.0, -9.0), (-7.0, 1.0)), ((1.0, 1.0), (-1.0, 11.0)), ((2.0, -5.0), (-3.0, 6.0)),
    ((0.0, 2.0), (0.0, -1.0)), ((4.0, -7.0), (-5.0, 0.0)), ((1.0, 6.0), (1.0, -10.0)), ((3.0, 9.0), (9.0, -10.0)),
    ((7.0, -3.0), (-6.0, -4.0)), ((1.0, 5.0), (-5.0, -9.0)), ((-5.0, -3.0), (5.0, -6.0)), ((-1.0, 8.0), (2.0, -9.0)),
    ((-8.0, -5.0), (2.0, 3.0)), ((6.0, 13.0), (6.0, -3.0)), ((-4.0, 4.0), (7.0, -5.0)), ((-5.0, -1.0), (6.0, -2.0)),
    ((9.0, 12.0), (-6.0, 2.0)), ((2.0, 8.0), (-12.0, 5.0)), ((-1.0, 8.0), (-1.0, -11.0)), ((2.0, -1.0), (-2.0, 9.0)),
    ((-10.0, 5.0), (-2.0, -1.0)), ((-5.0, 6.0), (7.0, -6.0)), ((11.0, -8.0), (7.0, -7.0)), ((6.0, 5.0), (-6.0, 6.0)),
    ((4.0, 1.0), (-1.0, 5.0)), ((4.0, -6.0), (8.0, 5.0)), ((4.0, -4.0), (-3.0, -6.0)), ((4.0, 7.0), (1.0, -8.0)),
    ((2.0, -7.0), (10.0, 7.0)), ((4.0, 1.0), (4.0, 0.0)), ((9.0, 8.0), (-1.0, -6.0)), ((-1.0, 3.0), (6.0, -3.0)),
    ((0.0, 3.0), (5.0, -3.0)), ((4.0, -12.0), (-3.0, 4.0)), ((-4.0, -7.0), (3.0, 10.0)), ((-4.0, -10.0), (6.0, -4.0)),
    ((1.0, -6.0), (7.0, 4.0)), ((1.0, 1.0), (-9.0, 0.0)), ((5.0, 3.0), (-7.0, 2.0)), ((-3.0, 2.0), (-2.0, 7.0)),
    ((-6.0, 3.0), (-3.0, -1.0)), ((5.0, -5.0), (-5.0, 8.0)), ((-11.0, 6.0), (3.0, -3.0)), ((7.0, 5.0), (1.0, -8.0)),
    ((-3.0, -6.0), (4.0, 0.0)), ((-9.0, -10.0), (12.0, -7.0)), ((10.0, 3.0), (5.0, -9.0)), ((2.0, 4.0), (-3.0, 0.0)),
    ((5.0, -2.0), (0.0, 3.0)), ((-2.0, 3.0), (6.0, 2.0)), ((-6.0, 1.0), (1.0, -4.0)), ((-12.0, 2.0), (3.0, 2.0)),
    ((3.0, 4.0), (-10.0, -1.0)), ((-9.0, -3.0), (4.0, 0.0)), ((11.0, -4.0), (2.0, 6.0)), ((2.0, 2.0), (0.0, 7.0)),
    ((7.0, 2.0), (0.0, -8.0)), ((-8.0, 0.0), (10.0, 8.0)), ((2.0, 5.0), (0.0, -3.0)), ((1.0, 1.0), (-2.0, 12.0)),
    ((-2.0, 2.0), (5.0, 6.0)), ((3.0, 2.0), (2.0, -1.0)), ((5.0, -2.0), (-1.0, 3.0)), ((-2.0, 1.0), (-8.0, -2.0)),
    ((-7.0, -5.0), (3.0, 3.0)), ((9.0, 0.0), (-3.0, 3.0)), ((-4.0, 3.0), (6.0, 4.0)), ((-4.0, -1.0), (-10.0, -10.0)),
    ((5.0, 7.0), (4.0, 5.0)), ((8.0, 5.0), (0.0, -9.0)), ((-4.0, -5.0), (7.0, -8.0)), ((-2.0, 1.0), (8.0, -2.0)),
    ((-2.0, -6.0), (-11.0, 5.0)), ((-2.0, -4.0), (2.0, 3.0)), ((-4.0, 6.0), (-5.0, 2.0)), ((-10.0, 12.0), (2.0, -7.0)),
    ((-7.0, -9.0), (3.0, -7.0)), ((5.0, 0.0), (-2.0, -5.0)), ((9.0, -1.0), (6.0, -4.0)), ((-2.0, -8.0), (0.0, 3.0)),
    ((-5.0, 7.0), (-2.0, -11.0)), ((9.0, 1.0), (-4.0, 9.0)), ((0.0, 0.0), (-5.0, -4.0)), ((-7.0, 0.0), (8.0, 2.0)),
    ((-9.0, -7.0), (4.0, -6.0)), ((3.0, -1.0), (-6.0, 0.0)), ((7.0, 1.0), (-8.0, -9.0)), ((3.0, 2.0), (-5.0, -4.0)),
    ((-6.0, 5.0), (4.0, 2.0)), ((-10.0, 9.0), (0.0, -7.0)), ((2.0, 11.0), (-1.0, -7.0)), ((-12.0, 5.0), (-4.0, 5.0)),
    ((5.0, 0.0), (-8.0, 7.0)), ((-2.0, 5.0), (8.0, -6.0)), ((-3.0, -7.0), (1.0, -13.0)), ((7.0, 7.0), (4.0, -7.0)),
    ((-13.0, 3.0), (3.0, -4.0)), ((-5.0, -8.0), (1.0, -3.0)), ((-10.0, -5.0), (8.0, -5.0)), ((4.0, 5.0), (1.0, 5.0)),
    ((9.0, 13.0), (2.0, 2.0)), ((5.0, -8.0), (5.0, -1.0)), ((1.0, 7.0), (3.0, 4.0)), ((-6.0, -2.0), (2.0, 3.0)),
    ((-6.0, -6.0), (2.0, -7.0)), ((1.0, -4.0), (4.0, 3.0)), ((-1.0, 2.0), (0.0, 3.0)), ((0.0, 5.0), (-6.0, -3.0)),
    ((-3.0, 4.0), (1.0, -9.0)), ((8.0, 4.0), (0.0, -10.0)), ((8.0, 1.0), (-2.0, 2.0)), ((-13.0, -12.0), (-6.0, -5.0)),
    ((1.0, 0.0), (3.0, 1.0)), ((-10.0, 0.0), (-4.0, -5.0)), ((3.0, -11.0), (10.0, 1.0)), ((4.0, 7.0), (-6.0, 1.0)),
    ((8.0, -6.0), (-8.0, -3.0)), ((5.0, 4.0), (-2.0, -10.0)), ((-3.0, -1.0), (-1.0, -2.0)), ((13.0, 7.0), (1.0, -5.0)),
    ((8.0, 1.0), (9.0, 3.0)), ((-2.0, -2.0), (2.0, -8.0)), ((-5.0, -11.0), (-2.0, 1.0)), ((6.0, -1.0), (-2.0, 4.0)),
];

/// Binary descriptor; bit `i` is set when the first sample of test `i` is
/// brighter than the second.
#[derive(Debug)]
pub struct Descriptor {
    pub b: BitVector,
    pub len: usize,
}

impl Descriptor {
    /// Descriptor length in bits.
    pub fn bits(&self) -> usize {
        self.len
    }

    pub fn contains(&self, bit: usize) -> bool {
        self.b.contains(bit)
    }
}

impl Matchable for Descriptor {
    /// Hamming distance.
    fn distance(&self, other: &Self) -> usize {
        (0..self.bits().min(other.bits()))
            .fold(0, |acc, x| acc + (self.b.contains(x) != other.b.contains(x)) as usize)
    }
}

/// Round an angle in degrees to the nearest multiple of `increment`.
pub fn round_angle(angle: i32, increment: i32) -> i32 {
    let modulo = angle.rem_euclid(increment);
    if modulo * 2 >= increment {
        angle - modulo + increment
    } else {
        angle - modulo
    }
}

/// Steered BRIEF for a single keypoint on `blurred_img`.
///
/// The test pattern is rotated by the keypoint orientation, quantized to
/// [`ANGLE_INCREMENT`] degrees. Samples falling outside the image are clamped
/// to the border.
pub fn brief_descriptor(blurred_img: &GrayImage, keypoint: &FastKeypoint, brief_length: usize) -> Descriptor {
    let width = blurred_img.width() as i32;
    let height = blurred_img.height() as i32;

    let rotation = Deg::from(Rad(keypoint.moment.rotation)).0.round() as i32;
    let rounded_angle = Deg(round_angle(rotation, ANGLE_INCREMENT) as f32);
    let cos_a = rounded_angle.cos();
    let sin_a = rounded_angle.sin();
    let (x, y) = keypoint.location;

    let steer = |(ox, oy): (f32, f32)| {
        let px = x + (ox * cos_a - oy * sin_a).round() as i32;
        let py = y + (ox * sin_a + oy * cos_a).round() as i32;
        (px.clamp(0, width - 1) as u32, py.clamp(0, height - 1) as u32)
    };

    let mut b = BitVector::new(brief_length);
    for (i, &(p1, p2)) in OFFSETS.iter().take(brief_length).enumerate() {
        let (x1, y1) = steer(p1);
        let (x2, y2) = steer(p2);
        if blurred_img.get_pixel(x1, y1).0[0] > blurred_img.get_pixel(x2, y2).0[0] {
            b.insert(i);
        }
    }

    Descriptor { b, len: brief_length }
}

/// Steered BRIEF descriptors for every keypoint, in input order.
pub fn brief(blurred_img: &GrayImage, keypoints: &[FastKeypoint], brief_length: usize) -> Vec<Descriptor> {
    keypoints
        .iter()
        .map(|k| brief_descriptor(blurred_img, k, brief_length))
        .collect()
}
