//! Synthetic scenes shared by the unit tests.

use image::{GrayImage, ImageBuffer, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random overlapping rectangles over a soft gradient: plenty of corners,
/// no repeating structure.
pub fn textured_scene(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
        let v = (60 + (x * 40 / width.max(1)) + (y * 30 / height.max(1))) as u8;
        Rgb([v, v, v])
    });

    let count = (width * height / 900).max(8);
    for _ in 0..count {
        let w = rng.gen_range(6..40u32);
        let h = rng.gen_range(6..40u32);
        let x0 = rng.gen_range(0..width);
        let y0 = rng.gen_range(0..height);
        let color = Rgb([rng.gen::<u8>(), rng.gen::<u8>(), rng.gen::<u8>()]);
        for y in y0..(y0 + h).min(height) {
            for x in x0..(x0 + w).min(width) {
                img.put_pixel(x, y, color);
            }
        }
    }
    img
}

pub fn textured_gray(width: u32, height: u32, seed: u64) -> GrayImage {
    image::DynamicImage::ImageRgb8(textured_scene(width, height, seed)).to_luma8()
}

/// Crop `width` x `height` starting at column `x0` of `scene`.
pub fn crop(scene: &RgbImage, x0: u32, width: u32, height: u32) -> RgbImage {
    image::imageops::crop_imm(scene, x0, 0, width, height).to_image()
}
