use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random coloured rectangles over a soft gradient.
pub fn rectangles_scene(width: u32, height: u32, seed: u64) -> RgbImage {
    assert!(width > 0 && height > 0, "scene dimensions must be positive");

    let mut rng = StdRng::seed_from_u64(seed);
    let mut img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
        let v = (60 + x * 40 / width + y * 30 / height) as u8;
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

/// `width` x full height window of `scene` starting at column `x0`.
pub fn window(scene: &RgbImage, x0: u32, width: u32) -> DynamicImage {
    let view = image::imageops::crop_imm(scene, x0, 0, width, scene.height()).to_image();
    DynamicImage::ImageRgb8(view)
}

/// Mean absolute per-channel difference between `canvas` at
/// `(x + dx, y)` and `img` at `(x, y)` over the given column range of `img`.
pub fn mean_abs_diff(canvas: &RgbImage, img: &RgbImage, dx: u32, columns: std::ops::Range<u32>) -> f64 {
    let mut total = 0u64;
    let mut samples = 0u64;
    for y in 2..img.height() - 2 {
        for x in columns.clone() {
            let p = canvas.get_pixel(x + dx, y);
            let q = img.get_pixel(x, y);
            for c in 0..3 {
                total += (p.0[c] as i32 - q.0[c] as i32).unsigned_abs() as u64;
                samples += 1;
            }
        }
    }
    total as f64 / samples as f64
}
