use image::imageops::replace;
use image::{ImageBuffer, Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use log::debug;

use crate::error::{Result, StitchError};
use crate::homography::Homography;

/// Canvas for two images side by side: twice the wider width, the taller
/// height.
pub fn canvas_size(a: (u32, u32), b: (u32, u32)) -> (u32, u32) {
    (2 * a.0.max(b.0), a.1.max(b.1))
}

fn check_size(img: &RgbImage, name: &str) -> Result<()> {
    if img.width() == 0 || img.height() == 0 {
        return Err(StitchError::InvalidInput(format!(
            "{} has zero size ({}x{})",
            name,
            img.width(),
            img.height()
        )));
    }
    Ok(())
}

/// Backward warp of `image` through `h` onto a `width` x `height` canvas with
/// bilinear sampling. Canvas pixels whose pre-image falls outside `image`
/// stay black.
pub fn warp_perspective(image: &RgbImage, h: &Homography, width: u32, height: u32) -> Result<RgbImage> {
    check_size(image, "source image")?;
    if width == 0 || height == 0 {
        return Err(StitchError::InvalidInput(format!("canvas has zero size ({}x{})", width, height)));
    }

    let projection = Projection::from_matrix(h.to_row_major_f32())
        .ok_or_else(|| StitchError::DegenerateGeometry("homography is not invertible".into()))?;

    let mut canvas: RgbImage = ImageBuffer::new(width, height);
    warp_into(image, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]), &mut canvas);
    Ok(canvas)
}

/// Warp `a` into the frame of `b` with `h` (which maps `a` pixels to `b`
/// pixels) and paste `b` unwarped over the canvas origin.
///
/// There is no blending: in the overlap `b` overwrites the warped pixels,
/// leaving a hard seam.
pub fn composite(a: &RgbImage, b: &RgbImage, h: &Homography) -> Result<RgbImage> {
    check_size(a, "first image")?;
    check_size(b, "second image")?;

    let (width, height) = canvas_size(a.dimensions(), b.dimensions());
    let mut canvas = warp_perspective(a, h, width, height)?;
    replace(&mut canvas, b, 0, 0);

    debug!("compositor: {}x{} panorama", width, height);
    Ok(canvas)
}
