// src/rotation.rs - rotation policy and rotate-then-crop of a composed canvas

use image::imageops;
use image::{ImageBuffer, Pixel, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::canvas::Canvas;
use crate::config::{Config, RotationChoice};

/// Bounds of the random angle drawn for a `customize` entry (upper bound exclusive)
const CUSTOM_ANGLE_RANGE: (u32, u32) = (5, 80);

/// Angles a custom draw must not produce, as they duplicate preset angles
const PRESET_ANGLES: [u32; 3] = [0, 45, 90];

/// Pick the rotation for one label; 0 when rotation is disabled
pub fn determine_rotation_angle<R: Rng + ?Sized>(config: &Config, rng: &mut R) -> i32 {
    if !config.rotation_allowed {
        return 0;
    }

    match config.rotation_angle_allowed.choose(rng) {
        Some(RotationChoice::Degrees(angle)) => *angle,
        Some(RotationChoice::Custom(_)) => custom_angle(config.custom_angle_step, rng),
        None => 0,
    }
}

/// Random multiple of `step` offset from 5 inside (5, 80), skipping preset angles
pub fn custom_angle<R: Rng + ?Sized>(step: u32, rng: &mut R) -> i32 {
    let (start, end) = CUSTOM_ANGLE_RANGE;
    let candidates: Vec<u32> = (start..end)
        .step_by(step.max(1) as usize)
        .filter(|a| !PRESET_ANGLES.contains(a))
        .collect();

    candidates.choose(rng).copied().unwrap_or(start) as i32
}

/// Tight bounding box (x, y, width, height) of pixels accepted by `is_content`
fn content_bounds<P, F>(image: &ImageBuffer<P, Vec<P::Subpixel>>, is_content: F) -> Option<(u32, u32, u32, u32)>
where
    P: Pixel,
    F: Fn(&P) -> bool,
{
    let mut bounds: Option<(u32, u32, u32, u32)> = None;

    for (x, y, px) in image.enumerate_pixels() {
        if !is_content(px) {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    bounds.map(|(x0, y0, x1, y1)| (x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

/// Crop to content; an image without content is returned whole
fn crop_to_content<P, F>(image: ImageBuffer<P, Vec<P::Subpixel>>, is_content: F) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
    F: Fn(&P) -> bool,
{
    match content_bounds(&image, is_content) {
        Some((x, y, width, height)) => imageops::crop_imm(&image, x, y, width, height).to_image(),
        None => {
            log::debug!("No content after rotation, keeping the expanded canvas");
            image
        }
    }
}

/// Paste `image` centered on a square of side `side` filled with `fill`
fn expand_square<P>(image: &ImageBuffer<P, Vec<P::Subpixel>>, side: u32, fill: P) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel,
{
    let mut expanded = ImageBuffer::from_pixel(side, side, fill);
    let x = (side - image.width()) / 2;
    let y = (side - image.height()) / 2;
    imageops::replace(&mut expanded, image, x as i64, y as i64);
    expanded
}

/// Rotate counter-clockwise by `angle` degrees and crop to the rotated content.
///
/// The canvas is first centered on a square large enough for any rotation, so nothing is
/// clipped. Exposed areas are transparent (alpha canvases) or `background` (opaque ones).
/// An angle of 0 returns the canvas untouched.
pub fn rotate_and_crop(canvas: Canvas, angle: i32, background: Rgb<u8>, padding: u32) -> Canvas {
    if angle.rem_euclid(360) == 0 {
        return canvas;
    }

    let (width, height) = canvas.dimensions();
    let diagonal = (width as f64).hypot(height as f64) as u32;
    let side = width.max(height).max(diagonal) + padding;
    // imageproc rotates clockwise for positive theta
    let theta = -(angle as f32).to_radians();

    match canvas {
        Canvas::Rgb(img) => {
            let expanded: RgbImage = expand_square(&img, side, background);
            let rotated = rotate_about_center(&expanded, theta, Interpolation::Nearest, background);
            Canvas::Rgb(crop_to_content(rotated, |p| *p != background))
        }
        Canvas::Rgba(img) => {
            let clear = Rgba([0, 0, 0, 0]);
            let expanded: RgbaImage = expand_square(&img, side, clear);
            let rotated = rotate_about_center(&expanded, theta, Interpolation::Nearest, clear);
            Canvas::Rgba(crop_to_content(rotated, |p| p[3] != 0))
        }
    }
}
