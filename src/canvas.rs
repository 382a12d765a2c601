// src/canvas.rs - the two-mode working image and color helpers

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use rand::Rng;

use crate::errors::{LabelSynthError, Result};

/// Color mode of a canvas, fixed for the lifetime of one label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Three channels, no transparency
    Opaque,
    /// Four channels with alpha
    Alpha,
}

/// Working image buffer of the synthesis pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Canvas {
    Rgb(RgbImage),
    Rgba(RgbaImage),
}

impl Canvas {
    /// Allocate a canvas filled with `background` (opaque) or fully transparent (alpha)
    pub fn new(mode: ColorMode, width: u32, height: u32, background: Rgb<u8>) -> Self {
        match mode {
            ColorMode::Opaque => Canvas::Rgb(RgbImage::from_pixel(width, height, background)),
            ColorMode::Alpha => Canvas::Rgba(RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]))),
        }
    }

    pub fn mode(&self) -> ColorMode {
        match self {
            Canvas::Rgb(_) => ColorMode::Opaque,
            Canvas::Rgba(_) => ColorMode::Alpha,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Canvas::Rgb(img) => img.dimensions(),
            Canvas::Rgba(img) => img.dimensions(),
        }
    }

    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.dimensions().1
    }

    /// Resample to exactly `width` x `height`, keeping the color mode
    pub fn resize(&self, width: u32, height: u32, filter: FilterType) -> Canvas {
        match self {
            Canvas::Rgb(img) => Canvas::Rgb(imageops::resize(img, width, height, filter)),
            Canvas::Rgba(img) => Canvas::Rgba(imageops::resize(img, width, height, filter)),
        }
    }

    /// Run an RGB-only transform regardless of mode.
    ///
    /// For alpha canvases the alpha channel is split off once, handed to the transform as a
    /// read-only mask, and merged back untouched. The transform must keep the image size.
    pub fn map_rgb<F>(self, transform: F) -> Result<Canvas>
    where
        F: FnOnce(RgbImage, Option<&GrayImage>) -> Result<RgbImage>,
    {
        match self {
            Canvas::Rgb(img) => Ok(Canvas::Rgb(transform(img, None)?)),
            Canvas::Rgba(img) => {
                let (rgb, alpha) = split_alpha(&img);
                let rgb = transform(rgb, Some(&alpha))?;
                Ok(Canvas::Rgba(merge_alpha(&rgb, &alpha)?))
            }
        }
    }

    /// Alpha channel, if the canvas carries one
    pub fn alpha(&self) -> Option<GrayImage> {
        match self {
            Canvas::Rgb(_) => None,
            Canvas::Rgba(img) => Some(split_alpha(img).1),
        }
    }

    /// Composite onto a solid background, dropping transparency (used by lossy encoders)
    pub fn flatten(&self, background: Rgb<u8>) -> RgbImage {
        match self {
            Canvas::Rgb(img) => img.clone(),
            Canvas::Rgba(img) => {
                let (w, h) = img.dimensions();
                let mut out = RgbImage::from_pixel(w, h, background);
                for (x, y, px) in img.enumerate_pixels() {
                    let a = px[3] as f32 / 255.0;
                    let dst = out.get_pixel_mut(x, y);
                    for c in 0..3 {
                        let v = px[c] as f32 * a + dst[c] as f32 * (1.0 - a);
                        dst[c] = v.round().clamp(0.0, 255.0) as u8;
                    }
                }
                out
            }
        }
    }
}

/// Split an RGBA image into its color and alpha planes
pub fn split_alpha(image: &RgbaImage) -> (RgbImage, GrayImage) {
    let (width, height) = image.dimensions();
    let mut rgb = RgbImage::new(width, height);
    let mut alpha = GrayImage::new(width, height);

    for (x, y, px) in image.enumerate_pixels() {
        rgb.put_pixel(x, y, Rgb([px[0], px[1], px[2]]));
        alpha.put_pixel(x, y, Luma([px[3]]));
    }

    (rgb, alpha)
}

/// Recombine color and alpha planes; both must have the same size
pub fn merge_alpha(rgb: &RgbImage, alpha: &GrayImage) -> Result<RgbaImage> {
    if rgb.dimensions() != alpha.dimensions() {
        return Err(LabelSynthError::Other(format!(
            "cannot merge {:?} color plane with {:?} alpha plane",
            rgb.dimensions(),
            alpha.dimensions()
        )));
    }

    Ok(ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let c = rgb.get_pixel(x, y);
        Rgba([c[0], c[1], c[2], alpha.get_pixel(x, y)[0]])
    }))
}

/// Parse `#rrggbb` (leading `#` optional)
pub fn parse_hex_color(hex: &str) -> Option<Rgb<u8>> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }

    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

pub fn to_hex(color: Rgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

/// HSV to RGB, all components in [0, 1]
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }

    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match (i as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

/// Pastel background color with brightness of at least `min_brightness`, as `#rrggbb`
pub fn generate_light_background<R: Rng + ?Sized>(min_brightness: f64, rng: &mut R) -> String {
    let h: f64 = rng.random();
    let s = rng.random_range(0.0..=0.3);
    let v = if min_brightness < 1.0 {
        rng.random_range(min_brightness..=1.0)
    } else {
        1.0
    };

    let (r, g, b) = hsv_to_rgb(h, s, v);
    to_hex(Rgb([(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]))
}
