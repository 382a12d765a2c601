use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::Rgb;
use tiff::encoder::{colortype, Rational, TiffEncoder};
use tiff::tags::ResolutionUnit;

use crate::canvas::Canvas;
use crate::config::OutputFormat;
use crate::errors::{LabelSynthError, Result};

/// Quality used for JPEG label files
pub const JPEG_QUALITY: u8 = 95;

const METERS_PER_INCH: f64 = 0.0254;

/// File name of a label image, e.g. `label_007.png`
pub fn label_filename(prefix: &str, label_id: u32, format: OutputFormat) -> String {
    format!("{}_{:03}.{}", prefix, label_id, format.extension())
}

/// PNG stores resolution as pixels per metre
pub fn pixels_per_meter(dpi: u32) -> u32 {
    (dpi as f64 / METERS_PER_INCH).round() as u32
}

/// Save a label image with `dpi` recorded in the file.
///
/// PNG and TIFF keep the canvas mode (RGBA stays RGBA). JPEG has no alpha, so transparent
/// canvases are flattened onto `background` first.
pub fn save_label<P: AsRef<Path>>(
    canvas: &Canvas,
    path: P,
    format: OutputFormat,
    dpi: u32,
    background: Rgb<u8>,
) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(LabelSynthError::InvalidPath(parent.to_path_buf()));
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    match format {
        OutputFormat::Png => write_png(canvas, &mut writer, dpi)?,
        OutputFormat::Tiff => write_tiff(canvas, &mut writer, dpi)?,
        OutputFormat::Jpg => {
            let rgb = canvas.flatten(background);
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
            let density = dpi.clamp(1, u16::MAX as u32) as u16;
            encoder.set_pixel_density(PixelDensity::dpi(density));
            encoder.encode_image(&rgb)?;
        }
    }
    writer.flush()?;

    log::debug!("Saved {} at {} dpi", path.display(), dpi);
    Ok(())
}

fn write_png<W: Write>(canvas: &Canvas, writer: W, dpi: u32) -> Result<()> {
    let (width, height) = canvas.dimensions();
    let (color, data) = match canvas {
        Canvas::Rgb(img) => (png::ColorType::Rgb, img.as_raw()),
        Canvas::Rgba(img) => (png::ColorType::Rgba, img.as_raw()),
    };

    let mut encoder = png::Encoder::new(writer, width, height);
    encoder.set_color(color);
    encoder.set_depth(png::BitDepth::Eight);
    let ppm = pixels_per_meter(dpi);
    encoder.set_pixel_dims(Some(png::PixelDimensions {
        xppu: ppm,
        yppu: ppm,
        unit: png::Unit::Meter,
    }));

    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(data)?;
    png_writer.finish()?;
    Ok(())
}

fn write_tiff<W: Write + std::io::Seek>(canvas: &Canvas, writer: &mut W, dpi: u32) -> Result<()> {
    let (width, height) = canvas.dimensions();
    let mut encoder = TiffEncoder::new(writer)?;
    let resolution = Rational { n: dpi, d: 1 };

    match canvas {
        Canvas::Rgb(img) => {
            let mut image = encoder.new_image::<colortype::RGB8>(width, height)?;
            image.resolution(ResolutionUnit::Inch, resolution);
            image.write_data(img.as_raw())?;
        }
        Canvas::Rgba(img) => {
            let mut image = encoder.new_image::<colortype::RGBA8>(width, height)?;
            image.resolution(ResolutionUnit::Inch, resolution);
            image.write_data(img.as_raw())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::ColorMode;
    use std::io::BufReader;
    use tiff::decoder::ifd::Value;
    use tiff::tags::Tag;

    #[test]
    fn filenames_are_zero_padded() {
        assert_eq!(label_filename("label", 7, OutputFormat::Png), "label_007.png");
        assert_eq!(label_filename("tag", 1234, OutputFormat::Jpg), "tag_1234.jpg");
    }

    #[test]
    fn png_keeps_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        let canvas = Canvas::new(ColorMode::Alpha, 8, 4, Rgb([255, 255, 255]));

        save_label(&canvas, &path, OutputFormat::Png, 72, Rgb([255, 255, 255])).unwrap();
        let loaded = image::open(&path).unwrap();
        assert!(loaded.color().has_alpha());
        assert_eq!((loaded.width(), loaded.height()), (8, 4));
    }

    #[test]
    fn png_records_dpi() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        let canvas = Canvas::new(ColorMode::Opaque, 6, 3, Rgb([10, 20, 30]));

        save_label(&canvas, &path, OutputFormat::Png, 77, Rgb([255, 255, 255])).unwrap();
        let reader = png::Decoder::new(BufReader::new(File::open(&path).unwrap()))
            .read_info()
            .unwrap();
        let dims = reader.info().pixel_dims.as_ref().unwrap();
        // 77 / 0.0254 = 3031.5
        assert_eq!((dims.xppu, dims.yppu), (3031, 3031));
        assert!(matches!(dims.unit, png::Unit::Meter));

        let loaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(loaded.get_pixel(5, 2), &Rgb([10, 20, 30]));
    }

    #[test]
    fn tiff_records_dpi() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tiff");
        let canvas = Canvas::new(ColorMode::Alpha, 5, 5, Rgb([0, 0, 0]));

        save_label(&canvas, &path, OutputFormat::Tiff, 300, Rgb([255, 255, 255])).unwrap();
        let mut decoder = tiff::decoder::Decoder::new(File::open(&path).unwrap()).unwrap();
        assert!(matches!(decoder.get_tag(Tag::XResolution).unwrap(), Value::Rational(300, 1)));
        assert!(matches!(decoder.get_tag(Tag::YResolution).unwrap(), Value::Rational(300, 1)));
        // 2 = inch
        assert_eq!(decoder.get_tag_u32(Tag::ResolutionUnit).unwrap(), 2);

        let loaded = image::open(&path).unwrap();
        assert!(loaded.color().has_alpha());
        assert_eq!((loaded.width(), loaded.height()), (5, 5));
    }

    #[test]
    fn jpeg_flattens_transparency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        let canvas = Canvas::new(ColorMode::Alpha, 16, 16, Rgb([0, 0, 0]));

        save_label(&canvas, &path, OutputFormat::Jpg, 150, Rgb([255, 255, 255])).unwrap();
        let loaded = image::open(&path).unwrap().to_rgb8();
        assert!(!image::open(&path).unwrap().color().has_alpha());
        assert!(loaded.pixels().all(|p| p[0] > 240));
    }

    #[test]
    fn missing_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("a.png");
        let canvas = Canvas::new(ColorMode::Opaque, 2, 2, Rgb([0, 0, 0]));
        let result = save_label(&canvas, &path, OutputFormat::Png, 72, Rgb([0, 0, 0]));
        assert!(matches!(result, Err(LabelSynthError::InvalidPath(_))));
    }
}
