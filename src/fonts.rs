// src/fonts.rs - font discovery, loading and the face abstraction used by the compositor

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, ScaleFont};
use image::{Rgb, Rgba};
use imageproc::drawing::draw_text_mut;

use crate::builtin_font;
use crate::canvas::Canvas;
use crate::config::{Config, FontWeight};
use crate::errors::{LabelSynthError, Result};

/// Family tried when the requested one cannot be loaded
pub const FALLBACK_FAMILY: &str = "DejaVu Sans";

/// Ink bounds of a text run relative to its drawing origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextBounds {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// A renderable face: a loaded outline font, or the built-in bitmap face
#[derive(Clone)]
pub enum Face {
    Outline { font: FontArc, embolden: bool },
    Builtin { bold: bool, italic: bool },
}

/// Lay glyphs out the same way `imageproc::drawing::draw_text_mut` does
fn outline_bounds(font: &FontArc, scale: PxScale, text: &str) -> Option<ab_glyph::Rect> {
    let scaled = font.as_scaled(scale);
    let mut caret = 0.0f32;
    let mut last: Option<GlyphId> = None;
    let mut bounds: Option<ab_glyph::Rect> = None;

    for c in text.chars() {
        let glyph_id = scaled.glyph_id(c);
        let glyph = glyph_id.with_scale_and_position(scale, point(caret, scaled.ascent()));
        caret += scaled.h_advance(glyph_id);
        if let Some(outlined) = scaled.outline_glyph(glyph) {
            if let Some(last) = last {
                caret += scaled.kern(glyph_id, last);
            }
            last = Some(glyph_id);
            let bb = outlined.px_bounds();
            bounds = Some(match bounds {
                None => bb,
                Some(b) => ab_glyph::Rect {
                    min: point(b.min.x.min(bb.min.x), b.min.y.min(bb.min.y)),
                    max: point(b.max.x.max(bb.max.x), b.max.y.max(bb.max.y)),
                },
            });
        }
    }

    bounds
}

impl Face {
    pub fn is_builtin(&self) -> bool {
        matches!(self, Face::Builtin { .. })
    }

    /// Measure `text` independently of any destination canvas
    pub fn measure(&self, font_size: f32, text: &str) -> TextBounds {
        match self {
            Face::Outline { font, embolden } => {
                match outline_bounds(font, PxScale::from(font_size), text) {
                    Some(bb) => TextBounds {
                        left: bb.min.x.round() as i32,
                        top: bb.min.y.round() as i32,
                        width: (bb.width().round() as u32) + u32::from(*embolden),
                        height: bb.height().round() as u32,
                    },
                    None => TextBounds {
                        left: 0,
                        top: 0,
                        width: 0,
                        height: 0,
                    },
                }
            }
            Face::Builtin { bold, italic } => {
                let (width, height) = builtin_font::measure(text, font_size, *bold, *italic);
                TextBounds {
                    left: 0,
                    top: 0,
                    width,
                    height,
                }
            }
        }
    }

    /// Draw `text` at origin (`x`, `y`). Alpha canvases receive the color with full opacity.
    pub fn draw(&self, canvas: &mut Canvas, color: Rgb<u8>, x: i32, y: i32, font_size: f32, text: &str) {
        let opaque = Rgba([color[0], color[1], color[2], 255]);
        match self {
            Face::Outline { font, embolden } => {
                let scale = PxScale::from(font_size);
                let passes: &[i32] = if *embolden { &[0, 1] } else { &[0] };
                for &dx in passes {
                    match canvas {
                        Canvas::Rgb(img) => draw_text_mut(img, color, x + dx, y, scale, font, text),
                        Canvas::Rgba(img) => draw_text_mut(img, opaque, x + dx, y, scale, font, text),
                    }
                }
            }
            Face::Builtin { bold, italic } => match canvas {
                Canvas::Rgb(img) => {
                    builtin_font::draw(img, color, x, y, font_size, text, *bold, *italic)
                }
                Canvas::Rgba(img) => {
                    builtin_font::draw(img, opaque, x, y, font_size, text, *bold, *italic)
                }
            },
        }
    }
}

struct FaceFile {
    family: String,
    path: PathBuf,
    bold: bool,
    italic: bool,
}

impl FaceFile {
    fn is_regular(&self) -> bool {
        !self.bold && !self.italic
    }
}

/// Font files found on disk, indexed by lowercase family name
#[derive(Default)]
pub struct FontCatalog {
    families: HashMap<String, Vec<FaceFile>>,
}

/// Helper function to recursively search for font files
fn find_font_files_recursive(dir_path: &Path, result: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir_path)? {
        let path = entry?.path();

        if path.is_dir() {
            find_font_files_recursive(&path, result)?;
        } else if path.is_file() {
            let is_font = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"))
                .unwrap_or(false);
            if is_font {
                result.push(path);
            }
        }
    }

    Ok(())
}

/// Family name and style flags from the font's name table
fn read_face_names(path: &Path) -> Option<(String, bool, bool)> {
    let data = fs::read(path).ok()?;
    let face = ttf_parser::Face::parse(&data, 0).ok()?;
    let family = face
        .names()
        .into_iter()
        .filter(|name| name.name_id == ttf_parser::name_id::FAMILY)
        .find_map(|name| name.to_string())?;

    Some((family, face.is_bold(), face.is_italic()))
}

impl FontCatalog {
    /// Index every .ttf/.otf file under `dirs`; unreadable directories are skipped
    pub fn scan<P: AsRef<Path>>(dirs: &[P]) -> Self {
        let mut files = Vec::new();
        for dir in dirs {
            let dir = dir.as_ref();
            if !dir.is_dir() {
                continue;
            }
            if let Err(e) = find_font_files_recursive(dir, &mut files) {
                log::warn!("Skipping font directory {}: {}", dir.display(), e);
            }
        }

        let mut families: HashMap<String, Vec<FaceFile>> = HashMap::new();
        for path in files {
            if let Some((family, bold, italic)) = read_face_names(&path) {
                families
                    .entry(family.to_lowercase())
                    .or_default()
                    .push(FaceFile {
                        family,
                        path,
                        bold,
                        italic,
                    });
            }
        }

        log::debug!("Font catalog: {} families", families.len());
        FontCatalog { families }
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Names of the families that have a regular face, sorted
    pub fn regular_families(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .families
            .values()
            .filter_map(|faces| faces.iter().find(|f| f.is_regular()))
            .map(|f| f.family.clone())
            .collect();
        names.sort();
        names
    }

    /// Best file for a family: exact style, then regular, then anything
    fn lookup(&self, family: &str, weight: FontWeight) -> Option<&FaceFile> {
        let faces = self.families.get(&family.to_lowercase())?;
        let bold = weight == FontWeight::Bold;
        let italic = weight == FontWeight::Italic;

        faces
            .iter()
            .find(|f| f.bold == bold && f.italic == italic)
            .or_else(|| faces.iter().find(|f| f.is_regular()))
            .or_else(|| faces.first())
    }
}

fn load_font_file(path: &Path) -> Result<FontArc> {
    let bytes = fs::read(path)?;
    FontArc::try_from_vec(bytes)
        .map_err(|e| LabelSynthError::Font(format!("{}: {}", path.display(), e)))
}

/// Configured families followed by the scanned regular families not already listed
pub fn family_pool(configured: &[String], catalog: &FontCatalog, include_scanned: bool) -> Vec<String> {
    let mut pool = configured.to_vec();
    if !include_scanned {
        return pool;
    }

    for family in catalog.regular_families() {
        if !pool.iter().any(|f| f.eq_ignore_ascii_case(&family)) {
            pool.push(family);
        }
    }
    pool
}

/// The run's family pool and a face resolved once for every (family, weight) pair
pub struct FontBook {
    families: Vec<String>,
    faces: HashMap<(String, FontWeight), Face>,
}

impl FontBook {
    /// Resolve all families in the pool: requested family, then the fallback family, then the
    /// built-in face. Never fails.
    pub fn load(config: &Config) -> Self {
        let catalog = FontCatalog::scan(&config.font_dirs);
        if catalog.is_empty() && !config.font_dirs.is_empty() {
            log::warn!("No font files found in {:?}", config.font_dirs);
        }
        let families = family_pool(&config.font_families, &catalog, config.include_scanned_families);
        log::info!(
            "Font pool: {} families ({} configured)",
            families.len(),
            config.font_families.len()
        );

        let mut loaded: HashMap<PathBuf, Option<FontArc>> = HashMap::new();
        let mut faces = HashMap::new();

        for family in &families {
            for &weight in &config.font_weights {
                let face = Self::resolve(&catalog, &mut loaded, family, weight);
                if face.is_builtin() {
                    log::warn!(
                        "No usable font for '{}' ({}), using the built-in face",
                        family,
                        weight
                    );
                }
                faces.insert((family.clone(), weight), face);
            }
        }

        FontBook { families, faces }
    }

    /// A book over the configured families that always renders with the built-in face
    pub fn builtin(config: &Config) -> Self {
        FontBook {
            families: config.font_families.clone(),
            faces: HashMap::new(),
        }
    }

    pub fn families(&self) -> &[String] {
        &self.families
    }

    fn resolve(
        catalog: &FontCatalog,
        loaded: &mut HashMap<PathBuf, Option<FontArc>>,
        family: &str,
        weight: FontWeight,
    ) -> Face {
        let mut candidates: Vec<(PathBuf, bool)> = Vec::new();
        let direct = Path::new(family);
        if direct.is_file() {
            candidates.push((direct.to_path_buf(), false));
        }
        for name in [family, FALLBACK_FAMILY] {
            if let Some(file) = catalog.lookup(name, weight) {
                candidates.push((file.path.clone(), file.bold));
            }
        }

        for (path, is_bold) in candidates {
            let font = loaded
                .entry(path.clone())
                .or_insert_with(|| match load_font_file(&path) {
                    Ok(font) => Some(font),
                    Err(e) => {
                        log::warn!("Failed to load font: {}", e);
                        None
                    }
                })
                .clone();

            if let Some(font) = font {
                return Face::Outline {
                    font,
                    embolden: weight == FontWeight::Bold && !is_bold,
                };
            }
        }

        Face::Builtin {
            bold: weight == FontWeight::Bold,
            italic: weight == FontWeight::Italic,
        }
    }

    /// Face for a family/weight pair; unknown pairs render with the built-in face
    pub fn face(&self, family: &str, weight: FontWeight) -> Face {
        self.faces
            .get(&(family.to_string(), weight))
            .cloned()
            .unwrap_or(Face::Builtin {
                bold: weight == FontWeight::Bold,
                italic: weight == FontWeight::Italic,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fonts_fall_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            font_dirs: vec![dir.path().display().to_string()],
            font_families: vec!["No Such Family".to_string()],
            ..Config::default()
        };

        let book = FontBook::load(&config);
        assert!(book.face("No Such Family", FontWeight::Bold).is_builtin());
        assert!(book.face("Unlisted", FontWeight::Normal).is_builtin());
    }

    #[test]
    fn corrupt_font_file_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("broken.ttf");
        fs::write(&bogus, b"not a font").unwrap();

        let catalog = FontCatalog::scan(&[dir.path()]);
        assert!(catalog.is_empty());

        let config = Config {
            font_dirs: vec![dir.path().display().to_string()],
            font_families: vec![bogus.display().to_string()],
            font_weights: vec![FontWeight::Normal],
            ..Config::default()
        };
        let book = FontBook::load(&config);
        assert!(book
            .face(&bogus.display().to_string(), FontWeight::Normal)
            .is_builtin());
    }

    fn face_file(family: &str, bold: bool, italic: bool) -> FaceFile {
        FaceFile {
            family: family.to_string(),
            path: PathBuf::from(format!("/fonts/{}.ttf", family)),
            bold,
            italic,
        }
    }

    #[test]
    fn scanned_regular_families_join_the_pool() {
        let mut families = HashMap::new();
        families.insert(
            "liberation serif".to_string(),
            vec![face_file("Liberation Serif", true, false), face_file("Liberation Serif", false, false)],
        );
        families.insert("noto sans".to_string(), vec![face_file("Noto Sans", false, true)]);
        families.insert("arial".to_string(), vec![face_file("Arial", false, false)]);
        let catalog = FontCatalog { families };

        assert_eq!(catalog.regular_families(), vec!["Arial", "Liberation Serif"]);

        let configured = vec!["DejaVu Sans".to_string(), "arial".to_string()];
        assert_eq!(
            family_pool(&configured, &catalog, true),
            vec!["DejaVu Sans", "arial", "Liberation Serif"]
        );
        assert_eq!(family_pool(&configured, &catalog, false), configured);
    }

    #[test]
    fn builtin_book_keeps_configured_families() {
        let config = Config::default();
        let book = FontBook::builtin(&config);
        assert_eq!(book.families(), config.font_families.as_slice());
        assert!(book.face("Arial", FontWeight::Normal).is_builtin());
    }

    #[test]
    fn builtin_measure_has_no_bearing() {
        let face = Face::Builtin {
            bold: false,
            italic: false,
        };
        let bounds = face.measure(24.0, "2.5");
        assert_eq!((bounds.left, bounds.top), (0, 0));
        assert!(bounds.width > 0 && bounds.height > 0);
    }
}
