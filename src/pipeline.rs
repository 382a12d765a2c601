// src/pipeline.rs - per-label synthesis: text, composition, rotation, degradation, record

use image::GrayImage;
use rand::{Rng, RngCore};
use serde::Serialize;

use crate::canvas::Canvas;
use crate::compositor::{compose, Background, LabelStyle};
use crate::config::{Config, FontWeight, RunProperties};
use crate::errors::Result;
use crate::fonts::FontBook;
use crate::realism::enhance_realism;
use crate::rotation::{determine_rotation_angle, rotate_and_crop};
use crate::text_content::generate_label_text;
use crate::vintage::{apply_vintage_effects, load_texture};

/// Metadata row for one generated label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelRecord {
    pub label_id: u32,
    /// Empty until the image has been written
    pub image_filename: String,
    pub text: String,
    pub rotation_angle: i32,
    pub font_family: String,
    pub font_size: u32,
    pub font_weight: FontWeight,
    pub text_color: String,
    /// `#rrggbb`, or `transparent`
    pub background: String,
    pub vintage_applied: bool,
    pub vintage_intensity: f64,
}

/// Everything a label needs that is resolved once per run
pub struct LabelSynthesizer<'a> {
    config: &'a Config,
    properties: RunProperties,
    fonts: FontBook,
    texture: Option<GrayImage>,
}

impl<'a> LabelSynthesizer<'a> {
    /// Load fonts and the paper texture for a run
    pub fn new(config: &'a Config, properties: RunProperties) -> Self {
        let fonts = FontBook::load(config);
        let texture = load_texture(config.texture_file.as_deref());
        Self::with_resources(config, properties, fonts, texture)
    }

    pub fn with_resources(
        config: &'a Config,
        properties: RunProperties,
        fonts: FontBook,
        texture: Option<GrayImage>,
    ) -> Self {
        LabelSynthesizer {
            config,
            properties,
            fonts,
            texture,
        }
    }

    /// Build one label image and its record. All randomness comes from `rng`, so a label is
    /// reproducible from its seed alone.
    pub fn synthesize<R: RngCore>(&self, label_id: u32, rng: &mut R) -> Result<(Canvas, LabelRecord)> {
        let config = self.config;

        let text = generate_label_text(config, rng);
        let angle = determine_rotation_angle(config, rng);
        let style = LabelStyle::sample(config, self.fonts.families(), rng);
        let background = Background::sample(config, rng);

        let face = self.fonts.face(&style.font_family, style.font_weight);
        let mut canvas = compose(
            &text.text,
            &style,
            &face,
            &background,
            config.min_text_padding,
            &self.properties,
        );

        if angle != 0 {
            canvas = rotate_and_crop(canvas, angle, background.rgb(), config.min_text_padding);
        }

        let vintage_applied = rng.random::<f64>() < config.vintage_effect_prob;
        if vintage_applied {
            canvas = apply_vintage_effects(canvas, config, self.texture.as_ref(), &mut *rng);
        }

        if config.add_realism {
            canvas = enhance_realism(canvas, config.realism_intensity, &mut *rng)?;
        }

        log::info!(
            "Label {}: '{}' ({:?}, {} deg, {}x{})",
            label_id,
            text.text,
            text.notation,
            angle,
            canvas.width(),
            canvas.height()
        );

        let record = LabelRecord {
            label_id,
            image_filename: String::new(),
            text: text.text,
            rotation_angle: angle,
            font_family: style.font_family,
            font_size: style.font_size,
            font_weight: style.font_weight,
            text_color: style.text_color,
            background: background.label(),
            vintage_applied,
            vintage_intensity: if vintage_applied {
                config.vintage_intensity
            } else {
                0.0
            },
        };

        Ok((canvas, record))
    }
}
