// src/config.rs - run settings for label synthesis, loaded from TOML (or JSON) files

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::errors::{LabelSynthError, Result};

/// Sentinel entry of the text vocabulary and angle set that asks for a random value
pub const CUSTOMIZE: &str = "customize";

/// Configuration for one generation run
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    // Output
    #[serde(default = "default_num_labels")]
    pub num_labels: u32,

    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default)]
    pub output_format: OutputFormat,

    #[serde(default = "default_filename_prefix")]
    pub filename_prefix: String,

    /// Run seed; a random one is drawn when absent
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default = "default_parallel")]
    pub use_parallel: bool,

    // Text content
    #[serde(default = "default_label_text_options")]
    pub label_text_options: Vec<String>,

    #[serde(default = "default_scientific_notation_prob")]
    pub scientific_notation_prob: f64,

    #[serde(default = "default_units")]
    pub units: Vec<String>,

    #[serde(default = "default_unit_separators")]
    pub unit_separators: Vec<String>,

    // Fonts and styling
    #[serde(default = "default_base_font_size")]
    pub base_font_size: u32,

    #[serde(default = "default_font_size_variation")]
    pub font_size_variation: u32,

    #[serde(default = "default_font_families")]
    pub font_families: Vec<String>,

    /// Directories scanned (recursively) for .ttf/.otf files
    #[serde(default = "default_font_dirs")]
    pub font_dirs: Vec<String>,

    /// Add the regular families found in `font_dirs` to `font_families`
    #[serde(default = "default_include_scanned_families")]
    pub include_scanned_families: bool,

    #[serde(default = "default_font_weights")]
    pub font_weights: Vec<FontWeight>,

    #[serde(default = "default_text_colors")]
    pub text_colors: Vec<String>,

    #[serde(default = "default_min_background_brightness")]
    pub min_background_brightness: f64,

    #[serde(default)]
    pub transparent_bg_prob: f64,

    #[serde(default = "default_min_text_padding")]
    pub min_text_padding: u32,

    // Rotation
    #[serde(default)]
    pub rotation_allowed: bool,

    #[serde(default = "default_rotation_angle_allowed")]
    pub rotation_angle_allowed: Vec<RotationChoice>,

    #[serde(default = "default_custom_angle_step")]
    pub custom_angle_step: u32,

    // Vintage effects
    #[serde(default = "default_vintage_effect_prob")]
    pub vintage_effect_prob: f64,

    #[serde(default = "default_vintage_intensity")]
    pub vintage_intensity: f64,

    #[serde(default = "default_blur_intensity")]
    pub blur_intensity: f64,

    #[serde(default = "default_texture_file")]
    pub texture_file: Option<String>,

    // Realism effects
    #[serde(default = "default_add_realism")]
    pub add_realism: bool,

    #[serde(default = "default_realism_intensity")]
    pub realism_intensity: f64,

    // Size and resolution
    #[serde(default = "default_customized_size_resolution")]
    pub customized_size_resolution: bool,

    #[serde(default = "default_min_width")]
    pub min_width: u32,

    #[serde(default = "default_max_width")]
    pub max_width: u32,

    #[serde(default = "default_min_height")]
    pub min_height: u32,

    #[serde(default = "default_max_height")]
    pub max_height: u32,

    #[serde(default = "default_min_dpi")]
    pub min_dpi: u32,

    #[serde(default = "default_max_dpi")]
    pub max_dpi: u32,

    #[serde(default = "default_fixed_dpi")]
    pub fixed_dpi: u32,
}

/// Image container written for each label
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    #[serde(alias = "jpeg")]
    Jpg,
    #[serde(alias = "tif")]
    Tiff,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Tiff => "tiff",
        }
    }
}

/// Font style recorded per label; also used to pick a matching face
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Normal,
    Bold,
    Italic,
}

impl fmt::Display for FontWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FontWeight::Normal => "normal",
            FontWeight::Bold => "bold",
            FontWeight::Italic => "italic",
        };
        f.write_str(name)
    }
}

/// One entry of the allowed rotation set: a fixed angle or the `"customize"` keyword
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(untagged)]
pub enum RotationChoice {
    Degrees(i32),
    Custom(CustomAngle),
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CustomAngle {
    Customize,
}

/// Values derived from the configuration once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunProperties {
    /// Box the composed canvas is fitted into, when size customization is on
    pub target_size: Option<(u32, u32)>,
}

fn default_num_labels() -> u32 {
    2000
}

fn default_output_dir() -> String {
    "./labels".to_string()
}

fn default_filename_prefix() -> String {
    "label".to_string()
}

fn default_parallel() -> bool {
    true
}

fn default_label_text_options() -> Vec<String> {
    [
        "0.5", "1.0", "2.7", "3.0", "11", "23", "10,000", "25,000", "50,000", "100,000", CUSTOMIZE,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_scientific_notation_prob() -> f64 {
    0.35
}

fn default_units() -> Vec<String> {
    [
        "", "  mg", "  mL", "  μg", "  μL", "  %", "  ppm", "  kelvin", "  M", " mM", " nM",
        " seconds", "  minutes", " hours", "  days", " (s)", "  (h)", " Celsius", "  Fahrenheit",
        "  Rankine", "meter", "liter", "(kg/L)", " m", " cm",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_unit_separators() -> Vec<String> {
    vec!["  ".to_string(), " ".to_string(), " --- ".to_string()]
}

fn default_base_font_size() -> u32 {
    24
}

fn default_font_size_variation() -> u32 {
    6
}

fn default_font_families() -> Vec<String> {
    ["DejaVu Sans", "Arial", "Verdana", "Times New Roman"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_font_dirs() -> Vec<String> {
    ["/usr/share/fonts", "/usr/local/share/fonts", "assets/fonts"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_include_scanned_families() -> bool {
    true
}

fn default_font_weights() -> Vec<FontWeight> {
    vec![FontWeight::Normal, FontWeight::Bold, FontWeight::Italic]
}

fn default_text_colors() -> Vec<String> {
    ["#000000", "#333333", "#555555", "#777777"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_background_brightness() -> f64 {
    0.8 // 0-1.0, higher = lighter
}

fn default_min_text_padding() -> u32 {
    20
}

fn default_rotation_angle_allowed() -> Vec<RotationChoice> {
    let mut angles: Vec<RotationChoice> = [0, 30, 45, 60, 90, 315, 270]
        .iter()
        .map(|&a| RotationChoice::Degrees(a))
        .collect();
    angles.push(RotationChoice::Custom(CustomAngle::Customize));
    angles
}

fn default_custom_angle_step() -> u32 {
    5
}

fn default_vintage_effect_prob() -> f64 {
    0.7
}

fn default_vintage_intensity() -> f64 {
    0.7
}

fn default_blur_intensity() -> f64 {
    0.5
}

fn default_texture_file() -> Option<String> {
    Some("old_paper.png".to_string())
}

fn default_add_realism() -> bool {
    true
}

fn default_realism_intensity() -> f64 {
    0.7
}

fn default_customized_size_resolution() -> bool {
    true
}

fn default_min_width() -> u32 {
    200
}

fn default_max_width() -> u32 {
    400
}

fn default_min_height() -> u32 {
    100
}

fn default_max_height() -> u32 {
    200
}

fn default_min_dpi() -> u32 {
    50
}

fn default_max_dpi() -> u32 {
    100
}

fn default_fixed_dpi() -> u32 {
    150
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_labels: default_num_labels(),
            output_dir: default_output_dir(),
            output_format: OutputFormat::default(),
            filename_prefix: default_filename_prefix(),
            seed: None,
            use_parallel: default_parallel(),
            label_text_options: default_label_text_options(),
            scientific_notation_prob: default_scientific_notation_prob(),
            units: default_units(),
            unit_separators: default_unit_separators(),
            base_font_size: default_base_font_size(),
            font_size_variation: default_font_size_variation(),
            font_families: default_font_families(),
            font_dirs: default_font_dirs(),
            include_scanned_families: default_include_scanned_families(),
            font_weights: default_font_weights(),
            text_colors: default_text_colors(),
            min_background_brightness: default_min_background_brightness(),
            transparent_bg_prob: 0.0,
            min_text_padding: default_min_text_padding(),
            rotation_allowed: false,
            rotation_angle_allowed: default_rotation_angle_allowed(),
            custom_angle_step: default_custom_angle_step(),
            vintage_effect_prob: default_vintage_effect_prob(),
            vintage_intensity: default_vintage_intensity(),
            blur_intensity: default_blur_intensity(),
            texture_file: default_texture_file(),
            add_realism: default_add_realism(),
            realism_intensity: default_realism_intensity(),
            customized_size_resolution: default_customized_size_resolution(),
            min_width: default_min_width(),
            max_width: default_max_width(),
            min_height: default_min_height(),
            max_height: default_max_height(),
            min_dpi: default_min_dpi(),
            max_dpi: default_max_dpi(),
            fixed_dpi: default_fixed_dpi(),
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

impl Config {
    /// Load configuration from a TOML file, or a JSON settings file when the extension is `.json`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LabelSynthError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        if is_json(path) {
            serde_json::from_str(&content).map_err(|source| LabelSynthError::ConfigJson {
                source,
                path: path.to_path_buf(),
            })
        } else {
            toml::from_str(&content).map_err(|source| LabelSynthError::ConfigLoad {
                source,
                path: path.to_path_buf(),
            })
        }
    }

    /// Save configuration to a TOML (or `.json`) file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self).map_err(|e| {
                LabelSynthError::Config(format!("Failed to serialize settings: {}", e))
            })?
        } else {
            toml::to_string_pretty(self).map_err(|e| {
                LabelSynthError::Config(format!("Failed to serialize config: {}", e))
            })?
        };

        fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration. The synthesis pipeline assumes a config that passed this check.
    pub fn validate(&self) -> Result<()> {
        if self.label_text_options.is_empty() {
            return Err(LabelSynthError::Config(
                "label_text_options must not be empty".to_string(),
            ));
        }

        if !self.units.is_empty() && self.unit_separators.is_empty() {
            return Err(LabelSynthError::Config(
                "unit_separators must not be empty when units are configured".to_string(),
            ));
        }

        if self.font_families.is_empty() {
            return Err(LabelSynthError::Config(
                "font_families must not be empty".to_string(),
            ));
        }

        if self.font_weights.is_empty() {
            return Err(LabelSynthError::Config(
                "font_weights must not be empty".to_string(),
            ));
        }

        if self.text_colors.is_empty() {
            return Err(LabelSynthError::Config(
                "text_colors must not be empty".to_string(),
            ));
        }

        for color in &self.text_colors {
            if crate::canvas::parse_hex_color(color).is_none() {
                return Err(LabelSynthError::Config(format!(
                    "text color '{}' is not a #rrggbb hex color",
                    color
                )));
            }
        }

        if self.base_font_size <= self.font_size_variation {
            return Err(LabelSynthError::Config(
                "base_font_size must be greater than font_size_variation".to_string(),
            ));
        }

        let probabilities = [
            ("scientific_notation_prob", self.scientific_notation_prob),
            ("transparent_bg_prob", self.transparent_bg_prob),
            ("vintage_effect_prob", self.vintage_effect_prob),
            ("vintage_intensity", self.vintage_intensity),
            ("realism_intensity", self.realism_intensity),
            ("min_background_brightness", self.min_background_brightness),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(LabelSynthError::Config(format!(
                    "{} must be between 0.0 and 1.0",
                    name
                )));
            }
        }

        if self.blur_intensity < 0.0 {
            return Err(LabelSynthError::Config(
                "blur_intensity must be >= 0.0".to_string(),
            ));
        }

        if self.rotation_allowed {
            if self.rotation_angle_allowed.is_empty() {
                return Err(LabelSynthError::Config(
                    "rotation_angle_allowed must not be empty when rotation is allowed".to_string(),
                ));
            }
            if self.custom_angle_step == 0 {
                return Err(LabelSynthError::Config(
                    "custom_angle_step must be > 0".to_string(),
                ));
            }
        }

        if self.customized_size_resolution {
            if self.min_width == 0 || self.min_width > self.max_width {
                return Err(LabelSynthError::Config(
                    "min_width must be > 0 and <= max_width".to_string(),
                ));
            }
            if self.min_height == 0 || self.min_height > self.max_height {
                return Err(LabelSynthError::Config(
                    "min_height must be > 0 and <= max_height".to_string(),
                ));
            }
            if self.min_dpi > self.max_dpi {
                return Err(LabelSynthError::Config(
                    "min_dpi must be <= max_dpi".to_string(),
                ));
            }
        }

        if self.filename_prefix.is_empty() {
            return Err(LabelSynthError::Config(
                "filename_prefix must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Draw the per-run target size (once per run, never per label)
    pub fn run_properties<R: Rng + ?Sized>(&self, rng: &mut R) -> RunProperties {
        let target_size = if self.customized_size_resolution {
            Some((
                rng.random_range(self.min_width..=self.max_width),
                rng.random_range(self.min_height..=self.max_height),
            ))
        } else {
            None
        };

        RunProperties { target_size }
    }

    /// DPI written for one label
    pub fn sample_dpi<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        if self.customized_size_resolution {
            rng.random_range(self.min_dpi..=self.max_dpi)
        } else {
            self.fixed_dpi
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn empty_pools_are_rejected() {
        let mut config = Config::default();
        config.font_weights.clear();
        assert!(matches!(config.validate(), Err(LabelSynthError::Config(_))));

        let mut config = Config::default();
        config.label_text_options.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let mut config = Config::default();
        config.min_width = 500;
        config.max_width = 100;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.min_dpi = 300;
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_round_trip_keeps_mixed_angle_set() {
        let mut config = Config::default();
        config.rotation_allowed = true;
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.rotation_angle_allowed, config.rotation_angle_allowed);
        assert!(parsed.rotation_allowed);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            num_labels = 3
            output_format = "jpeg"
            rotation_angle_allowed = [30, "customize"]
            "#,
        )
        .unwrap();
        assert_eq!(parsed.num_labels, 3);
        assert_eq!(parsed.output_format, OutputFormat::Jpg);
        assert_eq!(
            parsed.rotation_angle_allowed,
            vec![
                RotationChoice::Degrees(30),
                RotationChoice::Custom(CustomAngle::Customize)
            ]
        );
        assert_eq!(parsed.base_font_size, 24);
    }

    #[test]
    fn json_settings_file_is_loaded_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut config = Config::default();
        config.num_labels = 7;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.num_labels, 7);
    }

    #[test]
    fn run_properties_respect_ranges() {
        let config = Config::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let props = config.run_properties(&mut rng);
        let (w, h) = props.target_size.unwrap();
        assert!((config.min_width..=config.max_width).contains(&w));
        assert!((config.min_height..=config.max_height).contains(&h));

        let mut fixed = Config::default();
        fixed.customized_size_resolution = false;
        assert_eq!(fixed.run_properties(&mut rng).target_size, None);
        assert_eq!(fixed.sample_dpi(&mut rng), fixed.fixed_dpi);
    }
}
