// src/lib.rs - Library interface for label_synth

pub mod batch;
pub mod builtin_font;
pub mod canvas;
pub mod compositor;
pub mod config;
pub mod effects;
pub mod errors;
pub mod fonts;
pub mod image_io;
pub mod output;
pub mod pipeline;
pub mod realism;
pub mod rotation;
pub mod text_content;
pub mod vintage;

// Re-export commonly used types and functions
pub use errors::{LabelSynthError, Result};
pub use config::{Config, FontWeight, OutputFormat, RotationChoice, RunProperties};
pub use canvas::{Canvas, ColorMode};
pub use pipeline::{LabelRecord, LabelSynthesizer};
pub use batch::{generate_all_labels, RunSummary};
pub use image_io::save_label;
pub use output::write_metadata;

// Re-export text content functions
pub use text_content::{
    encode_scientific_notation,
    generate_label_text,
    Notation,
    TextSpec,
};

// Re-export composition and rotation
pub use compositor::{compose, Background, LabelStyle};
pub use fonts::{Face, FontBook};
pub use rotation::{determine_rotation_angle, rotate_and_crop};

// Re-export degradation pipelines
pub use effects::EffectChain;
pub use vintage::apply_vintage_effects;
pub use realism::enhance_realism;
