// src/text_content.rs - label strings with superscript or ASCII exponent notation

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::config::{Config, CUSTOMIZE};

const SUPERSCRIPTS: [(char, char); 12] = [
    ('0', '⁰'),
    ('1', '¹'),
    ('2', '²'),
    ('3', '³'),
    ('4', '⁴'),
    ('5', '⁵'),
    ('6', '⁶'),
    ('7', '⁷'),
    ('8', '⁸'),
    ('9', '⁹'),
    ('-', '⁻'),
    ('+', '⁺'),
];

/// Marker separating the coefficient from the power of ten
pub const TIMES_TEN: &str = " × 10";

/// Probability of appending a separator and unit
const UNIT_PROBABILITY: f64 = 0.7;

/// Which notation path produced a label string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notation {
    /// `"2.5 × 10⁴"`
    Superscript,
    /// `"12.5E-3"` or `"12.5e-3"`
    AsciiExponent,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpec {
    pub text: String,
    pub notation: Notation,
}

/// Convert the digits and signs of `value` to Unicode superscripts
pub fn to_superscript(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            SUPERSCRIPTS
                .iter()
                .find(|(plain, _)| *plain == c)
                .map(|(_, sup)| *sup)
                .unwrap_or(c)
        })
        .collect()
}

/// Plain digit or sign behind a superscript glyph
pub fn superscript_base(c: char) -> Option<char> {
    SUPERSCRIPTS
        .iter()
        .find(|(_, sup)| *sup == c)
        .map(|(plain, _)| *plain)
}

/// Rewrite superscript notation as plain text: `"1.23 × 10⁻³"` becomes `"1.23 × 10^{-3}"`.
///
/// Text without the `" × 10"` marker, or already in `^{..}` form, is returned unchanged.
pub fn encode_scientific_notation(text: &str) -> String {
    let plain: String = text
        .chars()
        .map(|c| superscript_base(c).unwrap_or(c))
        .collect();

    match plain.find(TIMES_TEN) {
        Some(pos) => {
            let split = pos + TIMES_TEN.len();
            if plain[split..].starts_with('^') {
                return plain;
            }
            format!("{}^{{{}}}", &plain[..split], &plain[split..])
        }
        None => plain,
    }
}

/// Fixed-precision decimal with trailing zeros removed, keeping at least one decimal digit
pub fn format_decimal(value: f64, places: usize) -> String {
    let mut s = format!("{:.*}", places, value);
    if s.contains('.') {
        while s.ends_with('0') && !s.ends_with(".0") {
            s.pop();
        }
    }
    s
}

fn random_reading<R: Rng + ?Sized>(rng: &mut R, places: usize) -> String {
    format_decimal(rng.random_range(1.0..=60.0), places)
}

/// Superscript form of a comma-grouped integer, or None if it does not parse as a positive number
fn superscript_form<R: Rng + ?Sized>(base: &str, rng: &mut R) -> Option<String> {
    let value: f64 = base.replace(',', "").trim().parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }

    let exponent = value.log10().floor() as i32;
    let coefficient = value / 10f64.powi(exponent);
    let places = rng.random_range(1..=3);

    Some(format!(
        "{}{}{}",
        format_decimal(coefficient, places),
        TIMES_TEN,
        to_superscript(&exponent.to_string())
    ))
}

/// Generate the label text for one image
pub fn generate_label_text<R: Rng + ?Sized>(config: &Config, rng: &mut R) -> TextSpec {
    let mut text = config
        .label_text_options
        .choose(rng)
        .cloned()
        .unwrap_or_default();
    let mut notation = Notation::Plain;

    if text == CUSTOMIZE {
        text = random_reading(rng, 4);
    }

    // Two independent gates: upgrade a grouped integer, or synthesize a fresh exponential reading
    if rng.random::<f64>() < config.scientific_notation_prob && text.contains(',') {
        match superscript_form(&text, rng) {
            Some(converted) => {
                text = converted;
                notation = Notation::Superscript;
            }
            None => log::debug!("Keeping '{}': not a number", text),
        }
    } else if rng.random::<f64>() < config.scientific_notation_prob {
        let value = random_reading(rng, 3);
        let exponent: i32 = rng.random_range(-14..=14);
        let infix = if rng.random_bool(0.5) { 'E' } else { 'e' };
        text = format!("{}{}{}", value, infix, exponent);
        notation = Notation::AsciiExponent;
    }

    if rng.random::<f64>() < UNIT_PROBABILITY && !config.units.is_empty() {
        let separator = config.unit_separators.choose(rng).map(String::as_str).unwrap_or(" ");
        let unit = config.units.choose(rng).map(String::as_str).unwrap_or("");
        text.push_str(separator);
        text.push_str(unit);
    }

    TextSpec { text, notation }
}
