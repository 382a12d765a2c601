// src/effects.rs - ordered chains of probabilistic RGB transforms

use image::{GrayImage, RgbImage};
use rand::{Rng, RngCore};

use crate::errors::Result;

/// RGB transform with access to the alpha mask (when the canvas has one) and the label RNG
pub type Transform<'a> =
    Box<dyn Fn(RgbImage, Option<&GrayImage>, &mut dyn RngCore) -> Result<RgbImage> + 'a>;

/// One named step of a chain, applied with the given probability
pub struct EffectStage<'a> {
    pub name: &'static str,
    pub probability: f64,
    apply: Transform<'a>,
}

/// Stages evaluated left to right; each draws once from the RNG to decide whether it runs
#[derive(Default)]
pub struct EffectChain<'a> {
    stages: Vec<EffectStage<'a>>,
}

impl<'a> EffectChain<'a> {
    pub fn new() -> Self {
        EffectChain { stages: Vec::new() }
    }

    /// Append a stage
    pub fn stage<F>(mut self, name: &'static str, probability: f64, apply: F) -> Self
    where
        F: Fn(RgbImage, Option<&GrayImage>, &mut dyn RngCore) -> Result<RgbImage> + 'a,
    {
        self.stages.push(EffectStage {
            name,
            probability,
            apply: Box::new(apply),
        });
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name).collect()
    }

    /// Run the chain; returns the image and the names of the stages that fired
    pub fn apply(
        &self,
        mut image: RgbImage,
        mask: Option<&GrayImage>,
        rng: &mut dyn RngCore,
    ) -> Result<(RgbImage, Vec<&'static str>)> {
        let mut applied = Vec::new();

        for stage in &self.stages {
            if rng.random::<f64>() < stage.probability {
                image = (stage.apply)(image, mask, &mut *rng)?;
                applied.push(stage.name);
            }
        }

        log::debug!("Effect stages applied: {:?}", applied);
        Ok((image, applied))
    }
}
