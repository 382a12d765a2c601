// src/batch.rs - run-level driver: seeding, sequential or parallel generation, metadata

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use image::Rgb;
use rand::{Rng, RngCore, SeedableRng};
use rand_xoshiro::{SplitMix64, Xoshiro256PlusPlus};
use rayon::prelude::*;

use crate::canvas::parse_hex_color;
use crate::config::Config;
use crate::errors::Result;
use crate::image_io::{label_filename, save_label};
use crate::output::write_metadata;
use crate::pipeline::{LabelRecord, LabelSynthesizer};

/// Fill used when a transparent label is written to a format without alpha
const FLATTEN_FILL: Rgb<u8> = Rgb([255, 255, 255]);

/// Outcome of a generation run
#[derive(Debug)]
pub struct RunSummary {
    pub seed: u64,
    pub requested: u32,
    pub failed: usize,
    /// Set when the stop flag cut the run short
    pub stopped: bool,
    pub output_dir: PathBuf,
    pub target_size: Option<(u32, u32)>,
    /// Records of the written labels, in label order
    pub records: Vec<LabelRecord>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn generated(&self) -> usize {
        self.records.len()
    }
}

/// Independent per-label seeds derived from the run seed
pub fn label_seeds(run_seed: u64, count: u32) -> Vec<u64> {
    let mut splitter = SplitMix64::seed_from_u64(run_seed);
    (0..count).map(|_| splitter.next_u64()).collect()
}

/// Synthesize, encode and save one label
fn generate_label(
    synthesizer: &LabelSynthesizer<'_>,
    config: &Config,
    output_dir: &Path,
    label_id: u32,
    seed: u64,
) -> Result<LabelRecord> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let (canvas, mut record) = synthesizer.synthesize(label_id, &mut rng)?;

    let dpi = config.sample_dpi(&mut rng);
    let filename = label_filename(&config.filename_prefix, label_id, config.output_format);
    let fill = parse_hex_color(&record.background).unwrap_or(FLATTEN_FILL);
    save_label(&canvas, output_dir.join(&filename), config.output_format, dpi, fill)?;

    record.image_filename = filename;
    Ok(record)
}

/// Generate `config.num_labels` labels into `config.output_dir` and write the metadata files.
///
/// The stop flag is checked before each label starts; labels already in progress finish.
/// A label that fails is logged and left out of the metadata.
pub fn generate_all_labels(config: &Config, stop: &AtomicBool) -> Result<RunSummary> {
    config.validate()?;
    let start_time = Instant::now();

    let output_dir = PathBuf::from(&config.output_dir);
    fs::create_dir_all(&output_dir)?;

    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    let mut run_rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let properties = config.run_properties(&mut run_rng);
    let seeds = label_seeds(run_rng.next_u64(), config.num_labels);

    log::info!(
        "Generating {} labels into {} (seed {}, target size {:?})",
        config.num_labels,
        output_dir.display(),
        seed,
        properties.target_size
    );

    let synthesizer = LabelSynthesizer::new(config, properties);

    let run_label = |(index, label_seed): (usize, &u64)| -> Option<Result<LabelRecord>> {
        if stop.load(Ordering::Relaxed) {
            return None;
        }
        let label_id = index as u32 + 1;
        Some(generate_label(&synthesizer, config, &output_dir, label_id, *label_seed))
    };

    let results: Vec<Option<Result<LabelRecord>>> = if config.use_parallel {
        seeds.par_iter().enumerate().map(run_label).collect()
    } else {
        seeds.iter().enumerate().map(run_label).collect()
    };

    let mut records = Vec::with_capacity(results.len());
    let mut failed = 0;
    let mut stopped = false;
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Some(Ok(record)) => records.push(record),
            Some(Err(e)) => {
                log::error!("Label {} failed: {}", index + 1, e);
                failed += 1;
            }
            None => stopped = true,
        }
    }

    if stopped {
        log::warn!("Stop requested, {} of {} labels generated", records.len(), config.num_labels);
    }

    write_metadata(&records, &output_dir)?;

    let elapsed = start_time.elapsed();
    log::info!(
        "Generated {} labels ({} failed) in {:.2} seconds",
        records.len(),
        failed,
        elapsed.as_secs_f64()
    );

    Ok(RunSummary {
        seed,
        requested: config.num_labels,
        failed,
        stopped,
        output_dir,
        target_size: properties.target_size,
        records,
        elapsed,
    })
}
