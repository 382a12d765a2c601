use std::path::Path;
use std::sync::atomic::AtomicBool;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use label_synth::{generate_all_labels, Config, OutputFormat};

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "label_synth - synthetic instrument label images for OCR training")]
struct Args {
    /// Path to configuration file (TOML, or JSON with a .json extension)
    #[clap(short, long, default_value = "config.toml")]
    config: String,

    /// Path to output directory (overrides config)
    #[clap(short, long)]
    output: Option<String>,

    /// Number of labels to generate (overrides config)
    #[clap(short = 'n', long)]
    count: Option<u32>,

    /// Run seed for reproducible output (overrides config)
    #[clap(short, long)]
    seed: Option<u64>,

    /// Image format (overrides config)
    #[clap(short, long)]
    format: Option<FormatArg>,

    /// Generate labels one after another instead of in parallel
    #[clap(long)]
    sequential: bool,

    /// Write the default configuration to the config path and exit
    #[clap(long)]
    write_default_config: bool,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Png,
    Jpg,
    Tiff,
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .init();
}

/// Main function
fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(args.debug);

    if args.write_default_config {
        Config::default()
            .save_to_file(&args.config)
            .with_context(|| format!("writing default configuration to {}", args.config))?;
        log::info!("Default configuration written to {}", args.config);
        return Ok(());
    }

    // Load configuration
    let mut config = if Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        log::warn!("Config file {} not found, using defaults", args.config);
        Config::default()
    };

    // Override config with command-line arguments
    if let Some(output) = args.output {
        config.output_dir = output;
    }

    if let Some(count) = args.count {
        config.num_labels = count;
    }

    if args.seed.is_some() {
        config.seed = args.seed;
    }

    if let Some(format) = args.format {
        config.output_format = match format {
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Jpg => OutputFormat::Jpg,
            FormatArg::Tiff => OutputFormat::Tiff,
        };
    }

    if args.sequential {
        config.use_parallel = false;
    }

    // Validate configuration
    config.validate()?;

    let stop = AtomicBool::new(false);
    let summary = generate_all_labels(&config, &stop).context("label generation failed")?;

    println!(
        "Generated {} of {} labels in {} ({:.2} seconds, seed {})",
        summary.generated(),
        summary.requested,
        summary.output_dir.display(),
        summary.elapsed.as_secs_f64(),
        summary.seed
    );

    if summary.failed > 0 {
        anyhow::bail!("{} labels failed", summary.failed);
    }

    Ok(())
}
