//! `upsample` CLI - Preview super-resolution training patches and manage configs.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use upsample::config::{
    self, ConfigStore, ConfigValue, Configuration, LoadOptions, TrainingParams,
};
use upsample::dataset::{DatasetFactory, DownsampleOptions, SourceDescriptor, HR_KEY, LR_KEY};
use upsample::image::{save_image, ResizeMethod};

/// Build low/high resolution patch pairs for super-resolution training.
#[derive(Parser, Debug)]
#[command(name = "upsample")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract random patches from an image and write each pair as image files.
    Patches(PatchesArgs),

    /// Manage the training config stored in a model directory.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
struct PatchesArgs {
    /// Source image path.
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Directory the patch previews are written to.
    #[arg(value_name = "OUTPUT_DIR")]
    output: PathBuf,

    /// Model directory whose saved config provides the defaults.
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// Number of patch pairs to write.
    #[arg(short = 'n', long, default_value = "16", value_name = "INT")]
    count: usize,

    /// File format of the previews.
    #[arg(short, long, value_enum, default_value_t = PreviewFormat::Png)]
    format: PreviewFormat,

    /// JPEG quality (1-100). Ignored for PNG previews.
    #[arg(
        short,
        long,
        default_value = "95",
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    quality: u8,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a config built from the defaults and the given overrides.
    Init {
        /// Model directory to write the config into.
        #[arg(value_name = "MODEL_DIR")]
        model_dir: PathBuf,

        /// Overwrite an existing config.
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Print the config stored in a model directory.
    Show {
        /// Model directory to read the config from.
        #[arg(value_name = "MODEL_DIR")]
        model_dir: PathBuf,

        /// Print the stored entries without checking them against the defaults.
        #[arg(long)]
        no_validate: bool,
    },
}

/// Image format used for patch previews.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PreviewFormat {
    Png,
    Jpg,
}

impl PreviewFormat {
    const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
        }
    }
}

/// File name of one side (`hr` or `lr`) of the `index`-th preview pair.
fn preview_path(output: &Path, index: usize, side: &str, format: PreviewFormat) -> PathBuf {
    output.join(format!("patch_{index:04}_{side}.{}", format.extension()))
}

/// Parameters given on the command line. They win over any saved config.
#[derive(Args, Debug)]
struct Overrides {
    /// Side length of the square high-resolution patches.
    #[arg(short, long, value_name = "INT")]
    patch_size: Option<usize>,

    /// Downsampling factor for the low-resolution companion (0.0-1.0].
    #[arg(short, long, value_name = "FLOAT")]
    scale: Option<f64>,

    /// Interpolation: bilinear, nearest_neighbor, bicubic or area.
    #[arg(short, long, value_name = "NAME")]
    method: Option<ResizeMethod>,

    /// Random seed for patch positions.
    #[arg(long, value_name = "INT")]
    seed: Option<u64>,
}

impl Overrides {
    fn to_config(&self) -> Result<Configuration> {
        let mut overrides = Configuration::new();
        if let Some(patch_size) = self.patch_size {
            let patch_size = i64::try_from(patch_size).context("Patch size is too large")?;
            overrides.insert(config::PATCH_SIZE, ConfigValue::Int(patch_size));
        }
        if let Some(scale) = self.scale {
            overrides.insert(config::SCALE, ConfigValue::Float(scale));
        }
        if let Some(method) = self.method {
            overrides.insert(config::DOWNSAMPLE_METHOD, ConfigValue::from(method.name()));
        }
        if let Some(seed) = self.seed {
            overrides.insert(config::SEED, config::seed_value(seed));
        }
        Ok(overrides)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("upsample={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let result = match &cli.command {
        Command::Patches(args) => run_patches(args),
        Command::Config(ConfigCommand::Init {
            model_dir,
            force,
            overrides,
        }) => run_config_init(model_dir, *force, overrides),
        Command::Config(ConfigCommand::Show {
            model_dir,
            no_validate,
        }) => run_config_show(model_dir, *no_validate),
    };

    if let Err(err) = result {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Command line overrides, then the saved config, then the defaults.
fn resolve_params(model_dir: Option<&Path>, overrides: &Overrides) -> Result<TrainingParams> {
    let defaults = config::defaults();

    let stored = match model_dir {
        Some(dir) => {
            let options = LoadOptions::validated_against(defaults.clone())
                .relax(config::RELAXED_KEYS.iter().copied());
            ConfigStore::new(dir)
                .load(&options)
                .context("Failed to load config")?
        }
        None => None,
    };

    let cli = overrides.to_config()?;
    let merged = config::merge([Some(&cli), stored.as_ref(), Some(&defaults)]);

    TrainingParams::from_config(&merged).context("Invalid training parameters")
}

fn run_patches(args: &PatchesArgs) -> Result<()> {
    // Validate input file exists
    if !args.image.exists() {
        anyhow::bail!("Input file does not exist: {}", args.image.display());
    }

    let params = resolve_params(args.model_dir.as_deref(), &args.overrides)?;
    tracing::info!("Using parameters: {params:?}");

    let base_dir = args.image.parent().unwrap_or_else(|| Path::new("."));
    let factory = DatasetFactory::from_params(base_dir, &params)?;
    let patches = factory
        .patches(&SourceDescriptor::new(&args.image), HR_KEY)
        .context("Failed to extract patches")?;
    let pairs = factory.add_downsampled(patches, &DownsampleOptions::from_params(&params))?;

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let pb = ProgressBar::new(args.count as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Writing patches [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("#>-"),
    );

    for (index, pair) in pairs.take(args.count).enumerate() {
        let pair = pair.context("Failed to downsample patch")?;
        for (side, key) in [("hr", HR_KEY), ("lr", LR_KEY)] {
            save_image(
                pair.require(key)?,
                preview_path(&args.output, index, side, args.format),
                args.quality,
            )?;
        }
        pb.inc(1);
    }

    pb.finish_with_message("Patches written");

    println!(
        "Successfully wrote {} patch pairs from {} -> {}",
        args.count,
        args.image.display(),
        args.output.display()
    );

    Ok(())
}

fn run_config_init(model_dir: &Path, force: bool, overrides: &Overrides) -> Result<()> {
    let store = ConfigStore::new(model_dir);
    if store.exists() && !force {
        anyhow::bail!(
            "Config already exists at {}, pass --force to overwrite",
            store.path().display()
        );
    }

    let cli = overrides.to_config()?;
    let merged = config::merge([Some(&cli), Some(&config::defaults())]);
    let params = TrainingParams::from_config(&merged).context("Invalid training parameters")?;

    store
        .save(&params.to_config(), &[] as &[&str])
        .context("Failed to save config")?;

    println!("Wrote config to {}", store.path().display());
    Ok(())
}

fn run_config_show(model_dir: &Path, no_validate: bool) -> Result<()> {
    let options = if no_validate {
        LoadOptions::unvalidated()
    } else {
        LoadOptions::validated_against(config::defaults())
            .relax(config::RELAXED_KEYS.iter().copied())
    };

    let store = ConfigStore::new(model_dir);
    match store.load(&options).context("Failed to load config")? {
        Some(stored) => {
            for (key, value) in &stored {
                println!("{key} = {value}");
            }
        }
        None => println!("No valid config in {}", model_dir.display()),
    }

    Ok(())
}
