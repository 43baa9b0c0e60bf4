//! # lottie-optimizer
//!
//! Shrinks Lottie files and composition scene graphs without changing what
//! they draw.
//!
//! ## Commands
//! - `reduce`: keyframe, gradient and precomp reductions on a Lottie file
//! - `merge`: merge layers that never overlap in time
//! - `compact`: run the scene optimizer over a scene document
//! - `stats`: print the size of a scene document

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Settings;
use lottie_core::optimization::merge_layers;
use lottie_core::reduce_composition;
use lottie_data::model::LottieJson;
use scene_core::{optimize, SceneDocument, Stats};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "lottie-optimizer")]
#[command(about = "Optimizing compiler for Lottie animations")]
#[command(version)]
struct Cli {
    /// JSON settings file with optional `reduction` and `optimizer` sections
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reduce keyframes, gradient stops and repeated precomps
    Reduce {
        input: PathBuf,

        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also merge layers that never overlap in time
        #[arg(long)]
        merge_layers: bool,
    },

    /// Merge layers that never overlap in time
    Merge {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Canonicalize and compact a scene document
    Compact {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the before/after report to stderr
        #[arg(long)]
        report: bool,
    },

    /// Print object, animator and key frame counts of a scene document
    Stats { input: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lottie_optimizer=info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Reduce {
            input,
            output,
            merge_layers,
        } => cmd_reduce(&input, output.as_deref(), merge_layers, &settings),
        Commands::Merge { input, output } => cmd_merge(&input, output.as_deref(), &settings),
        Commands::Compact {
            input,
            output,
            report,
        } => cmd_compact(&input, output.as_deref(), report, &settings),
        Commands::Stats { input } => cmd_stats(&input),
    }
}

fn read_lottie(path: &Path) -> Result<LottieJson> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing Lottie file {}", path.display()))
}

fn read_scene(path: &Path) -> Result<SceneDocument> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    SceneDocument::from_json(&text).with_context(|| format!("parsing scene document {}", path.display()))
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string(value).context("serializing output")?;
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

fn cmd_reduce(input: &Path, output: Option<&Path>, merge: bool, settings: &Settings) -> Result<()> {
    let mut lottie = read_lottie(input)?;
    let mut config = settings.reduction.clone();
    config.merge_layers |= merge;

    let stats = reduce_composition(&mut lottie, &config)
        .with_context(|| format!("reducing {}", input.display()))?;
    info!(
        layers_before = stats.layers_before,
        layers_after = stats.layers_after,
        keyframes_before = stats.keyframes_before,
        keyframes_after = stats.keyframes_after,
        gradient_stops_before = stats.gradient_stops_before,
        gradient_stops_after = stats.gradient_stops_after,
        precomps_collapsed = stats.precomps_collapsed,
        "reduced {}",
        input.display()
    );
    write_json(&lottie, output)
}

fn cmd_merge(input: &Path, output: Option<&Path>, settings: &Settings) -> Result<()> {
    let mut lottie = read_lottie(input)?;
    let merged = merge_layers(&mut lottie, &settings.reduction.merge)
        .with_context(|| format!("merging layers of {}", input.display()))?;
    info!(merged, layers = lottie.layers.len(), "merged {}", input.display());
    write_json(&lottie, output)
}

fn cmd_compact(input: &Path, output: Option<&Path>, report: bool, settings: &Settings) -> Result<()> {
    let SceneDocument { root, mut scene } = read_scene(input)?;
    let result = optimize(&mut scene, root, &settings.optimizer)
        .with_context(|| format!("optimizing {}", input.display()))?;
    info!(
        objects_before = result.before.objects,
        objects_after = result.after.objects,
        collected = result.collected,
        "compacted {}",
        input.display()
    );
    if report {
        eprintln!("{}", serde_json::to_string_pretty(&result)?);
    }
    write_json(
        &SceneDocument {
            root: result.root,
            scene,
        },
        output,
    )
}

fn cmd_stats(input: &Path) -> Result<()> {
    let SceneDocument { root, scene } = read_scene(input)?;
    let stats = Stats::of(&scene, root).context("walking the scene")?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
