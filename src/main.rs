//! isomix CLI - one posterior run from the command line.

use anyhow::{Context, Result};
use clap::Parser;
use isomix::{logging, plot, Config, MixingReport};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "isomix")]
#[command(version)]
#[command(about = "Bayesian three-source mixing model for a (δ¹⁸O, δ²H) observation")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = isomix::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Observed δ¹⁸O
    #[arg(long, allow_negative_numbers = true)]
    obs_o18: Option<f64>,

    /// Observed δ²H
    #[arg(long, allow_negative_numbers = true)]
    obs_h2: Option<f64>,

    /// σ(δ¹⁸O), at least 0.01
    #[arg(long)]
    sd_o18: Option<f64>,

    /// σ(δ²H), at least 0.1
    #[arg(long)]
    sd_h2: Option<f64>,

    /// Source S1 as O18,H2
    #[arg(long, value_parser = parse_pair, allow_hyphen_values = true)]
    s1: Option<(f64, f64)>,

    /// Source S2 as O18,H2
    #[arg(long, value_parser = parse_pair, allow_hyphen_values = true)]
    s2: Option<(f64, f64)>,

    /// Source S3 as O18,H2
    #[arg(long, value_parser = parse_pair, allow_hyphen_values = true)]
    s3: Option<(f64, f64)>,

    /// Prior draws (default 5000 or the config value)
    #[arg(short = 'n', long)]
    samples: Option<usize>,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Write the density plot to this PNG file
    #[arg(long)]
    plot: Option<PathBuf>,

    /// Print the full report, including every weighted sample, as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_pair(s: &str) -> Result<(f64, f64), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected O18,H2 but got '{s}'"))?;
    let o18 = a.trim().parse::<f64>().map_err(|e| format!("δ¹⁸O '{a}': {e}"))?;
    let h2 = b.trim().parse::<f64>().map_err(|e| format!("δ²H '{b}': {e}"))?;
    Ok((o18, h2))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(if cli.verbose { "debug" } else { "info" });

    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let mut inputs = config.defaults.clone();
    if let Some(v) = cli.obs_o18 {
        inputs.obs_o18 = v;
    }
    if let Some(v) = cli.obs_h2 {
        inputs.obs_h2 = v;
    }
    if let Some(v) = cli.sd_o18 {
        inputs.sd_o18 = v;
    }
    if let Some(v) = cli.sd_h2 {
        inputs.sd_h2 = v;
    }
    for (idx, pair) in [cli.s1, cli.s2, cli.s3].into_iter().enumerate() {
        if let Some((o18, h2)) = pair {
            inputs.set_source(idx, o18, h2)?;
        }
    }

    let mut settings = config.run_settings();
    if let Some(n) = cli.samples {
        settings.sample_count = n;
    }
    settings.include_frame = cli.json;

    let mut rng = match cli.seed.or(config.inference.seed) {
        Some(seed) => {
            info!(seed, "using fixed seed");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let report = match MixingReport::run(&inputs, settings, &mut rng) {
        Ok(report) => report,
        Err(e) => {
            warn!(kind = e.kind(), "run aborted");
            return Err(e.into());
        }
    };

    if let Some(path) = &cli.plot {
        plot::save_png(&report.curves, path)
            .with_context(|| format!("writing plot to {}", path.display()))?;
        info!(path = %path.display(), "wrote density plot");
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.summary);
    }

    Ok(())
}
