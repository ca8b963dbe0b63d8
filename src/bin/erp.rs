use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use erppipe::{run_participant, BadChannelSpec, PipelineConfig};

#[derive(Parser)]
#[command(name = "erp", about = "Single-participant ERP preprocessing pipeline")]
struct Args {
    /// Continuous recording (safetensors)
    #[arg(long)]
    input: PathBuf,

    /// Behavioral log (csv/tsv), one row per trial
    #[arg(long)]
    log: PathBuf,

    /// Full pipeline config as JSON; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target sampling rate in Hz
    #[arg(long)]
    downsample: Option<f64>,

    /// Band-pass lower cutoff in Hz
    #[arg(long)]
    highpass: Option<f64>,

    /// Band-pass upper cutoff in Hz
    #[arg(long)]
    lowpass: Option<f64>,

    /// Bad channels (comma-separated); overrides automatic detection
    #[arg(long)]
    bad_channels: Option<String>,

    /// Directory for all outputs (clean, epochs, trials, evokeds, export)
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<PipelineConfig>(&text)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    if let Some(sfreq) = args.downsample {
        cfg.downsample_sfreq = Some(sfreq);
    }
    if let Some(freq) = args.highpass {
        cfg.highpass_freq = freq;
    }
    if let Some(freq) = args.lowpass {
        cfg.lowpass_freq = freq;
    }
    if let Some(list) = &args.bad_channels {
        cfg.bad_channels =
            BadChannelSpec::List(list.split(',').map(str::to_string).collect());
    }
    if let Some(dir) = &args.output {
        cfg.clean_dir = Some(dir.join("clean"));
        cfg.epochs_dir = Some(dir.join("epochs"));
        cfg.trials_dir = Some(dir.join("trials"));
        cfg.evokeds_dir = Some(dir.join("evokeds"));
        cfg.export_dir = Some(dir.join("export"));
    }

    let out = run_participant(&args.input, &args.log, &cfg)?;
    println!(
        "{} trials, {} evokeds",
        out.trials.n_rows(),
        out.evokeds.len()
    );

    Ok(())
}
