use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use cmbeat_lib::{
    config::{DetectionParams, DetectorConfig},
    detectors::beats::detect_heartbeats,
    envelope::EnvelopeMethod,
    signal::TimeSeries,
};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

mod input;

#[derive(Parser)]
#[command(
    name = "cmbeat",
    version,
    about = "Template-matching heartbeat detection for SCG/GCG/PCG and pulse-wave recordings"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum EnvelopeArg {
    #[value(name = "power-lowpass")]
    PowerLowpass,
    #[value(name = "analytic")]
    Analytic,
}

#[derive(Args)]
struct SignalArgs {
    /// Sampling rate of the recording (Hz)
    #[arg(long)]
    fs: f64,
    /// Newline-delimited samples (stdin when omitted)
    #[arg(long)]
    input: Option<PathBuf>,
    /// Read this column of a headed CSV instead of one value per line
    #[arg(long)]
    column: Option<String>,
    /// TOML detector configuration; flags below take precedence
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    time_window_s: Option<f64>,
    #[arg(long)]
    pre_s: Option<f64>,
    #[arg(long)]
    post_s: Option<f64>,
    #[arg(long)]
    envelope: Option<EnvelopeArg>,
    #[arg(long)]
    envelope_min_prominence: Option<f64>,
    #[arg(long)]
    ncc_min_prominence: Option<f64>,
    /// Minimum beat spacing in samples (default: half the sampling rate)
    #[arg(long)]
    ncc_min_distance: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Select a template and detect every heartbeat; prints the full result as JSON
    Detect {
        #[command(flatten)]
        signal: SignalArgs,
        /// Leave the correlation trace out of the output
        #[arg(long)]
        no_trace: bool,
    },
    /// Only report the automatically selected template
    Template {
        #[command(flatten)]
        signal: SignalArgs,
    },
}

#[derive(Serialize)]
struct TemplateOutput {
    template: Vec<f64>,
    template_window: Vec<usize>,
    params: DetectionParams,
    message: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Detect { signal, no_trace } => cmd_detect(&signal, no_trace)?,
        Commands::Template { signal } => cmd_template(&signal)?,
    }
    Ok(())
}

fn build_config(args: &SignalArgs) -> Result<DetectorConfig> {
    let mut cfg = match args.config.as_deref() {
        Some(path) => input::load_config(path)?,
        None => DetectorConfig::default(),
    };
    if let Some(v) = args.time_window_s {
        cfg.time_window_s = v;
    }
    if let Some(v) = args.pre_s {
        cfg.pre_s = v;
    }
    if let Some(v) = args.post_s {
        cfg.post_s = v;
    }
    match args.envelope {
        Some(EnvelopeArg::Analytic) => cfg.envelope = EnvelopeMethod::AnalyticMagnitude,
        Some(EnvelopeArg::PowerLowpass) => {
            if !matches!(cfg.envelope, EnvelopeMethod::PowerLowpass { .. }) {
                cfg.envelope = EnvelopeMethod::default();
            }
        }
        None => {}
    }
    if let Some(v) = args.envelope_min_prominence {
        cfg.envelope_min_prominence = v;
    }
    if let Some(v) = args.ncc_min_prominence {
        cfg.ncc_min_prominence = v;
    }
    if args.ncc_min_distance.is_some() {
        cfg.ncc_min_distance_samples = args.ncc_min_distance;
    }
    Ok(cfg)
}

fn load_time_series(args: &SignalArgs) -> Result<TimeSeries> {
    let data = input::read_samples(args.input.as_deref(), args.column.as_deref())?;
    info!(
        "loaded {} samples from {}",
        data.len(),
        args.input
            .as_deref()
            .map(Path::display)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "stdin".into())
    );
    Ok(TimeSeries::new(args.fs, data))
}

fn cmd_detect(args: &SignalArgs, no_trace: bool) -> Result<()> {
    let cfg = build_config(args)?;
    let ts = load_time_series(args)?;
    let mut result = detect_heartbeats(&ts, &cfg)?;
    if no_trace {
        result.ncc_trace.clear();
    }
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn cmd_template(args: &SignalArgs) -> Result<()> {
    let cfg = build_config(args)?;
    let ts = load_time_series(args)?;
    let result = detect_heartbeats(&ts, &cfg)?;
    let out = TemplateOutput {
        template: result.template,
        template_window: result.template_window,
        params: result.params,
        message: result.message,
    };
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}
