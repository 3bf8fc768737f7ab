use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};

use rusty_prep::{methods, Configuration, Dataset, Domain, FoldEngine, ParamSet, ParamValue};

/// Apply a preprocessing method to every fold of a JSON dataset.
#[derive(Parser, Debug)]
#[command(name = "rusty-prep", version, about)]
struct Cli {
    /// Processor name, e.g. als-baseline, savgol, cut-range
    method: String,

    /// Dataset to read (JSON object of folds)
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the processed dataset
    #[arg(short, long)]
    output: PathBuf,

    /// Configuration file (JSON, naming a domain or whitelist); replaces --domain/--layout
    #[arg(long, conflicts_with_all = ["domain", "layout"])]
    config: Option<PathBuf>,

    /// Measurement domain whose field names to use
    #[arg(long, value_enum)]
    domain: Option<DomainArg>,

    /// Field layout preset for --domain
    #[arg(long, value_enum, requires = "domain")]
    layout: Option<Layout>,

    /// Parameter override, repeatable
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_override)]
    overrides: Vec<(String, ParamValue)>,

    /// Process folds on the rayon thread pool
    #[arg(long)]
    parallel: bool,

    /// Skip failing folds instead of aborting
    #[arg(long)]
    keep_going: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum DomainArg {
    Ftir,
    Nmr,
    Calorimetry,
}

impl From<DomainArg> for Domain {
    fn from(arg: DomainArg) -> Self {
        match arg {
            DomainArg::Ftir => Domain::Ftir,
            DomainArg::Nmr => Domain::Nmr,
            DomainArg::Calorimetry => Domain::Calorimetry,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
enum Layout {
    #[default]
    Single,
    Multi,
    Paired,
}

fn parse_override(s: &str) -> Result<(String, ParamValue), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{s}'"));
    }
    Ok((key.to_string(), ParamValue::parse_literal(value)))
}

// ---------------------------------------------------------------------------
// I/O
// ---------------------------------------------------------------------------

fn read_dataset(path: &Path) -> Result<Dataset> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing dataset {}", path.display()))
}

fn read_configuration(path: &Path) -> Result<Configuration> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing configuration {}", path.display()))
}

fn write_dataset(path: &Path, dataset: &Dataset) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), dataset)
        .with_context(|| format!("writing {}", path.display()))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let Some(processor) = methods::by_name(&cli.method) else {
        bail!(
            "unknown method '{}' (available: {})",
            cli.method,
            methods::names().join(", ")
        );
    };

    let configuration = match (&cli.config, cli.domain) {
        (Some(path), _) => read_configuration(path)?,
        (None, Some(domain)) => {
            let domain = Domain::from(domain);
            match cli.layout.unwrap_or_default() {
                Layout::Single => domain.single(),
                Layout::Multi => domain.multi(),
                Layout::Paired => domain.paired(),
            }
        }
        (None, None) => processor.default_configuration(),
    };

    let overrides: ParamSet = cli
        .overrides
        .iter()
        .map(|(k, v)| (k.as_str(), v.clone()))
        .collect();

    let dataset = read_dataset(&cli.input)?;
    info!("loaded {} folds from {}", dataset.len(), cli.input.display());

    let engine = FoldEngine::new().parallel(cli.parallel);
    let processed = if cli.keep_going {
        let partial = engine.run_partial(processor.as_ref(), &configuration, &dataset, &overrides)?;
        if !partial.failures.is_empty() {
            warn!("{} of {} folds failed", partial.failures.len(), dataset.len());
        }
        partial.dataset
    } else {
        engine
            .run(processor.as_ref(), &configuration, &dataset, &overrides)
            .with_context(|| format!("running {}", cli.method))?
    };

    write_dataset(&cli.output, &processed)?;
    info!("wrote {} folds to {}", processed.len(), cli.output.display());
    Ok(())
}
