//! latbench command line: run the benchmark matrix or summarize its tables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use latbench::{
    analysis, BitTier, CsvSink, HarnessConfig, PolyBackendKind, SchemeBackendKind, SecurityTier,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "latbench")]
#[command(about = "Benchmark NTT polynomial arithmetic and BFV schemes across backends")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Phase {
    Poly,
    Scheme,
    All,
}

#[derive(Subcommand)]
enum Command {
    /// Run the (repetition × backend × tier) matrix and append result rows
    Run {
        /// TOML file with harness settings; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "all")]
        only: Phase,

        #[arg(short, long)]
        repetitions: Option<usize>,

        /// Polynomials per operand batch
        #[arg(short, long)]
        batch_size: Option<usize>,

        #[arg(long)]
        poly_degree: Option<usize>,

        #[arg(long)]
        scheme_degree: Option<usize>,

        /// Comma-separated, e.g. 14,30,60
        #[arg(long, value_delimiter = ',')]
        bit_tiers: Option<Vec<BitTier>>,

        #[arg(long, value_delimiter = ',')]
        security_tiers: Option<Vec<SecurityTier>>,

        #[arg(long, value_enum, value_delimiter = ',')]
        poly_backends: Option<Vec<PolyBackendKind>>,

        #[arg(long, value_enum, value_delimiter = ',')]
        scheme_backends: Option<Vec<SchemeBackendKind>>,

        #[arg(long)]
        seed: Option<u64>,

        /// Skip round-trip and decryption checks
        #[arg(long)]
        no_verify: bool,

        #[arg(long)]
        poly_output: Option<PathBuf>,

        #[arg(long)]
        scheme_output: Option<PathBuf>,
    },

    /// Mean and standard deviation per (library, tier) of existing tables
    Summarize {
        #[arg(long, default_value = "statistics.csv")]
        poly_input: PathBuf,

        #[arg(long, default_value = "he_schemes.csv")]
        scheme_input: PathBuf,

        /// Directory receiving poly_summary.csv and scheme_summary.csv
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("latbench=info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            only,
            repetitions,
            batch_size,
            poly_degree,
            scheme_degree,
            bit_tiers,
            security_tiers,
            poly_backends,
            scheme_backends,
            seed,
            no_verify,
            poly_output,
            scheme_output,
        } => {
            let mut cfg = match &config {
                Some(path) => HarnessConfig::load(path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => HarnessConfig::default(),
            };
            if let Some(v) = repetitions {
                cfg.repetitions = v;
            }
            if let Some(v) = batch_size {
                cfg.batch_size = v;
            }
            if let Some(v) = poly_degree {
                cfg.poly_degree = v;
            }
            if let Some(v) = scheme_degree {
                cfg.scheme_degree = v;
            }
            if let Some(v) = bit_tiers {
                cfg.bit_tiers = v;
            }
            if let Some(v) = security_tiers {
                cfg.security_tiers = v;
            }
            if let Some(v) = poly_backends {
                cfg.poly_backends = v;
            }
            if let Some(v) = scheme_backends {
                cfg.scheme_backends = v;
            }
            if let Some(v) = seed {
                cfg.seed = v;
            }
            if no_verify {
                cfg.verify = false;
            }
            if let Some(v) = poly_output {
                cfg.poly_output = v;
            }
            if let Some(v) = scheme_output {
                cfg.scheme_output = v;
            }
            match only {
                Phase::Poly => cfg.scheme_backends.clear(),
                Phase::Scheme => cfg.poly_backends.clear(),
                Phase::All => {}
            }
            run(&cfg)
        }
        Command::Summarize {
            poly_input,
            scheme_input,
            out_dir,
        } => summarize(&poly_input, &scheme_input, &out_dir),
    }
}

fn run(cfg: &HarnessConfig) -> Result<()> {
    let runner = cfg.runner().context("invalid configuration")?;
    let mut sink = CsvSink::new(&cfg.poly_output, &cfg.scheme_output);
    info!(
        repetitions = cfg.repetitions,
        batch = cfg.batch_size,
        poly_degree = cfg.poly_degree,
        scheme_degree = cfg.scheme_degree,
        "starting run"
    );
    let summary = runner.run_all(&mut sink).context("benchmark run aborted")?;
    info!(
        written = summary.written,
        skipped = summary.skipped,
        failed = summary.failed,
        "run finished"
    );
    Ok(())
}

fn summarize(poly_input: &Path, scheme_input: &Path, out_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;
    if poly_input.exists() {
        let groups = analysis::summarize_poly(poly_input)
            .with_context(|| format!("reading {}", poly_input.display()))?;
        let out = out_dir.join("poly_summary.csv");
        analysis::write_poly_summary(&out, &groups)?;
        info!(groups = groups.len(), path = %out.display(), "polynomial summary written");
    }
    if scheme_input.exists() {
        let groups = analysis::summarize_scheme(scheme_input)
            .with_context(|| format!("reading {}", scheme_input.display()))?;
        let out = out_dir.join("scheme_summary.csv");
        analysis::write_scheme_summary(&out, &groups)?;
        info!(groups = groups.len(), path = %out.display(), "scheme summary written");
    }
    Ok(())
}
