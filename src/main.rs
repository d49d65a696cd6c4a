use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::warn;
use serde::Serialize;

use rusty_splat::config::{load_config, SplatConfig};
use rusty_splat::data::loader::load_file;
use rusty_splat::{
    classify_spectrum, evaluate_set, parse_spectral_type, type_to_string, CalibrationSet, IndexSet,
    IndexValues, SpectralType, SpectralTypeEstimate, Spectrum, TypeFlags,
};

#[derive(Parser)]
#[command(name = "rusty-splat")]
#[command(about = "Spectral indices and spectral types for brown dwarf spectra")]
#[command(version)]
struct Cli {
    /// JSON options file (`{"measure": {...}, "classify": {...}}`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure an index set on each spectrum
    Indices {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// burgasser, tokunaga, reid, geballe, allers or slesnick
        #[arg(short, long, default_value = "burgasser")]
        set: IndexSet,

        /// Monte Carlo samples per index
        #[arg(short, long)]
        nsamples: Option<usize>,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Estimate spectral types from index calibrations
    Classify {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// burgasser, reid or allers
        #[arg(short, long, default_value = "burgasser")]
        calibration: CalibrationSet,

        /// Round to the nearest half subtype
        #[arg(long)]
        round: bool,

        /// Report the type as a string (e.g. L3.5:)
        #[arg(long)]
        string: bool,

        #[arg(short, long)]
        nsamples: Option<usize>,

        /// Masking rounds
        #[arg(long)]
        nloop: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Decode spectral-type strings into numbers
    Parse {
        #[arg(required = true)]
        types: Vec<String>,
    },

    /// Encode a numeric spectral type as a string
    Format {
        number: f64,

        /// Uncertainty in subtypes (adds `:` above 1, `::` above 2)
        #[arg(short, long, default_value = "0")]
        uncertainty: f64,

        #[arg(long)]
        peculiar: bool,
    },
}

#[derive(Serialize)]
struct IndexReport<'a> {
    name: &'a str,
    date: Option<&'a str>,
    set: IndexSet,
    indices: IndexValues,
}

#[derive(Serialize)]
struct TypeReport<'a> {
    name: &'a str,
    calibration: CalibrationSet,
    #[serde(flatten)]
    estimate: SpectralTypeEstimate,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SplatConfig::default(),
    };

    match cli.command {
        Commands::Indices {
            files,
            set,
            nsamples,
            seed,
        } => {
            if let Some(n) = nsamples {
                config.measure.nsamples = n;
            }
            config.measure.seed = seed.or(config.measure.seed);

            let spectra = load_all(&files)?;
            let mut reports = Vec::new();
            for sp in &spectra {
                match evaluate_set(sp, set, &config.measure) {
                    Ok(indices) => reports.push(IndexReport {
                        name: &sp.name,
                        date: sp.date.as_deref(),
                        set,
                        indices,
                    }),
                    Err(err) => warn!("{sp}: skipped, {err}"),
                }
            }
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                println!("# {set} indices, {}", set.reference());
                for report in &reports {
                    let cells: Vec<String> = report
                        .indices
                        .iter()
                        .map(|(name, m)| format!("{name}={m}"))
                        .collect();
                    println!("{}\t{}", report.name, cells.join("\t"));
                }
            }
            finish(reports.len(), spectra.len())
        }

        Commands::Classify {
            files,
            calibration,
            round,
            string,
            nsamples,
            nloop,
            seed,
        } => {
            let classify = &mut config.classify;
            classify.round |= round;
            classify.as_string |= string;
            if let Some(n) = nsamples {
                classify.nsamples = n;
            }
            if let Some(n) = nloop {
                classify.nloop = n;
            }
            classify.seed = seed.or(classify.seed);

            if calibration.index_set().is_none() {
                bail!("the {calibration} calibration has no index set to measure from spectra");
            }

            let spectra = load_all(&files)?;
            let mut reports = Vec::new();
            for sp in &spectra {
                // Each spectrum gets its own failure; the batch carries on.
                match classify_spectrum(sp, calibration, &config.classify) {
                    Ok(estimate) => reports.push(TypeReport {
                        name: &sp.name,
                        calibration,
                        estimate,
                    }),
                    Err(err) => warn!("{sp}: not classified, {err}"),
                }
            }
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    let est = &report.estimate;
                    match &est.label {
                        Some(label) => println!("{}\t{label}", report.name),
                        None => {
                            println!("{}\t{:.2} ± {:.2}", report.name, est.spt, est.uncertainty)
                        }
                    }
                }
            }
            finish(reports.len(), spectra.len())
        }

        Commands::Parse { types } => {
            let parsed: Vec<(String, SpectralType)> = types
                .into_iter()
                .filter_map(|s| match parse_spectral_type(&s) {
                    Ok(t) => Some((s, t)),
                    Err(err) => {
                        warn!("{err}");
                        None
                    }
                })
                .collect();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&parsed)?);
            } else {
                for (s, t) in &parsed {
                    println!("{s}\t{:.1}", t.number);
                }
            }
            Ok(())
        }

        Commands::Format {
            number,
            uncertainty,
            peculiar,
        } => {
            let flags = TypeFlags {
                peculiar,
                ..TypeFlags::default()
            };
            println!("{}", type_to_string(number, uncertainty, &flags)?);
            Ok(())
        }
    }
}

/// Load every file, skipping (with a warning) those that fail.
fn load_all(files: &[PathBuf]) -> Result<Vec<Spectrum>> {
    let mut spectra = Vec::new();
    for path in files {
        match load_file(path) {
            Ok(mut loaded) => spectra.append(&mut loaded),
            Err(err) => warn!("{}: {err:#}", display(path)),
        }
    }
    if spectra.is_empty() {
        bail!("no spectra could be loaded");
    }
    Ok(spectra)
}

fn finish(succeeded: usize, total: usize) -> Result<()> {
    if succeeded == 0 {
        bail!("none of the {total} spectra could be processed");
    }
    if succeeded < total {
        warn!("{} of {total} spectra skipped", total - succeeded);
    }
    Ok(())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
