use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Monte Carlo draws per index when nothing else is configured.
pub const DEFAULT_NSAMPLES: usize = 100;

/// Masking rounds of the spectral-type estimator.
pub const DEFAULT_NLOOP: usize = 5;

// ---------------------------------------------------------------------------
// Index measurement options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureOptions {
    /// Monte Carlo trials per index (also the number of grid intervals per band).
    pub nsamples: usize,
    /// Fixed seed for reproducible draws; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for MeasureOptions {
    fn default() -> Self {
        Self {
            nsamples: DEFAULT_NSAMPLES,
            seed: None,
        }
    }
}

impl MeasureOptions {
    pub fn rng(&self) -> StdRng {
        seeded_rng(self.seed)
    }
}

// ---------------------------------------------------------------------------
// Classification options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyOptions {
    /// Round the final type to the nearest half subtype.
    pub round: bool,
    /// Also render the final type as a string such as `L3.5:`.
    pub as_string: bool,
    /// Draws used to push index uncertainty through each calibration.
    pub nsamples: usize,
    /// Number of masking rounds. There is no early exit.
    pub nloop: usize,
    pub seed: Option<u64>,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            round: false,
            as_string: false,
            nsamples: DEFAULT_NSAMPLES,
            nloop: DEFAULT_NLOOP,
            seed: None,
        }
    }
}

impl ClassifyOptions {
    pub fn rng(&self) -> StdRng {
        seeded_rng(self.seed)
    }

    /// Measurement options sharing this call's sample count and seed.
    pub fn measure_options(&self) -> MeasureOptions {
        MeasureOptions {
            nsamples: self.nsamples,
            seed: self.seed,
        }
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

// ---------------------------------------------------------------------------
// Config file
// ---------------------------------------------------------------------------

/// Options file read by the CLI:
///
/// ```json
/// { "measure": { "nsamples": 200 }, "classify": { "nloop": 5, "round": true } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplatConfig {
    pub measure: MeasureOptions,
    pub classify: ClassifyOptions,
}

pub fn load_config(path: &Path) -> Result<SplatConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}
