use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::measure::{measure_index, Band, CombineMethod, MeasuredIndex, SampleMethod};
use crate::config::MeasureOptions;
use crate::data::model::Spectrum;
use crate::error::{Result, SplatError};
use crate::sampler::SpectrumSampler;

/// Measured indices keyed by index name.
pub type IndexValues = BTreeMap<String, MeasuredIndex>;

/// One literature index: its bands and how they are sampled and combined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexDefinition {
    pub name: &'static str,
    pub bands: &'static [Band],
    pub method: CombineMethod,
    pub sample: SampleMethod,
}

const fn ratio(
    name: &'static str,
    bands: &'static [Band],
    sample: SampleMethod,
) -> IndexDefinition {
    IndexDefinition {
        name,
        bands,
        method: CombineMethod::Ratio,
        sample,
    }
}

const fn allers(name: &'static str, bands: &'static [Band]) -> IndexDefinition {
    IndexDefinition {
        name,
        bands,
        method: CombineMethod::Allers,
        sample: SampleMethod::Average,
    }
}

macro_rules! b {
    ($low:expr, $high:expr) => {
        Band {
            low: $low,
            high: $high,
        }
    };
}

use SampleMethod::{Average, Integrate};

static BURGASSER: [IndexDefinition; 7] = [
    ratio("H2O-J", &[b!(1.14, 1.165), b!(1.26, 1.285)], Integrate),
    ratio("CH4-J", &[b!(1.315, 1.335), b!(1.26, 1.285)], Integrate),
    ratio("H2O-H", &[b!(1.48, 1.52), b!(1.56, 1.60)], Integrate),
    ratio("CH4-H", &[b!(1.635, 1.675), b!(1.56, 1.60)], Integrate),
    ratio("H2O-K", &[b!(1.975, 1.995), b!(2.08, 2.12)], Integrate),
    ratio("CH4-K", &[b!(2.215, 2.255), b!(2.08, 2.12)], Integrate),
    ratio("K/J", &[b!(2.06, 2.10), b!(1.25, 1.29)], Integrate),
];

static TOKUNAGA: [IndexDefinition; 2] = [
    IndexDefinition {
        name: "K1",
        bands: &[b!(2.10, 2.18), b!(1.96, 2.04)],
        method: CombineMethod::Change,
        sample: Average,
    },
    IndexDefinition {
        name: "K2",
        bands: &[b!(2.20, 2.28), b!(2.10, 2.18)],
        method: CombineMethod::Change,
        sample: Average,
    },
];

static REID: [IndexDefinition; 2] = [
    ratio("H2O-A", &[b!(1.33, 1.35), b!(1.28, 1.30)], Average),
    ratio("H2O-B", &[b!(1.47, 1.49), b!(1.59, 1.61)], Average),
];

static GEBALLE: [IndexDefinition; 3] = [
    ratio("H2O-1.2", &[b!(1.26, 1.29), b!(1.13, 1.16)], Integrate),
    ratio("H2O-1.5", &[b!(1.57, 1.59), b!(1.46, 1.48)], Integrate),
    ratio("CH4-2.2", &[b!(2.08, 2.12), b!(2.215, 2.255)], Integrate),
];

// Feature band first, then the blue and red continuum bands.
static ALLERS: [IndexDefinition; 6] = [
    ratio("H2O", &[b!(1.55, 1.56), b!(1.492, 1.502)], Average),
    allers("FeH-z", &[b!(0.99135, 1.00465), b!(0.97335, 0.98665), b!(1.01535, 1.02865)]),
    allers("VO-z", &[b!(1.05095, 1.06505), b!(1.02795, 1.04205), b!(1.07995, 1.09405)]),
    allers("FeH-J", &[b!(1.19880, 1.20120), b!(1.19080, 1.19320), b!(1.20680, 1.20920)]),
    allers("KI-J", &[b!(1.23570, 1.25230), b!(1.21170, 1.22830), b!(1.26170, 1.27830)]),
    allers("H-cont", &[b!(1.54960, 1.57040), b!(1.45960, 1.48040), b!(1.65960, 1.68040)]),
];

static SLESNICK: [IndexDefinition; 3] = [
    ratio("H2O-1", &[b!(1.335, 1.345), b!(1.295, 1.304)], Average),
    ratio("H2O-2", &[b!(2.035, 2.045), b!(2.145, 2.155)], Average),
    ratio("FeH", &[b!(1.1935, 1.2065), b!(1.2235, 1.2365)], Average),
];

// ---------------------------------------------------------------------------
// IndexSet
// ---------------------------------------------------------------------------

/// A published collection of spectral indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexSet {
    Burgasser,
    Tokunaga,
    Reid,
    Geballe,
    Allers,
    Slesnick,
}

impl IndexSet {
    pub const ALL: [IndexSet; 6] = [
        IndexSet::Burgasser,
        IndexSet::Tokunaga,
        IndexSet::Reid,
        IndexSet::Geballe,
        IndexSet::Allers,
        IndexSet::Slesnick,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IndexSet::Burgasser => "burgasser",
            IndexSet::Tokunaga => "tokunaga",
            IndexSet::Reid => "reid",
            IndexSet::Geballe => "geballe",
            IndexSet::Allers => "allers",
            IndexSet::Slesnick => "slesnick",
        }
    }

    pub fn reference(self) -> &'static str {
        match self {
            IndexSet::Burgasser => "Burgasser et al. (2006)",
            IndexSet::Tokunaga => "Tokunaga & Kobayashi (1999)",
            IndexSet::Reid => "Reid et al. (2001)",
            IndexSet::Geballe => "Geballe et al. (2002)",
            IndexSet::Allers => "Allers et al. (2007) & Allers & Liu (2013)",
            IndexSet::Slesnick => "Slesnick et al. (2004)",
        }
    }

    /// Definitions in measurement order.
    pub fn definitions(self) -> &'static [IndexDefinition] {
        match self {
            IndexSet::Burgasser => &BURGASSER,
            IndexSet::Tokunaga => &TOKUNAGA,
            IndexSet::Reid => &REID,
            IndexSet::Geballe => &GEBALLE,
            IndexSet::Allers => &ALLERS,
            IndexSet::Slesnick => &SLESNICK,
        }
    }
}

impl fmt::Display for IndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndexSet {
    type Err = SplatError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        IndexSet::ALL
            .into_iter()
            .find(|set| set.name() == wanted)
            .ok_or_else(|| {
                SplatError::InvalidConfiguration(format!("unknown index set `{s}`"))
            })
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Measure every index of `set` on `spectrum`.
pub fn evaluate_set(
    spectrum: &Spectrum,
    set: IndexSet,
    options: &MeasureOptions,
) -> Result<IndexValues> {
    let sampler = spectrum.sampler()?;
    let mut rng = options.rng();
    debug!("measuring {set} indices on {spectrum}");
    evaluate_set_with(&sampler, set, options.nsamples, &mut rng)
}

/// Measure every index of `set` using a caller-supplied sampler and generator.
pub fn evaluate_set_with<R: Rng + ?Sized>(
    sampler: &SpectrumSampler,
    set: IndexSet,
    nsamples: usize,
    rng: &mut R,
) -> Result<IndexValues> {
    let mut out = IndexValues::new();
    for def in set.definitions() {
        let index = measure_index(sampler, def.bands, def.method, def.sample, nsamples, &mut *rng)?;
        debug!("{}: {index}", def.name);
        out.insert(def.name.to_string(), index);
    }
    Ok(out)
}
