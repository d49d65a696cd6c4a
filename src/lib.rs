//! Spectral indices and spectral-type classification for brown dwarf and
//! cool-star spectra.
//!
//! ```no_run
//! use rusty_splat::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let spectrum = &load_file(Path::new("spex_prism_0036+1821_040907.txt"))?[0];
//! let indices = evaluate_set(spectrum, IndexSet::Burgasser, &MeasureOptions::default())?;
//! let options = ClassifyOptions { as_string: true, round: true, ..Default::default() };
//! let spt = estimate_spectral_type(&indices, CalibrationSet::Burgasser, &options)?;
//! println!("{}: {:?} ± {:.1}", spectrum.name, spt.label, spt.uncertainty);
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod config;
pub mod data;
pub mod error;
pub mod index;
pub mod sampler;
pub mod spt;

pub use crate::classify::{
    classify_spectrum, estimate_spectral_type, CalibrationSet, SpectralTypeEstimate,
};
pub use crate::data::model::Spectrum;
pub use crate::error::{Result, SplatError};
pub use crate::index::{evaluate_set, measure_index, IndexSet, IndexValues, MeasuredIndex};
pub use crate::sampler::SpectrumSampler;
pub use crate::spt::{parse_spectral_type, type_to_string, SpectralType, TypeFlags};

/// Common imports for scripts.
pub mod prelude {
    pub use crate::classify::{classify_spectrum, estimate_spectral_type, CalibrationSet};
    pub use crate::config::{ClassifyOptions, MeasureOptions};
    pub use crate::data::loader::load_file;
    pub use crate::data::model::Spectrum;
    pub use crate::index::{evaluate_set, IndexSet};
    pub use crate::spt::{parse_spectral_type, type_to_string};
}
