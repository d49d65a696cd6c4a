/// Spectral-type classification from measured indices.
///
/// `calibration` holds the published polynomial tables; `estimator` runs the
/// masked weighted average over them.

pub mod calibration;
pub mod estimator;

pub use calibration::{Calibration, CalibrationFit, CalibrationSet};
pub use estimator::{
    classify_spectrum, estimate_spectral_type, estimate_with, EntryState, Phase,
    SpectralTypeEstimate, SpectralTypeEstimator,
};
