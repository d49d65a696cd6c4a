//! Error types for index measurement and spectral-type classification.

/// Errors reported by the measurement and classification core.
///
/// Every failure is surfaced as one of these variants; the core never hands
/// back a `NaN` in place of a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplatError {
    /// Wrong band count for a method, unknown set or calibration name, or a
    /// nonsensical option such as zero Monte Carlo samples.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A spectral-type string did not contain exactly one class letter.
    #[error("unparseable spectral type `{0}`")]
    UnparseableSpectralType(String),

    /// A numeric spectral type outside the K0–Y9 table.
    #[error("spectral type number {0} is outside 0 (K0) .. 49 (Y9)")]
    OutOfRangeSpectralType(f64),

    /// Every calibration entry was masked out of its valid range.
    #[error("indices incompatible with any {calibration} calibration range")]
    ConvergenceFailure {
        /// Calibration set being applied.
        calibration: &'static str,
    },

    /// Wavelength/flux/noise data that cannot be sampled.
    #[error("invalid spectrum: {0}")]
    InvalidSpectrum(String),

    /// An index band reaches past the wavelength coverage of the spectrum.
    #[error(
        "band {low}..{high} lies outside the spectrum coverage {min}..{max}"
    )]
    BandOutsideSpectrum {
        low: f64,
        high: f64,
        min: f64,
        max: f64,
    },

    /// The combined index is not a finite number, e.g. a band reduced to
    /// zero flux and ended up in a denominator.
    #[error(
        "{method} index is undefined on this spectrum (value {value}, uncertainty {uncertainty})"
    )]
    DegenerateIndex {
        method: &'static str,
        value: f64,
        uncertainty: f64,
    },
}

impl SplatError {
    /// Whether the failure concerns a single spectrum's data rather than the
    /// caller's setup. Batch callers can skip the spectrum and continue.
    pub fn is_per_spectrum(&self) -> bool {
        matches!(
            self,
            SplatError::ConvergenceFailure { .. }
                | SplatError::InvalidSpectrum(_)
                | SplatError::BandOutsideSpectrum { .. }
                | SplatError::DegenerateIndex { .. }
        )
    }
}

/// Convenient result alias for the core.
pub type Result<T> = std::result::Result<T, SplatError>;
