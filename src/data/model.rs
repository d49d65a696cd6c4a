use std::fmt;

use serde::Serialize;

use crate::error::{Result, SplatError};
use crate::sampler::SpectrumSampler;

/// Wavelength window (micron) whose peak flux sets the normalisation.
pub const NORMALIZE_WINDOW: (f64, f64) = (0.8, 2.3);

// ---------------------------------------------------------------------------
// Spectrum – one wavelength/flux/noise triple
// ---------------------------------------------------------------------------

/// A single spectrum.
///
/// `noise` is missing (`NaN`) wherever the source reported zero or a
/// non-finite value, so a missing error bar is never mistaken for a perfect
/// measurement.
#[derive(Debug, Clone, Serialize)]
pub struct Spectrum {
    /// Source name (from the file name or the record).
    pub name: String,
    /// Observation date when the file name carries one, e.g. `2004 Sep 07`.
    pub date: Option<String>,
    /// Wavelength axis in micron, increasing.
    pub wave: Vec<f64>,
    /// Flux density – same length as `wave`.
    pub flux: Vec<f64>,
    /// Flux uncertainty – same length as `wave`.
    pub noise: Vec<f64>,
}

impl Spectrum {
    /// Build a spectrum, checking lengths and sanitising the noise channel.
    /// `None` noise means the source had no uncertainty column.
    pub fn new(
        name: impl Into<String>,
        wave: Vec<f64>,
        flux: Vec<f64>,
        noise: Option<Vec<f64>>,
    ) -> Result<Self> {
        let noise = noise.unwrap_or_else(|| vec![f64::NAN; wave.len()]);
        if wave.len() != flux.len() || wave.len() != noise.len() {
            return Err(SplatError::InvalidSpectrum(format!(
                "wave has {} values but flux has {} and noise {}",
                wave.len(),
                flux.len(),
                noise.len()
            )));
        }
        let noise = noise
            .into_iter()
            .map(|n| if n.is_finite() && n != 0.0 { n } else { f64::NAN })
            .collect();

        Ok(Self {
            name: name.into(),
            date: None,
            wave,
            flux,
            noise,
        })
    }

    pub fn with_date(mut self, date: Option<String>) -> Self {
        self.date = date;
        self
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.wave.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wave.is_empty()
    }

    /// Whether any noise value survived sanitising.
    pub fn has_noise(&self) -> bool {
        self.noise.iter().any(|n| n.is_finite())
    }

    /// Wavelength range over positive flux, `None` if there is none.
    pub fn wave_range(&self) -> Option<(f64, f64)> {
        self.wave
            .iter()
            .zip(&self.flux)
            .filter(|(w, f)| w.is_finite() && **f > 0.0)
            .fold(None, |acc, (&w, _)| match acc {
                None => Some((w, w)),
                Some((lo, hi)) => Some((lo.min(w), hi.max(w))),
            })
    }

    /// Multiply flux and noise by `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.flux.iter_mut().for_each(|f| *f *= factor);
        self.noise.iter_mut().for_each(|n| *n *= factor);
    }

    /// Scale so the peak flux inside [`NORMALIZE_WINDOW`] is 1.
    pub fn normalize(&mut self) -> Result<()> {
        let (lo, hi) = NORMALIZE_WINDOW;
        let peak = self
            .wave
            .iter()
            .zip(&self.flux)
            .filter(|(w, f)| **w > lo && **w < hi && f.is_finite())
            .map(|(_, &f)| f)
            .fold(f64::NEG_INFINITY, f64::max);
        if !(peak.is_finite() && peak > 0.0) {
            return Err(SplatError::InvalidSpectrum(format!(
                "{}: no positive flux between {lo} and {hi} micron to normalize by",
                self.name
            )));
        }
        self.scale(1.0 / peak);
        Ok(())
    }

    /// Interpolating sampler over this spectrum.
    pub fn sampler(&self) -> Result<SpectrumSampler> {
        SpectrumSampler::new(&self.wave, &self.flux, &self.noise)
    }
}

impl fmt::Display for Spectrum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.date {
            Some(date) => write!(f, "{} ({date})", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_and_nan_noise_become_missing() {
        let sp = Spectrum::new(
            "test",
            vec![1.0, 1.1, 1.2],
            vec![1.0, 2.0, 3.0],
            Some(vec![0.0, f64::INFINITY, 0.5]),
        )
        .unwrap();
        assert!(sp.noise[0].is_nan());
        assert!(sp.noise[1].is_nan());
        assert_eq!(sp.noise[2], 0.5);
        assert!(sp.has_noise());
    }

    #[test]
    fn missing_noise_column_is_all_missing() {
        let sp = Spectrum::new("test", vec![1.0, 1.1], vec![1.0, 2.0], None).unwrap();
        assert!(!sp.has_noise());
        assert_eq!(sp.len(), 2);
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = Spectrum::new("bad", vec![1.0, 1.1], vec![1.0], None).unwrap_err();
        assert!(matches!(err, SplatError::InvalidSpectrum(_)));
    }

    #[test]
    fn normalize_uses_peak_in_window() {
        let mut sp = Spectrum::new(
            "n",
            vec![0.7, 1.0, 1.5, 2.4],
            vec![10.0, 2.0, 4.0, 8.0],
            Some(vec![1.0, 0.2, 0.4, 0.8]),
        )
        .unwrap();
        sp.normalize().unwrap();
        assert_relative_eq!(sp.flux[2], 1.0);
        assert_relative_eq!(sp.flux[0], 2.5);
        assert_relative_eq!(sp.noise[1], 0.05);
    }

    #[test]
    fn wave_range_ignores_non_positive_flux() {
        let sp = Spectrum::new(
            "r",
            vec![0.9, 1.0, 2.0, 2.5],
            vec![-1.0, 1.0, 1.0, 0.0],
            None,
        )
        .unwrap();
        assert_eq!(sp.wave_range(), Some((1.0, 2.0)));
    }
}
