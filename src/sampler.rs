use crate::error::{Result, SplatError};

// ---------------------------------------------------------------------------
// Linear interpolant over one channel
// ---------------------------------------------------------------------------

/// Piecewise-linear interpolation over strictly increasing `x`.
#[derive(Debug, Clone)]
struct Linear {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Linear {
    /// Evaluate at `at`. Outside `[x0, xn]` the result is `NaN`.
    fn eval(&self, at: f64) -> f64 {
        let n = self.x.len();
        if !(at >= self.x[0] && at <= self.x[n - 1]) {
            return f64::NAN;
        }
        // First index with x > at; clamp so that [i - 1, i] is a valid segment.
        let i = self.x.partition_point(|&xi| xi <= at).clamp(1, n - 1);
        let (x0, x1) = (self.x[i - 1], self.x[i]);
        let (y0, y1) = (self.y[i - 1], self.y[i]);
        if at == x1 {
            return y1;
        }
        if at == x0 {
            return y0;
        }
        y0 + (y1 - y0) * (at - x0) / (x1 - x0)
    }
}

// ---------------------------------------------------------------------------
// SpectrumSampler
// ---------------------------------------------------------------------------

/// Continuous flux and noise functions built from a sampled spectrum.
///
/// Both channels share the wavelength grid. Noise values that are missing
/// (`NaN`) interpolate to `NaN`, which the Monte Carlo layer reads as
/// "no perturbation".
#[derive(Debug, Clone)]
pub struct SpectrumSampler {
    flux: Linear,
    noise: Linear,
}

impl SpectrumSampler {
    /// Build a sampler from co-indexed wavelength, flux and noise.
    ///
    /// Points whose wavelength or flux is not finite are dropped first. At
    /// least two points must remain and wavelengths must be strictly
    /// increasing.
    pub fn new(wave: &[f64], flux: &[f64], noise: &[f64]) -> Result<Self> {
        if wave.len() != flux.len() || wave.len() != noise.len() {
            return Err(SplatError::InvalidSpectrum(format!(
                "wave has {} values, flux {}, noise {}",
                wave.len(),
                flux.len(),
                noise.len()
            )));
        }

        let mut x = Vec::with_capacity(wave.len());
        let mut f = Vec::with_capacity(wave.len());
        let mut s = Vec::with_capacity(wave.len());
        for ((&w, &fl), &ns) in wave.iter().zip(flux).zip(noise) {
            if w.is_finite() && fl.is_finite() {
                x.push(w);
                f.push(fl);
                s.push(ns);
            }
        }

        if x.len() < 2 {
            return Err(SplatError::InvalidSpectrum(format!(
                "need at least 2 finite points to interpolate, got {}",
                x.len()
            )));
        }
        if let Some(i) = x.windows(2).position(|pair| pair[1] <= pair[0]) {
            return Err(SplatError::InvalidSpectrum(format!(
                "wavelength is not strictly increasing at {} -> {}",
                x[i],
                x[i + 1]
            )));
        }

        Ok(Self {
            flux: Linear {
                x: x.clone(),
                y: f,
            },
            noise: Linear { x, y: s },
        })
    }

    /// Interpolated flux at wavelength `x`; `NaN` outside the domain.
    pub fn flux_at(&self, x: f64) -> f64 {
        self.flux.eval(x)
    }

    /// Interpolated noise at wavelength `x`; `NaN` outside the domain or
    /// where the noise is missing.
    pub fn noise_at(&self, x: f64) -> f64 {
        self.noise.eval(x)
    }

    /// Wavelength coverage `(min, max)`.
    pub fn domain(&self) -> (f64, f64) {
        let x = &self.flux.x;
        (x[0], x[x.len() - 1])
    }

    /// Whether `[low, high]` lies fully within the domain.
    pub fn covers(&self, low: f64, high: f64) -> bool {
        let (min, max) = self.domain();
        low >= min && high <= max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn interpolates_between_samples() {
        let s = SpectrumSampler::new(&[1.0, 2.0, 3.0], &[10.0, 20.0, 40.0], &[1.0, 1.0, 3.0])
            .unwrap();
        assert_relative_eq!(s.flux_at(1.5), 15.0);
        assert_relative_eq!(s.flux_at(2.5), 30.0);
        assert_relative_eq!(s.noise_at(2.5), 2.0);
        assert_relative_eq!(s.flux_at(3.0), 40.0);
        assert_relative_eq!(s.flux_at(1.0), 10.0);
    }

    #[test]
    fn outside_domain_is_nan() {
        let s = SpectrumSampler::new(&[1.0, 2.0], &[1.0, 1.0], &[0.1, 0.1]).unwrap();
        assert!(s.flux_at(0.5).is_nan());
        assert!(s.noise_at(2.5).is_nan());
        assert!(s.flux_at(f64::NAN).is_nan());
    }

    #[test]
    fn rejects_short_and_duplicate_grids() {
        assert!(matches!(
            SpectrumSampler::new(&[1.0], &[1.0], &[1.0]),
            Err(SplatError::InvalidSpectrum(_))
        ));
        assert!(matches!(
            SpectrumSampler::new(&[1.0, 1.0, 2.0], &[1.0, 2.0, 3.0], &[0.0; 3]),
            Err(SplatError::InvalidSpectrum(_))
        ));
        assert!(matches!(
            SpectrumSampler::new(&[1.0, 2.0], &[1.0], &[1.0, 1.0]),
            Err(SplatError::InvalidSpectrum(_))
        ));
    }

    #[test]
    fn drops_non_finite_flux_points() {
        let s = SpectrumSampler::new(
            &[1.0, 2.0, 3.0],
            &[1.0, f64::NAN, 3.0],
            &[f64::NAN; 3],
        )
        .unwrap();
        assert_relative_eq!(s.flux_at(2.0), 2.0);
        assert!(s.noise_at(2.0).is_nan());
        assert_eq!(s.domain(), (1.0, 3.0));
    }
}
