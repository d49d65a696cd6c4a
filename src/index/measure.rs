use std::fmt;
use std::str::FromStr;

use log::debug;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SplatError};
use crate::sampler::SpectrumSampler;

// ---------------------------------------------------------------------------
// Methods
// ---------------------------------------------------------------------------

/// How per-band values are combined into one index value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineMethod {
    /// `b0 / b1`
    Ratio,
    /// `(b0 + b1) / b2`
    Line,
    /// `2 (b0 - b1) / (b0 + b1)`
    Change,
    /// Feature band `b0` against a continuum interpolated from `b1` and `b2`
    /// at the feature midpoint.
    Allers,
}

impl CombineMethod {
    /// Number of bands this method consumes.
    pub fn band_count(self) -> usize {
        match self {
            CombineMethod::Line | CombineMethod::Allers => 3,
            CombineMethod::Ratio | CombineMethod::Change => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CombineMethod::Ratio => "ratio",
            CombineMethod::Line => "line",
            CombineMethod::Change => "change",
            CombineMethod::Allers => "allers",
        }
    }
}

impl fmt::Display for CombineMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CombineMethod {
    type Err = SplatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ratio" => Ok(CombineMethod::Ratio),
            "line" => Ok(CombineMethod::Line),
            "change" => Ok(CombineMethod::Change),
            "allers" => Ok(CombineMethod::Allers),
            other => Err(SplatError::InvalidConfiguration(format!(
                "unknown index method `{other}`"
            ))),
        }
    }
}

/// How one perturbed band curve is reduced to a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleMethod {
    /// Trapezoidal integral over the band grid.
    Integrate,
    Average,
    Median,
    Maximum,
    Minimum,
}

impl SampleMethod {
    pub fn name(self) -> &'static str {
        match self {
            SampleMethod::Integrate => "integrate",
            SampleMethod::Average => "average",
            SampleMethod::Median => "median",
            SampleMethod::Maximum => "maximum",
            SampleMethod::Minimum => "minimum",
        }
    }

    fn reduce(self, x: &[f64], y: &mut [f64]) -> f64 {
        match self {
            SampleMethod::Integrate => trapezoid(x, y),
            SampleMethod::Average => y.iter().sum::<f64>() / y.len() as f64,
            SampleMethod::Median => median(y),
            SampleMethod::Maximum => y.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            SampleMethod::Minimum => y.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }
}

impl fmt::Display for SampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleMethod {
    type Err = SplatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "integrate" => Ok(SampleMethod::Integrate),
            "average" | "mean" => Ok(SampleMethod::Average),
            "median" => Ok(SampleMethod::Median),
            "maximum" | "max" => Ok(SampleMethod::Maximum),
            "minimum" | "min" => Ok(SampleMethod::Minimum),
            other => Err(SplatError::InvalidConfiguration(format!(
                "unknown sample method `{other}`"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Band / MeasuredIndex
// ---------------------------------------------------------------------------

/// Wavelength interval in micron.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub low: f64,
    pub high: f64,
}

impl Band {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.low + self.high)
    }

    /// `(min, max)` of the two edges; a reversed band is accepted.
    fn ordered(&self) -> Result<(f64, f64)> {
        let (low, high) = (self.low.min(self.high), self.low.max(self.high));
        if !(low.is_finite() && high.is_finite()) || low == high {
            return Err(SplatError::InvalidConfiguration(format!(
                "band {}..{} must have two distinct finite edges",
                self.low, self.high
            )));
        }
        Ok((low, high))
    }
}

/// An index value with its Monte Carlo uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasuredIndex {
    pub value: f64,
    pub uncertainty: f64,
}

impl MeasuredIndex {
    pub fn new(value: f64, uncertainty: f64) -> Self {
        Self { value, uncertainty }
    }
}

impl fmt::Display for MeasuredIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} ± {:.4}", self.value, self.uncertainty)
    }
}

// ---------------------------------------------------------------------------
// Band grid: interpolated mean and sigma at nsamples + 1 points
// ---------------------------------------------------------------------------

struct BandGrid {
    x: Vec<f64>,
    mean: Vec<f64>,
    sigma: Vec<f64>,
}

impl BandGrid {
    fn build(sampler: &SpectrumSampler, band: &Band, nsamples: usize) -> Result<Self> {
        let (low, high) = band.ordered()?;
        if !sampler.covers(low, high) {
            let (min, max) = sampler.domain();
            return Err(SplatError::BandOutsideSpectrum {
                low,
                high,
                min,
                max,
            });
        }

        let step = (high - low) / nsamples as f64;
        let x: Vec<f64> = (0..=nsamples)
            .map(|k| if k == nsamples { high } else { low + step * k as f64 })
            .collect();
        let mean: Vec<f64> = x.iter().map(|&xi| sampler.flux_at(xi)).collect();
        let sigma: Vec<f64> = x.iter().map(|&xi| sampler.noise_at(xi)).collect();

        if sigma.iter().any(|s| !s.is_finite()) {
            debug!("band {low}..{high}: missing noise, drawing unperturbed flux there");
        }
        Ok(Self { x, mean, sigma })
    }

    /// One Gaussian draw of the band curve into `out`.
    fn perturb<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut Vec<f64>) {
        out.clear();
        out.extend(self.mean.iter().zip(&self.sigma).map(|(&m, &s)| {
            if s.is_finite() && s > 0.0 {
                let z: f64 = StandardNormal.sample(&mut *rng);
                m + s * z
            } else {
                m
            }
        }));
    }
}

// ---------------------------------------------------------------------------
// Measurement
// ---------------------------------------------------------------------------

/// Measure one spectral index by Monte Carlo sampling.
///
/// Each band is gridded at `nsamples + 1` points. For each of `nsamples`
/// trials every band gets an independent Gaussian draw of its flux curve,
/// reduced with `sample`; the per-band scalars are combined with `method`.
/// The result is the mean and population standard deviation of the trials.
pub fn measure_index<R: Rng + ?Sized>(
    sampler: &SpectrumSampler,
    bands: &[Band],
    method: CombineMethod,
    sample: SampleMethod,
    nsamples: usize,
    rng: &mut R,
) -> Result<MeasuredIndex> {
    if bands.len() != method.band_count() {
        return Err(SplatError::InvalidConfiguration(format!(
            "{method} index needs {} bands, got {}",
            method.band_count(),
            bands.len()
        )));
    }
    if nsamples == 0 {
        return Err(SplatError::InvalidConfiguration(
            "nsamples must be positive".to_string(),
        ));
    }

    let grids = bands
        .iter()
        .map(|band| BandGrid::build(sampler, band, nsamples))
        .collect::<Result<Vec<_>>>()?;

    // values[band][trial]
    let mut draw = Vec::with_capacity(nsamples + 1);
    let values: Vec<Vec<f64>> = grids
        .iter()
        .map(|grid| {
            (0..nsamples)
                .map(|_| {
                    grid.perturb(&mut *rng, &mut draw);
                    sample.reduce(&grid.x, &mut draw)
                })
                .collect()
        })
        .collect();

    let mids: Vec<f64> = bands.iter().map(Band::midpoint).collect();
    let trials: Vec<f64> = (0..nsamples)
        .map(|j| {
            let b: Vec<f64> = values.iter().map(|v| v[j]).collect();
            combine(method, &b, &mids)
        })
        .collect();

    let (value, uncertainty) = mean_std(&trials);
    if !(value.is_finite() && uncertainty.is_finite()) {
        return Err(SplatError::DegenerateIndex {
            method: method.name(),
            value,
            uncertainty,
        });
    }
    debug!(
        "{method}/{sample} index over {} bands: {value:.4} ± {uncertainty:.4}",
        bands.len()
    );
    Ok(MeasuredIndex::new(value, uncertainty))
}

fn combine(method: CombineMethod, b: &[f64], mids: &[f64]) -> f64 {
    match method {
        CombineMethod::Ratio => b[0] / b[1],
        CombineMethod::Line => (b[0] + b[1]) / b[2],
        CombineMethod::Change => 2.0 * (b[0] - b[1]) / (b[0] + b[1]),
        CombineMethod::Allers => {
            let span = mids[2] - mids[1];
            let w2 = (mids[0] - mids[1]) / span;
            let w1 = (mids[2] - mids[0]) / span;
            (w2 * b[2] + w1 * b[1]) / b[0]
        }
    }
}

fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| 0.5 * (xs[1] - xs[0]) * (ys[0] + ys[1]))
        .sum()
}

fn median(y: &mut [f64]) -> f64 {
    y.sort_by(f64::total_cmp);
    let n = y.len();
    if n % 2 == 1 {
        y[n / 2]
    } else {
        0.5 * (y[n / 2 - 1] + y[n / 2])
    }
}

/// Mean and population standard deviation. Empty input gives `(NaN, NaN)`.
pub(crate) fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Linear flux `a + b x` on 0.9..2.5 micron.
    fn linear_sampler(a: f64, b: f64, noise: f64) -> SpectrumSampler {
        let wave: Vec<f64> = (0..=800).map(|i| 0.9 + i as f64 * 0.002).collect();
        let flux: Vec<f64> = wave.iter().map(|w| a + b * w).collect();
        let noise = vec![noise; wave.len()];
        SpectrumSampler::new(&wave, &flux, &noise).unwrap()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    #[test]
    fn zero_noise_average_is_deterministic() {
        let s = linear_sampler(1.0, 2.0, 0.0);
        let bands = [Band::new(1.2, 1.3), Band::new(1.5, 1.6)];
        let m = measure_index(
            &s,
            &bands,
            CombineMethod::Ratio,
            SampleMethod::Average,
            100,
            &mut rng(),
        )
        .unwrap();
        // mean of a linear curve over a symmetric grid is the midpoint value
        let expected = (1.0 + 2.0 * 1.25) / (1.0 + 2.0 * 1.55);
        assert_relative_eq!(m.value, expected, epsilon = 1e-9);
        assert!(m.uncertainty < 1e-9);
    }

    #[test]
    fn identical_bands_give_identity_values() {
        let s = linear_sampler(1.0, 0.5, 0.05);
        let band = Band::new(1.2, 1.3);
        let ratio = measure_index(
            &s,
            &[band, band],
            CombineMethod::Ratio,
            SampleMethod::Integrate,
            200,
            &mut rng(),
        )
        .unwrap();
        assert_relative_eq!(ratio.value, 1.0, epsilon = 0.02);

        let change = measure_index(
            &s,
            &[band, band],
            CombineMethod::Change,
            SampleMethod::Average,
            200,
            &mut rng(),
        )
        .unwrap();
        assert_relative_eq!(change.value, 0.0, epsilon = 0.02);
        assert!(change.uncertainty > 0.0);
    }

    #[test]
    fn integrate_matches_trapezoid_area() {
        let s = linear_sampler(0.0, 1.0, 0.0);
        let m = measure_index(
            &s,
            &[Band::new(1.0, 2.0), Band::new(2.0, 2.4)],
            CombineMethod::Ratio,
            SampleMethod::Integrate,
            50,
            &mut rng(),
        )
        .unwrap();
        // areas 1.5 and 0.88
        assert_relative_eq!(m.value, 1.5 / 0.88, epsilon = 1e-9);
    }

    #[test]
    fn line_and_allers_combinations() {
        let s = linear_sampler(1.0, 0.0, 0.0);
        let bands = [Band::new(1.2, 1.3), Band::new(1.0, 1.1), Band::new(1.4, 1.5)];
        let line = measure_index(
            &s,
            &bands,
            CombineMethod::Line,
            SampleMethod::Median,
            20,
            &mut rng(),
        )
        .unwrap();
        assert_relative_eq!(line.value, 2.0, epsilon = 1e-12);

        // On a linear continuum the interpolated continuum equals the feature flux.
        let sloped = linear_sampler(0.5, 1.0, 0.0);
        let allers = measure_index(
            &sloped,
            &bands,
            CombineMethod::Allers,
            SampleMethod::Average,
            20,
            &mut rng(),
        )
        .unwrap();
        assert_relative_eq!(allers.value, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn reversed_band_is_accepted() {
        let s = linear_sampler(1.0, 0.0, 0.0);
        let m = measure_index(
            &s,
            &[Band::new(1.3, 1.2), Band::new(1.5, 1.6)],
            CombineMethod::Ratio,
            SampleMethod::Maximum,
            10,
            &mut rng(),
        )
        .unwrap();
        assert_relative_eq!(m.value, 1.0);
    }

    #[test]
    fn band_count_must_match_method() {
        let s = linear_sampler(1.0, 0.0, 0.0);
        let err = measure_index(
            &s,
            &[Band::new(1.2, 1.3), Band::new(1.5, 1.6)],
            CombineMethod::Allers,
            SampleMethod::Average,
            100,
            &mut rng(),
        )
        .unwrap_err();
        assert!(matches!(err, SplatError::InvalidConfiguration(_)));

        let err = measure_index(
            &s,
            &[Band::new(1.2, 1.3)],
            CombineMethod::Ratio,
            SampleMethod::Average,
            100,
            &mut rng(),
        )
        .unwrap_err();
        assert!(matches!(err, SplatError::InvalidConfiguration(_)));
    }

    #[test]
    fn band_outside_coverage_is_reported() {
        let s = linear_sampler(1.0, 0.0, 0.0);
        let err = measure_index(
            &s,
            &[Band::new(0.5, 0.6), Band::new(1.5, 1.6)],
            CombineMethod::Ratio,
            SampleMethod::Average,
            100,
            &mut rng(),
        )
        .unwrap_err();
        assert!(matches!(err, SplatError::BandOutsideSpectrum { .. }));
    }

    #[test]
    fn zero_flux_bands_are_degenerate() {
        let s = linear_sampler(0.0, 0.0, 0.0);
        let bands = [Band::new(1.1, 1.2), Band::new(1.5, 1.6)];
        for (method, sample) in [
            (CombineMethod::Change, SampleMethod::Average),
            (CombineMethod::Ratio, SampleMethod::Integrate),
        ] {
            let err = measure_index(&s, &bands, method, sample, 50, &mut rng()).unwrap_err();
            assert!(
                matches!(err, SplatError::DegenerateIndex { method: m, .. } if m == method.name()),
                "{method}: {err:?}"
            );
            assert!(err.is_per_spectrum());
        }
    }

    #[test]
    fn noise_propagates_into_uncertainty() {
        let s = linear_sampler(1.0, 0.0, 0.2);
        let bands = [Band::new(1.2, 1.3), Band::new(1.5, 1.6)];
        let m = measure_index(
            &s,
            &bands,
            CombineMethod::Ratio,
            SampleMethod::Minimum,
            300,
            &mut rng(),
        )
        .unwrap();
        assert!(m.uncertainty > 0.01, "uncertainty {}", m.uncertainty);
        assert!(m.value.is_finite());
    }

    #[test]
    fn method_names_parse() {
        assert_eq!("Allers".parse::<CombineMethod>().unwrap(), CombineMethod::Allers);
        assert_eq!("median".parse::<SampleMethod>().unwrap(), SampleMethod::Median);
        assert!("valley".parse::<CombineMethod>().is_err());
    }
}
