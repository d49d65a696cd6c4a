use log::{debug, warn};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::Serialize;

use super::calibration::{Calibration, CalibrationFit, CalibrationSet};
use crate::config::ClassifyOptions;
use crate::data::model::Spectrum;
use crate::error::{Result, SplatError};
use crate::index::measure::mean_std;
use crate::index::{evaluate_set_with, IndexValues, MeasuredIndex};
use crate::spt::{type_to_string, TypeFlags};

// ---------------------------------------------------------------------------
// Per-entry state
// ---------------------------------------------------------------------------

/// Iteration state of one calibration entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryState {
    pub spt: f64,
    pub spt_unc: f64,
    pub in_range: bool,
}

impl EntryState {
    pub const INITIAL: EntryState = EntryState {
        spt: 0.0,
        spt_unc: 99.0,
        in_range: true,
    };

    /// Inverse-variance weight, zero when masked out or undefined.
    pub fn weight(&self) -> f64 {
        if self.in_range && self.spt.is_finite() && self.spt_unc.is_finite() && self.spt_unc > 0.0 {
            self.spt_unc.powi(-2)
        } else {
            0.0
        }
    }

    /// State after the global estimate moved to `global`.
    pub fn remask(self, fit: &CalibrationFit, global: f64) -> Self {
        Self {
            in_range: fit.contains(global),
            ..self
        }
    }

    /// Fresh estimate from `nsamples` draws of the measured index.
    fn refresh<R: Rng + ?Sized>(
        self,
        fit: &CalibrationFit,
        calibration: &Calibration,
        index: MeasuredIndex,
        nsamples: usize,
        rng: &mut R,
    ) -> Self {
        let perturb = index.uncertainty.is_finite() && index.uncertainty > 0.0;
        let values: Vec<f64> = (0..nsamples)
            .map(|_| {
                let x = if perturb {
                    let z: f64 = StandardNormal.sample(&mut *rng);
                    index.value + index.uncertainty * z
                } else {
                    index.value
                };
                fit.eval(x) * calibration.scale
            })
            .filter(|v| v.is_finite())
            .collect();
        if values.is_empty() {
            warn!(
                "{}: {} = {} gives no finite type, entry ignored this round",
                calibration.name, fit.index, index.value
            );
        }

        let (mean, std) = mean_std(&values);
        Self {
            spt: mean + calibration.offset,
            spt_unc: (std.powi(2) + fit.fit_unc.powi(2)).sqrt(),
            ..self
        }
    }
}

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Initialized,
    Iterating { round: usize },
    Converged,
    Failed,
}

/// Final classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectralTypeEstimate {
    /// Numeric type (K0 = 0).
    pub spt: f64,
    pub uncertainty: f64,
    /// String form such as `L3.5:` when requested.
    pub label: Option<String>,
    /// Indices whose calibration range held the next-to-last estimate.
    pub contributing: Vec<String>,
}

/// Weighted mean over a calibration table with range masking.
///
/// Every round refreshes entry estimates, takes the inverse-variance mean of
/// the in-range entries, then re-masks each entry against that mean. The
/// number of rounds is fixed.
#[derive(Debug, Clone)]
pub struct SpectralTypeEstimator<'a> {
    calibration: &'a Calibration,
    inputs: Vec<Option<MeasuredIndex>>,
    states: Vec<EntryState>,
    phase: Phase,
    last: Option<(f64, f64)>,
}

impl<'a> SpectralTypeEstimator<'a> {
    pub fn new(calibration: &'a Calibration, indices: &IndexValues) -> Self {
        let inputs: Vec<Option<MeasuredIndex>> = calibration
            .fits
            .iter()
            .map(|fit| {
                let found = indices.get(fit.index).copied();
                if found.is_none() {
                    warn!("{}: no {} index measured, entry ignored", calibration.name, fit.index);
                }
                found
            })
            .collect();
        Self {
            calibration,
            states: vec![EntryState::INITIAL; inputs.len()],
            inputs,
            phase: Phase::Initialized,
            last: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn states(&self) -> &[EntryState] {
        &self.states
    }

    /// Run one round. Returns the global `(spt, uncertainty)` of this round.
    pub fn step<R: Rng + ?Sized>(&mut self, nsamples: usize, rng: &mut R) -> Result<(f64, f64)> {
        let round = match self.phase {
            Phase::Initialized => 1,
            Phase::Iterating { round } => round + 1,
            Phase::Converged | Phase::Failed => {
                return Err(SplatError::InvalidConfiguration(
                    "estimator already finished".to_string(),
                ))
            }
        };

        let entries = self
            .states
            .iter_mut()
            .zip(self.calibration.fits)
            .zip(&self.inputs);
        for ((state, fit), input) in entries {
            if let Some(index) = input {
                *state = state.refresh(fit, self.calibration, *index, nsamples, &mut *rng);
            }
        }

        let Some((spt, unc)) = weighted_mean(&self.states, &self.inputs) else {
            self.phase = Phase::Failed;
            warn!(
                "{}: indices do not fit within any calibration range (round {round})",
                self.calibration.name
            );
            return Err(SplatError::ConvergenceFailure {
                calibration: self.calibration.name,
            });
        };

        for (state, fit) in self.states.iter_mut().zip(self.calibration.fits) {
            *state = state.remask(fit, spt);
        }
        debug!(
            "{} round {round}: spt {spt:.2} ± {unc:.2}, {} of {} entries in range",
            self.calibration.name,
            self.states.iter().filter(|s| s.in_range).count(),
            self.states.len()
        );

        self.phase = Phase::Iterating { round };
        self.last = Some((spt, unc));
        Ok((spt, unc))
    }

    /// Run all `options.nloop` rounds and build the final estimate. The
    /// estimator is left `Converged` (or `Failed`).
    pub fn run<R: Rng + ?Sized>(
        &mut self,
        options: &ClassifyOptions,
        rng: &mut R,
    ) -> Result<SpectralTypeEstimate> {
        if options.nloop == 0 || options.nsamples == 0 {
            return Err(SplatError::InvalidConfiguration(
                "nloop and nsamples must be positive".to_string(),
            ));
        }

        // Entries weighted in the final round: those in range before it.
        let mut contributing = Vec::new();
        for _ in 0..options.nloop {
            contributing = self.contributing();
            self.step(options.nsamples, &mut *rng)?;
        }
        let Some((mut spt, uncertainty)) = self.last else {
            return Err(SplatError::ConvergenceFailure {
                calibration: self.calibration.name,
            });
        };
        self.phase = Phase::Converged;

        if options.round {
            spt = 0.5 * (2.0 * spt).round_ties_even();
        }
        let label = if options.as_string {
            Some(type_to_string(spt, uncertainty, &TypeFlags::default())?)
        } else {
            None
        };

        Ok(SpectralTypeEstimate {
            spt,
            uncertainty,
            label,
            contributing,
        })
    }

    fn contributing(&self) -> Vec<String> {
        self.calibration
            .fits
            .iter()
            .zip(&self.states)
            .zip(&self.inputs)
            .filter(|((_, state), input)| input.is_some() && state.in_range)
            .map(|((fit, _), _)| fit.index.to_string())
            .collect()
    }
}

/// Inverse-variance mean of the measured, in-range entries. `None` when the
/// weights sum to zero.
fn weighted_mean(states: &[EntryState], inputs: &[Option<MeasuredIndex>]) -> Option<(f64, f64)> {
    let (sum_w, sum_wx) = states
        .iter()
        .zip(inputs)
        .filter(|(_, input)| input.is_some())
        .map(|(state, _)| (state.weight(), state.spt))
        .filter(|(w, _)| *w > 0.0)
        .fold((0.0, 0.0), |(sw, swx), (w, x)| (sw + w, swx + w * x));
    (sum_w > 0.0).then(|| (sum_wx / sum_w, sum_w.sqrt().recip()))
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Classify from already measured indices.
pub fn estimate_spectral_type(
    indices: &IndexValues,
    set: CalibrationSet,
    options: &ClassifyOptions,
) -> Result<SpectralTypeEstimate> {
    let mut rng = options.rng();
    estimate_with(indices, set.calibration(), options, &mut rng)
}

/// Classify against any calibration table with a caller-supplied generator.
pub fn estimate_with<R: Rng + ?Sized>(
    indices: &IndexValues,
    calibration: &Calibration,
    options: &ClassifyOptions,
    rng: &mut R,
) -> Result<SpectralTypeEstimate> {
    let mut estimator = SpectralTypeEstimator::new(calibration, indices);
    estimator.run(options, rng)
}

/// Measure the calibration's own index set on `spectrum`, then classify.
pub fn classify_spectrum(
    spectrum: &Spectrum,
    set: CalibrationSet,
    options: &ClassifyOptions,
) -> Result<SpectralTypeEstimate> {
    let index_set = set.index_set().ok_or_else(|| {
        SplatError::InvalidConfiguration(format!(
            "{set} calibration has no index set to measure; supply its indices directly"
        ))
    })?;
    let sampler = spectrum.sampler()?;
    let mut rng = options.rng();
    let indices = evaluate_set_with(&sampler, index_set, options.nsamples, &mut rng)?;
    let estimate = estimate_with(&indices, set.calibration(), options, &mut rng)?;
    debug!("{spectrum}: {set} type {:.2} ± {:.2}", estimate.spt, estimate.uncertainty);
    Ok(estimate)
}
