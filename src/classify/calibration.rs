use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SplatError};
use crate::index::IndexSet;

/// Polynomial relation between one index and spectral type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationFit {
    /// Index name as produced by the index sets.
    pub index: &'static str,
    /// Polynomial coefficients, highest degree first.
    pub coeffs: &'static [f64],
    /// Scatter of the published fit, in subtypes.
    pub fit_unc: f64,
    /// Valid numeric spectral-type range `(min, max)`, inclusive.
    pub range: (f64, f64),
}

impl CalibrationFit {
    /// Horner evaluation of the fit polynomial.
    pub fn eval(&self, x: f64) -> f64 {
        self.coeffs.iter().fold(0.0, |acc, &c| acc * x + c)
    }

    pub fn contains(&self, spt: f64) -> bool {
        spt >= self.range.0 && spt <= self.range.1
    }
}

/// A published index/spectral-type calibration.
///
/// The polynomial output is multiplied by `scale` and shifted by `offset`
/// onto the K0 = 0 numeric scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub name: &'static str,
    pub reference: &'static str,
    pub offset: f64,
    pub scale: f64,
    pub fits: &'static [CalibrationFit],
}

impl Calibration {
    pub fn fit(&self, index: &str) -> Option<&CalibrationFit> {
        self.fits.iter().find(|fit| fit.index == index)
    }
}

static BURGASSER: Calibration = Calibration {
    name: "burgasser",
    reference: "Burgasser (2007, ApJ, 659, 655)",
    offset: 20.0,
    scale: 1.0,
    fits: &[
        CalibrationFit {
            index: "H2O-J",
            coeffs: &[1.038e2, -2.156e2, 1.312e2, -3.919e1, 1.949e1],
            fit_unc: 0.8,
            range: (20.0, 38.0),
        },
        CalibrationFit {
            index: "H2O-H",
            coeffs: &[9.087e-1, -3.221e1, 2.527e1, -1.978e1, 2.098e1],
            fit_unc: 1.0,
            range: (20.0, 38.0),
        },
        CalibrationFit {
            index: "CH4-J",
            coeffs: &[1.491e2, -3.381e2, 2.424e2, -8.450e1, 2.708e1],
            fit_unc: 0.7,
            range: (30.0, 38.0),
        },
        CalibrationFit {
            index: "CH4-H",
            coeffs: &[2.084e1, -5.068e1, 4.361e1, -2.291e1, 2.013e1],
            fit_unc: 0.3,
            range: (31.0, 38.0),
        },
        CalibrationFit {
            index: "CH4-K",
            coeffs: &[-1.259e1, -4.734e0, 2.534e1, -2.246e1, 1.885e1],
            fit_unc: 1.1,
            range: (20.0, 37.0),
        },
    ],
};

static REID: Calibration = Calibration {
    name: "reid",
    reference: "Reid et al. (2001, AJ, 121, 1710)",
    offset: 20.0,
    scale: 1.0,
    fits: &[
        CalibrationFit {
            index: "H2O-A",
            coeffs: &[-32.1, 23.4],
            fit_unc: 1.18,
            range: (18.0, 26.0),
        },
        CalibrationFit {
            index: "H2O-B",
            coeffs: &[-24.9, 20.7],
            fit_unc: 1.02,
            range: (18.0, 28.0),
        },
    ],
};

// Testi fits give tenths of a class, hence the scale of 10.
static TESTI: Calibration = Calibration {
    name: "testi",
    reference: "Testi et al. (2001, ApJ, 522, L147)",
    offset: 20.0,
    scale: 10.0,
    fits: &[
        CalibrationFit {
            index: "sHJ",
            coeffs: &[-1.87, 1.67],
            fit_unc: 0.5,
            range: (20.0, 26.0),
        },
        CalibrationFit {
            index: "sKJ",
            coeffs: &[-1.20, 2.01],
            fit_unc: 0.5,
            range: (20.0, 26.0),
        },
        CalibrationFit {
            index: "sH2O_J",
            coeffs: &[1.54, 0.98],
            fit_unc: 0.5,
            range: (20.0, 26.0),
        },
        CalibrationFit {
            index: "sH2O_H1",
            coeffs: &[1.27, 0.76],
            fit_unc: 0.5,
            range: (20.0, 26.0),
        },
        CalibrationFit {
            index: "sH2O_H2",
            coeffs: &[2.11, 0.29],
            fit_unc: 0.5,
            range: (20.0, 26.0),
        },
        CalibrationFit {
            index: "sH2O_K",
            coeffs: &[2.36, 0.60],
            fit_unc: 0.5,
            range: (20.0, 26.0),
        },
    ],
};

static ALLERS: Calibration = Calibration {
    name: "allers",
    reference: "Allers et al. (2007, ApJ, 657, 511)",
    offset: 10.0,
    scale: 1.0,
    fits: &[CalibrationFit {
        index: "H2O",
        coeffs: &[25.0, -19.25],
        fit_unc: 0.7,
        range: (15.0, 25.0),
    }],
};

// ---------------------------------------------------------------------------
// CalibrationSet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationSet {
    Burgasser,
    Reid,
    Testi,
    Allers,
}

impl CalibrationSet {
    pub const ALL: [CalibrationSet; 4] = [
        CalibrationSet::Burgasser,
        CalibrationSet::Reid,
        CalibrationSet::Testi,
        CalibrationSet::Allers,
    ];

    pub fn calibration(self) -> &'static Calibration {
        match self {
            CalibrationSet::Burgasser => &BURGASSER,
            CalibrationSet::Reid => &REID,
            CalibrationSet::Testi => &TESTI,
            CalibrationSet::Allers => &ALLERS,
        }
    }

    pub fn name(self) -> &'static str {
        self.calibration().name
    }

    /// Index set that produces this calibration's indices, if there is one.
    pub fn index_set(self) -> Option<IndexSet> {
        match self {
            CalibrationSet::Burgasser => Some(IndexSet::Burgasser),
            CalibrationSet::Reid => Some(IndexSet::Reid),
            CalibrationSet::Allers => Some(IndexSet::Allers),
            CalibrationSet::Testi => None,
        }
    }
}

impl fmt::Display for CalibrationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CalibrationSet {
    type Err = SplatError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        CalibrationSet::ALL
            .into_iter()
            .find(|set| set.name() == wanted)
            .ok_or_else(|| {
                SplatError::InvalidConfiguration(format!(
                    "spectral type calibration `{s}` is not available"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn horner_matches_expanded_polynomial() {
        let fit = CalibrationSet::Burgasser.calibration().fit("H2O-J").unwrap();
        let x: f64 = 0.6;
        let expanded = 1.038e2 * x.powi(4) - 2.156e2 * x.powi(3) + 1.312e2 * x.powi(2)
            - 3.919e1 * x
            + 1.949e1;
        assert_relative_eq!(fit.eval(x), expanded, epsilon = 1e-10);
    }

    #[test]
    fn calibration_indices_come_from_their_index_sets() {
        for set in CalibrationSet::ALL {
            let Some(index_set) = set.index_set() else {
                continue;
            };
            for fit in set.calibration().fits {
                assert!(
                    index_set.definitions().iter().any(|d| d.name == fit.index),
                    "{set}: {} missing from {index_set}",
                    fit.index
                );
            }
        }
    }

    #[test]
    fn ranges_are_ordered_and_uncertainties_positive() {
        for set in CalibrationSet::ALL {
            for fit in set.calibration().fits {
                assert!(fit.range.0 < fit.range.1);
                assert!(fit.fit_unc > 0.0);
                assert!(!fit.coeffs.is_empty());
            }
        }
    }

    #[test]
    fn parses_names() {
        assert_eq!("TESTI".parse::<CalibrationSet>().unwrap(), CalibrationSet::Testi);
        assert!(matches!(
            "geballe".parse::<CalibrationSet>(),
            Err(SplatError::InvalidConfiguration(_))
        ));
    }
}
