use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use rusty_splat::config::{ClassifyOptions, MeasureOptions};
use rusty_splat::data::loader::load_file;
use rusty_splat::{
    classify_spectrum, estimate_spectral_type, evaluate_set, parse_spectral_type, CalibrationSet,
    IndexSet, SplatError,
};

/// Flat spectrum with two troughs whose depths put both Reid H2O indices at
/// numeric type 22 (L2).
fn write_l2_spectrum(dir: &Path, with_noise: bool) -> PathBuf {
    let depth_a = (2.0 - 23.4) / -32.1;
    let depth_b = (2.0 - 20.7) / -24.9;

    let path = dir.join("spex_prism_synthL2_140506.txt");
    let mut file = fs::File::create(&path).unwrap();
    writeln!(file, "# wavelength flux noise").unwrap();
    for i in 0..=1600 {
        let w = 0.85 + i as f64 * 0.001;
        let f = if (1.325..=1.355).contains(&w) {
            depth_a
        } else if (1.465..=1.495).contains(&w) {
            depth_b
        } else {
            1.0
        };
        if with_noise {
            writeln!(file, "{w:.4} {f:.8} {:.8}", 0.01 * f).unwrap();
        } else {
            writeln!(file, "{w:.4} {f:.8}").unwrap();
        }
    }
    path
}

#[test]
fn noiseless_file_classifies_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_l2_spectrum(dir.path(), false);

    let spectra = load_file(&path).unwrap();
    assert_eq!(spectra.len(), 1);
    let sp = &spectra[0];
    assert_eq!(sp.name, "synthL2");
    assert_eq!(sp.date.as_deref(), Some("2014 May 06"));
    assert!(!sp.has_noise());

    let measure = MeasureOptions {
        seed: Some(1),
        ..Default::default()
    };
    let indices = evaluate_set(sp, IndexSet::Reid, &measure).unwrap();
    assert_relative_eq!(indices["H2O-A"].value, (2.0 - 23.4) / -32.1, epsilon = 1e-6);
    assert_relative_eq!(indices["H2O-B"].value, (2.0 - 20.7) / -24.9, epsilon = 1e-6);
    assert_relative_eq!(indices["H2O-A"].uncertainty, 0.0, epsilon = 1e-9);

    let options = ClassifyOptions {
        seed: Some(1),
        round: true,
        as_string: true,
        ..ClassifyOptions::default()
    };
    let est = estimate_spectral_type(&indices, CalibrationSet::Reid, &options).unwrap();
    assert_relative_eq!(est.spt, 22.0, epsilon = 1e-6);
    assert_eq!(est.label.as_deref(), Some("L2.0"));
    assert_eq!(parse_spectral_type("L2.0").unwrap().number, est.spt);
}

#[test]
fn noisy_file_lands_near_l2() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_l2_spectrum(dir.path(), true);
    let sp = &load_file(&path).unwrap()[0];
    assert!(sp.has_noise());

    let options = ClassifyOptions {
        seed: Some(2014),
        ..ClassifyOptions::default()
    };
    let est = classify_spectrum(sp, CalibrationSet::Reid, &options).unwrap();
    assert!((est.spt - 22.0).abs() < 1.0, "spt {}", est.spt);
    // Never tighter than the combined calibration scatter.
    assert!(est.uncertainty >= 0.7, "unc {}", est.uncertainty);

    let again = classify_spectrum(sp, CalibrationSet::Reid, &options).unwrap();
    assert_eq!(est, again);
}

#[test]
fn narrow_coverage_is_a_per_spectrum_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spex_prism_short_140506.txt");
    let mut file = fs::File::create(&path).unwrap();
    for i in 0..=200 {
        writeln!(file, "{:.4} 1.0", 1.2 + i as f64 * 0.001).unwrap();
    }
    drop(file);

    let sp = &load_file(&path).unwrap()[0];
    let err = evaluate_set(sp, IndexSet::Burgasser, &MeasureOptions::default()).unwrap_err();
    assert!(matches!(err, SplatError::BandOutsideSpectrum { .. }));
    assert!(err.is_per_spectrum());

    let err =
        classify_spectrum(sp, CalibrationSet::Testi, &ClassifyOptions::default()).unwrap_err();
    assert!(matches!(err, SplatError::InvalidConfiguration(_)));
    assert!(!err.is_per_spectrum());
}
