use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Float64Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Toy near-infrared spectrum: a Planck-like hump with H2O and CH4 troughs
/// whose depth grows with `spt` (20 = L0, 30 = T0).
fn generate_spectrum(wave: &[f64], spt: f64, snr: f64, rng: &mut StdRng) -> (Vec<f64>, Vec<f64>) {
    let water = ((spt - 15.0) / 20.0).clamp(0.0, 0.9);
    let methane = ((spt - 28.0) / 10.0).clamp(0.0, 0.9);
    let peak = 1.3 - 0.01 * (spt - 20.0);

    let flux: Vec<f64> = wave
        .iter()
        .map(|&w| {
            let continuum = gaussian(w, peak, 0.45, 1.0) + 0.05;
            let absorption = gaussian(w, 1.15, 0.04, water)
                + gaussian(w, 1.40, 0.08, water)
                + gaussian(w, 1.90, 0.10, water)
                + gaussian(w, 1.67, 0.04, methane)
                + gaussian(w, 2.25, 0.06, methane)
                + gaussian(w, 1.33, 0.03, methane);
            continuum * (1.0 - absorption.min(0.95))
        })
        .collect();

    let sigma = 1.0 / snr;
    let noise: Vec<f64> = flux.iter().map(|f| sigma * f.max(0.05)).collect();
    let observed = flux
        .iter()
        .zip(&noise)
        .map(|(f, n)| {
            let z: f64 = StandardNormal.sample(&mut *rng);
            f + n * z
        })
        .collect();
    (observed, noise)
}

fn list_array(rows: &[Vec<f64>]) -> arrow::array::ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        let values = builder.values();
        for &v in row {
            values.append_value(v);
        }
        builder.append(true);
    }
    builder.finish()
}

fn write_ascii(path: &Path, wave: &[f64], flux: &[f64], noise: &[f64]) -> Result<()> {
    let mut file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    writeln!(file, "# wavelength (micron)  flux  noise")?;
    for ((w, f), n) in wave.iter().zip(flux).zip(noise) {
        writeln!(file, "{w:.5} {f:.6e} {n:.6e}")?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(42);

    // SpeX prism coverage, 0.85 → 2.45 micron
    let wave: Vec<f64> = (0..=1600).map(|i| 0.85 + i as f64 * 0.001).collect();

    let types = [20.0, 23.0, 25.5, 28.0, 30.0, 33.0, 36.0];
    let snrs = [30.0, 100.0];

    let ascii_dir = Path::new("sample_spectra");
    fs::create_dir_all(ascii_dir).context("creating sample_spectra/")?;

    let mut all_wave = Vec::new();
    let mut all_flux = Vec::new();
    let mut all_noise = Vec::new();
    let mut all_name = Vec::new();
    let mut all_spt = Vec::new();

    for &spt in &types {
        for &snr in &snrs {
            let (flux, noise) = generate_spectrum(&wave, spt, snr, &mut rng);
            let name = format!("synth{:02}s{:03}", (spt * 10.0) as u32, snr as u32);
            write_ascii(
                &ascii_dir.join(format!("spex_prism_{name}_140506.txt")),
                &wave,
                &flux,
                &noise,
            )?;

            all_wave.push(wave.clone());
            all_flux.push(flux);
            all_noise.push(noise);
            all_name.push(name);
            all_spt.push(spt);
        }
    }

    let list_field = || DataType::List(Arc::new(Field::new("item", DataType::Float64, true)));
    let schema = Arc::new(Schema::new(vec![
        Field::new("wave", list_field(), false),
        Field::new("flux", list_field(), false),
        Field::new("noise", list_field(), false),
        Field::new("name", DataType::Utf8, false),
        Field::new("spt", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(list_array(&all_wave)),
            Arc::new(list_array(&all_flux)),
            Arc::new(list_array(&all_noise)),
            Arc::new(StringArray::from(
                all_name.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from(all_spt)),
        ],
    )
    .context("building record batch")?;

    let output_path = "sample_spectra.parquet";
    let file = fs::File::create(output_path).context("creating output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing writer")?;

    println!(
        "Wrote {} spectra ({} wavelengths each) to {output_path} and {}/",
        all_name.len(),
        wave.len(),
        ascii_dir.display()
    );
    Ok(())
}
