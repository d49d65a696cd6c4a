use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, Float32Array, Float64Array, LargeListArray, ListArray, StringArray,
};
use arrow::datatypes::DataType;
use log::{debug, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::Spectrum;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load spectra from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.txt` / `.dat` / `.spec` / none – whitespace columns `wave flux [noise]`
/// * `.json`    – `[{ "wave": [...], "flux": [...], "noise": [...], "name": ... }, ...]`
/// * `.csv`     – columns `wave`, `flux`, `noise` containing semicolon-separated floats
/// * `.parquet` – list columns `wave`, `flux`, optional `noise` and `name`
pub fn load_file(path: &Path) -> Result<Vec<Spectrum>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let mut spectra = match ext.as_str() {
        "" | "txt" | "dat" | "spec" | "ascii" => vec![load_ascii(path)?],
        "json" => load_json(path)?,
        "csv" => load_csv(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        "fits" | "fit" => bail!(
            "FITS files are not supported; convert {} to ASCII or Parquet",
            path.display()
        ),
        other => bail!("Unsupported file extension: .{other}"),
    };

    for sp in &mut spectra {
        if repair_snr_noise(sp) {
            warn!("{}: noise column looks like S/N, converted to noise", sp.name);
        }
    }
    debug!("loaded {} spectra from {}", spectra.len(), path.display());
    Ok(spectra)
}

// ---------------------------------------------------------------------------
// ASCII loader
// ---------------------------------------------------------------------------

/// SpeX-style text table: comment lines start with `#` or `;`, then two or
/// three whitespace-separated columns. `nan` entries are allowed.
fn load_ascii(path: &Path) -> Result<Spectrum> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;

    let mut columns: Option<usize> = None;
    let (mut wave, mut flux, mut noise) = (Vec::new(), Vec::new(), Vec::new());

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let values: Vec<f64> = line
            .split_whitespace()
            .take(3)
            .map(|tok| {
                tok.parse::<f64>()
                    .with_context(|| format!("line {}: '{tok}' is not a number", line_no + 1))
            })
            .collect::<Result<_>>()?;

        let n = *columns.get_or_insert(values.len());
        if n < 2 || values.len() != n {
            bail!(
                "line {}: expected {} columns, found {}",
                line_no + 1,
                n.max(2),
                values.len()
            );
        }
        wave.push(values[0]);
        flux.push(values[1]);
        if n == 3 {
            noise.push(values[2]);
        }
    }

    let noise = (columns == Some(3)).then_some(noise);
    let (name, date) = name_and_date_from_filename(path);
    let spectrum = Spectrum::new(name, wave, flux, noise)
        .with_context(|| format!("building spectrum from {}", path.display()))?;
    Ok(spectrum.with_date(date))
}

/// `spex_prism_0036+1821_040907.txt` → (`0036+1821`, `2004 Sep 07`).
pub fn name_and_date_from_filename(path: &Path) -> (String, Option<String>) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string();
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 2 {
        return (stem, None);
    }
    let name = parts[parts.len() - 2].to_string();
    let stamp = parts[parts.len() - 1];
    (name, format_date_stamp(stamp))
}

/// `yymmdd` → `20yy Mon dd`.
fn format_date_stamp(stamp: &str) -> Option<String> {
    if stamp.len() != 6 || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        debug!("'{stamp}' is not a yymmdd date");
        return None;
    }
    let month: usize = stamp[2..4].parse().ok()?;
    let label = MONTHS.get(month.checked_sub(1)?)?;
    Some(format!("20{} {label} {}", &stamp[..2], &stamp[4..]))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   { "name": "2MASS J0036+1821", "wave": [0.95, ...], "flux": [...], "noise": [...] },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Vec<Spectrum>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut spectra = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let wave = json_array_to_f64(obj.get("wave"), i, "wave")?;
        let flux = json_array_to_f64(obj.get("flux"), i, "flux")?;
        let noise = match obj.get("noise") {
            None | Some(JsonValue::Null) => None,
            some => Some(json_array_to_f64(some, i, "noise")?),
        };
        let name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("spectrum {i}"));

        spectra.push(Spectrum::new(name, wave, flux, noise).with_context(|| format!("Row {i}"))?);
    }

    Ok(spectra)
}

/// Nulls read as `NaN` so missing noise survives the round trip through JSON.
fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| match v {
            JsonValue::Null => Ok(f64::NAN),
            v => v
                .as_f64()
                .with_context(|| format!("Row {row}, {col}[{j}]: not a number")),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout:  header row with column names, one spectrum per row.
/// `wave`, `flux` and optional `noise` columns contain semicolon-separated
/// floats: `"0.95;0.96;0.97"`. An optional `name` column labels the row.
fn load_csv(path: &Path) -> Result<Vec<Spectrum>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let column = |name: &str| headers.iter().position(|h| h == name);

    let wave_idx = column("wave").context("CSV missing 'wave' column")?;
    let flux_idx = column("flux").context("CSV missing 'flux' column")?;
    let noise_idx = column("noise");
    let name_idx = column("name");

    let mut spectra = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let wave = parse_semicolon_floats(record.get(wave_idx).unwrap_or(""), row_no, "wave")?;
        let flux = parse_semicolon_floats(record.get(flux_idx).unwrap_or(""), row_no, "flux")?;
        let noise = match noise_idx.and_then(|i| record.get(i)) {
            Some(cell) if !cell.trim().is_empty() => {
                Some(parse_semicolon_floats(cell, row_no, "noise")?)
            }
            _ => None,
        };
        let name = name_idx
            .and_then(|i| record.get(i))
            .map(str::to_string)
            .unwrap_or_else(|| format!("spectrum {row_no}"));

        spectra.push(
            Spectrum::new(name, wave, flux, noise).with_context(|| format!("CSV row {row_no}"))?,
        );
    }

    Ok(spectra)
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of spectra.
///
/// Expected schema:
/// - `wave`: List<Float64> or LargeList<Float64> – wavelength arrays
/// - `flux`: List<Float64> or LargeList<Float64> – flux arrays
/// - `noise` (optional): same shape as `flux`
/// - `name` (optional): Utf8 source name
///
/// Other columns are ignored.
fn load_parquet(path: &Path) -> Result<Vec<Spectrum>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut spectra = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let n_rows = batch.num_rows();

        let wave_idx = schema
            .index_of("wave")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'wave' column"))?;
        let flux_idx = schema
            .index_of("flux")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'flux' column"))?;
        let noise_col = schema.index_of("noise").ok().map(|i| batch.column(i));
        let name_col = schema.index_of("name").ok().map(|i| batch.column(i));

        let wave_col = batch.column(wave_idx);
        let flux_col = batch.column(flux_idx);

        for row in 0..n_rows {
            let wave = extract_f64_list(wave_col, row)
                .with_context(|| format!("Row {row}: failed to read 'wave'"))?;
            let flux = extract_f64_list(flux_col, row)
                .with_context(|| format!("Row {row}: failed to read 'flux'"))?;
            let noise = match noise_col {
                Some(col) if !col.is_null(row) => Some(
                    extract_f64_list(col, row)
                        .with_context(|| format!("Row {row}: failed to read 'noise'"))?,
                ),
                _ => None,
            };
            let name = name_col
                .and_then(|col| extract_string(col, row))
                .unwrap_or_else(|| format!("spectrum {}", spectra.len()));

            let spectrum =
                Spectrum::new(name, wave, flux, noise).with_context(|| format!("Row {row}"))?;
            spectra.push(spectrum);
        }
    }

    Ok(spectra)
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    // The inner array can be Float64 or Float32
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

fn extract_string(col: &Arc<dyn Array>, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    match col.data_type() {
        DataType::Utf8 => col
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|s| s.value(row).to_string()),
        DataType::LargeUtf8 => Some(col.as_string::<i64>().value(row).to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// S/N column repair
// ---------------------------------------------------------------------------

/// Some library files store S/N in the noise column. When the median of
/// `flux / noise` over the brighter half of the spectrum is below 1, the
/// column is taken as S/N and replaced with `flux / snr`; gaps are filled with
/// the median noise. Returns whether the column was converted.
pub fn repair_snr_noise(sp: &mut Spectrum) -> bool {
    let Some(flux_median) = median(sp.flux.iter().copied()) else {
        return false;
    };
    let bright_snr = median(
        sp.flux
            .iter()
            .zip(&sp.noise)
            .filter(|(f, _)| **f > flux_median)
            .map(|(f, n)| f / n),
    );
    if !bright_snr.is_some_and(|snr| snr < 1.0) {
        return false;
    }

    let converted: Vec<f64> = sp.flux.iter().zip(&sp.noise).map(|(f, snr)| f / snr).collect();
    let fill = median(converted.iter().copied()).unwrap_or(f64::NAN);
    sp.noise = converted
        .into_iter()
        .map(|n| if n.is_finite() && n != 0.0 { n } else { fill })
        .collect();
    true
}

/// Median of the finite values, `None` if there are none.
fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut v: Vec<f64> = values.filter(|x| x.is_finite()).collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(f64::total_cmp);
    let n = v.len();
    Some(if n % 2 == 1 {
        v[n / 2]
    } else {
        0.5 * (v[n / 2 - 1] + v[n / 2])
    })
}
