/// Data layer: the spectrum container and file loading.
///
/// Architecture:
/// ```text
///  .txt / .json / .csv / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Vec<Spectrum>, S/N column repair
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Spectrum  │  wave / flux / noise, missing noise = NaN
///   └──────────┘
///        │
///        ▼
///   SpectrumSampler → index measurement
/// ```

pub mod loader;
pub mod model;
