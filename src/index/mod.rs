/// Spectral index measurement.
///
/// ```text
///   Spectrum ──► SpectrumSampler
///                     │
///                     ▼
///   ┌──────────┐   per definition   ┌─────────┐
///   │ measure  │ ◄───────────────── │  sets   │  static literature tables
///   └──────────┘                    └─────────┘
///        │
///        ▼
///   IndexValues  (name → value ± uncertainty)
/// ```

pub mod measure;
pub mod sets;

pub use measure::{measure_index, Band, CombineMethod, MeasuredIndex, SampleMethod};
pub use sets::{evaluate_set, evaluate_set_with, IndexDefinition, IndexSet, IndexValues};
