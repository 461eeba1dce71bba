/// Data layer: volume and table I/O, masking.
///
/// Architecture:
/// ```text
///  .nii / .nii.gz            .csv / .tsv / .par / .json / .parquet
///        │                              │
///        ▼                              ▼
///   ┌──────────┐                  ┌──────────┐
///   │  loader   │  → Volume, Mask  │  loader   │  → RegressorTable
///   └──────────┘                  └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ masking   │  extract → MaskedSignal (voxels × time) … scatter back
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  writer   │  Volume → .nii / .nii.gz (header reused)
///   └──────────┘
/// ```

pub mod loader;
pub mod masking;
pub mod model;
pub mod writer;
