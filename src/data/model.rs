use ndarray::{Array2, Array3, Array4, ArrayD, Axis, Ix3};
use nifti::NiftiHeader;

use crate::error::{CleanError, Result};

/// Spatial index of a voxel: `[x, y, z]`.
pub type VoxelCoord = [usize; 3];

// NIfTI `xyzt_units` time bits.
const UNITS_TIME_MASK: u8 = 0x38;
const UNITS_MSEC: u8 = 16;
const UNITS_USEC: u8 = 24;

// ---------------------------------------------------------------------------
// Volume – a 4D time series plus its header
// ---------------------------------------------------------------------------

/// A 4D image `(x, y, z, t)` together with the header it was read from.
///
/// The header carries the affine (`srow_*`, `quatern_*`), the voxel sizes and
/// the temporal resolution (`pixdim[4]`); every output written from a
/// `Volume` reuses it.
#[derive(Debug, Clone)]
pub struct Volume {
    pub data: Array4<f64>,
    pub header: NiftiHeader,
}

impl Volume {
    pub fn new(data: Array4<f64>, header: NiftiHeader) -> Self {
        Volume { data, header }
    }

    /// `[nx, ny, nz]`.
    pub fn spatial_shape(&self) -> [usize; 3] {
        let (nx, ny, nz, _) = self.data.dim();
        [nx, ny, nz]
    }

    pub fn n_timepoints(&self) -> usize {
        self.data.len_of(Axis(3))
    }

    /// Sampling interval in seconds from `pixdim[4]`, honouring the
    /// millisecond and microsecond unit codes. `None` when the field is unset.
    pub fn header_tr(&self) -> Option<f64> {
        let raw = self.header.pixdim[4] as f64;
        if !raw.is_finite() || raw <= 0.0 {
            return None;
        }
        let tr = match self.header.xyzt_units & UNITS_TIME_MASK {
            UNITS_MSEC => raw / 1_000.0,
            UNITS_USEC => raw / 1_000_000.0,
            _ => raw,
        };
        Some(tr)
    }

    /// Absolute voxel edge lengths from `pixdim[1..4]`.
    pub fn voxel_sizes(&self) -> [f64; 3] {
        [
            (self.header.pixdim[1] as f64).abs(),
            (self.header.pixdim[2] as f64).abs(),
            (self.header.pixdim[3] as f64).abs(),
        ]
    }

    /// A new volume sharing this one's header.
    pub fn with_data(&self, data: Array4<f64>) -> Volume {
        Volume {
            data,
            header: self.header.clone(),
        }
    }

    /// Mean over time of every voxel.
    pub fn temporal_mean(&self) -> Array3<f64> {
        let n = self.n_timepoints().max(1) as f64;
        self.data.sum_axis(Axis(3)) / n
    }
}

// ---------------------------------------------------------------------------
// Mask – the in-brain voxel set
// ---------------------------------------------------------------------------

/// Boolean voxel selection over a 3D grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub data: Array3<bool>,
}

impl Mask {
    /// Any non-zero value selects the voxel. A 4D image whose fourth axis has
    /// length one is accepted as 3D.
    pub fn from_values(values: ArrayD<f64>) -> Result<Self> {
        let values = match values.ndim() {
            3 => values,
            4 if values.len_of(Axis(3)) == 1 => values.index_axis_move(Axis(3), 0),
            _ => {
                return Err(CleanError::shape(format!(
                    "mask must be 3D, got shape {:?}",
                    values.shape()
                )))
            }
        };
        let values = values
            .into_dimensionality::<Ix3>()
            .map_err(|e| CleanError::shape(format!("mask: {e}")))?;
        Ok(Mask {
            data: values.mapv(|v| v != 0.0),
        })
    }

    /// Voxels whose mean over time is non-zero; used when no mask is given.
    pub fn from_nonzero_mean(volume: &Volume) -> Self {
        Mask {
            data: volume.temporal_mean().mapv(|v| v != 0.0),
        }
    }

    pub fn shape(&self) -> [usize; 3] {
        let (nx, ny, nz) = self.data.dim();
        [nx, ny, nz]
    }

    /// Selected voxel coordinates in C order over `(x, y, z)`.
    pub fn coords(&self) -> Vec<VoxelCoord> {
        self.data
            .indexed_iter()
            .filter(|&(_, &selected)| selected)
            .map(|((x, y, z), _)| [x, y, z])
            .collect()
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }
}

// ---------------------------------------------------------------------------
// MaskedSignal – voxels × time matrix with its row → voxel mapping
// ---------------------------------------------------------------------------

/// Time series of every selected voxel, one row per voxel.
#[derive(Debug, Clone)]
pub struct MaskedSignal {
    /// Row `i` of `values` belongs to voxel `coords[i]`.
    pub coords: Vec<VoxelCoord>,
    /// Shape `(n_voxels, n_timepoints)`.
    pub values: Array2<f64>,
}

impl MaskedSignal {
    pub fn n_voxels(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_timepoints(&self) -> usize {
        self.values.ncols()
    }
}

// ---------------------------------------------------------------------------
// RegressorTable – externally supplied per-timepoint regressors
// ---------------------------------------------------------------------------

/// A table of regressors: one row per timepoint, one column per parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressorTable {
    /// Column labels; generated (`col0`, `col1`, …) when the source has none.
    pub columns: Vec<String>,
    /// Shape `(n_rows, n_columns)`.
    pub values: Array2<f64>,
}

impl RegressorTable {
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.values.ncols()
    }

    /// Build from row-major rows; all rows must have the same width.
    pub fn from_rows(columns: Option<Vec<String>>, rows: Vec<Vec<f64>>) -> anyhow::Result<Self> {
        let width = match (&columns, rows.first()) {
            (Some(cols), _) => cols.len(),
            (None, Some(first)) => first.len(),
            (None, None) => 0,
        };
        for (i, row) in rows.iter().enumerate() {
            if row.len() != width {
                anyhow::bail!("row {i} has {} values, expected {width}", row.len());
            }
        }
        let n_rows = rows.len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let values = Array2::from_shape_vec((n_rows, width), flat)?;
        let columns = columns.unwrap_or_else(|| (0..width).map(|i| format!("col{i}")).collect());
        Ok(RegressorTable { columns, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn header_with_tr(tr: f32, units: u8) -> NiftiHeader {
        let mut header = NiftiHeader::default();
        header.pixdim = [1.0, 2.0, 2.0, 3.0, tr, 0.0, 0.0, 0.0];
        header.xyzt_units = units;
        header
    }

    #[test]
    fn header_tr_reads_pixdim_in_seconds() {
        let vol = Volume::new(Array4::zeros((1, 1, 1, 4)), header_with_tr(2.0, 2 | 8));
        assert_eq!(vol.header_tr(), Some(2.0));
    }

    #[test]
    fn header_tr_converts_milliseconds() {
        let vol = Volume::new(Array4::zeros((1, 1, 1, 4)), header_with_tr(1500.0, 2 | 16));
        assert_eq!(vol.header_tr(), Some(1.5));
    }

    #[test]
    fn header_tr_is_none_when_unset() {
        let vol = Volume::new(Array4::zeros((1, 1, 1, 4)), header_with_tr(0.0, 0));
        assert_eq!(vol.header_tr(), None);
    }

    #[test]
    fn mask_coords_follow_c_order() {
        let mut values = Array::zeros(IxDyn(&[2, 2, 2]));
        values[&[1, 0, 1][..]] = 3.0;
        values[&[0, 1, 0][..]] = 1.0;
        values[&[0, 0, 1][..]] = -1.0;
        let mask = Mask::from_values(values).unwrap();
        assert_eq!(mask.coords(), vec![[0, 0, 1], [0, 1, 0], [1, 0, 1]]);
        assert_eq!(mask.count(), 3);
    }

    #[test]
    fn mask_accepts_singleton_fourth_axis() {
        let values = Array::ones(IxDyn(&[2, 3, 4, 1]));
        let mask = Mask::from_values(values).unwrap();
        assert_eq!(mask.shape(), [2, 3, 4]);
    }

    #[test]
    fn mask_rejects_time_series() {
        let values = Array::ones(IxDyn(&[2, 2, 2, 5]));
        assert!(matches!(Mask::from_values(values), Err(CleanError::Shape(_))));
    }

    #[test]
    fn table_rows_must_share_width() {
        let err = RegressorTable::from_rows(None, vec![vec![1.0, 2.0], vec![3.0]]);
        assert!(err.is_err());
        let table = RegressorTable::from_rows(None, vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(table.columns, vec!["col0", "col1"]);
        assert_eq!(table.values[[1, 0]], 3.0);
    }
}
