use ndarray::{Array2, Array4, ArrayView2, Axis};

use super::model::{Mask, MaskedSignal, Volume, VoxelCoord};
use crate::error::{CleanError, Result};

// ---------------------------------------------------------------------------
// Volume → voxels × time
// ---------------------------------------------------------------------------

/// Pull the time series of every voxel selected by `mask` into a
/// `(n_voxels, n_timepoints)` matrix. Rows follow [`Mask::coords`].
pub fn extract(volume: &Volume, mask: &Mask) -> Result<MaskedSignal> {
    if volume.spatial_shape() != mask.shape() {
        return Err(CleanError::shape(format!(
            "mask grid {:?} does not match volume grid {:?}",
            mask.shape(),
            volume.spatial_shape()
        )));
    }

    let coords = mask.coords();
    let n_t = volume.n_timepoints();
    let mut values = Array2::zeros((coords.len(), n_t));
    for (mut row, &[x, y, z]) in values.axis_iter_mut(Axis(0)).zip(&coords) {
        row.assign(&volume.data.slice(ndarray::s![x, y, z, ..]));
    }

    Ok(MaskedSignal { coords, values })
}

// ---------------------------------------------------------------------------
// voxels × time → Volume
// ---------------------------------------------------------------------------

/// Write each row of `values` back to its voxel in a zero-filled 4D grid of
/// spatial shape `shape`. The fourth axis takes the column count of `values`.
pub fn scatter(coords: &[VoxelCoord], values: ArrayView2<f64>, shape: [usize; 3]) -> Result<Array4<f64>> {
    if coords.len() != values.nrows() {
        return Err(CleanError::shape(format!(
            "{} voxel coordinates for {} signal rows",
            coords.len(),
            values.nrows()
        )));
    }

    let [nx, ny, nz] = shape;
    let mut out = Array4::zeros((nx, ny, nz, values.ncols()));
    for (row, &[x, y, z]) in values.axis_iter(Axis(0)).zip(coords) {
        if x >= nx || y >= ny || z >= nz {
            return Err(CleanError::shape(format!(
                "voxel [{x}, {y}, {z}] outside grid {shape:?}"
            )));
        }
        out.slice_mut(ndarray::s![x, y, z, ..]).assign(&row);
    }
    Ok(out)
}

/// Zero every voxel of `data` that `mask` does not select.
pub fn apply_mask(data: &mut Array4<f64>, mask: &Mask) -> Result<()> {
    let (nx, ny, nz, _) = data.dim();
    if [nx, ny, nz] != mask.shape() {
        return Err(CleanError::shape(format!(
            "mask grid {:?} does not match data grid {:?}",
            mask.shape(),
            [nx, ny, nz]
        )));
    }
    for ((x, y, z), &selected) in mask.data.indexed_iter() {
        if !selected {
            data.slice_mut(ndarray::s![x, y, z, ..]).fill(0.0);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use nifti::NiftiHeader;

    fn ramp_volume() -> Volume {
        let data = Array4::from_shape_fn((2, 2, 2, 4), |(x, y, z, t)| {
            (100 * x + 10 * y + z) as f64 + t as f64 * 0.5
        });
        Volume::new(data, NiftiHeader::default())
    }

    fn corner_mask() -> Mask {
        let mut data = Array3::from_elem((2, 2, 2), false);
        data[[0, 0, 1]] = true;
        data[[1, 1, 0]] = true;
        Mask { data }
    }

    #[test]
    fn extract_keeps_mask_order() {
        let signal = extract(&ramp_volume(), &corner_mask()).unwrap();
        assert_eq!(signal.coords, vec![[0, 0, 1], [1, 1, 0]]);
        assert_eq!(signal.values.dim(), (2, 4));
        assert_eq!(signal.values[[0, 0]], 1.0);
        assert_eq!(signal.values[[1, 3]], 111.5);
    }

    #[test]
    fn extract_rejects_grid_mismatch() {
        let mask = Mask {
            data: Array3::from_elem((2, 2, 3), true),
        };
        assert!(matches!(extract(&ramp_volume(), &mask), Err(CleanError::Shape(_))));
    }

    #[test]
    fn scatter_round_trips_selected_voxels() {
        let vol = ramp_volume();
        let mask = corner_mask();
        let signal = extract(&vol, &mask).unwrap();
        let out = scatter(&signal.coords, signal.values.view(), vol.spatial_shape()).unwrap();

        for ((x, y, z), &selected) in mask.data.indexed_iter() {
            for t in 0..4 {
                let expected = if selected { vol.data[[x, y, z, t]] } else { 0.0 };
                assert_eq!(out[[x, y, z, t]], expected);
            }
        }
    }

    #[test]
    fn apply_mask_zeroes_outside() {
        let mut data = ramp_volume().data;
        apply_mask(&mut data, &corner_mask()).unwrap();
        assert_eq!(data[[1, 0, 0, 2]], 0.0);
        assert_eq!(data[[0, 0, 1, 2]], 2.0);
    }
}
