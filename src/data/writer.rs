use std::path::Path;

use log::debug;
use nifti::writer::WriterOptions;

use super::model::Volume;
use crate::error::{CleanError, Result};

/// Write `volume` as 64-bit float NIfTI, reusing its header.
///
/// Affine, voxel sizes, units and `pixdim[4]` carry over unchanged. Intensity
/// scaling is reset because the data is written already scaled. A `.gz`
/// suffix selects gzip compression. Missing parent directories are created.
pub fn save_volume(path: &Path, volume: &Volume) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| CleanError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut header = volume.header.clone();
    header.scl_slope = 1.0;
    header.scl_inter = 0.0;

    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(&volume.data)
        .map_err(|source| CleanError::Nifti {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("wrote {} with shape {:?}", path.display(), volume.data.shape());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_volume;
    use ndarray::Array4;
    use nifti::NiftiHeader;

    #[test]
    fn header_fields_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol.nii");

        let mut header = NiftiHeader::default();
        header.pixdim = [1.0, 1.5, 1.5, 3.0, 2.5, 0.0, 0.0, 0.0];
        header.xyzt_units = 2 | 8;
        header.sform_code = 1;
        header.srow_x = [1.5, 0.0, 0.0, -10.0];
        header.srow_y = [0.0, 1.5, 0.0, -12.0];
        header.srow_z = [0.0, 0.0, 3.0, 4.0];
        header.scl_slope = 2.0;

        let data = Array4::from_shape_fn((3, 2, 2, 5), |(x, y, z, t)| (x + 3 * y + 7 * z) as f64 * 0.5 + t as f64);
        save_volume(&path, &Volume::new(data.clone(), header)).unwrap();

        let back = load_volume(&path).unwrap();
        assert_eq!(back.data, data);
        assert_eq!(back.header.pixdim[4], 2.5);
        assert_eq!(back.header.srow_x, [1.5, 0.0, 0.0, -10.0]);
        assert_eq!(back.header.srow_z, [0.0, 0.0, 3.0, 4.0]);
        assert_eq!(back.header_tr(), Some(2.5));
    }

    #[test]
    fn parent_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("dir").join("vol.nii");
        save_volume(&path, &Volume::new(Array4::zeros((1, 1, 1, 2)), NiftiHeader::default())).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn blocked_parent_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        let err = save_volume(&file.join("vol.nii"), &Volume::new(Array4::zeros((1, 1, 1, 1)), NiftiHeader::default()))
            .unwrap_err();
        assert!(matches!(err, CleanError::Io { .. }));
    }

    #[test]
    fn gzip_output_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol.nii.gz");
        let data = Array4::from_elem((2, 2, 2, 3), 4.25);
        save_volume(&path, &Volume::new(data.clone(), NiftiHeader::default())).unwrap();
        assert_eq!(load_volume(&path).unwrap().data, data);
    }
}
