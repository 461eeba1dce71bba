#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ndarray::Array4;
use nifti::NiftiHeader;

use fmri_clean::data::model::Volume;
use fmri_clean::data::writer::save_volume;

pub const TR: f32 = 2.0;

pub fn header() -> NiftiHeader {
    let mut header = NiftiHeader::default();
    header.pixdim = [1.0, 2.0, 2.0, 2.5, TR, 0.0, 0.0, 0.0];
    header.xyzt_units = 2 | 8;
    header.sform_code = 1;
    header.srow_x = [2.0, 0.0, 0.0, -3.0];
    header.srow_y = [0.0, 2.0, 0.0, -4.0];
    header.srow_z = [0.0, 0.0, 2.5, 5.0];
    header
}

/// Deterministic 4D series; every voxel differs in offset, trend and
/// oscillation so that variances are distinct.
pub fn series(shape: (usize, usize, usize, usize)) -> Array4<f64> {
    Array4::from_shape_fn(shape, |(x, y, z, t)| {
        let v = (x * 9 + y * 3 + z) as f64;
        let t = t as f64;
        100.0 + 5.0 * v + 0.3 * (v + 1.0) * t + (v + 1.0) * (0.8 * t + v).sin() + (1.7 * t * (v + 2.0)).cos()
    })
}

pub fn write_volume(dir: &Path, name: &str, data: Array4<f64>) -> PathBuf {
    let path = dir.join(name);
    save_volume(&path, &Volume::new(data, header())).unwrap();
    path
}

/// Mask over a grid of `shape` selecting `voxels`.
pub fn write_mask(dir: &Path, name: &str, shape: (usize, usize, usize), voxels: &[[usize; 3]]) -> PathBuf {
    let mut data = Array4::zeros((shape.0, shape.1, shape.2, 1));
    for &[x, y, z] in voxels {
        data[[x, y, z, 0]] = 1.0;
    }
    write_volume(dir, name, data)
}

pub fn write_text(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// `rows` × `cols` whitespace table with smooth, non-collinear columns.
pub fn motion_table(rows: usize, cols: usize) -> String {
    (0..rows)
        .map(|t| {
            (0..cols)
                .map(|c| format!("{:.6}", ((t + 1) as f64 * (c + 1) as f64 * 0.37).sin() * 0.1))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
