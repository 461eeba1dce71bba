use ndarray::{Array4, ArrayViewMut3, Axis};

use crate::error::{CleanError, Result};

/// Kernel radius in standard deviations.
const TRUNCATE: f64 = 4.0;

/// `sigma = fwhm / (2 * sqrt(2 * ln 2))`
pub fn fwhm_to_sigma(fwhm: f64) -> f64 {
    fwhm / (2.0 * (2.0 * std::f64::consts::LN_2).sqrt())
}

/// Smooth every frame of a 4D volume with a separable Gaussian of the given
/// FWHM in millimetres. Boundaries are mirrored.
pub fn gaussian_smooth(data: &mut Array4<f64>, voxel_sizes: [f64; 3], fwhm: f64) -> Result<()> {
    let kernels = kernels_for(voxel_sizes, fwhm)?;
    for frame in data.axis_iter_mut(Axis(3)) {
        smooth_frame(frame, &kernels);
    }
    Ok(())
}

fn smooth_frame(mut frame: ArrayViewMut3<f64>, kernels: &[Vec<f64>; 3]) {
    for (axis, kernel) in kernels.iter().enumerate() {
        for lane in frame.lanes_mut(Axis(axis)) {
            convolve_lane(lane, kernel);
        }
    }
}

fn kernels_for(voxel_sizes: [f64; 3], fwhm: f64) -> Result<[Vec<f64>; 3]> {
    if !(fwhm.is_finite() && fwhm > 0.0) {
        return Err(CleanError::config(format!("FWHM must be positive, got {fwhm}")));
    }
    if voxel_sizes.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
        return Err(CleanError::config(format!(
            "smoothing needs positive voxel sizes, header has {voxel_sizes:?}"
        )));
    }
    let sigma_mm = fwhm_to_sigma(fwhm);
    Ok(voxel_sizes.map(|size| gaussian_kernel(sigma_mm / size)))
}

/// Normalised 1D Gaussian with radius `round(TRUNCATE * sigma)`.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as isize;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|i| (-0.5 * (i as f64 / sigma).powi(2)).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

/// Mirror index into `0..n` (`d c b a | a b c d | d c b a`).
fn reflect(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = i.rem_euclid(period);
    if m < n as isize {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}

fn convolve_lane(mut lane: ndarray::ArrayViewMut1<f64>, kernel: &[f64]) {
    let n = lane.len();
    if n == 0 || kernel.len() <= 1 {
        return;
    }
    let radius = (kernel.len() / 2) as isize;
    let src = lane.to_vec();
    for (i, out) in lane.iter_mut().enumerate() {
        *out = kernel
            .iter()
            .enumerate()
            .map(|(k, w)| w * src[reflect(i as isize + k as isize - radius, n)])
            .sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn kernel_is_normalised_and_symmetric() {
        let k = gaussian_kernel(1.5);
        assert_eq!(k.len(), 13);
        assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        for i in 0..k.len() / 2 {
            assert!((k[i] - k[k.len() - 1 - i]).abs() < 1e-15);
        }
    }

    #[test]
    fn reflect_mirrors_edges() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
        assert_eq!(reflect(2, 4), 2);
        assert_eq!(reflect(9, 4), 1);
    }

    #[test]
    fn constant_volume_is_unchanged() {
        let mut data = Array4::from_elem((5, 4, 3, 2), 7.0);
        gaussian_smooth(&mut data, [2.0, 2.0, 3.0], 6.0).unwrap();
        assert!(data.iter().all(|v| (v - 7.0).abs() < 1e-12));
    }

    #[test]
    fn impulse_spreads_and_keeps_mass() {
        let mut frame = Array3::zeros((15, 15, 15));
        frame[[7, 7, 7]] = 1.0;
        let kernels = kernels_for([1.0, 1.0, 1.0], 2.0).unwrap();
        smooth_frame(frame.view_mut(), &kernels);
        assert!(frame[[7, 7, 7]] < 1.0);
        assert!(frame[[8, 7, 7]] > 0.0);
        assert!((frame.sum() - 1.0).abs() < 1e-9);
        assert!((frame[[6, 7, 7]] - frame[[8, 7, 7]]).abs() < 1e-15);
    }

    #[test]
    fn zero_voxel_size_is_rejected() {
        let mut data = Array4::zeros((2, 2, 2, 1));
        assert!(gaussian_smooth(&mut data, [0.0, 1.0, 1.0], 3.0).is_err());
        assert!(gaussian_smooth(&mut data, [1.0, 1.0, 1.0], 0.0).is_err());
    }
}
