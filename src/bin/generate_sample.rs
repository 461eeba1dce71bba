use std::f64::consts::PI;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::{Array2, Array4};
use nifti::NiftiHeader;

use fmri_clean::data::model::Volume;
use fmri_clean::data::writer::save_volume;
use fmri_clean::{CleanParams, Job};

const SHAPE: (usize, usize, usize) = (16, 16, 8);
const N_TIMEPOINTS: usize = 120;
const TR: f64 = 2.0;
const VOXEL_MM: f32 = 3.0;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        mean + std_dev * z
    }
}

fn header() -> NiftiHeader {
    let mut header = NiftiHeader::default();
    header.pixdim = [1.0, VOXEL_MM, VOXEL_MM, VOXEL_MM, TR as f32, 0.0, 0.0, 0.0];
    header.xyzt_units = 2 | 8; // mm, sec
    header.sform_code = 1;
    header.srow_x = [VOXEL_MM, 0.0, 0.0, -24.0];
    header.srow_y = [0.0, VOXEL_MM, 0.0, -24.0];
    header.srow_z = [0.0, 0.0, VOXEL_MM, -12.0];
    header
}

fn in_brain(x: usize, y: usize, z: usize) -> bool {
    let (nx, ny, nz) = SHAPE;
    let dx = (x as f64 + 0.5) / nx as f64 - 0.5;
    let dy = (y as f64 + 0.5) / ny as f64 - 0.5;
    let dz = (z as f64 + 0.5) / nz as f64 - 0.5;
    (dx / 0.42).powi(2) + (dy / 0.45).powi(2) + (dz / 0.45).powi(2) <= 1.0
}

/// Six rigid-body parameters per timepoint: slow drifts plus two small jerks.
fn motion_parameters(rng: &mut SimpleRng) -> Array2<f64> {
    Array2::from_shape_fn((N_TIMEPOINTS, 6), |(t, p)| {
        let drift = 0.002 * t as f64 * (p as f64 + 1.0) / 6.0;
        let jerk = if (40..44).contains(&t) || (90..92).contains(&t) {
            0.05 * (p as f64 - 2.5)
        } else {
            0.0
        };
        drift + jerk
    })
    .mapv(|v| v + rng.gauss(0.0, 0.0005))
}

fn main() -> Result<()> {
    env_logger::init();
    let out_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    std::fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let motion = motion_parameters(&mut rng);
    let (nx, ny, nz) = SHAPE;

    // Shared nuisance: cardiac-like oscillation, strongest near the "vessels".
    let physio: Vec<f64> = (0..N_TIMEPOINTS)
        .map(|t| (2.0 * PI * 0.23 * t as f64 * TR).sin())
        .collect();
    // Resting-state fluctuation in the left half.
    let network: Vec<f64> = (0..N_TIMEPOINTS)
        .map(|t| (2.0 * PI * 0.03 * t as f64 * TR).sin())
        .collect();

    let mut data = Array4::<f64>::zeros((nx, ny, nz, N_TIMEPOINTS));
    let mut mask = Array4::<f64>::zeros((nx, ny, nz, 1));
    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                if !in_brain(x, y, z) {
                    continue;
                }
                mask[[x, y, z, 0]] = 1.0;
                let vessel = (x + y) % 7 == 0;
                let physio_amp = if vessel { 40.0 } else { 2.0 };
                let network_amp = if x < nx / 2 { 6.0 } else { 0.0 };
                let baseline = 1000.0 + rng.gauss(0.0, 30.0);
                for t in 0..N_TIMEPOINTS {
                    let drift = 0.15 * t as f64;
                    let motion_leak = 200.0 * motion[[t, (x + z) % 6]];
                    data[[x, y, z, t]] = baseline
                        + drift
                        + physio_amp * physio[t]
                        + network_amp * network[t]
                        + motion_leak
                        + rng.gauss(0.0, 4.0);
                }
            }
        }
    }

    let func_path = out_dir.join("func.nii.gz");
    let mask_path = out_dir.join("mask.nii.gz");
    let motion_path = out_dir.join("motion.par");
    save_volume(&func_path, &Volume::new(data, header()))?;
    save_volume(&mask_path, &Volume::new(mask, header()))?;
    write_motion(&motion_path, &motion)?;

    let mut params = CleanParams::new(&func_path, out_dir.join("func_clean.nii.gz"), &mask_path);
    params.motion_param_path = Some(motion_path);
    params.high_pass = Some(0.01);
    params.low_pass = Some(0.1);
    let job_path = out_dir.join("clean_job.json");
    let job = serde_json::to_string_pretty(&Job::Clean(params))?;
    std::fs::write(&job_path, job).with_context(|| format!("writing {}", job_path.display()))?;

    println!(
        "Wrote {}x{}x{}x{N_TIMEPOINTS} series, mask, motion table and job file to {}",
        nx,
        ny,
        nz,
        out_dir.display()
    );
    Ok(())
}

fn write_motion(path: &Path, motion: &Array2<f64>) -> Result<()> {
    let mut file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    for row in motion.outer_iter() {
        let line: Vec<String> = row.iter().map(|v| format!("{v:.6}")).collect();
        writeln!(file, "{}", line.join("  "))?;
    }
    Ok(())
}
