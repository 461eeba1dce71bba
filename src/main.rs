use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use fmri_clean::Job;

fn main() -> ExitCode {
    env_logger::init();

    let Some(job_path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("usage: fmri-clean <job.json>");
        return ExitCode::from(2);
    };

    let job = match Job::load(&job_path) {
        Ok(job) => job,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("[ERROR] {e:?}");
            return ExitCode::FAILURE;
        }
    };

    let status = job.run(&mut io::stdout().lock(), &mut io::stderr().lock());
    ExitCode::from(status.code() as u8)
}
