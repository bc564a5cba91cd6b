//! Dalton jobs
//!
//! Dalton's wrapper manages its own scratch area, so interactive runs
//! launch it directly. Queue scripts stage restart archives, pin the work
//! memory from the per-processor request, and tar the wavefunction files
//! worth restarting from.

use std::env;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::FatalError;
use crate::host::Host;
use crate::job::Job;
use crate::program::{self, ProgramKind, Strategy, Stream, StreamPlan};

pub struct Dalton;

/// Wavefunction and bookkeeping files archived after a queue run.
const SAVED_FILES: &[&str] = &[
    "SIRIUS.RST",
    "SIRIFC",
    "molden.inp",
    "DALTON.ORB",
    "DALTON.MOL",
    "DALTON.ERR",
    "DALTON.CM",
    "DALTON.BAS",
    "RSPVEC",
];

#[derive(Serialize)]
struct ScriptContext {
    scratch: String,
    wrkmem: i64,
    nscm: i64,
    input: String,
    restart: String,
    restopt: String,
    dalton: String,
    output: String,
    base: String,
    files: String,
    dir: String,
}

/// Restart staging commands and the matching wrapper flag. An archive
/// name without a path is looked for in the submission directory; a
/// restart directory derives the archive name from the input stem, with
/// the numerical-differentiation prefix stripped when present.
fn restart_staging(job: &Job) -> (String, String) {
    fn unpack(archive: &str) -> String {
        format!(
            "# Explicitly perform the -f flag (Dalton local submission)\n\
             tar -x SIRIUS.RST -vzf {a}.tar.gz\n\
             tar -x RSPVEC -vzf {a}.tar.gz\n",
            a = archive
        )
    }

    if let Some(restart) = &job.opts.restart {
        let archive = if restart.contains('/') {
            restart.clone()
        } else {
            format!("{}/{}", job.dir.to_string_lossy(), restart)
        };
        (unpack(&archive), format!("-f {}", restart))
    } else if let Some(dir) = &job.opts.restart_dir {
        let name = if job.stem_base.contains("tpa_") {
            job.stem_base.replace("tpa_", "")
        } else {
            job.stem_base.clone()
        };
        let archive = dir.join(name);
        (unpack(&archive.to_string_lossy()), String::new())
    } else {
        (String::new(), String::new())
    }
}

impl Strategy for Dalton {
    fn name(&self) -> &'static str {
        "Dalton"
    }

    fn kind(&self) -> ProgramKind {
        ProgramKind::Dalton
    }

    fn requires_scratch(&self) -> bool {
        false
    }

    fn executable(&self, _job: &Job, _host: &Host) -> Result<String, FatalError> {
        let home = env::var("DALHOME").map_err(|_| FatalError::MissingEnv("DALHOME"))?;
        Ok(PathBuf::from(home)
            .join("bin")
            .join("dalton")
            .to_string_lossy()
            .into_owned())
    }

    fn launch_args(&self, job: &Job, host: &Host) -> Result<Vec<String>, FatalError> {
        let mut args = program::nice_prefix(job);
        args.push(self.executable(job, host)?);
        if job.opts.out.is_some() {
            args.push("-o".to_string());
            args.push(job.output_base.clone());
        }
        if !job.input_in_cwd() {
            args.push("-w".to_string());
            args.push(job.dir.to_string_lossy().into_owned());
        }
        args.push(job.input_base.clone());
        Ok(args)
    }

    fn streams(&self, job: &Job, _scratch: Option<&std::path::Path>) -> StreamPlan {
        if job.flags.quiet {
            StreamPlan {
                stdin: Stream::Inherit,
                stdout: Stream::Null,
                stderr: Stream::Null,
            }
        } else {
            StreamPlan {
                stdin: Stream::Inherit,
                stdout: Stream::Inherit,
                stderr: Stream::Inherit,
            }
        }
    }

    fn script_body(&self, job: &Job, host: &Host, _procs: i64) -> anyhow::Result<String> {
        /// included Dalton script template
        static SCRIPT: &str = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/templates/dalton.txt"
        ));

        let dalton = match env::var("DALTON") {
            Ok(path) => path,
            Err(_) => {
                let fallback = "/gpfs/group/jensen/dalton-2011/DALTON/bin/lionxg/dalton_mpi.x";
                println!("$DALTON environment variable not defined");
                println!("Defaulting to {}", fallback);
                fallback.to_string()
            }
        };

        let (restart, restopt) = restart_staging(job);
        let mem = job.resources.mem.unwrap_or(host.defaults.mem);

        let context = ScriptContext {
            scratch: job
                .scratch_root
                .join(&job.stem_base)
                .to_string_lossy()
                .into_owned(),
            // Dalton takes its work memory in megawords
            wrkmem: mem * 128000,
            nscm: 8,
            input: job.input_full.to_string_lossy().into_owned(),
            restart,
            restopt,
            dalton,
            output: job.output_full.to_string_lossy().into_owned(),
            base: job.stem_base.clone(),
            files: SAVED_FILES.join(" "),
            dir: job.dir.to_string_lossy().into_owned(),
        };
        program::render("dalton", SCRIPT, &context)
    }
}
