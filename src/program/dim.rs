//! DIM jobs

use std::env;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::FatalError;
use crate::host::Host;
use crate::job::{with_suffix, Job};
use crate::program::{self, ProgramKind, Strategy, Stream, StreamPlan};

pub struct Dim;

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[derive(Serialize)]
struct ScriptContext {
    stem: String,
    dim: String,
    input: String,
    output: String,
}

impl Strategy for Dim {
    fn name(&self) -> &'static str {
        "DIM"
    }

    fn kind(&self) -> ProgramKind {
        ProgramKind::Dim
    }

    fn requires_scratch(&self) -> bool {
        false
    }

    fn executable(&self, _job: &Job, _host: &Host) -> Result<String, FatalError> {
        let dimpath = env::var("DIMPATH").map_err(|_| FatalError::MissingEnv("DIMPATH"))?;
        for dir in env::split_paths(&dimpath) {
            let exe = dir.join("dim.py");
            if is_executable(&exe) {
                return Ok(exe.to_string_lossy().into_owned());
            }
        }
        Err(FatalError::DimNotFound)
    }

    fn launch_args(&self, job: &Job, host: &Host) -> Result<Vec<String>, FatalError> {
        let mut args = program::nice_prefix(job);
        args.push(self.executable(job, host)?);
        args.push(job.input_full.to_string_lossy().into_owned());
        if job.opts.out.is_some() {
            args.push("-o".to_string());
            args.push(job.output_full.to_string_lossy().into_owned());
        }
        if let Some(nodes) = job.resources.nodes {
            args.push("-n".to_string());
            args.push(nodes.to_string());
        }
        Ok(args)
    }

    fn streams(&self, job: &Job, _scratch: Option<&Path>) -> StreamPlan {
        if job.flags.quiet {
            StreamPlan {
                stdin: Stream::Inherit,
                stdout: Stream::ToFile(with_suffix(&job.stem_full, "logfile")),
                stderr: Stream::Inherit,
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
        /// included DIM script templates, one per account kind
        static SCRIPT: &str = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/templates/dim.txt"
        ));
        static SCRIPT_COLLAB: &str = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/templates/dim_collab.txt"
        ));

        let dim = match env::var("DIM") {
            Ok(path) => path,
            Err(_) => {
                let fallback = "/gpfs/group/jensen/dim/dim.py";
                println!("$DIM environment variable not defined");
                println!("Defaulting to {}", fallback);
                fallback.to_string()
            }
        };

        let context = ScriptContext {
            stem: job.stem_full.to_string_lossy().into_owned(),
            dim,
            input: job.input_full.to_string_lossy().into_owned(),
            output: job.output_full.to_string_lossy().into_owned(),
        };

        if host.queue_account.as_deref() == Some("lxj18_collab") {
            program::render("dim_collab", SCRIPT_COLLAB, &context)
        } else {
            program::render("dim", SCRIPT, &context)
        }
    }
}
