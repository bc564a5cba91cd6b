//! POV-Ray rendering jobs
//!
//! POV-Ray streams the image straight to its destination, so there is no
//! scratch handling and nothing to harvest. Scene sizing for VMD exports
//! rides in on the passthrough arguments.

use std::path::Path;
use std::process::{Command, Stdio};

use log::warn;
use serde::Serialize;

use crate::error::FatalError;
use crate::host::Host;
use crate::job::{with_suffix, Job};
use crate::program::{self, ProgramKind, Strategy, Stream, StreamPlan};

pub struct PovRay;

const INTERACTIVE_EXE: &str = "/usr/global/bin/povray";
const QUEUE_EXE: &str = "/usr/global/povray/3.6.1/bin/povray";

/// VMD renders at 800x800 by default; --vmd scales both dimensions.
fn scene_options(job: &Job) -> Vec<String> {
    let mut opts = job.opts.passthrough.clone();
    if let Some(scale) = job.opts.image_scale {
        let height = (scale * 800.0) as i64;
        let width = (scale * 800.0) as i64;
        opts.push(format!("+H{}", height));
        opts.push(format!("+W{}", width));
    }
    opts
}

#[derive(Serialize)]
struct ScriptContext {
    stem: String,
    povray: String,
    dir: String,
    home: String,
    opts: String,
    input: String,
    outbase: String,
    output: String,
}

impl Strategy for PovRay {
    fn name(&self) -> &'static str {
        "POVRay"
    }

    fn kind(&self) -> ProgramKind {
        ProgramKind::PovRay
    }

    fn requires_scratch(&self) -> bool {
        false
    }

    fn output_suffix(&self) -> &'static str {
        "png"
    }

    fn display_program(&self) -> &'static str {
        "display"
    }

    fn executable(&self, _job: &Job, _host: &Host) -> Result<String, FatalError> {
        Ok(INTERACTIVE_EXE.to_string())
    }

    fn launch_args(&self, job: &Job, host: &Host) -> Result<Vec<String>, FatalError> {
        let mut args = program::nice_prefix(job);
        args.push(self.executable(job, host)?);
        args.extend(scene_options(job));
        args.push(job.input_full.to_string_lossy().into_owned());
        if job.opts.out.is_some() {
            args.push(format!("-O{}", job.output_full.to_string_lossy()));
        }
        Ok(args)
    }

    fn streams(&self, job: &Job, _scratch: Option<&Path>) -> StreamPlan {
        if job.flags.quiet {
            StreamPlan {
                stdin: Stream::Inherit,
                stdout: Stream::Inherit,
                stderr: Stream::ToFile(with_suffix(&job.stem_full, "logfile")),
            }
        } else {
            StreamPlan {
                stdin: Stream::Inherit,
                stdout: Stream::Inherit,
                stderr: Stream::Inherit,
            }
        }
    }

    /// The render log comes out with Mac line endings; normalize it when
    /// we captured it.
    fn post_run(&self, job: &Job) {
        if !job.flags.quiet {
            return;
        }
        let logfile = with_suffix(&job.stem_full, "logfile");
        let result = Command::new("mac2unix")
            .arg(&logfile)
            .stderr(Stdio::null())
            .status();
        if let Err(err) = result {
            warn!("Can't normalize {}: {}", logfile.display(), err);
        }
    }

    fn script_body(&self, job: &Job, _host: &Host, _procs: i64) -> anyhow::Result<String> {
        /// included POV-Ray script template
        static SCRIPT: &str = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/templates/povray.txt"
        ));

        let home = std::env::var("HOME").map_err(|_| FatalError::MissingEnv("HOME"))?;
        let context = ScriptContext {
            stem: job.stem_full.to_string_lossy().into_owned(),
            povray: QUEUE_EXE.to_string(),
            dir: job.dir.to_string_lossy().into_owned(),
            home,
            opts: scene_options(job).join(" "),
            input: job.input_full.to_string_lossy().into_owned(),
            outbase: job.output_base.clone(),
            output: job.output_full.to_string_lossy().into_owned(),
        };
        program::render("povray", SCRIPT, &context)
    }
}
