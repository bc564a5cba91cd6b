//! Program families and their submission strategies
//!
//! Each supported computational program knows how to name its output,
//! build an interactive launch, fill a scheduler-script body, and pick
//! the files worth keeping from scratch. Everything else (headers,
//! scratch lifecycle, the scheduler handoff) is shared.

/// ABINIT: explicit scratch, driven by a generated .files file
pub mod abinit;
/// The ADF engine family: ADF, BAND and ReaxFF share an input format
pub mod adf;
/// Dalton: manages its own scratch
pub mod dalton;
/// DIM: manages its own scratch
pub mod dim;
/// Gaussian: explicit scratch
pub mod gaussian;
/// Pre-built scheduler scripts submitted verbatim
pub mod jobscript;
/// NWChem: explicit scratch
pub mod nwchem;
/// POV-Ray rendering jobs
pub mod povray;
/// Q-Chem: explicit scratch, csh scripts
pub mod qchem;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::error::{FatalError, SkipError};
use crate::host::Host;
use crate::job::Job;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramKind {
    Adf,
    Band,
    ReaxFf,
    NwChem,
    Gaussian,
    QChem,
    Abinit,
    Dalton,
    PovRay,
    Dim,
    JobScript,
}

/// Map a file to its program family.
///
/// The extension decides, except that the ADF engines share `.run` and
/// `.inp` and are told apart by the engine invocation inside the file.
/// The sniff reads the file once; a file that cannot be read here is a
/// per-file skip, not a fatal error.
pub fn classify(path: &Path) -> Result<ProgramKind, SkipError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    match ext.as_str() {
        "pov" | "ini" => Ok(ProgramKind::PovRay),
        "inp" | "run" => sniff_adf_engine(path),
        "nw" => Ok(ProgramKind::NwChem),
        "dal" => Ok(ProgramKind::Dalton),
        "g09" => Ok(ProgramKind::Gaussian),
        "qchem" => Ok(ProgramKind::QChem),
        "in" => Ok(ProgramKind::Abinit),
        "dim" => Ok(ProgramKind::Dim),
        "script" => Ok(ProgramKind::JobScript),
        _ => Err(SkipError::UnknownExtension(ext)),
    }
}

fn sniff_adf_engine(path: &Path) -> Result<ProgramKind, SkipError> {
    let text =
        fs::read_to_string(path).map_err(|_| SkipError::SniffFailed(path.to_path_buf()))?;
    if text.contains("$ADFBIN/band") {
        Ok(ProgramKind::Band)
    } else if text.contains("$ADFBIN/reaxff") {
        Ok(ProgramKind::ReaxFf)
    } else {
        Ok(ProgramKind::Adf)
    }
}

pub fn strategy(kind: ProgramKind) -> Box<dyn Strategy> {
    match kind {
        ProgramKind::Adf => Box::new(adf::AdfFamily::adf()),
        ProgramKind::Band => Box::new(adf::AdfFamily::band()),
        ProgramKind::ReaxFf => Box::new(adf::AdfFamily::reaxff()),
        ProgramKind::NwChem => Box::new(nwchem::NwChem),
        ProgramKind::Gaussian => Box::new(gaussian::Gaussian),
        ProgramKind::QChem => Box::new(qchem::QChem),
        ProgramKind::Abinit => Box::new(abinit::Abinit),
        ProgramKind::Dalton => Box::new(dalton::Dalton),
        ProgramKind::PovRay => Box::new(povray::PovRay),
        ProgramKind::Dim => Box::new(dim::Dim),
        ProgramKind::JobScript => Box::new(jobscript::JobScript),
    }
}

/// Where a child process stream goes during interactive execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stream {
    Inherit,
    Null,
    ToFile(PathBuf),
    FromFile(PathBuf),
}

#[derive(Debug, Clone)]
pub struct StreamPlan {
    pub stdin: Stream,
    pub stdout: Stream,
    pub stderr: Stream,
}

/// The family-specific rules for building, launching and harvesting one
/// class of computational job. One implementation per program family.
pub trait Strategy {
    /// Family name, used for scratch directory naming and messages.
    fn name(&self) -> &'static str;

    fn kind(&self) -> ProgramKind;

    /// Whether interactive runs need an explicitly managed scratch
    /// directory.
    fn requires_scratch(&self) -> bool;

    /// Extension of the default output file.
    fn output_suffix(&self) -> &'static str {
        "out"
    }

    /// Program used by --debug to show the finished output.
    fn display_program(&self) -> &'static str {
        "less"
    }

    /// Interpreter line for generated scripts, when the family is picky.
    fn shebang(&self) -> Option<&'static str> {
        None
    }

    /// Family-specific sanity checks before any work happens.
    fn validate(&self, _job: &Job) -> Result<(), FatalError> {
        Ok(())
    }

    /// Executable behind interactive runs; also shown in the banner.
    fn executable(&self, job: &Job, _host: &Host) -> Result<String, FatalError> {
        Ok(job.input_full.to_string_lossy().into_owned())
    }

    /// Interactive argv. Starts with nice so a workstation stays usable
    /// while the job runs.
    fn launch_args(&self, job: &Job, host: &Host) -> Result<Vec<String>, FatalError> {
        let mut args = nice_prefix(job);
        args.push(self.executable(job, host)?);
        Ok(args)
    }

    /// The scheduler-script payload placed below the host header.
    fn script_body(&self, job: &Job, host: &Host, procs: i64) -> anyhow::Result<String>;

    /// Rewrites applied to the input file before submission. Must be
    /// idempotent; `None` means the file is left untouched.
    fn edit_input(&self, text: &str, host: &Host, _job: &Job) -> Option<String> {
        edit_location_paths(text, host)
    }

    /// Stage the input (and whatever else the family needs) into scratch.
    fn stage_inputs(&self, job: &Job, scratch: &Path) -> io::Result<()> {
        stage_checkpoint_tapes(job, scratch)?;
        fs::copy(&job.input_full, scratch.join(&job.input_base))?;
        Ok(())
    }

    /// Soft link placed in the submission directory so the raw log can be
    /// followed while the job runs.
    fn link_log(&self, _job: &Job, _scratch: &Path) {}

    /// Stream wiring for the interactive subprocess.
    fn streams(&self, job: &Job, _scratch: Option<&Path>) -> StreamPlan {
        if job.flags.quiet {
            StreamPlan {
                stdin: Stream::Inherit,
                stdout: Stream::ToFile(job.output_full.clone()),
                stderr: Stream::ToFile(PathBuf::from("logfile")),
            }
        } else {
            StreamPlan {
                stdin: Stream::Inherit,
                stdout: Stream::ToFile(job.output_full.clone()),
                stderr: Stream::Inherit,
            }
        }
    }

    /// (source, destination) pairs to copy out of scratch after the run.
    fn harvest(&self, _job: &Job, _scratch: &Path) -> Vec<(PathBuf, PathBuf)> {
        Vec::new()
    }

    /// Fixups after a run that streamed its results directly.
    fn post_run(&self, _job: &Job) {}
}

pub(crate) fn nice_prefix(job: &Job) -> Vec<String> {
    vec![
        "nice".to_string(),
        "-n".to_string(),
        job.flags.nice.to_string(),
    ]
}

/// Swap the storage prefix between the cluster filesystem and its local
/// mount, whichever direction this host needs. Both replacements are
/// idempotent because each erases the marker the other looks for.
pub(crate) fn edit_location_paths(text: &str, host: &Host) -> Option<String> {
    if host.local && text.contains("gpfs/work") {
        Some(text.replace("gpfs/work", "amphome"))
    } else if !host.local && text.contains("amphome") {
        Some(text.replace("amphome", "gpfs/work"))
    } else {
        None
    }
}

/// Checkpoint tapes named after the input are staged into scratch under
/// the names the engine expects.
pub(crate) fn stage_checkpoint_tapes(job: &Job, scratch: &Path) -> io::Result<()> {
    for (ext, tape) in [("t21", "TAPE21"), ("t16", "TAPE16")] {
        let checkpoint = crate::job::with_suffix(&job.stem_full, ext);
        if checkpoint.is_file() {
            fs::copy(&checkpoint, scratch.join(tape))?;
        }
    }
    Ok(())
}

/// Render one of the embedded script templates.
pub(crate) fn render<C: Serialize>(
    name: &'static str,
    template: &'static str,
    context: &C,
) -> anyhow::Result<String> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template(name, template)?;
    Ok(tt.render(name, context)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(classify(Path::new("a.dal")).unwrap(), ProgramKind::Dalton);
        assert_eq!(classify(Path::new("a.pov")).unwrap(), ProgramKind::PovRay);
        assert_eq!(classify(Path::new("a.nw")).unwrap(), ProgramKind::NwChem);
        assert_eq!(classify(Path::new("a.g09")).unwrap(), ProgramKind::Gaussian);
        assert_eq!(classify(Path::new("a.in")).unwrap(), ProgramKind::Abinit);
        assert_eq!(
            classify(Path::new("a.script")).unwrap(),
            ProgramKind::JobScript
        );
    }

    #[test]
    fn unknown_extension_is_a_per_file_skip() {
        let err = classify(Path::new("notes.txt")).unwrap_err();
        assert_eq!(err.to_string(), "Unrecognized extension: txt.");
    }

    #[test]
    fn shared_extension_is_resolved_by_engine_marker() {
        let dir = tempfile::tempdir().unwrap();

        let band = dir.path().join("slab.run");
        let mut f = fs::File::create(&band).unwrap();
        writeln!(f, "#!/bin/sh\n\"$ADFBIN/band\" <<eor").unwrap();
        assert_eq!(classify(&band).unwrap(), ProgramKind::Band);

        let reaxff = dir.path().join("md.run");
        let mut f = fs::File::create(&reaxff).unwrap();
        writeln!(f, "touch x\n\"$ADFBIN/reaxff\"").unwrap();
        assert_eq!(classify(&reaxff).unwrap(), ProgramKind::ReaxFf);

        let adf = dir.path().join("mol.run");
        let mut f = fs::File::create(&adf).unwrap();
        writeln!(f, "\"$ADFBIN/adf\" <<eor").unwrap();
        assert_eq!(classify(&adf).unwrap(), ProgramKind::Adf);
    }

    #[test]
    fn missing_file_during_sniff_is_a_skip() {
        let err = classify(Path::new("/nonexistent/mol.run")).unwrap_err();
        assert!(matches!(err, SkipError::SniffFailed(_)));
    }
}
