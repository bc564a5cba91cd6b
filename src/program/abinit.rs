//! ABINIT jobs
//!
//! ABINIT is driven by a generated `.files` file listing the input, the
//! output names and the pseudopotentials, fed to the binary on stdin.
//! The pseudopotential paths must come from the user; there is no way to
//! guess them.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use log::warn;
use serde::Serialize;

use crate::error::FatalError;
use crate::host::Host;
use crate::job::{with_suffix, Job};
use crate::program::{self, ProgramKind, Strategy, Stream, StreamPlan};

pub struct Abinit;

fn files_name(job: &Job) -> String {
    format!("{}.files", job.stem_base)
}

fn input_stem(job: &Job) -> String {
    // stem of the input filename itself, which differs from the job stem
    // when --out renames the run
    Path::new(&job.input_base)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Serialize)]
struct ScriptContext {
    stem: String,
    base: String,
    input: String,
    inpbase: String,
    inpstem: String,
    psp: String,
    prog: String,
    output: String,
    dir: String,
}

impl Strategy for Abinit {
    fn name(&self) -> &'static str {
        "ABINIT"
    }

    fn kind(&self) -> ProgramKind {
        ProgramKind::Abinit
    }

    fn requires_scratch(&self) -> bool {
        true
    }

    fn output_suffix(&self) -> &'static str {
        "logfile"
    }

    fn validate(&self, job: &Job) -> Result<(), FatalError> {
        if job.opts.psp.is_empty() {
            return Err(FatalError::MissingPsp);
        }
        Ok(())
    }

    fn executable(&self, _job: &Job, host: &Host) -> Result<String, FatalError> {
        if host.name.contains("hammer") {
            Ok("abinis".to_string())
        } else {
            Ok("abinit".to_string())
        }
    }

    /// The input arrives on stdin via the .files file, so the argv is
    /// just the binary.
    fn launch_args(&self, job: &Job, host: &Host) -> Result<Vec<String>, FatalError> {
        let mut args = program::nice_prefix(job);
        args.push(self.executable(job, host)?);
        Ok(args)
    }

    fn stage_inputs(&self, job: &Job, scratch: &Path) -> io::Result<()> {
        // The .files driver lands next to the input and in scratch; the
        // input itself is referenced by absolute path.
        let files_path = job.dir.join(files_name(job));
        let mut file = fs::File::create(&files_path)?;
        writeln!(file, "{}", job.input_full.to_string_lossy())?;
        writeln!(file, "{}.out", job.stem_base)?;
        writeln!(file, "{}i", input_stem(job))?;
        writeln!(file, "{}o", job.stem_base)?;
        writeln!(file, "tmp")?;
        for psp in &job.opts.psp {
            writeln!(file, "{}", psp.to_string_lossy())?;
        }

        // Auxiliary restart inputs follow the <stem>i* convention
        let aux_prefix = format!("{}i", input_stem(job));
        for entry in fs::read_dir(&job.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&aux_prefix) && entry.path().is_file() {
                fs::copy(entry.path(), scratch.join(&name))?;
            }
        }

        fs::copy(&files_path, scratch.join(files_name(job)))?;
        Ok(())
    }

    fn streams(&self, job: &Job, scratch: Option<&Path>) -> StreamPlan {
        let files = match scratch {
            Some(dir) => dir.join(files_name(job)),
            None => job.dir.join(files_name(job)),
        };
        StreamPlan {
            stdin: Stream::FromFile(files),
            stdout: Stream::ToFile(job.output_full.clone()),
            stderr: Stream::ToFile(with_suffix(&job.stem_full, "err")),
        }
    }

    fn script_body(&self, job: &Job, _host: &Host, procs: i64) -> anyhow::Result<String> {
        /// included ABINIT script template
        static SCRIPT: &str = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/templates/abinit.txt"
        ));

        let psp: Vec<String> = job
            .opts
            .psp
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let prog = if procs > 1 { "mpirun abinip" } else { "abinis" };

        let input_stem_full = job
            .input_full
            .with_extension("")
            .to_string_lossy()
            .into_owned();

        let context = ScriptContext {
            stem: job.stem_full.to_string_lossy().into_owned(),
            base: job.stem_base.clone(),
            input: job.input_full.to_string_lossy().into_owned(),
            inpbase: input_stem(job),
            inpstem: input_stem_full,
            psp: psp.join("\n"),
            prog: prog.to_string(),
            output: job.output_full.to_string_lossy().into_owned(),
            dir: job.dir.to_string_lossy().into_owned(),
        };
        program::render("abinit", SCRIPT, &context)
    }

    /// Archive the numbered output files, then bring back the archive and
    /// the main output.
    fn harvest(&self, job: &Job, scratch: &Path) -> Vec<(PathBuf, PathBuf)> {
        let tarname = format!("{}.tar.gz", job.stem_base);
        let prefix = format!("{}o", job.stem_base);

        let mut outputs: Vec<String> = match fs::read_dir(scratch) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| name.starts_with(&prefix))
                .collect(),
            Err(_) => Vec::new(),
        };
        outputs.sort();

        if !outputs.is_empty() {
            let status = Command::new("tar")
                .current_dir(scratch)
                .arg("-czf")
                .arg(&tarname)
                .args(&outputs)
                .status();
            if !matches!(status, Ok(code) if code.success()) {
                warn!("Can't archive the numbered outputs");
            }
        }

        let mut pairs = Vec::new();
        if scratch.join(&tarname).exists() {
            pairs.push((scratch.join(&tarname), job.dir.join(&tarname)));
        }
        let main_out = scratch.join(format!("{}.out", job.stem_base));
        if main_out.exists() {
            pairs.push((main_out, with_suffix(&job.stem_full, "out")));
        }
        pairs
    }
}
