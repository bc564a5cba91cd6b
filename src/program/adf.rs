//! The ADF engine family: ADF, BAND and ReaxFF
//!
//! All three engines read the same shell-wrapper input format and run out
//! of an explicit scratch directory; they differ in which scratch files
//! are worth keeping and in how output redirection is spliced into the
//! input. BAND and ReaxFF are recognized by the engine invocation inside
//! the file, since the extension alone cannot tell them apart from ADF.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::warn;
use rand::Rng;
use serde::Serialize;

use crate::error::FatalError;
use crate::host::Host;
use crate::job::{with_suffix, Job};
use crate::program::{self, ProgramKind, Strategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    Adf,
    Band,
    ReaxFf,
}

pub struct AdfFamily {
    engine: Engine,
}

impl AdfFamily {
    pub fn adf() -> AdfFamily {
        AdfFamily { engine: Engine::Adf }
    }

    pub fn band() -> AdfFamily {
        AdfFamily { engine: Engine::Band }
    }

    pub fn reaxff() -> AdfFamily {
        AdfFamily {
            engine: Engine::ReaxFf,
        }
    }

    /// Raw scratch filename -> canonical output suffix.
    fn save_files(&self) -> &'static [(&'static str, &'static str)] {
        match self.engine {
            Engine::Adf => &[
                ("logfile", "logfile"),
                ("TAPE21", "t21"),
                ("TAPE13", "t13"),
                ("TAPE41", "t41"),
                ("dftb.chk", "chk"),
                ("dftb.rkf", "rkf"),
                ("TAPE15", "t15"),
                ("TAPE10", "t10"),
                ("TAPE16", "t16"),
            ],
            Engine::Band => &[("logfile", "logfile"), ("RUNKF", "runkf")],
            Engine::ReaxFf => &[
                ("summary.txt", "logfile"),
                ("xmolout", "rxxmol"),
                ("thermolog", "rxthermo"),
                ("energylog", "rxenergy"),
                ("molfra.out", "rxmolfra"),
                ("reaxout.kf", "rxkf"),
            ],
        }
    }

    /// The engine's live log in the scratch directory.
    fn raw_log(&self) -> &'static str {
        match self.engine {
            Engine::ReaxFf => "summary.txt",
            _ => "logfile",
        }
    }
}

/// Splice the job's output path into the input's heredoc invocations. The
/// first becomes a truncating redirect, the rest append. An input that
/// already carries the redirect comes back unchanged, so resubmitting an
/// edited file is a no-op.
fn redirect_heredoc(text: &str, output: &Path) -> String {
    let out = output.to_string_lossy();
    let first = format!("<<eor>{}", out);
    if text.contains(&first) {
        return text.to_string();
    }
    let text = text.replace("<< eor", "<<eor");
    let text = text.replace("<<eor", &format!("<<eor>>{}", out));
    text.replacen(&format!("<<eor>>{}", out), &first, 1)
}

/// ReaxFF writes through its own summary mechanism, so redirection means
/// piping the engine invocation itself and pointing the summary link at
/// the result directory. Idempotent like the heredoc splice.
fn redirect_reaxff(text: &str, job: &Job) -> String {
    let out = job.output_full.to_string_lossy();
    let invoke = "\"$ADFBIN/reaxff\"";
    let piped = format!("{}>{}", invoke, out);
    let mut text = if text.contains(&piped) {
        text.to_string()
    } else {
        text.replace(invoke, &piped)
    };

    let touch = "touch \"$SCM_LINK_SUMMARY_TXT\"";
    if !text.contains("export SCM_LINK_SUMMARY_TXT=") {
        let export = format!(
            "export SCM_LINK_SUMMARY_TXT=\"$SCM_RESULTDIR/{}.logfile\"; ",
            job.stem_base
        );
        text = text.replace(touch, &format!("{}{}", export, touch));
    }
    text
}

/// Scratch subdirectory name: the job stem plus a random salt, so two
/// submissions of the same input on one cluster cannot collide.
fn scratch_jobname(stem: &str) -> String {
    let mut rng = rand::thread_rng();
    let salt: String = (0..4).map(|_| rng.gen_range(b'a'..=b'z') as char).collect();
    let prefix: String = stem.chars().take(15).collect();
    format!("{}{}", prefix, salt)
}

#[derive(Serialize)]
struct ScriptContext {
    stem: String,
    scratch: String,
    jobname: String,
    temp: String,
    dir: String,
    input: String,
}

impl Strategy for AdfFamily {
    fn name(&self) -> &'static str {
        match self.engine {
            Engine::Adf => "ADF",
            Engine::Band => "BAND",
            Engine::ReaxFf => "ReaxFF",
        }
    }

    fn kind(&self) -> ProgramKind {
        match self.engine {
            Engine::Adf => ProgramKind::Adf,
            Engine::Band => ProgramKind::Band,
            Engine::ReaxFf => ProgramKind::ReaxFf,
        }
    }

    fn requires_scratch(&self) -> bool {
        true
    }

    fn validate(&self, job: &Job) -> Result<(), FatalError> {
        if job.ext == "inp" {
            eprintln!(
                "Warning: .inp extension for {} is being deprecated for .run.",
                self.name()
            );
        }
        Ok(())
    }

    fn executable(&self, _job: &Job, _host: &Host) -> Result<String, FatalError> {
        std::env::var("ADFHOME").map_err(|_| FatalError::MissingEnv("ADFHOME"))
    }

    fn launch_args(&self, job: &Job, _host: &Host) -> Result<Vec<String>, FatalError> {
        let mut args = program::nice_prefix(job);
        args.push("bash".to_string());
        args.push(job.input_base.clone());
        Ok(args)
    }

    fn edit_input(&self, text: &str, host: &Host, _job: &Job) -> Option<String> {
        let mut text = text.to_string();
        let mut changed = false;

        if let Some(swapped) = program::edit_location_paths(&text, host) {
            text = swapped;
            changed = true;
        }

        // Relic of an older submission layout; the redirect is spliced in
        // at script time now.
        for relic in [">>$SCM_OUTPUT", ">$SCM_OUTPUT"] {
            if text.contains(relic) {
                text = text.replace(relic, "");
                changed = true;
            }
        }

        if self.engine == Engine::ReaxFf {
            let touch = "touch \"$SCM_LINK_SUMMARY_TXT\"";
            let guarded = "touch \"$SCM_LINK_SUMMARY_TXT\" 2>/dev/null";
            if text.contains(touch) && !text.contains(guarded) {
                text = text.replace(touch, guarded);
                changed = true;
            }
        }

        changed.then_some(text)
    }

    fn link_log(&self, job: &Job, scratch: &Path) {
        let logname = format!("{}.logfile", job.stem_base);
        let result = Command::new("ln")
            .arg("-sfT")
            .arg(scratch.join(self.raw_log()))
            .arg(job.dir.join(logname))
            .status();
        if let Err(err) = result {
            warn!("Can't link the logfile: {}", err);
        }
    }

    fn script_body(&self, job: &Job, host: &Host, _procs: i64) -> anyhow::Result<String> {
        /// included ADF-family script template
        static SCRIPT: &str = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/templates/adf.txt"
        ));

        let raw = fs::read_to_string(&job.input_full)?;
        let input = match self.engine {
            Engine::ReaxFf => redirect_reaxff(&raw, job),
            _ => redirect_heredoc(&raw, &job.output_full),
        };

        let context = ScriptContext {
            stem: job.stem_full.to_string_lossy().into_owned(),
            scratch: job.scratch_root.to_string_lossy().into_owned(),
            jobname: scratch_jobname(&job.stem_base),
            temp: host.temp.to_string_lossy().into_owned(),
            dir: job.dir.to_string_lossy().into_owned(),
            input,
        };
        program::render("adf", SCRIPT, &context)
    }

    fn harvest(&self, job: &Job, scratch: &Path) -> Vec<(PathBuf, PathBuf)> {
        self.save_files()
            .iter()
            .filter_map(|(raw, suffix)| {
                let source = scratch.join(raw);
                source
                    .exists()
                    .then(|| (source, with_suffix(&job.stem_full, suffix)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heredoc_redirect_truncates_first_and_appends_rest() {
        let text = "\"$ADFBIN/adf\" <<eor\nend input\neor\n\"$ADFBIN/densf\" << eor\neor\n";
        let redirected = redirect_heredoc(text, Path::new("/data/mol.out"));
        assert!(redirected.contains("\"$ADFBIN/adf\" <<eor>/data/mol.out"));
        assert!(redirected.contains("\"$ADFBIN/densf\" <<eor>>/data/mol.out"));
    }

    #[test]
    fn heredoc_redirect_is_idempotent() {
        let text = "\"$ADFBIN/adf\" <<eor\neor\n";
        let once = redirect_heredoc(text, Path::new("/data/mol.out"));
        let twice = redirect_heredoc(&once, Path::new("/data/mol.out"));
        assert_eq!(once, twice);
    }

    #[test]
    fn reaxff_edit_guards_the_touch_call_once() {
        let family = AdfFamily::reaxff();
        let host = crate::host::Host::resolve("amp.chem.psu.edu").unwrap();
        let job = test_job();
        let text = "touch \"$SCM_LINK_SUMMARY_TXT\"\n\"$ADFBIN/reaxff\"\n";

        let once = family.edit_input(text, &host, &job).unwrap();
        assert!(once.contains("touch \"$SCM_LINK_SUMMARY_TXT\" 2>/dev/null"));
        // a second pass finds nothing left to do
        assert!(family.edit_input(&once, &host, &job).is_none());
    }

    #[test]
    fn reaxff_redirect_is_idempotent() {
        let job = test_job();
        let text = "touch \"$SCM_LINK_SUMMARY_TXT\"\n\"$ADFBIN/reaxff\"\n";
        let once = redirect_reaxff(text, &job);
        let twice = redirect_reaxff(&once, &job);
        assert_eq!(once, twice);
        assert!(once.contains("\"$ADFBIN/reaxff\">"));
        assert!(once.contains("export SCM_LINK_SUMMARY_TXT="));
    }

    #[test]
    fn band_keeps_only_its_save_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["logfile", "RUNKF", "TAPE21", "junk"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        let job = test_job();
        let pairs = AdfFamily::band().harvest(&job, dir.path());
        let mut kept: Vec<String> = pairs
            .iter()
            .map(|(src, _)| src.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        kept.sort();
        assert_eq!(kept, vec!["RUNKF", "logfile"]);
        let dests: Vec<&PathBuf> = pairs.iter().map(|(_, d)| d).collect();
        assert!(dests.contains(&&PathBuf::from("/data/mol.runkf")));
    }

    fn test_job() -> Job {
        use crate::job::{Flags, ProgramOptions, Resources};
        Job::new(
            Path::new("/data/mol.run"),
            "out",
            Path::new("/scratch"),
            Resources {
                nodes: None,
                ppn: None,
                wall: None,
                mem: None,
                exclusive: false,
            },
            Flags {
                script_only: false,
                exact: false,
                open: false,
                debug: false,
                quiet: false,
                pid: false,
                check_limits: true,
                nice: 19,
            },
            ProgramOptions {
                out: None,
                psp: Vec::new(),
                restart: None,
                restart_dir: None,
                image_scale: None,
                passthrough: Vec::new(),
            },
        )
    }
}
