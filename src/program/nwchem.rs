//! NWChem jobs

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::warn;
use serde::Serialize;

use crate::error::FatalError;
use crate::host::Host;
use crate::job::Job;
use crate::program::{self, ProgramKind, Strategy};

pub struct NwChem;

#[derive(Serialize)]
struct ScriptContext {
    stem: String,
    jobname: String,
    nwchem: String,
    input: String,
    output: String,
    base: String,
    dir: String,
}

impl Strategy for NwChem {
    fn name(&self) -> &'static str {
        "NWChem"
    }

    fn kind(&self) -> ProgramKind {
        ProgramKind::NwChem
    }

    fn requires_scratch(&self) -> bool {
        true
    }

    fn executable(&self, _job: &Job, _host: &Host) -> Result<String, FatalError> {
        env::var("NWCHEM_TOP").map_err(|_| FatalError::MissingEnv("NWCHEM_TOP"))
    }

    fn launch_args(&self, job: &Job, _host: &Host) -> Result<Vec<String>, FatalError> {
        let mut args = program::nice_prefix(job);
        if let Some(nodes) = job.resources.nodes {
            args.push("mpirun".to_string());
            args.push("-n".to_string());
            args.push(nodes.to_string());
        }
        args.push("nwchem".to_string());
        args.push(job.input_base.clone());
        Ok(args)
    }

    fn script_body(&self, job: &Job, host: &Host, _procs: i64) -> anyhow::Result<String> {
        /// included NWChem script templates, one per account kind
        static SCRIPT: &str = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/templates/nwchem.txt"
        ));
        static SCRIPT_COLLAB: &str = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/templates/nwchem_collab.txt"
        ));

        let nwchem = match env::var("NWCHEM") {
            Ok(path) => path,
            Err(_) => {
                let fallback = "/gpfs/group/jensen/nwchem-6.1.1/bin/LINUX64/nwchem";
                println!("$NWCHEM environment variable not defined");
                println!("Defaulting to {}", fallback);
                fallback.to_string()
            }
        };

        let context = ScriptContext {
            stem: job.stem_full.to_string_lossy().into_owned(),
            jobname: job.stem_base.chars().take(15).collect(),
            nwchem,
            input: job.input_full.to_string_lossy().into_owned(),
            output: job.output_full.to_string_lossy().into_owned(),
            base: job.stem_base.clone(),
            dir: job.dir.to_string_lossy().into_owned(),
        };

        if host.queue_account.as_deref() == Some("lxj18_collab") {
            program::render("nwchem_collab", SCRIPT_COLLAB, &context)
        } else {
            program::render("nwchem", SCRIPT, &context)
        }
    }

    /// Everything in scratch goes home as one archive; picking single
    /// files apart is the user's business.
    fn harvest(&self, job: &Job, scratch: &Path) -> Vec<(PathBuf, PathBuf)> {
        let tarname = format!("{}.tar.gz", job.stem_base);
        let status = Command::new("tar")
            .current_dir(scratch)
            .args(["-czf", &tarname, "--exclude", &tarname, "."])
            .status();
        match status {
            Ok(code) if code.success() => {
                vec![(scratch.join(&tarname), job.dir.join(&tarname))]
            }
            _ => {
                warn!("Can't archive the scratch directory, nothing harvested");
                Vec::new()
            }
        }
    }
}
