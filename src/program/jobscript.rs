//! Pre-built scheduler scripts
//!
//! A `.script` file already contains its own directives and is handed to
//! the scheduler verbatim. There is nothing to run interactively and no
//! body to generate; the submission driver short-circuits both.

use anyhow::bail;

use crate::error::FatalError;
use crate::host::Host;
use crate::job::Job;
use crate::program::{ProgramKind, Strategy};

pub struct JobScript;

impl Strategy for JobScript {
    fn name(&self) -> &'static str {
        "JobScript"
    }

    fn kind(&self) -> ProgramKind {
        ProgramKind::JobScript
    }

    fn requires_scratch(&self) -> bool {
        false
    }

    fn launch_args(&self, job: &Job, _host: &Host) -> Result<Vec<String>, FatalError> {
        Err(FatalError::InteractiveJobScript(job.input_base.clone()))
    }

    fn script_body(&self, _job: &Job, _host: &Host, _procs: i64) -> anyhow::Result<String> {
        bail!("job scripts are submitted verbatim")
    }
}
