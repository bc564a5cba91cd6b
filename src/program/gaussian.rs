//! Gaussian jobs

use serde::Serialize;

use crate::host::Host;
use crate::job::Job;
use crate::program::{self, ProgramKind, Strategy};

pub struct Gaussian;

#[derive(Serialize)]
struct ScriptContext {
    base: String,
    input: String,
}

impl Strategy for Gaussian {
    fn name(&self) -> &'static str {
        "Gaussian"
    }

    fn kind(&self) -> ProgramKind {
        ProgramKind::Gaussian
    }

    fn requires_scratch(&self) -> bool {
        true
    }

    fn script_body(&self, job: &Job, _host: &Host, _procs: i64) -> anyhow::Result<String> {
        /// included Gaussian script template
        static SCRIPT: &str = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/templates/gaussian.txt"
        ));

        // Gaussian writes its own .log output; the error stream gets a
        // distinct .errorfile name so a failure is easy to spot.
        let context = ScriptContext {
            base: job.stem_base.clone(),
            input: job.input_base.clone(),
        };
        program::render("gaussian", SCRIPT, &context)
    }
}
