//! Q-Chem jobs
//!
//! Q-Chem's environment scripts expect csh, so generated scripts carry a
//! csh interpreter line whatever the host dialect.

use serde::Serialize;

use crate::host::Host;
use crate::job::Job;
use crate::program::{self, ProgramKind, Strategy};

pub struct QChem;

#[derive(Serialize)]
struct ScriptContext {
    base: String,
    input: String,
    output: String,
}

impl Strategy for QChem {
    fn name(&self) -> &'static str {
        "QChem"
    }

    fn kind(&self) -> ProgramKind {
        ProgramKind::QChem
    }

    fn requires_scratch(&self) -> bool {
        true
    }

    fn shebang(&self) -> Option<&'static str> {
        Some("#!/bin/csh")
    }

    fn script_body(&self, job: &Job, _host: &Host, _procs: i64) -> anyhow::Result<String> {
        /// included Q-Chem script template
        static SCRIPT: &str = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/templates/qchem.txt"
        ));

        let context = ScriptContext {
            base: job.stem_base.clone(),
            input: job.input_base.clone(),
            output: job.output_base.clone(),
        };
        program::render("qchem", SCRIPT, &context)
    }
}
