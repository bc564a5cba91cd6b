//! The submission driver
//!
//! One job at a time: apply input edits, then dispatch on the host's
//! submission mode. Interactive execution blocks until the program
//! exits; queue submission returns as soon as the scheduler takes the
//! script.

/// Interactive execution, with and without explicit scratch
pub mod interactive;
/// Script generation and the scheduler handoff
pub mod queue;

use std::fs;

use log::info;

use crate::error::Result;
use crate::host::{Host, SubmitMode};
use crate::job::Job;
use crate::program::Strategy;

pub fn submit(job: &Job, host: &Host, strategy: &dyn Strategy) -> Result<()> {
    strategy.validate(job)?;
    apply_input_edits(job, host, strategy)?;

    match host.mode {
        SubmitMode::Interactive => interactive::run(job, host, strategy),
        SubmitMode::Queue => queue::submit(job, host, strategy),
    }
}

/// Location-specific rewrites of the input file. All edits are
/// idempotent, so resubmitting an already-edited file leaves it alone.
fn apply_input_edits(job: &Job, host: &Host, strategy: &dyn Strategy) -> Result<()> {
    let text = fs::read_to_string(&job.input_full)?;
    if let Some(edited) = strategy.edit_input(&text, host, job) {
        info!("Rewriting {} for this host", job.input_full.display());
        fs::write(&job.input_full, edited)?;
    }
    Ok(())
}
