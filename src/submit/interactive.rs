//! Interactive execution
//!
//! Blocks until the program exits; there is no timeout at this layer.
//! Wall-time limits only constrain what gets requested from a scheduler,
//! they are not enforced by killing anything here.

use std::env;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use chrono::Local;
use serde::Serialize;

use crate::error::Result;
use crate::host::Host;
use crate::job::Job;
use crate::program::{Strategy, Stream, StreamPlan};
use crate::scratch::{self, scratch_dir_name, ScratchDir};

pub fn run(job: &Job, host: &Host, strategy: &dyn Strategy) -> Result<()> {
    if strategy.requires_scratch() {
        run_in_scratch(job, host, strategy)?;
    } else {
        run_direct(job, host, strategy)?;
    }

    if job.flags.debug {
        let _ = Command::new(strategy.display_program())
            .arg(&job.output_full)
            .status();
    }
    Ok(())
}

fn run_in_scratch(job: &Job, host: &Host, strategy: &dyn Strategy) -> Result<()> {
    let args = strategy.launch_args(job, host)?;
    let executable = strategy.executable(job, host)?;
    let scratch_path = job
        .scratch_root
        .join(scratch_dir_name(strategy.name(), std::process::id()));

    if !job.flags.quiet {
        print_banner(job, &executable, &scratch_path)?;
    }

    let scratch = ScratchDir::create(&job.scratch_root, strategy.name())?;

    // Loose checkpoint tapes in the invocation directory ride along.
    for tape in ["TAPE21", "TAPE16"] {
        if Path::new(tape).is_file() {
            fs::copy(tape, scratch.path().join(tape))?;
        }
    }
    strategy.stage_inputs(job, scratch.path())?;
    strategy.link_log(job, scratch.path());

    let plan = strategy.streams(job, Some(scratch.path()));
    let _ = spawn(&args, Some(scratch.path()), &plan)?;

    let pairs = strategy.harvest(job, scratch.path());
    scratch::harvest_copy(&pairs);
    drop(scratch);

    if !job.flags.quiet {
        print_tail();
    }
    Ok(())
}

fn run_direct(job: &Job, host: &Host, strategy: &dyn Strategy) -> Result<()> {
    let args = strategy.launch_args(job, host)?;
    let plan = strategy.streams(job, None);
    let _ = spawn(&args, None, &plan)?;
    strategy.post_run(job);
    Ok(())
}

/// Run the argv with the requested stream wiring, waiting for it to
/// finish. The child's exit status is the user's to interpret.
fn spawn(
    args: &[String],
    cwd: Option<&Path>,
    plan: &StreamPlan,
) -> io::Result<std::process::ExitStatus> {
    let mut command = Command::new(&args[0]);
    command.args(&args[1..]);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    wire(&mut command, plan)?;
    command.status()
}

fn wire(command: &mut Command, plan: &StreamPlan) -> io::Result<()> {
    match &plan.stdin {
        Stream::Inherit => {}
        Stream::Null => {
            command.stdin(Stdio::null());
        }
        Stream::FromFile(path) => {
            command.stdin(Stdio::from(File::open(path)?));
        }
        Stream::ToFile(_) => {}
    }
    match &plan.stdout {
        Stream::Inherit => {}
        Stream::Null => {
            command.stdout(Stdio::null());
        }
        Stream::ToFile(path) => {
            command.stdout(Stdio::from(File::create(path)?));
        }
        Stream::FromFile(_) => {}
    }
    match &plan.stderr {
        Stream::Inherit => {}
        Stream::Null => {
            command.stderr(Stdio::null());
        }
        Stream::ToFile(path) => {
            command.stderr(Stdio::from(File::create(path)?));
        }
        Stream::FromFile(_) => {}
    }
    Ok(())
}

#[derive(Serialize)]
struct BannerContext {
    invocation: String,
    date: String,
    input: String,
    output: String,
    pid: u32,
    nice: i64,
    dir: String,
    scratch: String,
    program: String,
}

/// Frame the run so interleaved program output stays attributable.
fn print_banner(job: &Job, executable: &str, scratch: &Path) -> Result<()> {
    /// included banner template
    static BANNER: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/data/templates/banner.txt"
    ));

    let invocation: Vec<String> = env::args().collect();
    let context = BannerContext {
        invocation: invocation.join(" "),
        date: Local::now().format("%c").to_string(),
        input: job.input_full.to_string_lossy().into_owned(),
        output: job.output_full.to_string_lossy().into_owned(),
        pid: std::process::id(),
        nice: job.flags.nice,
        dir: job.dir.to_string_lossy().into_owned(),
        scratch: scratch.to_string_lossy().into_owned(),
        program: executable.to_string(),
    };
    let banner = crate::program::render("banner", BANNER, &context)?;
    eprintln!("{}", banner);
    Ok(())
}

#[derive(Serialize)]
struct TailContext {
    date: String,
}

fn print_tail() {
    /// included completion trailer template
    static TAIL: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/data/templates/tail.txt"
    ));
    let context = TailContext {
        date: Local::now().format("%c").to_string(),
    };
    if let Ok(tail) = crate::program::render("tail", TAIL, &context) {
        println!("{}", tail);
    }
}
