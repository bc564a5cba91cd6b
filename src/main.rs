use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::info;

use hemuli::cli::Args;
use hemuli::error::{FatalError, Result, SkipError, SubmitError};
use hemuli::host::{rc, Host};
use hemuli::job::{abs_path, Flags, Job, ProgramOptions, Resources};
use hemuli::{program, submit};

fn main() {
    env_logger::init();
    info!("hei! starting up :)");

    if let Err(err) = run() {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let identity = hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut host = Host::resolve(&identity)?;
    info!("Submitting on {}", host.name);

    if args.limits {
        host.print_limits();
        return Ok(());
    }

    // Option combinations that cannot mean anything
    if args.exact && args.ppn == Some(-1) {
        return Err(FatalError::ExactWithoutPpn.into());
    }
    if args.restart.is_some() && args.restart_dir.is_some() {
        return Err(FatalError::ConflictingRestart.into());
    }

    let input_files = gather_input_files(&args)?;
    if (args.restart.is_some() || args.out.is_some()) && input_files.len() > 1 {
        return Err(FatalError::SingleFileOption.into());
    }

    // The allocation table decides which account jobs bill to; a local
    // machine has no scheduler to bill.
    match rc::select_allocation(&args.allocation) {
        Ok(account) => host.queue_account = Some(account),
        Err(FatalError::AllocationTable) if host.local => {}
        Err(err) => return Err(err.into()),
    }

    if args.default {
        host.apply_user_defaults()?;
    }

    let resources = Resources::from_args(&args, &host)?;
    let flags = Flags::from_args(&args);
    let opts = ProgramOptions::from_args(&args);
    let scratch_root = args
        .scratch
        .clone()
        .unwrap_or_else(|| host.scratch.clone());

    for file in &input_files {
        match submit_one(file, &host, &scratch_root, &resources, &flags, &opts) {
            Ok(()) => {}
            Err(SubmitError::Skip(skip)) => {
                eprintln!("{}", skip);
                eprintln!("Skipping...");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn gather_input_files(args: &Args) -> Result<Vec<PathBuf>> {
    if !args.input_files.is_empty() {
        return Ok(args.input_files.clone());
    }
    let mut files = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            files.push(PathBuf::from(trimmed));
        }
    }
    Ok(files)
}

fn submit_one(
    path: &Path,
    host: &Host,
    scratch_root: &Path,
    resources: &Resources,
    flags: &Flags,
    opts: &ProgramOptions,
) -> Result<()> {
    let full = abs_path(path);
    let submittable = fs::metadata(&full)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false);
    if !submittable {
        return Err(SkipError::Unreadable(full).into());
    }

    let kind = program::classify(&full)?;
    let strategy = program::strategy(kind);
    let job = Job::new(
        &full,
        strategy.output_suffix(),
        scratch_root,
        resources.clone(),
        flags.clone(),
        opts.clone(),
    );
    submit::submit(&job, host, strategy.as_ref())
}
