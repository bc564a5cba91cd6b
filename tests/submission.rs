//! End-to-end submission scenarios, short of invoking any real scheduler
//! or computational program.

use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use hemuli::host::limits::ResourceRequest;
use hemuli::host::Host;
use hemuli::job::{Flags, Job, ProgramOptions, Resources};
use hemuli::program;
use hemuli::submit::queue;

fn resources(nodes: i64, ppn: i64, wall: &str, mem: i64) -> Resources {
    Resources {
        nodes: Some(nodes),
        ppn: Some(ppn),
        wall: Some(wall.parse().unwrap()),
        mem: Some(mem),
        exclusive: false,
    }
}

fn bare_resources() -> Resources {
    Resources {
        nodes: None,
        ppn: None,
        wall: None,
        mem: None,
        exclusive: false,
    }
}

fn flags() -> Flags {
    Flags {
        script_only: true,
        exact: false,
        open: false,
        debug: false,
        quiet: false,
        pid: false,
        check_limits: true,
        nice: 19,
    }
}

fn opts() -> ProgramOptions {
    ProgramOptions {
        out: None,
        psp: Vec::new(),
        restart: None,
        restart_dir: None,
        image_scale: None,
        passthrough: Vec::new(),
    }
}

#[test]
fn dalton_runs_interactively_under_nice_without_scratch_handling() {
    env::set_var("DALHOME", "/opt/dalton");
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("run.dal");
    fs::write(&input, "**DALTON INPUT\n.RUN WAVE FUNCTIONS\n").unwrap();

    let host = Host::resolve("amp.chem.psu.edu").unwrap();
    let strategy = program::strategy(program::classify(&input).unwrap());
    assert!(!strategy.requires_scratch());

    let job = Job::new(
        &input,
        strategy.output_suffix(),
        &host.scratch,
        bare_resources(),
        flags(),
        opts(),
    );
    assert_eq!(job.output_base, "run.out");

    let args = strategy.launch_args(&job, &host).unwrap();
    assert_eq!(args[0], "nice");
    assert_eq!(args[1], "-n");
    assert_eq!(args[2], "19");
    assert_eq!(args[3], "/opt/dalton/bin/dalton");
    assert_eq!(args.last().unwrap(), "run.dal");
}

#[test]
fn pbs_script_carries_the_validated_resource_request() {
    env::set_var("USER", "mymble");
    let host = Host::resolve("acib.production.int.aci.ics.psu.edu").unwrap();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("slab.nw");
    fs::write(&input, "title \"slab\"\ntask dft energy\n").unwrap();

    let strategy = program::strategy(program::classify(&input).unwrap());
    let job = Job::new(
        &input,
        strategy.output_suffix(),
        &host.scratch,
        resources(4, 8, "24:00:00", 2000),
        flags(),
        opts(),
    );
    let request = ResourceRequest {
        nodes: 4,
        ppn: 8,
        wall: "24:00:00".parse().unwrap(),
        mem: Some(2000),
    };
    host.check_limits(&request).unwrap();

    let script = queue::build_script(&job, &host, strategy.as_ref(), &request).unwrap();
    assert!(script.contains("#PBS -l nodes=4:ppn=8\n"));
    assert!(script.contains("#PBS -l walltime=24:00:00\n"));
    assert!(script.contains("#PBS -l pmem=2000mb\n"));

    let path = queue::generate_script(&job, &host, strategy.as_ref(), &request).unwrap();
    assert_eq!(path, dir.path().join("slab.script"));
    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_ne!(mode & 0o111, 0);
}

#[test]
fn over_limit_request_aborts_before_any_script_is_written() {
    env::set_var("USER", "mymble");
    let host = Host::resolve("acib.production.int.aci.ics.psu.edu").unwrap();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("huge.nw");
    fs::write(&input, "task dft energy\n").unwrap();

    let strategy = program::strategy(program::classify(&input).unwrap());
    let job = Job::new(
        &input,
        strategy.output_suffix(),
        &host.scratch,
        resources(1000, 8, "24:00:00", 2000),
        flags(),
        opts(),
    );

    let err = queue::submit(&job, &host, strategy.as_ref()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Max nodes on acib.production.int.aci.ics.psu.edu is 253"
    );
    assert!(!dir.path().join("huge.script").exists());
}

#[test]
fn shared_extension_files_classify_by_their_engine() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("surface.run");
    fs::write(&input, "#!/bin/sh\n\"$ADFBIN/band\" <<eor\nEND\neor\n").unwrap();
    assert_eq!(
        program::classify(&input).unwrap(),
        program::ProgramKind::Band
    );
}

#[test]
fn job_script_files_cannot_run_interactively() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("prebuilt.script");
    fs::write(&input, "#PBS -l nodes=1:ppn=1\nhostname\n").unwrap();

    let host = Host::resolve("amp.chem.psu.edu").unwrap();
    let strategy = program::strategy(program::classify(&input).unwrap());
    let job = Job::new(
        &input,
        strategy.output_suffix(),
        &host.scratch,
        bare_resources(),
        flags(),
        opts(),
    );
    let err = strategy.launch_args(&job, &host).unwrap_err();
    assert_eq!(
        err.to_string(),
        "File prebuilt.script is a job script. Submitting it interactively makes no sense."
    );
}

#[test]
fn scratch_directories_for_different_processes_cannot_collide() {
    let a = hemuli::scratch::scratch_dir_name("ADF", 1000);
    let b = hemuli::scratch::scratch_dir_name("ADF", 1001);
    assert_ne!(a, b);
}

#[test]
fn exclusive_requests_omit_ppn_and_memory_directives() {
    env::set_var("USER", "mymble");
    let mut host = Host::resolve("submit01.hpc.psu.edu").unwrap();
    host.queue_account = Some("open".to_string());

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("wide.nw");
    fs::write(&input, "task dft energy\n").unwrap();

    let strategy = program::strategy(program::classify(&input).unwrap());
    let mut res = bare_resources();
    res.nodes = Some(2);
    res.wall = Some("48:00:00".parse().unwrap());
    res.exclusive = true;
    let job = Job::new(
        &input,
        strategy.output_suffix(),
        &host.scratch,
        res,
        flags(),
        opts(),
    );
    let request = ResourceRequest {
        nodes: 2,
        ppn: -1,
        wall: "48:00:00".parse().unwrap(),
        mem: None,
    };

    let script = queue::build_script(&job, &host, strategy.as_ref(), &request).unwrap();
    assert!(script.contains("#SBATCH --exclusive\n"));
    assert!(!script.contains("--ntasks-per-node"));
    assert!(!script.contains("--mem-per-cpu"));
    assert!(script.contains("#SBATCH --account=open\n"));
    assert!(script.contains("#SBATCH --partition=open\n"));
}

#[test]
fn input_edits_swap_storage_prefixes_only_once() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("mol.run");
    fs::write(&input, "cd /gpfs/work/jensen/mol\n\"$ADFBIN/adf\" <<eor\neor\n").unwrap();

    let host = Host::resolve("amp.chem.psu.edu").unwrap();
    let strategy = program::strategy(program::ProgramKind::Adf);
    let job = Job::new(
        &input,
        strategy.output_suffix(),
        Path::new("/scratch"),
        bare_resources(),
        flags(),
        opts(),
    );

    let text = fs::read_to_string(&input).unwrap();
    let edited = strategy.edit_input(&text, &host, &job).unwrap();
    assert!(edited.contains("amphome"));
    // a second pass has nothing left to change
    assert!(strategy.edit_input(&edited, &host, &job).is_none());
}
