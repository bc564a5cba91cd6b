//! Queue submission
//!
//! Builds the scheduler script (host-dialect header + program body),
//! writes it next to the input with execute permission, and either hands
//! it to the scheduler binary or stops after writing when --script is
//! given. Submission is fire-and-forget; once the scheduler accepts the
//! script the job is its problem.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::anyhow;
use log::info;

use crate::error::{FatalError, Result};
use crate::host::limits::ResourceRequest;
use crate::host::walltime::Walltime;
use crate::host::{Host, QueueDialect};
use crate::job::{with_suffix, Job};
use crate::program::{ProgramKind, Strategy};

pub fn submit(job: &Job, host: &Host, strategy: &dyn Strategy) -> Result<()> {
    if strategy.kind() == ProgramKind::JobScript {
        return submit_verbatim(job, host, strategy);
    }

    let request = resolve_resources(job, host)?;
    if job.flags.check_limits {
        host.check_limits(&request)?;
    }

    let script_path = generate_script(job, host, strategy, &request)?;
    let name = job_name(&job.stem_base);
    let command = scheduler_command(job, host, &name, &script_path)?;

    if job.flags.script_only {
        println!(
            "Wrote {} job script {}...",
            strategy.name(),
            script_path.display()
        );
        println!("Submit with \"{}\"", command.join(" "));
        println!();
    } else {
        println!("Submitting {} job {}...", strategy.name(), job.stem_base);
        let _ = Command::new(&command[0]).args(&command[1..]).status();
        println!();
    }
    Ok(())
}

/// Pre-built scripts carry their own directives; they go to the
/// scheduler untouched.
fn submit_verbatim(job: &Job, host: &Host, strategy: &dyn Strategy) -> Result<()> {
    let name = job_name(&job.stem_base);
    let command = scheduler_command(job, host, &name, &job.input_full)?;
    println!("Submitting {} job {}...", strategy.name(), job.stem_base);
    let _ = Command::new(&command[0]).args(&command[1..]).status();
    println!();
    Ok(())
}

/// Fill in whatever the flags left out, asking on stdin with the host
/// default shown. An empty answer takes the default. The exclusive
/// shorthand requests whole nodes, so ppn and memory are not asked for.
fn resolve_resources(job: &Job, host: &Host) -> Result<ResourceRequest> {
    let d = &host.defaults;
    println!("File {}", job.input_full.display());

    let nodes = match job.resources.nodes {
        Some(nodes) => nodes,
        None => prompt_i64(
            &format!("How many nodes do you want assigned? [{}] ", d.nodes),
            d.nodes,
            || FatalError::BadNodes,
        )?,
    };

    let (ppn, mem) = if job.resources.exclusive {
        (-1, None)
    } else {
        let ppn = match job.resources.ppn {
            Some(ppn) => ppn,
            None => prompt_i64(
                &format!("How many processors per node? [{}] ", d.ppn),
                d.ppn,
                || FatalError::BadPpn,
            )?,
        };
        let mem = match job.resources.mem {
            Some(mem) => mem,
            None => prompt_i64(
                &format!(
                    "How much memory per processor do you want (MB) [{}] ",
                    d.mem
                ),
                d.mem,
                || FatalError::BadMem,
            )?,
        };
        (ppn, Some(mem))
    };

    let wall = match job.resources.wall {
        Some(wall) => wall,
        None => {
            let answer = prompt(&format!("Requested wall clock time? [{}] ", d.wall))?;
            if answer.is_empty() {
                d.wall
            } else {
                answer
                    .parse::<Walltime>()
                    .map_err(|_| FatalError::BadWalltime(answer))?
            }
        }
    };

    Ok(ResourceRequest {
        nodes,
        ppn,
        wall,
        mem,
    })
}

fn prompt(message: &str) -> io::Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_i64<F>(message: &str, default: i64, err: F) -> Result<i64>
where
    F: Fn() -> FatalError,
{
    let answer = prompt(message)?;
    if answer.is_empty() {
        Ok(default)
    } else {
        answer.parse().map_err(|_| err().into())
    }
}

/// Write the full scheduler script with execute permission and return
/// its path.
pub fn generate_script(
    job: &Job,
    host: &Host,
    strategy: &dyn Strategy,
    request: &ResourceRequest,
) -> Result<PathBuf> {
    let text = build_script(job, host, strategy, request)?;
    let path = with_suffix(&job.stem_full, "script");
    fs::write(&path, &text)?;
    let mut permissions = fs::metadata(&path)?.permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions)?;
    info!("Wrote scheduler script {}", path.display());
    Ok(path)
}

pub fn build_script(
    job: &Job,
    host: &Host,
    strategy: &dyn Strategy,
    request: &ResourceRequest,
) -> Result<String> {
    let dialect = host
        .dialect
        .ok_or_else(|| anyhow!("{} has no queue dialect", host.name))?;
    let header = match dialect {
        QueueDialect::Pbs => pbs_header(job, strategy, request),
        QueueDialect::Sbatch => sbatch_header(job, host, strategy, request),
    };
    let procs = (request.nodes * request.ppn).abs();
    let body = strategy.script_body(job, host, procs)?;
    Ok(format!("{}{}", header, body))
}

fn pbs_header(job: &Job, strategy: &dyn Strategy, request: &ResourceRequest) -> String {
    let mut h = String::with_capacity(512);
    if let Some(shebang) = strategy.shebang() {
        let _ = writeln!(h, "{}", shebang);
    }
    let _ = writeln!(h, "#");
    if job.flags.exact {
        let _ = writeln!(h, "#PBS -W x=nmatchpolicy:exactnode");
    }
    if request.ppn == -1 {
        let _ = writeln!(h, "#PBS -l nodes={}", request.nodes);
    } else {
        let _ = writeln!(h, "#PBS -l nodes={}:ppn={}", request.nodes, request.ppn);
    }
    let _ = writeln!(h, "#PBS -l walltime={}", request.wall);
    if let Some(mem) = request.mem {
        let _ = writeln!(h, "#PBS -l pmem={}mb", mem);
    }
    let _ = writeln!(h, "#PBS -j eo");
    let _ = writeln!(h, "#PBS -e {}.err", job.stem_full.to_string_lossy());
    h
}

fn sbatch_header(
    job: &Job,
    host: &Host,
    strategy: &dyn Strategy,
    request: &ResourceRequest,
) -> String {
    let mut h = String::with_capacity(512);
    let _ = writeln!(h, "{}", strategy.shebang().unwrap_or("#!/bin/bash"));
    let _ = writeln!(h, "#");
    let _ = writeln!(h, "#SBATCH --time={}", request.wall);
    let _ = writeln!(h, "#SBATCH --nodes={}", request.nodes);
    if job.resources.exclusive {
        let _ = writeln!(h, "#SBATCH --exclusive");
    }
    if request.ppn != -1 {
        let _ = writeln!(h, "#SBATCH --ntasks-per-node={}", request.ppn);
    }
    if let Some(mem) = request.mem {
        let _ = writeln!(h, "#SBATCH --mem-per-cpu={}mb", mem);
    }
    if let Some(account) = &host.queue_account {
        let _ = writeln!(h, "#SBATCH --account={}", account);
        let partition = if account == "open" { "open" } else { "sla-prio" };
        let _ = writeln!(h, "#SBATCH --partition={}", partition);
    }
    let _ = writeln!(h, "#SBATCH --error {}.err", job.stem_full.to_string_lossy());
    h
}

/// Scheduler job names are limited to 15 bytes and must start with a
/// letter; a leading digit becomes a placeholder.
pub fn job_name(stem_base: &str) -> String {
    let mut name: String = stem_base.chars().take(15).collect();
    if name
        .chars()
        .next()
        .map(|c| c.is_ascii_digit())
        .unwrap_or(false)
    {
        name.replace_range(0..1, "q");
    }
    if name.is_empty() {
        name.push('q');
    }
    name
}

fn scheduler_command(
    job: &Job,
    host: &Host,
    name: &str,
    script: &Path,
) -> Result<Vec<String>> {
    let dialect = host
        .dialect
        .ok_or_else(|| anyhow!("{} has no queue dialect", host.name))?;
    let script = script.to_string_lossy().into_owned();
    let command = match dialect {
        QueueDialect::Pbs => {
            let mut command = vec!["qsub".to_string()];
            if job.flags.exact {
                command.push("-W".to_string());
                command.push("x=nmatchpolicy:exactnode".to_string());
            }
            if !job.flags.open {
                if let Some(account) = &host.queue_account {
                    command.push("-A".to_string());
                    command.push(account.clone());
                }
            }
            command.push("-N".to_string());
            command.push(name.to_string());
            command.push(script);
            command
        }
        QueueDialect::Sbatch => vec![
            "sbatch".to_string(),
            "--job-name".to_string(),
            name.to_string(),
            script,
        ],
    };
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Flags, ProgramOptions, Resources};
    use crate::program;

    fn queue_job(input: &str) -> Job {
        Job::new(
            Path::new(input),
            "out",
            Path::new("/gpfs/scratch/moomin"),
            Resources {
                nodes: Some(4),
                ppn: Some(8),
                wall: Some("24:00:00".parse().unwrap()),
                mem: Some(2000),
                exclusive: false,
            },
            Flags {
                script_only: true,
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

    fn request() -> ResourceRequest {
        ResourceRequest {
            nodes: 4,
            ppn: 8,
            wall: "24:00:00".parse().unwrap(),
            mem: Some(2000),
        }
    }

    #[test]
    fn pbs_header_carries_the_resource_request() {
        let job = queue_job("/work/films/slab.nw");
        let strategy = program::strategy(program::ProgramKind::NwChem);
        let header = pbs_header(&job, strategy.as_ref(), &request());
        assert!(header.contains("#PBS -l nodes=4:ppn=8\n"));
        assert!(header.contains("#PBS -l walltime=24:00:00\n"));
        assert!(header.contains("#PBS -l pmem=2000mb\n"));
        assert!(header.contains("#PBS -j eo\n"));
        assert!(header.contains("#PBS -e /work/films/slab.err\n"));
    }

    #[test]
    fn negative_ppn_drops_the_ppn_clause() {
        let job = queue_job("/work/films/slab.nw");
        let strategy = program::strategy(program::ProgramKind::NwChem);
        let mut req = request();
        req.nodes = 160;
        req.ppn = -1;
        let header = pbs_header(&job, strategy.as_ref(), &req);
        assert!(header.contains("#PBS -l nodes=160\n"));
        assert!(!header.contains("ppn="));
    }

    #[test]
    fn sbatch_header_names_account_and_partition() {
        let mut host = Host::resolve("amp.chem.psu.edu").unwrap();
        host.queue_account = Some("lxj18_c_t_sc_default".to_string());
        let job = queue_job("/work/films/slab.nw");
        let strategy = program::strategy(program::ProgramKind::NwChem);
        let header = sbatch_header(&job, &host, strategy.as_ref(), &request());
        assert!(header.starts_with("#!/bin/bash\n"));
        assert!(header.contains("#SBATCH --time=24:00:00\n"));
        assert!(header.contains("#SBATCH --nodes=4\n"));
        assert!(header.contains("#SBATCH --ntasks-per-node=8\n"));
        assert!(header.contains("#SBATCH --mem-per-cpu=2000mb\n"));
        assert!(header.contains("#SBATCH --account=lxj18_c_t_sc_default\n"));
        assert!(header.contains("#SBATCH --partition=sla-prio\n"));
    }

    #[test]
    fn open_account_selects_the_open_partition() {
        let mut host = Host::resolve("amp.chem.psu.edu").unwrap();
        host.queue_account = Some("open".to_string());
        let job = queue_job("/work/films/slab.nw");
        let strategy = program::strategy(program::ProgramKind::NwChem);
        let header = sbatch_header(&job, &host, strategy.as_ref(), &request());
        assert!(header.contains("#SBATCH --partition=open\n"));
    }

    #[test]
    fn qchem_scripts_get_a_csh_interpreter() {
        let job = queue_job("/work/tddft.qchem");
        let strategy = program::strategy(program::ProgramKind::QChem);
        let header = pbs_header(&job, strategy.as_ref(), &request());
        assert!(header.starts_with("#!/bin/csh\n#\n"));
    }

    #[test]
    fn job_names_fit_the_scheduler() {
        assert_eq!(job_name("water"), "water");
        assert_eq!(job_name("a_very_long_job_stem_name"), "a_very_long_job");
        assert_eq!(job_name("2photon"), "qphoton");
    }
}
