//! Target execution environments
//!
//! A [Host] is built once per process from the machine's network identity
//! and is read-only afterwards, except for the queue account which is
//! filled in from the allocation table. Interactive hosts carry no queue
//! dialect and no limits.

/// Hard resource ceilings and the request checker
pub mod limits;
/// The allocation table and the per-user defaults file
pub mod rc;
/// Wall-time parsing and formatting
pub mod walltime;

use std::env;
use std::path::PathBuf;

use crate::error::{FatalError, LimitViolation};
use limits::{LimitPolicy, ResourceLimits, ResourceRequest};
use walltime::Walltime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    Interactive,
    Queue,
}

/// The directive syntax the host's batch scheduler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueDialect {
    Pbs,
    Sbatch,
}

/// Resource values used when the user gives none.
#[derive(Debug, Clone)]
pub struct Defaults {
    pub nodes: i64,
    pub ppn: i64,
    pub wall: Walltime,
    /// Per-processor memory in MB.
    pub mem: i64,
}

#[derive(Debug)]
pub struct Host {
    pub name: String,
    pub shortname: String,
    pub mode: SubmitMode,
    pub dialect: Option<QueueDialect>,
    pub local: bool,
    pub scratch: PathBuf,
    pub temp: PathBuf,
    pub queue_account: Option<String>,
    pub defaults: Defaults,
    pub limits: Option<ResourceLimits>,
    pub limit_policy: LimitPolicy,
}

fn queue_defaults() -> Defaults {
    Defaults {
        nodes: 8,
        ppn: 1,
        wall: Walltime::from_secs(24 * 3600),
        mem: 2000,
    }
}

fn shortname(name: &str) -> String {
    name.split('.').next().unwrap_or(name).to_string()
}

fn user_home_var(var: &'static str) -> Result<String, FatalError> {
    env::var(var).map_err(|_| FatalError::MissingEnv(var))
}

impl Host {
    /// Pick the host from the canonical network identity. Fixed substring
    /// lookup, first match wins; an unknown identity is fatal because
    /// nothing can be submitted without an environment.
    pub fn resolve(identity: &str) -> Result<Host, FatalError> {
        if identity.contains("chem.psu.edu") || identity.contains("science.psu.edu") {
            Ok(Host::local(identity))
        } else if identity.contains("stampede.tacc.utexas.edu") {
            Host::stampede("stampede.tacc.utexas.edu")
        } else if identity.contains("acib.production.int.aci.ics.psu.edu") {
            Host::acib(identity)
        } else if identity.contains("hpc.psu.edu") {
            Host::hpc(identity)
        } else {
            Err(FatalError::UnknownHost)
        }
    }

    fn local(name: &str) -> Host {
        Host {
            name: name.to_string(),
            shortname: shortname(name),
            mode: SubmitMode::Interactive,
            dialect: None,
            local: true,
            scratch: PathBuf::from("/scratch"),
            temp: PathBuf::from("/tmp"),
            queue_account: None,
            defaults: queue_defaults(),
            limits: None,
            limit_policy: LimitPolicy::Standard,
        }
    }

    fn stampede(name: &str) -> Result<Host, FatalError> {
        let scratch = user_home_var("SCRATCH")?;
        let mut defaults = queue_defaults();
        defaults.ppn = 16;
        Ok(Host {
            name: name.to_string(),
            shortname: shortname(name),
            mode: SubmitMode::Queue,
            dialect: Some(QueueDialect::Pbs),
            local: false,
            scratch: PathBuf::from(scratch),
            temp: PathBuf::from("/tmp"),
            queue_account: None,
            defaults,
            limits: Some(ResourceLimits {
                max_nodes: 256,
                max_ppn: 16,
                max_total: 4096,
                min_nodes: 1,
                max_wall: Walltime::from_secs(48 * 3600),
                max_mem_per_node: 32000,
            }),
            limit_policy: LimitPolicy::Standard,
        })
    }

    fn acib(name: &str) -> Result<Host, FatalError> {
        let user = user_home_var("USER")?;
        let mut defaults = queue_defaults();
        defaults.ppn = -1;
        Ok(Host {
            name: name.to_string(),
            shortname: shortname(name),
            mode: SubmitMode::Queue,
            dialect: Some(QueueDialect::Pbs),
            local: false,
            scratch: PathBuf::from("/gpfs/scratch").join(&user),
            temp: PathBuf::from("/tmp"),
            queue_account: None,
            defaults,
            limits: Some(ResourceLimits {
                max_nodes: 253,
                max_ppn: 20,
                max_total: 160,
                min_nodes: 1,
                max_wall: Walltime::from_secs(192 * 3600),
                max_mem_per_node: 256000,
            }),
            limit_policy: LimitPolicy::TotalProcessors,
        })
    }

    fn hpc(name: &str) -> Result<Host, FatalError> {
        let user = user_home_var("USER")?;
        let mut defaults = queue_defaults();
        defaults.ppn = -1;
        Ok(Host {
            name: name.to_string(),
            shortname: shortname(name),
            mode: SubmitMode::Queue,
            dialect: Some(QueueDialect::Sbatch),
            local: false,
            scratch: PathBuf::from("/scratch").join(&user),
            temp: PathBuf::from("/tmp"),
            queue_account: None,
            defaults,
            limits: Some(ResourceLimits {
                max_nodes: 253,
                max_ppn: 48,
                max_total: 160,
                min_nodes: 1,
                max_wall: Walltime::from_secs(192 * 3600),
                max_mem_per_node: 256000,
            }),
            limit_policy: LimitPolicy::TotalProcessors,
        })
    }

    pub fn is_interactive(&self) -> bool {
        self.mode == SubmitMode::Interactive
    }

    /// Check a request against this host's ceilings. Interactive hosts
    /// have none, so everything passes.
    pub fn check_limits(&self, req: &ResourceRequest) -> Result<(), LimitViolation> {
        match &self.limits {
            Some(limits) => limits.check(&self.name, self.limit_policy, req),
            None => Ok(()),
        }
    }

    /// Merge overrides from the per-user defaults file into this host's
    /// defaults. Called for `--default` only.
    pub fn apply_user_defaults(&mut self) -> Result<(), FatalError> {
        let Some((path, user)) = rc::read_user_defaults(&self.shortname)? else {
            return Ok(());
        };
        if let Some(nodes) = user.nodes {
            self.defaults.nodes = nodes;
        }
        if let Some(ppn) = user.ppn {
            self.defaults.ppn = ppn;
        }
        if let Some(wall) = user.wall {
            self.defaults.wall = wall.parse().map_err(|_| FatalError::BadUserDefault {
                field: "wall",
                path: path.clone(),
            })?;
        }
        if let Some(mem) = user.mem {
            self.defaults.mem = mem;
        }
        Ok(())
    }

    /// Print the host's ceilings and defaults for `--limits`.
    pub fn print_limits(&self) {
        match &self.limits {
            None => println!("{} is an interactive host.  There are no limits.", self.name),
            Some(l) => {
                println!("Host name                     : {}", self.name);
                println!("Max # nodes                   : {}", l.max_nodes);
                println!("Min # nodes                   : {}", l.min_nodes);
                println!("Max # processors per node     : {}", l.max_ppn);
                println!("Max # total processors        : {}", l.max_total);
                println!("Max memory per node           : {} GB", l.max_mem_per_node / 1000);
                println!("Max wall time                 : {}", l.max_wall);
                println!();
                println!("Default # Nodes               : {}", self.defaults.nodes);
                println!("Default # processors per node : {}", self.defaults.ppn);
                println!("Default memory per processor  : {} GB", self.defaults.mem / 1000);
                println!("Default wall time             : {}", self.defaults.wall);
            }
        }
    }
}
