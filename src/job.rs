//! The unit of work: one input file bound to one host and one program
//!
//! Name fields are computed once at construction and never touched again;
//! everything downstream (scripts, harvests, banners) reads them. In a
//! multi-file run each file gets an independent [Job]; only the host is
//! shared.

use std::env;
use std::path::{Path, PathBuf};

use crate::cli::Args;
use crate::error::FatalError;
use crate::host::walltime::Walltime;
use crate::host::{Host, SubmitMode};

/// Requested compute resources, after shorthand unpacking. Values stay
/// optional here; prompting and defaulting happen at submission time.
#[derive(Debug, Clone)]
pub struct Resources {
    pub nodes: Option<i64>,
    pub ppn: Option<i64>,
    pub wall: Option<Walltime>,
    pub mem: Option<i64>,
    pub exclusive: bool,
}

#[derive(Debug, Clone)]
pub struct Flags {
    pub script_only: bool,
    pub exact: bool,
    pub open: bool,
    pub debug: bool,
    pub quiet: bool,
    pub pid: bool,
    pub check_limits: bool,
    pub nice: i64,
}

/// Family-specific options carried along for whichever program wants them.
#[derive(Debug, Clone)]
pub struct ProgramOptions {
    pub out: Option<PathBuf>,
    pub psp: Vec<PathBuf>,
    pub restart: Option<String>,
    pub restart_dir: Option<PathBuf>,
    pub image_scale: Option<f64>,
    pub passthrough: Vec<String>,
}

pub struct Job {
    /// Absolute input path.
    pub input_full: PathBuf,
    /// Input filename without its directory.
    pub input_base: String,
    /// The submission directory (where results land).
    pub dir: PathBuf,
    /// Absolute input path with the extension removed.
    pub stem_full: PathBuf,
    pub stem_base: String,
    pub ext: String,
    pub output_full: PathBuf,
    pub output_base: String,
    pub scratch_root: PathBuf,
    pub resources: Resources,
    pub flags: Flags,
    pub opts: ProgramOptions,
}

/// Append a dot-suffix to a stem without disturbing dots already in the
/// name (`with_extension` would eat them).
pub fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}.{}", stem.to_string_lossy(), suffix))
}

/// Expand a leading `~` and anchor relative paths at the current
/// directory. No filesystem access, so it works for paths that do not
/// exist yet.
pub fn abs_path(path: &Path) -> PathBuf {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    };
    if expanded.is_absolute() {
        expanded
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    }
}

fn split_stem(path: &Path) -> (PathBuf, String, String) {
    let stem = path.with_extension("");
    let base = stem
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    (stem, base, ext)
}

impl Resources {
    /// Unpack the resource flags in precedence order: `--default` fills
    /// gaps from the host, then `--all` and `--exclusive` shorthands
    /// override the individual flags.
    pub fn from_args(args: &Args, host: &Host) -> Result<Resources, FatalError> {
        let mut nodes = args.nodes;
        let mut ppn = args.ppn;
        let mut wall = match &args.wall {
            Some(text) => Some(parse_wall(text)?),
            None => None,
        };
        let mut mem = args.mem;
        let mut exclusive = false;

        if args.default && host.mode == SubmitMode::Queue {
            nodes = nodes.or(Some(host.defaults.nodes));
            ppn = ppn.or(Some(host.defaults.ppn));
            wall = wall.or(Some(host.defaults.wall));
            mem = mem.or(Some(host.defaults.mem));
        }

        if let Some(all) = &args.all {
            nodes = Some(parse_int(&all[0], FatalError::BadNodes)?);
            ppn = Some(parse_int(&all[1], FatalError::BadPpn)?);
            wall = Some(parse_wall(&all[2])?);
            mem = Some(parse_int(&all[3], FatalError::BadMem)?);
        }

        if let Some(excl) = &args.exclusive {
            nodes = Some(parse_int(&excl[0], FatalError::BadNodes)?);
            wall = Some(parse_wall(&excl[1])?);
            ppn = None;
            mem = None;
            exclusive = true;
        }

        Ok(Resources {
            nodes,
            ppn,
            wall,
            mem,
            exclusive,
        })
    }
}

fn parse_int(text: &str, err: FatalError) -> Result<i64, FatalError> {
    text.trim().parse().map_err(|_| err)
}

fn parse_wall(text: &str) -> Result<Walltime, FatalError> {
    text.parse()
        .map_err(|_| FatalError::BadWalltime(text.to_string()))
}

impl Flags {
    pub fn from_args(args: &Args) -> Flags {
        Flags {
            script_only: args.script,
            exact: args.exact,
            open: args.open,
            debug: args.debug,
            quiet: args.quiet,
            pid: args.pid,
            check_limits: !args.nolimit,
            nice: args.nice,
        }
    }
}

impl ProgramOptions {
    pub fn from_args(args: &Args) -> ProgramOptions {
        ProgramOptions {
            out: args.out.as_deref().map(abs_path),
            psp: args.psp.iter().map(|p| abs_path(p)).collect(),
            restart: args.restart.clone(),
            restart_dir: args.restart_dir.clone(),
            image_scale: args.vmd,
            passthrough: args.passthrough.clone(),
        }
    }
}

impl Job {
    /// Bind one input file to its derived names. `suffix` is the
    /// program's output extension (`out`, `logfile`, `png`).
    pub fn new(
        input: &Path,
        suffix: &str,
        scratch_root: &Path,
        resources: Resources,
        flags: Flags,
        opts: ProgramOptions,
    ) -> Job {
        let input_full = abs_path(input);
        let input_base = input_full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = input_full
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        let (mut stem_full, mut stem_base, ext) = split_stem(&input_full);

        // An explicit output wins; every other name follows it.
        let mut output_full = match &opts.out {
            Some(out) => {
                let out = abs_path(out);
                let (stem, base, _) = split_stem(&out);
                stem_full = stem;
                stem_base = base;
                out
            }
            None => with_suffix(&stem_full, suffix),
        };

        if flags.pid {
            let pid = std::process::id();
            output_full = with_suffix(&stem_full, &format!("{}.{}", pid, suffix));
            stem_full = with_suffix(&stem_full, &pid.to_string());
            stem_base = format!("{}.{}", stem_base, pid);
        }

        let output_base = output_full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Job {
            input_full,
            input_base,
            dir,
            stem_full,
            stem_base,
            ext,
            output_full,
            output_base,
            scratch_root: abs_path(scratch_root),
            resources,
            flags,
            opts,
        }
    }

    /// Whether the input lives in the directory the tool was invoked from.
    pub fn input_in_cwd(&self) -> bool {
        env::current_dir().map(|cwd| cwd == self.dir).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_resources() -> Resources {
        Resources {
            nodes: None,
            ppn: None,
            wall: None,
            mem: None,
            exclusive: false,
        }
    }

    fn bare_flags() -> Flags {
        Flags {
            script_only: false,
            exact: false,
            open: false,
            debug: false,
            quiet: false,
            pid: false,
            check_limits: true,
            nice: 19,
        }
    }

    fn bare_opts() -> ProgramOptions {
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
    fn derives_names_from_the_input() {
        let job = Job::new(
            Path::new("/data/runs/water.run"),
            "out",
            Path::new("/scratch"),
            bare_resources(),
            bare_flags(),
            bare_opts(),
        );
        assert_eq!(job.input_base, "water.run");
        assert_eq!(job.stem_base, "water");
        assert_eq!(job.ext, "run");
        assert_eq!(job.output_full, PathBuf::from("/data/runs/water.out"));
        assert_eq!(job.dir, PathBuf::from("/data/runs"));
    }

    #[test]
    fn explicit_output_renames_the_stem() {
        let mut opts = bare_opts();
        opts.out = Some(PathBuf::from("/results/final.log"));
        let job = Job::new(
            Path::new("/data/water.run"),
            "out",
            Path::new("/scratch"),
            bare_resources(),
            bare_flags(),
            opts,
        );
        assert_eq!(job.output_full, PathBuf::from("/results/final.log"));
        assert_eq!(job.stem_base, "final");
    }

    #[test]
    fn pid_flag_inserts_the_process_id() {
        let mut flags = bare_flags();
        flags.pid = true;
        let job = Job::new(
            Path::new("/data/water.dal"),
            "out",
            Path::new("/scratch"),
            bare_resources(),
            flags,
            bare_opts(),
        );
        let expected = format!("water.{}.out", std::process::id());
        assert_eq!(job.output_base, expected);
        assert_eq!(job.stem_base, format!("water.{}", std::process::id()));
    }
}
