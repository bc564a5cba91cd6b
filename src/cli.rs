//! Command-line surface
//!
//! Queue-host options have no effect on an interactive system and vice
//! versa, mirroring how the schedulers themselves behave.

use std::path::PathBuf;

use clap::Parser;

/// Submit a computational job.
///
/// The program type and submission method are determined automatically
/// from the input file extension, the file contents, and the host the
/// job is submitted on. Input filenames may be given explicitly or piped
/// in from the standard input.
#[derive(Parser, Debug)]
#[command(name = "hemuli", version, about, long_about = None)]
pub struct Args {
    /// The input files to submit. Read from standard input when omitted.
    pub input_files: Vec<PathBuf>,

    /// Non-default output file to use, extension included.
    #[arg(short, long, value_name = "LOGFILE")]
    pub out: Option<PathBuf>,

    /// Override the host's scratch directory.
    #[arg(short, long)]
    pub scratch: Option<PathBuf>,

    /// Pseudopotential paths for the ABINIT .files file.
    #[arg(long, num_args = 1.., value_name = "PSP")]
    pub psp: Vec<PathBuf>,

    /// Dalton restart file, without the .tar.gz extension.
    #[arg(short, long)]
    pub restart: Option<String>,

    /// Directory of Dalton restart files. Use the exact path.
    #[arg(short = 'R', long)]
    pub restart_dir: Option<PathBuf>,

    /// Multiple of the default POV-Ray height and width for VMD scenes.
    #[arg(long, value_name = "SCALE")]
    pub vmd: Option<f64>,

    /// The number of nodes to run on.
    #[arg(short, long)]
    pub nodes: Option<i64>,

    /// The processors per node to use. -1 requests whole processors
    /// without a node layout where the host supports it.
    #[arg(short, long, allow_hyphen_values = true)]
    pub ppn: Option<i64>,

    /// The wall time to request, in any of: sec, min:sec, hour:min:sec,
    /// day:hour:min:sec.
    #[arg(short, long, value_name = "WALLTIME")]
    pub wall: Option<String>,

    /// Memory per processor in MB. Not required.
    #[arg(short, long)]
    pub mem: Option<i64>,

    /// Specify nodes, ppn, wall and mem with one option, in that order.
    #[arg(short, long, num_args = 4, allow_hyphen_values = true,
          value_names = ["NODES", "PPN", "WALLTIME", "MEM"])]
    pub all: Option<Vec<String>>,

    /// Request whole nodes: specify nodes and wall with one option.
    #[arg(short, long, num_args = 2, value_names = ["NODES", "WALLTIME"])]
    pub exclusive: Option<Vec<String>>,

    /// Use the host's default nodes, ppn, wall and mem. Hard-coded
    /// defaults may be overridden with a .submitrc.json in your home
    /// directory.
    #[arg(short, long)]
    pub default: bool,

    /// Skip the resource-limit check for this host.
    #[arg(long)]
    pub nolimit: bool,

    /// Create the script file without submitting it. Useful if you want
    /// to edit the job.
    #[arg(short = 'S', long)]
    pub script: bool,

    /// Use the exact node arrangement requested.
    #[arg(long)]
    pub exact: bool,

    /// Submit to the open queue.
    #[arg(short = 'O', long)]
    pub open: bool,

    /// Short allocation code to submit under, resolved through the
    /// $ALLOCATIONS table.
    #[arg(short = 'A', long, default_value = "o")]
    pub allocation: String,

    /// Open the output file with a pager upon completion.
    #[arg(short = 'D', long)]
    pub debug: bool,

    /// Add the process ID to the output file name.
    #[arg(long)]
    pub pid: bool,

    /// The niceness for interactive runs.
    #[arg(long, default_value_t = 19, value_parser = clap::value_parser!(i64).range(0..=20))]
    pub nice: i64,

    /// Do not print anything to screen.
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the job limits on the current host and exit.
    #[arg(long)]
    pub limits: bool,

    /// Extra arguments passed through to the program (after --).
    #[arg(last = true)]
    pub passthrough: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_combined_resource_shorthand() {
        let args = Args::parse_from([
            "hemuli", "--all", "8", "1", "48:00:00", "2000", "job.run",
        ]);
        assert_eq!(
            args.all.as_deref(),
            Some(&["8".into(), "1".into(), "48:00:00".into(), "2000".into()][..])
        );
        assert_eq!(args.input_files, vec![PathBuf::from("job.run")]);
    }

    #[test]
    fn negative_ppn_is_accepted() {
        let args = Args::parse_from(["hemuli", "-p", "-1", "job.run"]);
        assert_eq!(args.ppn, Some(-1));
    }

    #[test]
    fn passthrough_args_follow_a_double_dash() {
        let args = Args::parse_from(["hemuli", "scene.pov", "--", "+A0.5"]);
        assert_eq!(args.passthrough, vec!["+A0.5".to_string()]);
    }
}
