//! Error taxonomy for the submission pipeline
//!
//! Two failure classes matter here: configuration problems that make the
//! whole run pointless ([FatalError]) and per-file problems that should not
//! stop a batch of submissions ([SkipError]). External tool failures
//! (the program itself, qsub, sbatch) are not wrapped at all; the child's
//! exit status and output speak for themselves.

use std::path::PathBuf;

use thiserror::Error;

use crate::host::walltime::Walltime;

/// Aborts the run: one diagnostic line, non-zero exit.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("Unknown host!  Speak to your sysadmin.")]
    UnknownHost,

    #[error("You need to set the environment variable ALLOCATIONS and point it to the correct file")]
    AllocationTable,

    #[error("Unrecognized allocation. Current allocations available: {0}")]
    UnknownAllocation(String),

    #[error("${0} environment variable is not defined!")]
    MissingEnv(&'static str),

    #[error("Could not find an executable \"dim.py\" in your $DIMPATH!")]
    DimNotFound,

    #[error("ABINIT requires pseudopotential files with --psp")]
    MissingPsp,

    #[error("Either specify --restart or --restart-dir, not both.")]
    ConflictingRestart,

    #[error("--restart and --out are only valid for one input file at a time.")]
    SingleFileOption,

    #[error("--exact not valid with --ppn = -1")]
    ExactWithoutPpn,

    #[error("The wall value {0} is not valid.")]
    BadWalltime(String),

    #[error("Nodes must be an integer")]
    BadNodes,

    #[error("PPN must be an integer")]
    BadPpn,

    #[error("Memory must be an integer")]
    BadMem,

    #[error("Invalid {} in {}", .field, .path.display())]
    BadUserDefault { field: &'static str, path: PathBuf },

    #[error(transparent)]
    Limit(#[from] LimitViolation),

    #[error("File {0} is a job script. Submitting it interactively makes no sense.")]
    InteractiveJobScript(String),
}

/// Skips the current input file, the batch continues.
#[derive(Debug, Error)]
pub enum SkipError {
    #[error("File not suitable for submission: {}", .0.display())]
    Unreadable(PathBuf),

    #[error("Unrecognized extension: {0}.")]
    UnknownExtension(String),

    #[error("File {} does not exist.", .0.display())]
    SniffFailed(PathBuf),
}

/// A resource request outside the host's hard ceilings.
///
/// The messages name the offending limit and the host so the user can fix
/// the request without consulting documentation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LimitViolation {
    #[error("PPN must be greater than 0")]
    NonPositivePpn,

    #[error("Max nodes on {host} is {max}")]
    MaxNodes { host: String, max: i64 },

    #[error("Max PPN on {host} is {max}")]
    MaxPpn { host: String, max: i64 },

    #[error("Max total processors on {host} is {max}")]
    MaxTotal { host: String, max: i64 },

    #[error("Min nodes on {host} is {min}")]
    MinNodes { host: String, min: i64 },

    #[error("Min total processors on {host} is {min}")]
    MinTotal { host: String, min: i64 },

    #[error("Max memory per node on {host} is {max}")]
    MaxMemPerNode { host: String, max: i64 },

    #[error("Max wall time on {host} is {max}")]
    MaxWall { host: String, max: Walltime },
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Fatal(#[from] FatalError),

    #[error(transparent)]
    Skip(#[from] SkipError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<LimitViolation> for SubmitError {
    fn from(v: LimitViolation) -> Self {
        SubmitError::Fatal(FatalError::Limit(v))
    }
}

pub type Result<T> = std::result::Result<T, SubmitError>;
