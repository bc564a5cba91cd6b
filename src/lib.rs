//! Prepare computational jobs and hand them to the right execution
//! environment.
//!
//! Given an input file, the pipeline resolves the host it is running on,
//! picks the program family from the file, validates the requested
//! resources against the host's ceilings, and then either runs the
//! program interactively (with a managed scratch directory where the
//! program needs one) or generates a scheduler script and submits it.

/// Command-line surface
pub mod cli;
/// Fatal and per-file error taxonomy
pub mod error;
/// Execution environments and their resource policies
pub mod host;
/// The per-file unit of work
pub mod job;
/// Program families and submission strategies
pub mod program;
/// Scratch directory lifecycle
pub mod scratch;
/// The submission driver
pub mod submit;
