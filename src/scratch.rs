//! Per-job scratch directories
//!
//! Interactive runs of scratch-requiring programs get a private directory
//! under the scratch root. The name carries the process id; that is the
//! sole isolation mechanism between concurrent invocations sharing one
//! scratch root, so it must never collide. The directory is removed on
//! every exit path, including failed runs and failed harvests.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

/// Directory name for one program family in one process.
pub fn scratch_dir_name(family: &str, pid: u32) -> String {
    format!("{}.{}", family, pid)
}

/// A created scratch directory. Dropping it deletes the directory,
/// best-effort; a failed delete is logged and otherwise ignored.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn create(root: &Path, family: &str) -> std::io::Result<ScratchDir> {
        let path = root.join(scratch_dir_name(family, std::process::id()));
        fs::create_dir(&path)?;
        info!("Created scratch directory {}", path.display());
        Ok(ScratchDir { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir_all(&self.path) {
            warn!(
                "Can't remove scratch directory {}: {}",
                self.path.display(),
                err
            );
        }
    }
}

/// Copy harvested results back to the submission directory.
///
/// A destination that is a symbolic link to the source (the live-log
/// link) must be unlinked first, or the copy would truncate the very
/// file it reads. A copy that fails onto a stale link gets the link
/// removed and one retry. Anything else is logged and skipped; partial
/// results beat none.
pub fn harvest_copy(pairs: &[(PathBuf, PathBuf)]) {
    for (source, dest) in pairs {
        let same_file = match (fs::canonicalize(source), fs::canonicalize(dest)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if same_file {
            let _ = fs::remove_file(dest);
        }

        if fs::copy(source, dest).is_ok() {
            continue;
        }

        let dangling_link = fs::symlink_metadata(dest)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if dangling_link {
            let _ = fs::remove_file(dest);
            if fs::copy(source, dest).is_ok() {
                continue;
            }
        }

        warn!(
            "Can't copy {} back to {}",
            source.display(),
            dest.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_differ_across_processes() {
        assert_ne!(scratch_dir_name("ADF", 100), scratch_dir_name("ADF", 101));
        assert_eq!(scratch_dir_name("ADF", 4242), "ADF.4242");
    }

    #[test]
    fn directory_is_removed_when_the_guard_drops() {
        let root = tempfile::tempdir().unwrap();
        let path;
        {
            let scratch = ScratchDir::create(root.path(), "NWChem").unwrap();
            path = scratch.path().to_path_buf();
            fs::write(path.join("intermediate"), "data").unwrap();
            assert!(path.is_dir());
        }
        assert!(!path.exists());
    }

    #[test]
    fn harvest_replaces_a_link_to_the_source_with_a_real_copy() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("logfile");
        fs::write(&source, "progress").unwrap();
        let dest = dir.path().join("job.logfile");
        std::os::unix::fs::symlink(&source, &dest).unwrap();

        harvest_copy(&[(source.clone(), dest.clone())]);

        assert!(!fs::symlink_metadata(&dest).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "progress");
        assert_eq!(fs::read_to_string(&source).unwrap(), "progress");
    }

    #[test]
    fn harvest_retries_once_over_a_dangling_link() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("result.out");
        fs::write(&source, "energies").unwrap();
        let dest = dir.path().join("job.out");
        std::os::unix::fs::symlink(dir.path().join("gone"), &dest).unwrap();

        harvest_copy(&[(source, dest.clone())]);

        assert_eq!(fs::read_to_string(&dest).unwrap(), "energies");
    }
}
