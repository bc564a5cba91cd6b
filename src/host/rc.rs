//! External configuration read at startup
//!
//! Two small JSON files feed the submission pipeline: the allocation table
//! (`$ALLOCATIONS`, shared by a group) and the per-user defaults file
//! (`~/.submitrc.json`). Both are deserialized straight into typed structs.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use log::info;
use serde::Deserialize;

use crate::error::FatalError;

/// Resource overrides for one host, keyed by shortname in the rc file.
///
/// ```json
/// { "hpc": { "nodes": 4, "ppn": 8, "wall": "48:00:00", "mem": 4000 } }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct UserDefaults {
    pub nodes: Option<i64>,
    pub ppn: Option<i64>,
    pub wall: Option<String>,
    pub mem: Option<i64>,
}

fn rc_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".submitrc.json"))
}

/// Read the defaults entry for one host shortname. A missing or unreadable
/// rc file means no overrides; a file that is present but not valid JSON
/// is a configuration error the user will want to know about.
pub fn read_user_defaults(
    shortname: &str,
) -> Result<Option<(PathBuf, UserDefaults)>, FatalError> {
    let Some(path) = rc_path() else {
        return Ok(None);
    };
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(_) => return Ok(None),
    };
    info!("Reading user defaults from {}", path.display());
    let mut table: HashMap<String, UserDefaults> =
        serde_json::from_str(&text).map_err(|_| FatalError::BadUserDefault {
            field: "JSON",
            path: path.clone(),
        })?;
    Ok(table.remove(shortname).map(|entry| (path, entry)))
}

/// Map a short allocation code to the scheduler account string using the
/// table behind `$ALLOCATIONS`. Codes are matched case-insensitively; an
/// unknown code is fatal and lists what is available.
pub fn select_allocation(code: &str) -> Result<String, FatalError> {
    let path = env::var("ALLOCATIONS").map_err(|_| FatalError::AllocationTable)?;
    let text = fs::read_to_string(&path).map_err(|_| FatalError::AllocationTable)?;
    let table: HashMap<String, String> =
        serde_json::from_str(&text).map_err(|_| FatalError::AllocationTable)?;

    match table.get(&code.to_lowercase()) {
        Some(account) => Ok(account.clone()),
        None => {
            let mut codes: Vec<String> = table.keys().cloned().collect();
            codes.sort();
            Err(FatalError::UnknownAllocation(codes.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn unknown_allocation_code_lists_the_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"o": "open", "a": "lxj18_a_g_sc_default", "e": "lxj18_e_g_bc_default"}}"#
        )
        .unwrap();
        env::set_var("ALLOCATIONS", file.path());

        assert_eq!(select_allocation("A").unwrap(), "lxj18_a_g_sc_default");

        let err = select_allocation("z").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unrecognized allocation. Current allocations available: a, e, o"
        );
    }
}
