//! Timestamped backup rotation for managed files.
//!
//! Before a managed file is overwritten or deleted it is copied to
//! `<path>-<timestamp>`, where the timestamp is fixed-width so that
//! lexicographic order equals chronological order. At most `keep`
//! backups are retained per path; `keep == 0` disables backups
//! entirely (zero copies, not a default count).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{Error, Result};

/// Fixed-width, lexicographically sortable timestamp.
const STAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Copy `path` to a timestamped sibling, then prune old backups so that
/// at most `keep` remain (including the one just written).
pub fn backup(path: &Path, keep: u32) -> Result<()> {
    if keep == 0 {
        return Ok(());
    }

    let stamp = Utc::now().format(STAMP_FORMAT).to_string();
    let mut target = path.as_os_str().to_owned();
    target.push("-");
    target.push(&stamp);
    let target = PathBuf::from(target);

    log::info!("backing up {} to {}", path.display(), target.display());
    fs::copy(path, &target)
        .map_err(|e| Error::io(format!("backing up {}", path.display()), e))?;

    for stale in backups_for(path)?.iter().skip(keep as usize) {
        log::debug!("pruning old backup {}", stale.display());
        fs::remove_file(stale)
            .map_err(|e| Error::io(format!("pruning backup {}", stale.display()), e))?;
    }
    Ok(())
}

/// All backups of `path`, newest first.
pub fn backups_for(path: &Path) -> Result<Vec<PathBuf>> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let Some(name) = path.file_name() else {
        return Ok(Vec::new());
    };
    let prefix = {
        let mut p = name.to_string_lossy().into_owned();
        p.push('-');
        p
    };

    let entries = fs::read_dir(parent)
        .map_err(|e| Error::io(format!("listing backups in {}", parent.display()), e))?;

    let mut backups: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            file_name
                .strip_prefix(&prefix)
                .is_some_and(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
        })
        .map(|entry| entry.path())
        .collect();

    // Timestamps are fixed-width, so path order is chronological order.
    backups.sort();
    backups.reverse();
    Ok(backups)
}
