//! Atomic file writing utilities shared by every JSON repository.
//!
//! Uses the temp-write -> fsync -> rename pattern so a crash leaves a
//! repository file either fully pre-write or fully post-write, never a
//! partial document.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Write `content` atomically to `path`, creating parent directories as
/// needed.
pub fn atomic_write(path: &Path, content: &[u8], mode: Option<u32>) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;

    fs::create_dir_all(parent)?;

    let temp_path = path.with_file_name(format!(
        ".{}.tmp.{}",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id()
    ));

    {
        let mut opts = OpenOptions::new();
        opts.write(true).create(true).truncate(true);

        #[cfg(unix)]
        {
            opts.mode(mode.unwrap_or(0o644));
        }

        let mut file = opts.open(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    fs::rename(&temp_path, path)?;

    #[cfg(unix)]
    {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}

/// Write a pretty-printed JSON document followed by a trailing newline,
/// the on-disk shape every repository in `codex-agent-repo` uses.
pub fn atomic_write_json_pretty<T: serde::Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let mut content = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    content.push('\n');
    atomic_write(path, content.as_bytes(), None)
}
