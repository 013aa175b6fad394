//! Resolves `${configDir}` (§6): `~/.config/codex-agent/` by default,
//! where every JSON repository and the daemon pid-file live.

use std::path::PathBuf;

use crate::error::RepoError;

pub fn default_config_dir() -> Result<PathBuf, RepoError> {
    dirs::config_dir()
        .map(|dir| dir.join("codex-agent"))
        .ok_or(RepoError::NoConfigDir)
}
