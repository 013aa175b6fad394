//! Spawn options and the common-flag builder shared by `exec`, `resume`,
//! and `fork` (§4.5, §6's process command line).

use std::path::PathBuf;

/// Options shared by every spawn flavor. Only `cwd` is required by this
/// crate; everything else is passed through to the tool binary verbatim.
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    pub cwd: Option<PathBuf>,
    pub model: Option<String>,
    pub full_auto: bool,
    pub sandbox: Option<String>,
    pub ask_for_approval: Option<String>,
    /// `-c key=value` config overrides, applied in the given order.
    pub overrides: Vec<String>,
    pub images: Vec<PathBuf>,
    /// Extra caller-supplied flags appended after everything else.
    pub passthrough: Vec<String>,
}

/// `--nth-message N`, only meaningful for `spawn_fork`.
#[derive(Debug, Clone, Default)]
pub struct ForkOptions {
    pub spawn: SpawnOptions,
    pub nth_message: Option<u32>,
}

/// Appends the common flags in the fixed order specified by §4.5:
/// `--model`, `--full-auto`, `--sandbox`, `--ask-for-approval`, `-c`
/// overrides, `--image` paths, then passthrough.
pub fn push_common_flags(args: &mut Vec<String>, opts: &SpawnOptions) {
    if let Some(model) = &opts.model {
        args.push("--model".to_string());
        args.push(model.clone());
    }
    if opts.full_auto {
        args.push("--full-auto".to_string());
    }
    if let Some(sandbox) = &opts.sandbox {
        args.push("--sandbox".to_string());
        args.push(sandbox.clone());
    }
    if let Some(approval) = &opts.ask_for_approval {
        args.push("--ask-for-approval".to_string());
        args.push(approval.clone());
    }
    for override_kv in &opts.overrides {
        args.push("-c".to_string());
        args.push(override_kv.clone());
    }
    for image in &opts.images {
        args.push("--image".to_string());
        args.push(image.display().to_string());
    }
    args.extend(opts.passthrough.iter().cloned());
}
