// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for the fork, its configuration file,
//! and the relative paths shared between the fork and the upstream clone.

use std::path::{Component, Path, PathBuf};

/// Name of configuration file expected at the top-level of a fork.
pub const CONFIG_FILE_NAME: &str = ".surgeon.yaml";

/// Determine absolute path to the fork being operated on.
///
/// The fork is always the current working directory unless the caller says
/// otherwise.
///
/// # Errors
///
/// - Return [`NoWorkingDir`] if current directory cannot be determined.
pub fn fork_dir() -> Result<PathBuf> {
    std::env::current_dir().map_err(|_| NoWorkingDir)
}

/// Determine default absolute path to configuration file of a fork.
///
/// Does not check if the path returned actually exists.
pub fn default_config_path(fork: impl AsRef<Path>) -> PathBuf {
    fork.as_ref().join(CONFIG_FILE_NAME)
}

/// Render relative path with forward slashes.
///
/// Ignore prefixes, logs, and Git all speak in forward slashes no matter the
/// platform, so relative paths are compared in this form.
pub fn to_slash(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// No way to determine current working directory.
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to current working directory")]
pub struct NoWorkingDir;

/// Friendly result alias :3
pub type Result<T, E = NoWorkingDir> = std::result::Result<T, E>;
