// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tree reconciliation.
//!
//! Bring a fork up to date with a modified upstream clone by copying files
//! from the clone into the fork. A file is a copy __candidate__ when it is
//! either _missing_ from the fork, or reported as _changed_ by version control
//! after the codemods ran.
//!
//! # Reconciliation Rules
//!
//! - Candidates are paths relative to the root of the upstream clone.
//! - The `.git` directory of the clone is never walked.
//! - A candidate covered by the ignore policy is never copied, no matter if
//!   it is missing or changed.
//! - A candidate whose fork copy already holds identical bytes is not copied
//!   again. Thus, reconciling the same pair of trees twice copies nothing the
//!   second time.
//! - Files are only ever added or overwritten. Files of the fork without an
//!   upstream counterpart are left alone.
//!
//! The copy loop is not atomic. A failure part way through leaves earlier
//! copies in place, which the clean history of the fork can undo.

use crate::{config::Ignore, path::to_slash};

use ignore::WalkBuilder;
use std::{
    collections::BTreeSet,
    fs::{copy, read},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Path prefix exclusion policy.
///
/// A relative path is ignored if and only if its forward slash form starts
/// with any configured prefix. Matching is plain string prefix matching, so
/// the prefix `ct` covers both `ct/alpine.sh` and `ctl.sh`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IgnorePolicy {
    prefixes: Vec<String>,
}

impl IgnorePolicy {
    /// Construct new policy from ignore rules of configuration.
    pub fn new(rules: &[Ignore]) -> Self {
        let prefixes = rules
            .iter()
            .map(|rule| rule.prefix.clone())
            .inspect(|prefix| {
                if prefix.is_empty() {
                    warn!("empty ignore prefix excludes every file from reconciliation");
                }
            })
            .collect();

        Self { prefixes }
    }

    /// Check if relative path is excluded from reconciliation.
    pub fn is_ignored(&self, path: impl AsRef<Path>) -> bool {
        let path = to_slash(path);
        self.prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Outcome of reconciliation.
///
/// All paths are relative to the root of the upstream clone, and are sorted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Copied because the fork lacked them.
    pub missing: Vec<PathBuf>,

    /// Copied because version control reported them as changed.
    pub changed: Vec<PathBuf>,

    /// Candidates dropped by the ignore policy.
    pub ignored: Vec<PathBuf>,

    /// Candidates whose fork copy already matched.
    pub unchanged: Vec<PathBuf>,
}

impl Reconciliation {
    /// Iterate over every copied path.
    pub fn copied(&self) -> impl Iterator<Item = &Path> {
        self.missing
            .iter()
            .chain(self.changed.iter())
            .map(PathBuf::as_path)
    }

    /// Count of copied paths.
    pub fn copy_count(&self) -> usize {
        self.missing.len() + self.changed.len()
    }
}

/// Copy files from upstream clone into fork.
#[derive(Debug, Clone)]
pub struct Reconciler {
    upstream: PathBuf,
    fork: PathBuf,
    policy: IgnorePolicy,
}

impl Reconciler {
    /// Construct new reconciler between upstream clone and fork.
    pub fn new(upstream: impl Into<PathBuf>, fork: impl Into<PathBuf>, policy: IgnorePolicy) -> Self {
        Self {
            upstream: upstream.into(),
            fork: fork.into(),
            policy,
        }
    }

    /// List files of upstream clone that the fork does not have.
    ///
    /// Ignore rules are not applied here.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::Walk`] if upstream clone cannot be walked.
    #[instrument(skip(self), level = "debug")]
    pub fn missing_files(&self) -> Result<BTreeSet<PathBuf>> {
        let walker = WalkBuilder::new(&self.upstream)
            .standard_filters(false)
            .hidden(false)
            .follow_links(false)
            .filter_entry(|entry| entry.file_name() != ".git")
            .build();

        let mut missing = BTreeSet::new();
        for entry in walker {
            let entry = entry?;

            // INVARIANT: Only regular files count, symlinks are judged by
            // what they point at.
            if !entry.path().is_file() {
                continue;
            }

            // INVARIANT: Walker only yields entries under the upstream root.
            let Ok(relative) = entry.path().strip_prefix(&self.upstream) else {
                continue;
            };

            if !self.fork.join(relative).exists() {
                debug!("fork is missing {:?}", to_slash(relative));
                missing.insert(relative.to_path_buf());
            }
        }

        Ok(missing)
    }

    /// Copy missing and changed files into fork.
    ///
    /// Changed paths must be relative to the upstream clone root.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::Walk`] if upstream clone cannot be walked.
    /// - Return [`ReconcileError::Read`] if candidate cannot be read.
    /// - Return [`ReconcileError::CreateDir`] if parent directory of copy
    ///   cannot be made.
    /// - Return [`ReconcileError::Copy`] if candidate cannot be copied.
    #[instrument(skip(self, changed), level = "debug")]
    pub fn reconcile(&self, changed: &BTreeSet<PathBuf>) -> Result<Reconciliation> {
        let missing = self.missing_files()?;
        let mut result = Reconciliation::default();

        for path in missing.union(changed) {
            if self.policy.is_ignored(path) {
                debug!("ignore {:?}", to_slash(path));
                result.ignored.push(path.clone());
                continue;
            }

            let source = self.upstream.join(path);
            if !source.is_file() {
                debug!("skip {:?}, not a regular file", to_slash(path));
                continue;
            }

            let target = self.fork.join(path);
            if !missing.contains(path) && self.same_contents(&source, &target)? {
                debug!("fork already has {:?}", to_slash(path));
                result.unchanged.push(path.clone());
                continue;
            }

            self.copy_file(&source, &target)?;
            info!("copy {:?}", to_slash(path));
            if missing.contains(path) {
                result.missing.push(path.clone());
            } else {
                result.changed.push(path.clone());
            }
        }

        info!(
            "copied {} missing and {} changed files into fork",
            result.missing.len(),
            result.changed.len()
        );

        Ok(result)
    }

    fn same_contents(&self, source: &Path, target: &Path) -> Result<bool> {
        if !target.is_file() {
            return Ok(false);
        }

        let lhs = read(source).map_err(|err| ReconcileError::Read {
            source: err,
            path: source.into(),
        })?;
        let rhs = read(target).map_err(|err| ReconcileError::Read {
            source: err,
            path: target.into(),
        })?;

        Ok(lhs == rhs)
    }

    fn copy_file(&self, source: &Path, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            mkdirp::mkdirp(parent).map_err(|err| ReconcileError::CreateDir {
                source: err,
                path: parent.into(),
            })?;
        }

        // INVARIANT: Copies carry over permission bits of the source file.
        copy(source, target).map_err(|err| ReconcileError::Copy {
            source: err,
            from: source.into(),
            to: target.into(),
        })?;

        Ok(())
    }
}

/// Reconciliation error types.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Upstream clone cannot be walked.
    #[error(transparent)]
    Walk(#[from] ignore::Error),

    /// Candidate file cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Parent directory of copy cannot be made.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Candidate cannot be copied into fork.
    #[error("failed to copy {:?} to {:?}", from.display(), to.display())]
    Copy {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },
}

/// Friendly result alias :3
type Result<T, E = ReconcileError> = std::result::Result<T, E>;
