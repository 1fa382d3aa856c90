// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Operate on a fork.
//!
//! [`Surgeon`] drives one complete run over a fork: verify the fork is clean,
//! pull it, clone upstream, run the codemod pipeline over the clone, reconcile
//! the clone into the fork, and optionally commit what was copied. The
//! upstream clone never outlives the run.

use crate::{
    codemod::{
        pipeline::{Pipeline, PipelineError},
        Registry,
    },
    config::Config,
    reconcile::{IgnorePolicy, ReconcileError, Reconciler, Reconciliation},
    vcs::{Git2Vcs, VcsError, VersionControl},
};

use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Fork operator.
pub struct Surgeon<V = Git2Vcs>
where
    V: VersionControl,
{
    config: Config,
    fork: PathBuf,
    registry: Registry,
    vcs: V,
}

impl Surgeon<Git2Vcs> {
    /// Open fork at target path with built-in codemods.
    ///
    /// # Errors
    ///
    /// - Return [`SurgeryError::Vcs`] if fork is not a Git repository.
    pub fn open(fork: impl Into<PathBuf>, config: Config) -> Result<Self> {
        let fork = fork.into();
        let vcs = Git2Vcs::open(&fork)?;

        Ok(Self::new(config, fork, Registry::with_builtins(), vcs))
    }
}

impl<V> Surgeon<V>
where
    V: VersionControl,
{
    /// Construct new surgeon.
    pub fn new(config: Config, fork: impl Into<PathBuf>, registry: Registry, vcs: V) -> Self {
        Self {
            config,
            fork: fork.into(),
            registry,
            vcs,
        }
    }

    /// Path to fork root.
    pub fn fork(&self) -> &Path {
        &self.fork
    }

    /// Bring fork up to date with upstream plus codemods.
    ///
    /// When a commit message is given, every copied file is staged and
    /// committed once. Nothing is committed if nothing was copied.
    ///
    /// # Errors
    ///
    /// - Return [`SurgeryError::DirtyFork`] if fork has uncommitted changes.
    /// - Return [`SurgeryError::Vcs`] if version control operations fail.
    /// - Return [`SurgeryError::Pipeline`] if any codemod fails.
    /// - Return [`SurgeryError::Reconcile`] if copying into fork fails.
    #[instrument(skip(self), level = "debug")]
    pub fn operate(&self, commit: Option<&str>) -> Result<Reconciliation> {
        // INVARIANT: Fork must be clean before any codemod runs.
        if !self.vcs.is_clean()? {
            return Err(SurgeryError::DirtyFork {
                path: self.fork.clone(),
            });
        }

        let outcome = self.vcs.pull()?;
        info!("fork {outcome}");

        let clone = self.vcs.clone_upstream(&self.config.upstream)?;
        Pipeline::new(&self.registry).run(&self.config.codemods, clone.path(), &self.fork)?;

        let changed = self.vcs.changed_files(&clone)?;
        let policy = IgnorePolicy::new(&self.config.ignorelist);
        let result = Reconciler::new(clone.path(), &self.fork, policy).reconcile(&changed)?;

        if let Some(message) = commit {
            if result.copy_count() == 0 {
                warn!("nothing copied, skip commit");
            } else {
                let copied = result.copied().map(Path::to_path_buf).collect::<Vec<_>>();
                self.vcs.stage(&copied)?;
                self.vcs.commit(message)?;
            }
        }

        Ok(result)
    }
}

/// Surgery error types.
#[derive(Debug, thiserror::Error)]
pub enum SurgeryError {
    /// Fork has uncommitted changes.
    #[error("fork {:?} has uncommitted changes, commit or stash them first", path.display())]
    DirtyFork { path: PathBuf },

    /// Version control operations fail.
    #[error(transparent)]
    Vcs(#[from] VcsError),

    /// Codemod pipeline fails.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Reconciliation fails.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// Friendly result alias :3
type Result<T, E = SurgeryError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{CodeModInvocation, Ignore},
        vcs::{PullOutcome, UpstreamClone},
    };
    use pretty_assertions::assert_eq;
    use std::{
        cell::RefCell,
        collections::BTreeSet,
        fs::{read_to_string, write},
    };

    #[derive(Default)]
    struct FakeVcs {
        dirty: bool,
        upstream: Vec<(&'static str, &'static str)>,
        changed: BTreeSet<PathBuf>,
        clone_path: RefCell<Option<PathBuf>>,
        staged: RefCell<Vec<PathBuf>>,
        commits: RefCell<Vec<String>>,
    }

    impl VersionControl for FakeVcs {
        fn is_clean(&self) -> crate::vcs::Result<bool> {
            Ok(!self.dirty)
        }

        fn pull(&self) -> crate::vcs::Result<PullOutcome> {
            Ok(PullOutcome::AlreadyUpToDate)
        }

        fn clone_upstream(&self, _: &str) -> crate::vcs::Result<UpstreamClone> {
            let dir = tempfile::Builder::new()
                .prefix("surgeon-upstream")
                .tempdir()
                .map_err(VcsError::TempDir)?;
            for (name, contents) in &self.upstream {
                write(dir.path().join(name), contents).map_err(VcsError::TempDir)?;
            }
            *self.clone_path.borrow_mut() = Some(dir.path().to_path_buf());

            Ok(UpstreamClone::new(dir))
        }

        fn changed_files(&self, _: &UpstreamClone) -> crate::vcs::Result<BTreeSet<PathBuf>> {
            Ok(self.changed.clone())
        }

        fn stage(&self, paths: &[PathBuf]) -> crate::vcs::Result<()> {
            self.staged.borrow_mut().extend_from_slice(paths);
            Ok(())
        }

        fn commit(&self, message: &str) -> crate::vcs::Result<()> {
            self.commits.borrow_mut().push(message.into());
            Ok(())
        }
    }

    fn config(codemods: Vec<CodeModInvocation>, ignorelist: Vec<Ignore>) -> Config {
        Config {
            upstream: "https://example.com/upstream.git".into(),
            modsdir: "codemods".into(),
            codemods,
            ignorelist,
        }
    }

    fn sed(pattern: &str, search: &str, replacement: &str) -> CodeModInvocation {
        CodeModInvocation {
            description: "rename".into(),
            mod_name: "sed".into(),
            pattern: pattern.into(),
            args: vec![search.into(), replacement.into()],
        }
    }

    #[test]
    fn operate_reconciles_and_commits() -> anyhow::Result<()> {
        let fork = tempfile::tempdir()?;
        write(fork.path().join("a.txt"), "hello upstream\n")?;

        let vcs = FakeVcs {
            upstream: vec![("a.txt", "hello upstream\n"), ("b.txt", "new\n"), ("ct.sh", "ct\n")],
            changed: BTreeSet::from([PathBuf::from("a.txt")]),
            ..Default::default()
        };
        let config = config(
            vec![sed("a.txt", "upstream", "fork")],
            vec![Ignore { prefix: "ct".into() }],
        );
        let surgeon = Surgeon::new(config, fork.path(), Registry::with_builtins(), vcs);
        let result = surgeon.operate(Some("chore: sync upstream"))?;

        assert_eq!(result.missing, vec![PathBuf::from("b.txt")]);
        assert_eq!(result.changed, vec![PathBuf::from("a.txt")]);
        assert_eq!(result.ignored, vec![PathBuf::from("ct.sh")]);
        assert_eq!(read_to_string(fork.path().join("a.txt"))?, "hello fork\n");
        assert!(!fork.path().join("ct.sh").exists());

        assert_eq!(
            *surgeon.vcs.staged.borrow(),
            vec![PathBuf::from("b.txt"), PathBuf::from("a.txt")]
        );
        assert_eq!(*surgeon.vcs.commits.borrow(), vec!["chore: sync upstream".to_string()]);

        let clone_path = surgeon.vcs.clone_path.borrow().clone();
        assert!(clone_path.is_some_and(|path| !path.exists()));

        Ok(())
    }

    #[test]
    fn operate_refuses_dirty_fork() -> anyhow::Result<()> {
        let fork = tempfile::tempdir()?;
        let vcs = FakeVcs {
            dirty: true,
            upstream: vec![("a.txt", "a\n")],
            ..Default::default()
        };
        let surgeon = Surgeon::new(config(vec![], vec![]), fork.path(), Registry::with_builtins(), vcs);
        let result = surgeon.operate(None);

        assert!(matches!(result, Err(SurgeryError::DirtyFork { ref path }) if path == fork.path()));
        assert!(surgeon.vcs.clone_path.borrow().is_none());
        assert!(!fork.path().join("a.txt").exists());

        Ok(())
    }

    #[test]
    fn operate_removes_clone_on_failure() -> anyhow::Result<()> {
        let fork = tempfile::tempdir()?;
        let vcs = FakeVcs {
            upstream: vec![("a.txt", "a\n")],
            ..Default::default()
        };
        let broken = CodeModInvocation {
            description: "no such thing".into(),
            mod_name: "awk".into(),
            pattern: "*".into(),
            args: vec![],
        };
        let surgeon = Surgeon::new(
            config(vec![broken], vec![]),
            fork.path(),
            Registry::with_builtins(),
            vcs,
        );
        let result = surgeon.operate(None);

        assert!(matches!(
            result,
            Err(SurgeryError::Pipeline(PipelineError::UnknownCodemod { .. }))
        ));
        let clone_path = surgeon.vcs.clone_path.borrow().clone();
        assert!(clone_path.is_some_and(|path| !path.exists()));
        assert!(!fork.path().join("a.txt").exists());

        Ok(())
    }

    #[test]
    fn operate_skips_commit_when_nothing_copied() -> anyhow::Result<()> {
        let fork = tempfile::tempdir()?;
        write(fork.path().join("a.txt"), "a\n")?;
        let vcs = FakeVcs {
            upstream: vec![("a.txt", "a\n")],
            changed: BTreeSet::from([PathBuf::from("a.txt")]),
            ..Default::default()
        };
        let surgeon = Surgeon::new(config(vec![], vec![]), fork.path(), Registry::with_builtins(), vcs);
        let result = surgeon.operate(Some("chore: sync upstream"))?;

        assert_eq!(result.copy_count(), 0);
        assert_eq!(result.unchanged, vec![PathBuf::from("a.txt")]);
        assert!(surgeon.vcs.commits.borrow().is_empty());

        Ok(())
    }
}
