// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control adapter.
//!
//! Surgeon only needs a handful of version control operations: check that the
//! fork is clean, pull the fork from its own remote, clone upstream into a
//! temporary directory, list what the codemods changed in that clone, and
//! optionally stage and commit the files copied into the fork. These
//! operations sit behind [`VersionControl`]. [`Git2Vcs`] implements them
//! through libgit2.
//!
//! # Upstream Clones
//!
//! An upstream clone is a scoped resource. [`UpstreamClone`] owns the
//! temporary directory holding the clone, and removes it when dropped. Thus,
//! the clone is released no matter how an operation ends.

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    Config as GitConfig, FetchOptions, RemoteCallbacks, Repository, Status, StatusOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    collections::BTreeSet,
    ffi::OsStr,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tempfile::TempDir;
use tracing::{debug, info, instrument};

/// Outcome of pulling fork from its remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Fork already had everything.
    AlreadyUpToDate,

    /// Fork was fast-forwarded.
    FastForward,
}

impl Display for PullOutcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::AlreadyUpToDate => fmt.write_str("already up to date"),
            Self::FastForward => fmt.write_str("fast-forwarded"),
        }
    }
}

/// Clone of upstream in a temporary directory.
///
/// The directory and everything in it is removed on drop.
#[derive(Debug)]
pub struct UpstreamClone {
    dir: TempDir,
}

impl UpstreamClone {
    /// Take ownership of temporary directory holding a clone.
    pub fn new(dir: TempDir) -> Self {
        Self { dir }
    }

    /// Path to root of clone.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Drop for UpstreamClone {
    fn drop(&mut self) {
        debug!("remove upstream clone at {:?}", self.dir.path().display());
    }
}

/// Layer of indirection for version control of the fork.
pub trait VersionControl {
    /// Check that the fork has no uncommitted or untracked changes.
    fn is_clean(&self) -> Result<bool>;

    /// Pull fork from its `origin` remote.
    ///
    /// Being up to date already is not an error.
    fn pull(&self) -> Result<PullOutcome>;

    /// Clone upstream into a fresh temporary directory.
    fn clone_upstream(&self, url: &str) -> Result<UpstreamClone>;

    /// List files of clone that differ from its checked out commit.
    ///
    /// Paths are relative to the root of the clone. Deleted files are never
    /// listed.
    fn changed_files(&self, clone: &UpstreamClone) -> Result<BTreeSet<PathBuf>>;

    /// Stage paths of fork, relative to the fork root.
    fn stage(&self, paths: &[PathBuf]) -> Result<()>;

    /// Commit staged changes of fork onto its current branch.
    fn commit(&self, message: &str) -> Result<()>;
}

/// Version control through libgit2.
pub struct Git2Vcs {
    repository: Repository,
}

impl Git2Vcs {
    /// Open fork repository at target path.
    ///
    /// # Errors
    ///
    /// - Return [`VcsError::Git2`] if path is not a Git repository.
    #[instrument(skip(path), level = "debug")]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        debug!("open fork repository: {:?}", path.as_ref().display());
        let repository = Repository::open(path.as_ref())?;

        Ok(Self { repository })
    }

    fn current_branch(&self) -> Result<String> {
        let head = self.repository.head()?;
        if !head.is_branch() {
            return Err(VcsError::DetachedHead);
        }

        head.shorthand()
            .map(ToString::to_string)
            .ok_or(VcsError::DetachedHead)
    }
}

impl VersionControl for Git2Vcs {
    #[instrument(skip(self), level = "debug")]
    fn is_clean(&self) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = self.repository.statuses(Some(&mut opts))?;
        for entry in statuses.iter() {
            debug!(
                "uncommitted change {:?}: {:?}",
                bytes_to_path(entry.path_bytes()).display(),
                entry.status()
            );
        }

        Ok(statuses.is_empty())
    }

    #[instrument(skip(self), level = "debug")]
    fn pull(&self) -> Result<PullOutcome> {
        let branch = self.current_branch()?;
        let mut remote = self.repository.find_remote("origin")?;
        let url = remote.url().unwrap_or("origin").to_string();
        info!("pull {branch:?} from {url}");

        let bar = progress_bar(&url)?;
        let authenticator =
            GitAuthenticator::default().set_prompter(IndicatifPrompter::new(bar.clone()));
        let config = GitConfig::open_default()?;
        let mut fo = FetchOptions::new();
        fo.remote_callbacks(remote_callbacks(&authenticator, &config, bar.clone()));
        remote.fetch(&[branch.as_str()], Some(&mut fo), None)?;
        bar.finish_and_clear();

        let fetch_head = self.repository.find_reference("FETCH_HEAD")?;
        let fetch_commit = self.repository.reference_to_annotated_commit(&fetch_head)?;
        let (analysis, _) = self.repository.merge_analysis(&[&fetch_commit])?;

        if analysis.is_up_to_date() {
            return Ok(PullOutcome::AlreadyUpToDate);
        }

        if !analysis.is_fast_forward() {
            return Err(VcsError::NonFastForward { branch });
        }

        // INVARIANT: Move branch first, then bring the work tree along with it.
        let refname = format!("refs/heads/{branch}");
        let mut reference = self.repository.find_reference(&refname)?;
        reference.set_target(fetch_commit.id(), "surgeon: fast-forward")?;
        self.repository.set_head(&refname)?;
        self.repository
            .checkout_head(Some(CheckoutBuilder::new().force()))?;

        Ok(PullOutcome::FastForward)
    }

    #[instrument(skip(self), level = "debug")]
    fn clone_upstream(&self, url: &str) -> Result<UpstreamClone> {
        let dir = tempfile::Builder::new()
            .prefix("surgeon-upstream")
            .tempdir()
            .map_err(VcsError::TempDir)?;
        info!("clone {url} into {:?}", dir.path().display());

        let bar = progress_bar(url)?;
        let authenticator =
            GitAuthenticator::default().set_prompter(IndicatifPrompter::new(bar.clone()));
        let config = GitConfig::open_default()?;
        let mut fo = FetchOptions::new();
        fo.remote_callbacks(remote_callbacks(&authenticator, &config, bar.clone()));
        RepoBuilder::new().fetch_options(fo).clone(url, dir.path())?;
        bar.finish_and_clear();

        Ok(UpstreamClone::new(dir))
    }

    #[instrument(skip(self, clone), level = "debug")]
    fn changed_files(&self, clone: &UpstreamClone) -> Result<BTreeSet<PathBuf>> {
        let repository = Repository::open(clone.path())?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let mut changed = BTreeSet::new();
        for entry in repository.statuses(Some(&mut opts))?.iter() {
            let status = entry.status();
            if status.intersects(Status::WT_DELETED | Status::INDEX_DELETED) {
                continue;
            }

            let path = bytes_to_path(entry.path_bytes());
            debug!("changed {:?}: {status:?}", path.display());
            changed.insert(path.to_path_buf());
        }

        Ok(changed)
    }

    #[instrument(skip(self, paths), level = "debug")]
    fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        let mut index = self.repository.index()?;
        for path in paths {
            debug!("stage {:?}", path.display());
            index.add_path(path)?;
        }
        index.write()?;

        Ok(())
    }

    #[instrument(skip(self, message), level = "debug")]
    fn commit(&self, message: &str) -> Result<()> {
        // INVARIANT: Always use new tree produced by index.
        let mut index = self.repository.index()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repository.find_tree(tree_oid)?;

        // INVARIANT: Append to current HEAD if there is one.
        let signature = self.repository.signature()?;
        let mut parents = Vec::new();
        if let Some(parent) = self.repository.head().ok().and_then(|head| head.target()) {
            parents.push(self.repository.find_commit(parent)?);
        }
        let parents = parents.iter().collect::<Vec<_>>();

        let oid = self.repository.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;
        info!("commit {oid}: {message}");

        Ok(())
    }
}

fn progress_bar(message: &str) -> Result<ProgressBar> {
    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
    )?
    .progress_chars("-Cco.");
    let bar = ProgressBar::no_length().with_style(style);
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));

    Ok(bar)
}

fn remote_callbacks<'a>(
    authenticator: &'a GitAuthenticator,
    config: &'a GitConfig,
    bar: ProgressBar,
) -> RemoteCallbacks<'a> {
    let mut throttle = Instant::now();
    let mut rc = RemoteCallbacks::new();
    rc.credentials(authenticator.credentials(config));
    rc.transfer_progress(move |progress| {
        if throttle.elapsed() > Duration::from_millis(10) {
            throttle = Instant::now();
            bar.set_length(progress.total_objects() as u64);
            bar.set_position(progress.received_objects() as u64);
        }
        true
    });

    rc
}

/// Git2 authentication prompter for progress bar.
///
/// Suspends the progress bar while the user types. A cancelled prompt gives
/// up on authentication instead of aborting the process.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

// Thanks from:
//
// https://github.com/rust-lang/git2-rs/blob/5bc3baa9694a94db2ca9cc256b5bce8a215f9013/
// src/util.rs#L85
#[cfg(unix)]
fn bytes_to_path(bytes: &[u8]) -> &Path {
    use std::os::unix::prelude::*;
    Path::new(OsStr::from_bytes(bytes))
}
#[cfg(windows)]
fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Version control error types.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Temporary directory for upstream clone cannot be made.
    #[error("failed to create temporary directory for upstream clone")]
    TempDir(#[source] std::io::Error),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Fork is not on a branch.
    #[error("fork HEAD is not on a branch")]
    DetachedHead,

    /// Fork and its remote diverged.
    #[error("cannot fast-forward branch {branch:?}, fork and remote have diverged")]
    NonFastForward { branch: String },
}

/// Friendly result alias :3
pub type Result<T, E = VcsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs::{create_dir_all, remove_file, write};

    fn init_repo(path: &Path) -> anyhow::Result<Repository> {
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(path, &opts)?;
        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;

        Ok(repo)
    }

    fn commit_all(vcs: &Git2Vcs, paths: &[&str]) -> anyhow::Result<()> {
        let paths = paths.iter().map(PathBuf::from).collect::<Vec<_>>();
        vcs.stage(&paths)?;
        vcs.commit("chore: add files")?;

        Ok(())
    }

    #[test]
    fn is_clean_sees_untracked_files() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        init_repo(root.path())?;
        write(root.path().join("a.txt"), "a\n")?;
        let vcs = Git2Vcs::open(root.path())?;
        assert!(!vcs.is_clean()?);

        commit_all(&vcs, &["a.txt"])?;
        assert!(vcs.is_clean()?);

        write(root.path().join("a.txt"), "b\n")?;
        assert!(!vcs.is_clean()?);

        Ok(())
    }

    #[test]
    fn changed_files_excludes_deletions() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        init_repo(dir.path())?;
        write(dir.path().join("keep.txt"), "keep\n")?;
        write(dir.path().join("edit.txt"), "edit\n")?;
        write(dir.path().join("gone.txt"), "gone\n")?;
        let vcs = Git2Vcs::open(dir.path())?;
        commit_all(&vcs, &["keep.txt", "edit.txt", "gone.txt"])?;

        write(dir.path().join("edit.txt"), "edited\n")?;
        remove_file(dir.path().join("gone.txt"))?;
        create_dir_all(dir.path().join("new/deep"))?;
        write(dir.path().join("new/deep/file.txt"), "new\n")?;

        let clone = UpstreamClone::new(dir);
        let result = vcs.changed_files(&clone)?;
        let expect = BTreeSet::from([
            PathBuf::from("edit.txt"),
            PathBuf::from("new/deep/file.txt"),
        ]);
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn clone_upstream_is_removed_on_drop() -> anyhow::Result<()> {
        let upstream = tempfile::tempdir()?;
        init_repo(upstream.path())?;
        write(upstream.path().join("README.md"), "upstream\n")?;
        let upstream_vcs = Git2Vcs::open(upstream.path())?;
        commit_all(&upstream_vcs, &["README.md"])?;

        let url = upstream.path().to_string_lossy().into_owned();
        let clone = upstream_vcs.clone_upstream(&url)?;
        let path = clone.path().to_path_buf();
        assert!(path.join("README.md").is_file());
        assert!(path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with("surgeon-upstream")));

        drop(clone);
        assert!(!path.exists());

        Ok(())
    }

    #[test]
    fn pull_fast_forwards_then_reports_up_to_date() -> anyhow::Result<()> {
        let origin = tempfile::tempdir()?;
        init_repo(origin.path())?;
        write(origin.path().join("a.txt"), "a\n")?;
        let origin_vcs = Git2Vcs::open(origin.path())?;
        commit_all(&origin_vcs, &["a.txt"])?;

        let fork = tempfile::tempdir()?;
        let repo = Repository::clone(&origin.path().to_string_lossy(), fork.path())?;
        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;
        let fork_vcs = Git2Vcs::open(fork.path())?;
        assert_eq!(fork_vcs.pull()?, PullOutcome::AlreadyUpToDate);

        write(origin.path().join("b.txt"), "b\n")?;
        commit_all(&origin_vcs, &["b.txt"])?;
        assert_eq!(fork_vcs.pull()?, PullOutcome::FastForward);
        assert!(fork.path().join("b.txt").is_file());
        assert!(fork_vcs.is_clean()?);

        Ok(())
    }
}
