// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Surgically modify your forks.
//!
//! Surgeon keeps a user-owned __fork__ in sync with a pristine __upstream__
//! repository while replaying the user's own customizations on top of it.
//! Customizations are expressed as an ordered listing of __codemods__, i.e.,
//! small named file transformations that are applied to a throwaway clone of
//! upstream. Once every codemod has run, the clone is __reconciled__ into the
//! fork by copying over anything that is missing from the fork, or anything
//! that the codemods changed.
//!
//! # Operation
//!
//! 1. Verify that the fork has no uncommitted changes.
//! 2. Pull the latest state of the fork from its own remote.
//! 3. Clone upstream into a temporary directory.
//! 4. Apply each configured codemod in order to the upstream clone.
//! 5. Copy missing and changed files from the clone into the fork, skipping
//!    anything covered by the ignore list.
//! 6. Remove the temporary clone.
//!
//! Codemods are cumulative. Each codemod sees the output of every codemod
//! listed before it.
//!
//! # See Also
//!
//! 1. [`codemod`]
//! 2. [`reconcile`]
//! 3. [`surgery`]

pub mod codemod;
pub mod config;
pub mod path;
pub mod reconcile;
pub mod surgery;
pub mod vcs;

pub use codemod::{pipeline::Pipeline, CodeMod, Registry};
pub use config::Config;
pub use reconcile::{IgnorePolicy, Reconciliation, Reconciler};
pub use surgery::Surgeon;
pub use vcs::{Git2Vcs, PullOutcome, UpstreamClone, VersionControl};
