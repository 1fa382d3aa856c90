// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Codemod transformation engine.
//!
//! A __codemod__ is a named, parameterized file transformation. Every codemod
//! operates on the files of the upstream clone that match a glob pattern, and
//! rewrites their contents in place. Codemods never rename or delete files.
//!
//! # Codemod Contract
//!
//! All codemods implement [`CodeMod`], which is composed of four methods:
//!
//! - [`CodeMod::validate`] checks the arguments of an invocation without
//!   touching the file system.
//! - [`CodeMod::apply`] expands the glob against the upstream root, and edits
//!   each matched file.
//! - [`CodeMod::description`] gives a one line summary.
//! - [`CodeMod::usage`] gives a long description with an example
//!   configuration.
//!
//! # Built-in Codemods
//!
//! | Name          | Arguments                      |
//! |---------------|--------------------------------|
//! | `sed`         | search, replacement            |
//! | `inject`      | `start`/`end`/line, content    |
//! | `sjson`       | `set`/`del`, key path, [value] |
//! | `replacefile` | fork relative path             |
//! | `bashfunc`    | function name, fork relative path |
//!
//! # See Also
//!
//! 1. [`Registry`]
//! 2. [`pipeline`]

pub mod bashfunc;
pub mod inject;
pub mod locate;
pub mod pipeline;
pub mod replacefile;
pub mod sed;
pub mod sjson;

use crate::codemod::{
    bashfunc::BashFunc, inject::Inject, replacefile::ReplaceFile, sed::Sed, sjson::SJson,
};

use glob::{glob_with, MatchOptions, Pattern};
use std::{
    collections::BTreeMap,
    fmt::{Debug, Formatter, Result as FmtResult},
    fs::{metadata, read, set_permissions, write},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Named file transformation.
///
/// Implementations are stateless. All state lives in the arguments of an
/// invocation, and the files being edited.
pub trait CodeMod: Send + Sync + 'static {
    /// Apply codemod to every file of upstream matching pattern.
    ///
    /// Replacement assets are resolved relative to the fork root.
    fn apply(&self, upstream: &Path, fork: &Path, pattern: &str, args: &[String]) -> Result<()>;

    /// Check arguments of invocation.
    ///
    /// Must not touch the file system.
    fn validate(&self, upstream: &Path, fork: &Path, pattern: &str, args: &[String])
        -> Result<()>;

    /// One line summary of codemod.
    fn description(&self) -> &'static str;

    /// Long usage text of codemod with example configuration.
    fn usage(&self) -> &'static str;
}

/// Name to codemod mapping.
///
/// Constructed once at startup and passed to whatever needs to resolve
/// codemods by name. Names are unique. Registering a name twice silently
/// replaces the earlier codemod.
#[derive(Default)]
pub struct Registry {
    mods: BTreeMap<String, Box<dyn CodeMod>>,
}

impl Registry {
    /// Construct new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct new registry holding the five built-in codemods.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("sed", Sed);
        registry.register("inject", Inject);
        registry.register("sjson", SJson);
        registry.register("replacefile", ReplaceFile);
        registry.register("bashfunc", BashFunc);
        registry
    }

    /// Register codemod under a name.
    ///
    /// Returns the codemod that previously held the name, if any.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        codemod: impl CodeMod,
    ) -> Option<Box<dyn CodeMod>> {
        self.mods.insert(name.into(), Box::new(codemod))
    }

    /// Resolve codemod by name.
    ///
    /// # Errors
    ///
    /// - Return [`CodemodError::NotFound`] if no codemod has that name.
    pub fn resolve(&self, name: &str) -> Result<&dyn CodeMod> {
        self.mods
            .get(name)
            .map(|codemod| &**codemod)
            .ok_or_else(|| CodemodError::NotFound { name: name.into() })
    }

    /// Iterate over registered codemods sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn CodeMod)> {
        self.mods
            .iter()
            .map(|(name, codemod)| (name.as_str(), &**codemod))
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }
}

impl Debug for Registry {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_set().entries(self.mods.keys()).finish()
    }
}

/// Expand glob pattern relative to upstream root.
///
/// Only regular files are returned. An empty listing is not an error.
///
/// # Errors
///
/// - Return [`CodemodError::Glob`] if pattern is malformed.
/// - Return [`CodemodError::GlobWalk`] if a matched path cannot be read.
#[instrument(skip(upstream), level = "debug")]
pub fn matched_files(upstream: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    // INVARIANT: Upstream root is taken literally, only the pattern is a glob.
    let root = Pattern::escape(upstream.to_string_lossy().as_ref());
    let full = format!("{}/{}", root.trim_end_matches('/'), pattern);

    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let entries = glob_with(&full, options).map_err(|err| CodemodError::Glob {
        source: err,
        pattern: pattern.into(),
    })?;

    let mut matches = Vec::new();
    for entry in entries {
        let path = entry?;
        if path.is_dir() {
            debug!("skip directory match {:?}", path.display());
            continue;
        }
        matches.push(path);
    }

    Ok(matches)
}

/// Read file into bytes.
///
/// # Errors
///
/// - Return [`CodemodError::Read`] if file cannot be read.
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>> {
    read(path).map_err(|err| CodemodError::Read {
        source: err,
        path: path.into(),
    })
}

/// Read file into UTF-8 text.
///
/// # Errors
///
/// - Return [`CodemodError::Read`] if file cannot be read.
/// - Return [`CodemodError::NotText`] if file is not UTF-8.
pub(crate) fn read_text(path: &Path) -> Result<String> {
    String::from_utf8(read_file(path)?).map_err(|err| CodemodError::NotText {
        source: err.utf8_error(),
        path: path.into(),
    })
}

/// Rewrite file contents in place.
///
/// Permission bits of the file are kept as they were before the rewrite.
///
/// # Errors
///
/// - Return [`CodemodError::Read`] if file metadata cannot be read.
/// - Return [`CodemodError::Write`] if file cannot be written.
pub(crate) fn rewrite(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    let permissions = metadata(path)
        .map_err(|err| CodemodError::Read {
            source: err,
            path: path.into(),
        })?
        .permissions();

    write(path, contents.as_ref())
        .and_then(|_| set_permissions(path, permissions))
        .map_err(|err| CodemodError::Write {
            source: err,
            path: path.into(),
        })
}

/// Check exact argument count.
///
/// # Errors
///
/// - Return [`CodemodError::Arity`] if counts differ.
pub(crate) fn expect_args(mod_name: &'static str, args: &[String], expect: usize) -> Result<()> {
    if args.len() != expect {
        return Err(CodemodError::Arity {
            mod_name,
            expect: expect.to_string(),
            found: args.len(),
        });
    }

    Ok(())
}

/// All possible error types of codemods.
#[derive(Debug, thiserror::Error)]
pub enum CodemodError {
    /// No codemod registered under name.
    #[error("codemod {name:?} not found")]
    NotFound { name: String },

    /// Wrong number of arguments.
    #[error("{mod_name} requires {expect} arguments, found {found}")]
    Arity {
        mod_name: &'static str,
        expect: String,
        found: usize,
    },

    /// Argument has wrong shape.
    #[error("{mod_name} argument {position} is invalid: {reason}")]
    ArgType {
        mod_name: &'static str,
        position: usize,
        reason: String,
    },

    /// Glob pattern is malformed.
    #[error("invalid match pattern {pattern:?}")]
    Glob {
        #[source]
        source: glob::PatternError,
        pattern: String,
    },

    /// Glob match cannot be read.
    #[error(transparent)]
    GlobWalk(#[from] glob::GlobError),

    /// Injection line lies beyond end of file.
    #[error("line {line} out of range for {:?} with {lines} lines", path.display())]
    Range {
        line: usize,
        lines: usize,
        path: PathBuf,
    },

    /// JSON action is neither set nor del.
    #[error("unknown action {action:?}, expected \"set\" or \"del\"")]
    UnknownAction { action: String },

    /// JSON key path walks into an array with a key that is not an index.
    #[error("key {key:?} cannot index array in {:?}", path.display())]
    KeyPath { key: String, path: PathBuf },

    /// JSON key path indexes too far past the end of an array.
    #[error("index {key} lies too far past end of {len} item array in {:?}", path.display())]
    IndexRange {
        key: String,
        len: usize,
        path: PathBuf,
    },

    /// JSON document cannot be parsed or rendered.
    #[error("invalid JSON document {:?}", path.display())]
    Json {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Shell function cannot be located.
    #[error("failed to locate shell function in {:?}", path.display())]
    Locate {
        #[source]
        source: crate::codemod::locate::LocateError,
        path: PathBuf,
    },

    /// File is not UTF-8 text.
    #[error("file {:?} is not valid UTF-8", path.display())]
    NotText {
        #[source]
        source: std::str::Utf8Error,
        path: PathBuf,
    },

    /// File cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = CodemodError> = std::result::Result<T, E>;
