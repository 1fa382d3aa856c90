// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Whole file replacement codemod.

use crate::codemod::{expect_args, matched_files, read_file, rewrite, CodeMod, CodemodError, Result};

use std::path::Path;
use tracing::{debug, info, instrument};

/// Replace matched files with a file kept in the fork.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplaceFile;

impl CodeMod for ReplaceFile {
    #[instrument(skip(self, args), level = "debug")]
    fn apply(&self, upstream: &Path, fork: &Path, pattern: &str, args: &[String]) -> Result<()> {
        info!("apply replacefile to {pattern:?}");
        let matches = matched_files(upstream, pattern)?;
        if matches.is_empty() {
            return Ok(());
        }

        let replacement = fork.join(&args[0]);
        let contents = read_file(&replacement)?;
        for path in matches {
            debug!(
                "replace {:?} with {:?}",
                path.display(),
                replacement.display()
            );
            rewrite(&path, &contents)?;
        }

        Ok(())
    }

    fn validate(&self, _: &Path, _: &Path, _: &str, args: &[String]) -> Result<()> {
        expect_args("replacefile", args, 1)?;
        if Path::new(&args[0]).is_absolute() {
            return Err(CodemodError::ArgType {
                mod_name: "replacefile",
                position: 1,
                reason: format!("{:?} must be relative to the fork", args[0]),
            });
        }

        Ok(())
    }

    fn description(&self) -> &'static str {
        "Replace a file with another"
    }

    fn usage(&self) -> &'static str {
        r#"Replace a file with another.
This codemod replaces the contents of the matched file(s) with a file from
your fork. The matched file keeps its own permissions.

Args (1 required):
    1. The path to the file (in your fork) to replace the matched file(s)

Example:
    upstream: https://github.com/community-scripts/ProxmoxVE
    modsdir: codemods
    codemods:
      - description: Replace create_lxc
        mod: replacefile
        match: ct/create_lxc.sh
        args:
          - codemods/create_lxc.sh
"#
    }
}
