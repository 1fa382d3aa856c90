// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Substring replacement codemod.

use crate::codemod::{expect_args, matched_files, read_file, rewrite, CodeMod, CodemodError, Result};

use std::path::Path;
use tracing::{debug, info, instrument};

/// Replace every literal occurrence of a string in matched files.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sed;

impl CodeMod for Sed {
    #[instrument(skip(self, args), level = "debug")]
    fn apply(&self, upstream: &Path, _fork: &Path, pattern: &str, args: &[String]) -> Result<()> {
        info!("apply sed to {pattern:?}");
        let (search, replacement) = (args[0].as_bytes(), args[1].as_bytes());
        for path in matched_files(upstream, pattern)? {
            debug!("replace {:?} in {:?}", args[0], path.display());
            let content = read_file(&path)?;
            rewrite(&path, sed_replace(search, replacement, &content))?;
        }

        Ok(())
    }

    fn validate(&self, _: &Path, _: &Path, _: &str, args: &[String]) -> Result<()> {
        expect_args("sed", args, 2)?;
        if args[0].is_empty() {
            return Err(CodemodError::ArgType {
                mod_name: "sed",
                position: 1,
                reason: "search string cannot be empty".into(),
            });
        }

        Ok(())
    }

    fn description(&self) -> &'static str {
        "Replace strings in a file"
    }

    fn usage(&self) -> &'static str {
        r#"Replace strings in a file.
This codemod replaces every occurrence of a string in the matched file(s)
with a string specified in the arguments. File permissions are preserved.

Args (2 required):
    1. search string
    2. replacement string

Example:
    upstream: https://github.com/community-scripts/ProxmoxVE
    modsdir: codemods
    codemods:
      - description: Header Updates
        mod: sed
        match: misc/*.func
        args:
          - https://github.com/community-scripts/ProxmoxVE/raw/main/ct/headers/
          - https://github.com/bketelsen/IncusScripts/raw/main/ct/headers/
"#
    }
}

/// Replace all non-overlapping occurrences of search in content.
///
/// Occurrences are found left to right. Replacement text is never searched
/// again.
pub fn sed_replace(search: &[u8], replacement: &[u8], content: &[u8]) -> Vec<u8> {
    if search.is_empty() {
        return content.to_vec();
    }

    let mut output = Vec::with_capacity(content.len());
    let mut rest = content;
    while let Some(index) = find(rest, search) {
        output.extend_from_slice(&rest[..index]);
        output.extend_from_slice(replacement);
        rest = &rest[index + search.len()..];
    }
    output.extend_from_slice(rest);

    output
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
