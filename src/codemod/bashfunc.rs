// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shell function replacement codemod.
//!
//! Swaps out a single top-level function of a shell script with the
//! contents of a script kept in the fork. Everything outside of the located
//! function is kept line for line.

use crate::codemod::{
    expect_args,
    locate::{locate_function, print_script, BashParser, LocateError, ScriptParser},
    matched_files, read_text, rewrite, CodeMod, CodemodError, Result,
};

use std::path::Path;
use tracing::{debug, info, instrument};

/// Replace a shell function in matched files.
#[derive(Debug, Default, Clone, Copy)]
pub struct BashFunc;

impl CodeMod for BashFunc {
    #[instrument(skip(self, args), level = "debug")]
    fn apply(&self, upstream: &Path, fork: &Path, pattern: &str, args: &[String]) -> Result<()> {
        info!("apply bashfunc to {pattern:?}");
        let matches = matched_files(upstream, pattern)?;
        if matches.is_empty() {
            return Ok(());
        }

        let (name, replacement_path) = (&args[0], fork.join(&args[1]));
        let replacement = read_text(&replacement_path)?;
        for path in matches {
            debug!(
                "replace function {name:?} in {:?} with {:?}",
                path.display(),
                replacement_path.display()
            );
            let content = read_text(&path)?;

            // INVARIANT: Blame the file whose parse actually failed.
            let output = replace_function(&BashParser, name, &replacement, &content).map_err(
                |err| match err {
                    ReplaceError::Target(source) => CodemodError::Locate {
                        source,
                        path: path.clone(),
                    },
                    ReplaceError::Replacement(source) => CodemodError::Locate {
                        source,
                        path: replacement_path.clone(),
                    },
                },
            )?;
            rewrite(&path, output)?;
        }

        Ok(())
    }

    fn validate(&self, _: &Path, _: &Path, _: &str, args: &[String]) -> Result<()> {
        expect_args("bashfunc", args, 2)?;
        if args[0].is_empty() || args[0].chars().any(char::is_whitespace) {
            return Err(CodemodError::ArgType {
                mod_name: "bashfunc",
                position: 1,
                reason: format!("{:?} is not a function name", args[0]),
            });
        }

        Ok(())
    }

    fn description(&self) -> &'static str {
        "Replace a bash function with another"
    }

    fn usage(&self) -> &'static str {
        r#"Replace a bash function with another.
This codemod searches for a top-level bash function in the matched file(s)
and replaces it with the contents of a script kept in your fork. When a
function is declared more than once, the first declaration is replaced.

Args (2 required):
    1. The name of the function to replace
    2. The path to the file (in your fork) containing the replacement function

Example:
    upstream: https://github.com/community-scripts/ProxmoxVE
    modsdir: codemods
    codemods:
      - description: PVE Check Function
        mod: bashfunc
        match: misc/build.func
        args:
          - pve_check
          - codemods/pve_check.sh
"#
    }
}

/// Replace top-level function of script with replacement script.
///
/// Lines before and after the function are kept as is. The replacement is
/// printed in normalized form in place of the function. No blank line is left
/// dangling at the end of the output by the splice.
///
/// # Errors
///
/// - Return [`ReplaceError::Target`] if function cannot be located in
///   content.
/// - Return [`ReplaceError::Replacement`] if replacement cannot be parsed.
pub fn replace_function(
    parser: &impl ScriptParser,
    name: &str,
    replacement: &str,
    content: &str,
) -> Result<String, ReplaceError> {
    let boundary = locate_function(parser, content, name).map_err(ReplaceError::Target)?;
    let statements = parser
        .parse(replacement)
        .map_err(ReplaceError::Replacement)?;

    let lines = content.split('\n').collect::<Vec<_>>();
    let mut output = String::with_capacity(content.len() + replacement.len());
    for line in &lines[..boundary.start_line - 1] {
        output.push_str(line);
        output.push('\n');
    }
    output.push_str(&print_script(replacement, &statements));
    for line in lines.iter().skip(boundary.end_line) {
        output.push_str(line);
        output.push('\n');
    }

    // INVARIANT: Every kept line got a newline, drop the one past the end.
    if output.ends_with('\n') {
        output.pop();
    }

    Ok(output)
}

/// Error types of shell function replacement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplaceError {
    /// Function cannot be located in script being edited.
    #[error(transparent)]
    Target(LocateError),

    /// Replacement script cannot be parsed.
    #[error(transparent)]
    Replacement(LocateError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::fs::{create_dir_all, read_to_string, write};

    const ORIGINAL: &str = indoc! {r#"

        function foo() {
        	echo "Hello, World!"
        }

        function bar() {
        	echo "Goodbye, World!"
        }
    "#};

    #[test]
    fn replace_named_function() {
        let replacement = indoc! {r#"

            function foo() {
            	echo "Hello, Universe!"
            }
        "#};

        let result = replace_function(&BashParser, "foo", replacement, ORIGINAL).unwrap();
        let expect = indoc! {r#"

            function foo() {
            	echo "Hello, Universe!"
            }

            function bar() {
            	echo "Goodbye, World!"
            }
        "#};
        assert_eq!(result, expect);
    }

    #[test]
    fn replace_missing_function() {
        let replacement = "function baz() {\n    echo \"Hello, Universe!\"\n}\n";
        let result = replace_function(&BashParser, "baz", replacement, ORIGINAL);
        assert_eq!(
            result,
            Err(ReplaceError::Target(LocateError::NotFound {
                name: "baz".into()
            }))
        );
        assert_eq!(
            result.unwrap_err().to_string(),
            "function \"baz\" not found"
        );
    }

    #[test]
    fn replace_last_function_without_trailing_newline() {
        let content = "echo start\nbar() {\n  echo old\n}";
        let replacement = "bar() {\n  echo new\n}\n\n\n";
        let result = replace_function(&BashParser, "bar", replacement, content).unwrap();
        assert_eq!(result, "echo start\nbar() {\n  echo new\n}");
    }

    #[test]
    fn replace_first_of_duplicate_declarations() {
        let content = indoc! {r#"
            greet() {
              echo one
            }
            greet() {
              echo two
            }
        "#};
        let result = replace_function(&BashParser, "greet", "greet() {\n  echo zero\n}\n", content)
            .unwrap();
        let expect = indoc! {r#"
            greet() {
              echo zero
            }
            greet() {
              echo two
            }
        "#};
        assert_eq!(result, expect);
    }

    #[test]
    fn apply_replaces_function_from_fork_asset() -> anyhow::Result<()> {
        let upstream = tempfile::tempdir()?;
        let fork = tempfile::tempdir()?;
        create_dir_all(upstream.path().join("misc"))?;
        create_dir_all(fork.path().join("codemods"))?;
        write(upstream.path().join("misc/build.func"), ORIGINAL)?;
        write(
            fork.path().join("codemods/foo.sh"),
            "function foo() {\n\techo \"Hello, Fork!\"\n}\n",
        )?;

        BashFunc.apply(
            upstream.path(),
            fork.path(),
            "misc/*.func",
            &["foo".into(), "codemods/foo.sh".into()],
        )?;

        let result = read_to_string(upstream.path().join("misc/build.func"))?;
        assert!(result.contains("echo \"Hello, Fork!\""));
        assert!(result.contains("echo \"Goodbye, World!\""));
        assert!(!result.contains("Hello, World!"));

        Ok(())
    }

    #[test]
    fn apply_names_file_missing_function() -> anyhow::Result<()> {
        let upstream = tempfile::tempdir()?;
        let fork = tempfile::tempdir()?;
        write(upstream.path().join("build.func"), ORIGINAL)?;
        write(fork.path().join("qux.sh"), "qux() {\n  :\n}\n")?;

        let result = BashFunc.apply(
            upstream.path(),
            fork.path(),
            "build.func",
            &["qux".into(), "qux.sh".into()],
        );
        assert!(matches!(
            result,
            Err(CodemodError::Locate { source: LocateError::NotFound { .. }, ref path })
                if path == &upstream.path().join("build.func")
        ));

        Ok(())
    }

    #[test]
    fn validate_function_name() {
        let root = Path::new("/");
        assert!(BashFunc
            .validate(root, root, "*", &["foo".into(), "foo.sh".into()])
            .is_ok());
        assert!(matches!(
            BashFunc.validate(root, root, "*", &["foo".into()]),
            Err(CodemodError::Arity { found: 1, .. })
        ));
        assert!(matches!(
            BashFunc.validate(root, root, "*", &["two words".into(), "foo.sh".into()]),
            Err(CodemodError::ArgType { .. })
        ));
    }
}
