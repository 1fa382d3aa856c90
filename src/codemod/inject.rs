// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Content injection codemod.
//!
//! Injects content at the start of a file, at the end of a file, or after a
//! given line of a file.
//!
//! # Line Numbers
//!
//! Line numbers are 1-indexed, and content is inserted __after__ the given
//! line. Thus, injecting at line 1 makes the content the new second line of
//! the file. Injecting at line 0 makes the content the new first line.

use crate::codemod::{expect_args, matched_files, read_text, rewrite, CodeMod, CodemodError, Result};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
    str::FromStr,
};
use tracing::{debug, info, instrument};

/// Inject content into matched files.
#[derive(Debug, Default, Clone, Copy)]
pub struct Inject;

impl CodeMod for Inject {
    #[instrument(skip(self, args), level = "debug")]
    fn apply(&self, upstream: &Path, _fork: &Path, pattern: &str, args: &[String]) -> Result<()> {
        info!("apply inject to {pattern:?}");
        let position: Position = args[0].parse()?;
        for path in matched_files(upstream, pattern)? {
            debug!("inject at {position} in {:?}", path.display());
            let content = read_text(&path)?;
            let output = inject(position, &args[1], &content).map_err(|err| match err {
                InjectError::OutOfRange { line, lines } => CodemodError::Range {
                    line,
                    lines,
                    path: path.clone(),
                },
            })?;
            rewrite(&path, output)?;
        }

        Ok(())
    }

    fn validate(&self, _: &Path, _: &Path, _: &str, args: &[String]) -> Result<()> {
        expect_args("inject", args, 2)?;
        args[0].parse::<Position>()?;

        Ok(())
    }

    fn description(&self) -> &'static str {
        "Inject contents into a file"
    }

    fn usage(&self) -> &'static str {
        r##"Inject contents into a file.
This codemod modifies the matched file(s) by injecting specified content.
Content injected at a line number is placed on a new line right after
that line.

Args (2 required):
    1. Injection point in the file. Valid: "start", "end", <line number>
    2. The content to inject

Example:
    upstream: https://github.com/community-scripts/ProxmoxVE
    modsdir: codemods
    codemods:
      - description: Inject Modification notice
        mod: inject
        match: install/*.sh
        args:
          - end
          - "# Modified by surgeon"
"##
    }
}

/// Point of injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Before all existing content.
    Start,

    /// After all existing content.
    End,

    /// After 1-indexed line.
    Line(usize),
}

impl FromStr for Position {
    type Err = CodemodError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data {
            "start" => Ok(Self::Start),
            "end" => Ok(Self::End),
            line => line
                .parse::<usize>()
                .map(Self::Line)
                .map_err(|err| CodemodError::ArgType {
                    mod_name: "inject",
                    position: 1,
                    reason: format!("expected \"start\", \"end\", or line number, not {line:?} ({err})"),
                }),
        }
    }
}

impl Display for Position {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Start => fmt.write_str("start"),
            Self::End => fmt.write_str("end"),
            Self::Line(line) => write!(fmt, "line {line}"),
        }
    }
}

/// Inject content into text.
///
/// Lines are rejoined with newlines, so a missing trailing newline stays
/// missing and an existing one stays put.
///
/// # Errors
///
/// - Return [`InjectError::OutOfRange`] if line lies beyond end of text.
pub fn inject(position: Position, content: &str, text: &str) -> Result<String, InjectError> {
    match position {
        Position::Start => Ok(format!("{content}\n{text}")),
        Position::End => Ok(format!("{text}\n{content}")),
        Position::Line(line) => {
            let mut lines = text.split('\n').collect::<Vec<_>>();

            // INVARIANT: A trailing newline terminates the last line, it does
            // not start a new one.
            let count = match text {
                "" => 0,
                text if text.ends_with('\n') => lines.len() - 1,
                _ => lines.len(),
            };
            if line > count {
                return Err(InjectError::OutOfRange { line, lines: count });
            }

            lines.insert(line, content);
            Ok(lines.join("\n"))
        }
    }
}

/// Error types of text injection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InjectError {
    /// Line lies beyond end of text.
    #[error("line {line} out of range, text has {lines} lines")]
    OutOfRange { line: usize, lines: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;
    use std::fs::{read_to_string, write};

    #[test_case(Position::Start, "Hello", "World", "Hello\nWorld"; "at start")]
    #[test_case(Position::End, "Goodbye", "World", "World\nGoodbye"; "at end")]
    #[test_case(Position::Line(1), "Inserted", "Line1\nLine2\nLine3", "Line1\nInserted\nLine2\nLine3"; "after first line")]
    #[test_case(Position::Line(2), "Inserted", "Line1\nLine2\nLine3", "Line1\nLine2\nInserted\nLine3"; "after second line")]
    #[test_case(Position::Line(3), "Inserted", "Line1\nLine2\nLine3", "Line1\nLine2\nLine3\nInserted"; "after last line")]
    #[test_case(Position::Line(0), "Inserted", "Line1\nLine2", "Inserted\nLine1\nLine2"; "before first line")]
    #[test_case(Position::Line(2), "Inserted", "Line1\nLine2\n", "Line1\nLine2\nInserted\n"; "keeps trailing newline")]
    #[test]
    fn inject_content(position: Position, content: &str, text: &str, expect: &str) {
        let result = inject(position, content, text);
        assert_eq!(result, Ok(expect.to_string()));
    }

    #[test_case(Position::Line(10), "Line1\nLine2", 2; "far beyond end")]
    #[test_case(Position::Line(3), "Line1\nLine2\n", 2; "trailing newline is not a line")]
    #[test_case(Position::Line(1), "", 0; "empty text")]
    #[test]
    fn inject_out_of_range(position: Position, text: &str, lines: usize) {
        let result = inject(position, "x", text);
        let Position::Line(line) = position else {
            unreachable!()
        };
        assert_eq!(result, Err(InjectError::OutOfRange { line, lines }));
    }

    #[test]
    fn position_parsing() {
        assert_eq!("start".parse::<Position>().unwrap(), Position::Start);
        assert_eq!("end".parse::<Position>().unwrap(), Position::End);
        assert_eq!("12".parse::<Position>().unwrap(), Position::Line(12));
        assert!(matches!(
            "middle".parse::<Position>(),
            Err(CodemodError::ArgType { position: 1, .. })
        ));
        assert!(matches!(
            "-3".parse::<Position>(),
            Err(CodemodError::ArgType { .. })
        ));
    }

    #[test]
    fn usage_shows_full_example() {
        let usage = Inject.usage();
        assert!(usage.contains("- \"# Modified by surgeon\"\n"));
        assert!(usage.trim_end().ends_with("# Modified by surgeon\""));
    }

    #[test]
    fn apply_reports_range_error_with_path() -> anyhow::Result<()> {
        let upstream = tempfile::tempdir()?;
        let target = upstream.path().join("install.sh");
        write(&target, "Line1\nLine2")?;

        let result = Inject.apply(
            upstream.path(),
            upstream.path(),
            "install.sh",
            &["10".into(), "x".into()],
        );
        assert!(matches!(
            result,
            Err(CodemodError::Range { line: 10, lines: 2, ref path }) if path == &target
        ));
        assert_eq!(read_to_string(&target)?, "Line1\nLine2");

        Ok(())
    }

    #[test]
    fn apply_injects_into_every_match() -> anyhow::Result<()> {
        let upstream = tempfile::tempdir()?;
        write(upstream.path().join("a.sh"), "echo a\n")?;
        write(upstream.path().join("b.sh"), "echo b")?;

        Inject.apply(
            upstream.path(),
            upstream.path(),
            "*.sh",
            &["end".into(), "# Modified by surgeon".into()],
        )?;

        assert_eq!(
            read_to_string(upstream.path().join("a.sh"))?,
            "echo a\n\n# Modified by surgeon"
        );
        assert_eq!(
            read_to_string(upstream.path().join("b.sh"))?,
            "echo b\n# Modified by surgeon"
        );

        Ok(())
    }
}
