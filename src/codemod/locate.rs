// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shell function location.
//!
//! Finds the line span of a named function declaration in a shell script.
//! Scripts are parsed, not pattern matched, so braces inside strings,
//! comments, here-documents, or nested blocks never confuse the boundary of a
//! function.
//!
//! # Parsing
//!
//! Parsing sits behind [`ScriptParser`], which reduces a script to its
//! listing of top-level [`Statement`]s. Location logic only ever looks at
//! that listing. [`BashParser`] is the default parser, backed by the
//! tree-sitter bash grammar.
//!
//! # Duplicate Declarations
//!
//! A script may declare the same function more than once. The first
//! top-level declaration in source order always wins.

use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{debug, instrument};
use tree_sitter::{Node, Parser};

/// Inclusive, 1-indexed line span of a located function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionBoundary {
    pub start_line: usize,
    pub end_line: usize,
}

impl Display for FunctionBoundary {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "lines {}-{}", self.start_line, self.end_line)
    }
}

/// Kind of top-level statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Function declaration.
    Function,

    /// Comment line.
    Comment,

    /// Anything else.
    Command,
}

/// Top-level statement of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: StatementKind,

    /// Declared name of functions.
    pub name: Option<String>,

    /// First line of statement, 1-indexed.
    pub start_line: usize,

    /// Last line of statement, 1-indexed.
    pub end_line: usize,
}

/// Reduce a shell script to its top-level statements.
pub trait ScriptParser {
    /// Parse script source into top-level statements in source order.
    ///
    /// # Errors
    ///
    /// - Return [`LocateError::Syntax`] if script is malformed.
    fn parse(&self, source: &str) -> Result<Vec<Statement>>;
}

/// Bash parser backed by tree-sitter.
#[derive(Debug, Default, Clone, Copy)]
pub struct BashParser;

impl ScriptParser for BashParser {
    fn parse(&self, source: &str) -> Result<Vec<Statement>> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_bash::LANGUAGE.into())
            .map_err(|err| LocateError::ParserInit(err.to_string()))?;
        let tree = parser.parse(source, None).ok_or(LocateError::ParseFailed)?;
        let root = tree.root_node();

        if let Some(bad) = first_error(root) {
            return Err(LocateError::Syntax {
                line: bad.start_position().row + 1,
            });
        }

        let mut statements = Vec::new();
        let mut cursor = root.walk();
        for node in root.named_children(&mut cursor) {
            statements.push(to_statement(node, source));
        }

        Ok(statements)
    }
}

fn to_statement(node: Node<'_>, source: &str) -> Statement {
    // INVARIANT: Redirections wrap the function itself, e.g., `foo() {...} >&2`.
    let declaration = match node.kind() {
        "function_definition" => Some(node),
        "redirected_statement" => node
            .child_by_field_name("body")
            .filter(|body| body.kind() == "function_definition"),
        _ => None,
    };

    let (kind, name) = match declaration {
        Some(declaration) => (
            StatementKind::Function,
            declaration
                .child_by_field_name("name")
                .and_then(|name| name.utf8_text(source.as_bytes()).ok())
                .map(ToString::to_string),
        ),
        None if node.kind() == "comment" => (StatementKind::Comment, None),
        None => (StatementKind::Command, None),
    };

    let start = node.start_position();
    let end = node.end_position();

    // INVARIANT: A node that stops at column zero ended on the previous line.
    let end_line = if end.column == 0 && end.row > start.row {
        end.row
    } else {
        end.row + 1
    };

    Statement {
        kind,
        name,
        start_line: start.row + 1,
        end_line,
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if !node.has_error() {
        return None;
    }

    if node.is_error() || node.is_missing() {
        return Some(node);
    }

    let mut cursor = node.walk();
    let children = node.children(&mut cursor).collect::<Vec<_>>();
    children.into_iter().find_map(first_error).or(Some(node))
}

/// Locate line span of top-level function declaration by name.
///
/// # Errors
///
/// - Return [`LocateError::NotFound`] if no top-level function has the name.
/// - Return [`LocateError::Syntax`] if script is malformed.
#[instrument(skip(parser, source), level = "debug")]
pub fn locate_function(
    parser: &impl ScriptParser,
    source: &str,
    name: &str,
) -> Result<FunctionBoundary> {
    let statements = parser.parse(source)?;
    let boundary = statements
        .iter()
        .find(|statement| {
            statement.kind == StatementKind::Function && statement.name.as_deref() == Some(name)
        })
        .map(|statement| FunctionBoundary {
            start_line: statement.start_line,
            end_line: statement.end_line,
        })
        .ok_or_else(|| LocateError::NotFound { name: name.into() })?;
    debug!("found function {name:?} at {boundary}");

    Ok(boundary)
}

/// Print script in normalized form.
///
/// Keeps every line from the first to the last top-level statement verbatim,
/// so here-document bodies survive untouched. Leading and trailing blank
/// lines are dropped, and the output always ends with exactly one newline.
/// Empty scripts print nothing.
pub fn print_script(source: &str, statements: &[Statement]) -> String {
    let (Some(first), Some(last)) = (statements.first(), statements.last()) else {
        return String::new();
    };

    let mut output = source
        .split('\n')
        .skip(first.start_line - 1)
        .take(last.end_line + 1 - first.start_line)
        .collect::<Vec<_>>()
        .join("\n");
    output.push('\n');

    output
}

/// Shell function location error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocateError {
    /// Parser cannot load shell grammar.
    #[error("failed to initialize shell parser: {0}")]
    ParserInit(String),

    /// Parser gave up on script.
    #[error("failed to parse shell script")]
    ParseFailed,

    /// Script is malformed.
    #[error("shell syntax error at line {line}")]
    Syntax { line: usize },

    /// No top-level function with name.
    #[error("function {name:?} not found")]
    NotFound { name: String },
}

/// Friendly result alias :3
pub type Result<T, E = LocateError> = std::result::Result<T, E>;
