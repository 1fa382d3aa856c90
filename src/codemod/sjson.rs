// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! JSON key patching codemod.
//!
//! Sets or deletes a single value of a JSON document addressed by a key path.
//!
//! # Key Paths
//!
//! A key path is a listing of keys separated by dots, e.g.,
//! `install_methods.1.resources.os`. Each key either names a member of an
//! object, or indexes an array:
//!
//! - A numeric key indexes an array. Setting past the end of an array pads it
//!   with nulls, up to [`MAX_PADDING`] of them.
//! - The key `-1` appends to an array when setting, and names the last
//!   element of an array when deleting.
//! - A literal dot inside a key is written as `\.`.
//!
//! Missing intermediate values are created when setting. They become arrays
//! when the next key is numeric, and objects otherwise. Deleting a path that
//! does not exist does nothing.

use crate::codemod::{matched_files, read_text, rewrite, CodeMod, CodemodError, Result};

use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Modify JSON documents in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct SJson;

impl CodeMod for SJson {
    #[instrument(skip(self, args), level = "debug")]
    fn apply(&self, upstream: &Path, _fork: &Path, pattern: &str, args: &[String]) -> Result<()> {
        info!("apply sjson to {pattern:?}");
        let action = Action::from_args(args)?;
        for path in matched_files(upstream, pattern)? {
            debug!("{action:?} {:?} in {:?}", args[1], path.display());
            let content = read_text(&path)?;
            let output = patch_json(&action, &args[1], &content).map_err(|err| match err {
                PatchError::Parse(source) => CodemodError::Json {
                    source,
                    path: path.clone(),
                },
                PatchError::NotAnIndex { key } => CodemodError::KeyPath {
                    key,
                    path: path.clone(),
                },
                PatchError::IndexRange { key, len } => CodemodError::IndexRange {
                    key,
                    len,
                    path: path.clone(),
                },
            })?;
            rewrite(&path, output)?;
        }

        Ok(())
    }

    fn validate(&self, _: &Path, _: &Path, _: &str, args: &[String]) -> Result<()> {
        Action::from_args(args)?;
        if args[1].is_empty() {
            return Err(CodemodError::ArgType {
                mod_name: "sjson",
                position: 2,
                reason: "key path cannot be empty".into(),
            });
        }

        Ok(())
    }

    fn description(&self) -> &'static str {
        "Modify a JSON file in-place"
    }

    fn usage(&self) -> &'static str {
        r#"sjson modifies a JSON file in-place.
This codemod sets or deletes the value at a key path of the matched file(s).
Values are always set as JSON strings.

Args (3 required for set, 2 required for del):
    1. Action (set, del)
    2. Key path, e.g., install_methods.1.resources.os
    3. Value (required for set)

Example:
    upstream: https://github.com/community-scripts/ProxmoxVE
    modsdir: codemods
    codemods:
      - description: change OS Key to debian
        mod: sjson
        match: json/debian-vm.json
        args:
          - set
          - install_methods.1.resources.os
          - debian
"#
    }
}

/// Most nulls that setting past the end of an array may pad it with.
pub const MAX_PADDING: usize = 1024;

/// Edit to perform on a JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Set string value at key path.
    Set(String),

    /// Delete value at key path.
    Delete,
}

impl Action {
    /// Determine action from codemod arguments.
    ///
    /// # Errors
    ///
    /// - Return [`CodemodError::Arity`] if argument count does not fit action.
    /// - Return [`CodemodError::UnknownAction`] if action is not known.
    pub fn from_args(args: &[String]) -> Result<Self> {
        let arity = |expect: &str| CodemodError::Arity {
            mod_name: "sjson",
            expect: expect.into(),
            found: args.len(),
        };

        match args {
            [action, _, value] if action == "set" => Ok(Self::Set(value.clone())),
            [action, _] if action == "del" => Ok(Self::Delete),
            [action, ..] if action == "set" && args.len() > 1 => Err(arity("3")),
            [action, ..] if action == "del" && args.len() > 1 => Err(arity("2")),
            [action, _] | [action, _, _] => Err(CodemodError::UnknownAction {
                action: action.clone(),
            }),
            _ => Err(arity("2 or 3")),
        }
    }
}

/// Apply action at key path of JSON text.
///
/// Pretty-printed documents stay pretty-printed, compact ones stay compact.
/// Member order of objects is preserved. Blank text is treated as an empty
/// document.
///
/// # Errors
///
/// - Return [`PatchError::Parse`] if text is not valid JSON.
/// - Return [`PatchError::NotAnIndex`] if key path indexes array with a
///   non-numeric key.
/// - Return [`PatchError::IndexRange`] if key path indexes more than
///   [`MAX_PADDING`] items past the end of an array.
pub fn patch_json(action: &Action, key_path: &str, text: &str) -> Result<String, PatchError> {
    let mut document = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(text)?
    };

    let keys = split_key_path(key_path);
    match action {
        Action::Set(value) => set_value(&mut document, &keys, Value::String(value.clone()))?,
        Action::Delete => delete_value(&mut document, &keys),
    }

    let mut output = if text.trim_end().contains('\n') {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    if text.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}

/// Split key path on unescaped dots.
pub fn split_key_path(key_path: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut key = String::new();
    let mut chars = key_path.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => key.push(escaped),
                None => key.push('\\'),
            },
            '.' => keys.push(std::mem::take(&mut key)),
            c => key.push(c),
        }
    }
    keys.push(key);

    keys
}

fn is_index(key: &str) -> bool {
    key == "-1" || (!key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()))
}

fn set_value(node: &mut Value, keys: &[String], value: Value) -> Result<(), PatchError> {
    let Some((key, rest)) = keys.split_first() else {
        *node = value;
        return Ok(());
    };

    match node {
        Value::Object(members) => {
            let child = members.entry(key.clone()).or_insert(Value::Null);
            set_value(child, rest, value)
        }
        Value::Array(items) => {
            let index = match key.as_str() {
                "-1" => items.len(),
                key if is_index(key) => key.parse::<usize>().unwrap_or(usize::MAX),
                key => return Err(PatchError::NotAnIndex { key: key.into() }),
            };

            // INVARIANT: Padding stays bounded no matter what index is asked for.
            let limit = items.len().saturating_add(MAX_PADDING);
            if index > limit {
                return Err(PatchError::IndexRange {
                    key: key.clone(),
                    len: items.len(),
                });
            }
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            set_value(&mut items[index], rest, value)
        }
        // INVARIANT: Scalars in the way are replaced by a fresh container.
        scalar => {
            *scalar = if is_index(key) {
                Value::Array(Vec::new())
            } else {
                Value::Object(Map::new())
            };
            set_value(scalar, keys, value)
        }
    }
}

fn delete_value(node: &mut Value, keys: &[String]) {
    let Some((key, rest)) = keys.split_first() else {
        return;
    };

    match node {
        Value::Object(members) if rest.is_empty() => {
            members.shift_remove(key);
        }
        Value::Object(members) => {
            if let Some(child) = members.get_mut(key) {
                delete_value(child, rest);
            }
        }
        Value::Array(items) => {
            let index = match key.as_str() {
                "-1" => items.len().checked_sub(1),
                key => key.parse::<usize>().ok().filter(|index| *index < items.len()),
            };
            match index {
                Some(index) if rest.is_empty() => {
                    items.remove(index);
                }
                Some(index) => delete_value(&mut items[index], rest),
                None => {}
            }
        }
        _ => {}
    }
}

/// Error types of JSON patching.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Document cannot be parsed or rendered.
    #[error(transparent)]
    Parse(#[from] serde_json::Error),

    /// Array indexed with a key that is not a number.
    #[error("key {key:?} cannot index array")]
    NotAnIndex { key: String },

    /// Array indexed too far past its end.
    #[error("index {key} lies too far past end of {len} item array")]
    IndexRange { key: String, len: usize },
}
