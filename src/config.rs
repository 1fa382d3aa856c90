// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the `.surgeon.yaml` file that every fork carries at
//! its top-level. Serialization and deserialization go through [`FromStr`] and
//! [`Display`]. Reading the file is offered through [`Config::load`] for
//! convenience.

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Fork configuration layout.
///
/// # General Layout
///
/// A configuration names the upstream repository to pull from, the directory
/// inside the fork that holds replacement assets, an ordered listing of
/// codemods, and a listing of path prefixes that should never be copied into
/// the fork.
///
/// ```yaml
/// upstream: https://github.com/community-scripts/ProxmoxVE
/// modsdir: codemods
/// codemods:
///   - description: Header Updates
///     mod: sed
///     match: misc/*.func
///     args:
///       - https://github.com/community-scripts/ProxmoxVE/raw/main/ct/headers/
///       - https://github.com/bketelsen/IncusScripts/raw/main/ct/headers/
/// ignorelist:
///   - prefix: ct
/// ```
///
/// The order of codemods matters. Each codemod operates on the output of the
/// codemods listed before it.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Config {
    /// URL of upstream repository to clone from.
    pub upstream: String,

    /// Directory in fork that houses replacement assets for codemods.
    #[serde(default)]
    pub modsdir: String,

    /// Ordered listing of codemods to apply to upstream.
    #[serde(default)]
    pub codemods: Vec<CodeModInvocation>,

    /// Path prefixes to never copy into the fork.
    #[serde(default)]
    pub ignorelist: Vec<Ignore>,
}

impl Config {
    /// Read and parse configuration file at target path.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if configuration file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if configuration is malformed.
    /// - Return [`ConfigError::ShellExpansion`] if shell expansion fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = read_to_string(path.as_ref()).map_err(|err| ConfigError::Read {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;

        data.parse()
    }

    /// Template configuration written by `surgeon init`.
    pub fn template() -> Self {
        Self {
            upstream: "https://some.repository.com/upstream/repo".into(),
            modsdir: "mymods".into(),
            codemods: vec![CodeModInvocation {
                description: "Modify URLS".into(),
                mod_name: "sed".into(),
                pattern: "cmd/*.go".into(),
                args: vec![
                    "github.com/upstream/repo".into(),
                    "github.com/myfork/repo".into(),
                ],
            }],
            ignorelist: vec![Ignore {
                prefix: "ct".into(),
            }],
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: Config = serde_yaml::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on upstream and mods directory.
        config.upstream = shellexpand::full(config.upstream.as_str())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned();
        config.modsdir = shellexpand::full(config.modsdir.as_str())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned();

        Ok(config)
    }
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            serde_yaml::to_string(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Invocation of a codemod.
///
/// Identifies which codemod to run, over which upstream files, with which
/// arguments.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct CodeModInvocation {
    /// Human description of what the invocation is for.
    #[serde(default)]
    pub description: String,

    /// Registered name of codemod to run.
    #[serde(rename = "mod")]
    pub mod_name: String,

    /// Glob matching files relative to upstream root.
    #[serde(rename = "match")]
    pub pattern: String,

    /// Arguments handed to codemod verbatim.
    #[serde(default, deserialize_with = "scalar_strings")]
    pub args: Vec<String>,
}

/// Path prefix to exclude from reconciliation.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Ignore {
    /// Relative path prefix.
    pub prefix: String,
}

// Codemod arguments are strings, but YAML happily reads `- 12` as a number.
fn scalar_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    values
        .unwrap_or_default()
        .into_iter()
        .map(|value| match value {
            Value::Null => Ok(String::new()),
            Value::Bool(flag) => Ok(flag.to_string()),
            Value::Number(number) => Ok(number.to_string()),
            Value::String(string) => Ok(string),
            other => Err(serde::de::Error::custom(format!(
                "codemod arguments must be scalars, found {other:?}"
            ))),
        })
        .collect()
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(serde_yaml::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(serde_yaml::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("FORKS", "/home/blah/forks")])]
    fn deserialize_config() -> anyhow::Result<()> {
        let result: Config = indoc! {r##"
            upstream: $FORKS/upstream.git
            modsdir: codemods
            codemods:
              - description: PVE Check Function
                mod: bashfunc
                match: misc/build.func
                args:
                  - pve_check
                  - codemods/pve_check.sh
              - description: Inject after line
                mod: inject
                match: install/*.sh
                args:
                  - 12
                  - "# Modified by surgeon"
            ignorelist:
              - prefix: ct
              - prefix: .github
        "##}
        .parse()?;

        let expect = Config {
            upstream: "/home/blah/forks/upstream.git".into(),
            modsdir: "codemods".into(),
            codemods: vec![
                CodeModInvocation {
                    description: "PVE Check Function".into(),
                    mod_name: "bashfunc".into(),
                    pattern: "misc/build.func".into(),
                    args: vec!["pve_check".into(), "codemods/pve_check.sh".into()],
                },
                CodeModInvocation {
                    description: "Inject after line".into(),
                    mod_name: "inject".into(),
                    pattern: "install/*.sh".into(),
                    args: vec!["12".into(), "# Modified by surgeon".into()],
                },
            ],
            ignorelist: vec![
                Ignore {
                    prefix: "ct".into(),
                },
                Ignore {
                    prefix: ".github".into(),
                },
            ],
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn deserialize_config_with_missing_sections() -> anyhow::Result<()> {
        let result: Config = "upstream: https://blah.org/foo.git\n".parse()?;
        let expect = Config {
            upstream: "https://blah.org/foo.git".into(),
            ..Default::default()
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn deserialize_config_rejects_nested_args() {
        let result = indoc! {r#"
            upstream: https://blah.org/foo.git
            codemods:
              - mod: sed
                match: "*.sh"
                args:
                  - [nested, list]
        "#}
        .parse::<Config>();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn serialize_template_config() -> anyhow::Result<()> {
        let result = Config::template().to_string();
        let expect = indoc! {r#"
            upstream: https://some.repository.com/upstream/repo
            modsdir: mymods
            codemods:
            - description: Modify URLS
              mod: sed
              match: cmd/*.go
              args:
              - github.com/upstream/repo
              - github.com/myfork/repo
            ignorelist:
            - prefix: ct
        "#};
        assert_eq!(result, expect);

        let reparsed: Config = result.parse()?;
        assert_eq!(reparsed, Config::template());

        Ok(())
    }
}
