// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Ordered codemod execution.
//!
//! Runs the codemod invocations of a configuration one after another against
//! the upstream clone. Each invocation is resolved, validated, and applied in
//! full before the next one starts. The first failure stops the pipeline.
//! Edits made by earlier invocations are left as they are.

use crate::{
    codemod::{CodemodError, Registry},
    config::CodeModInvocation,
};

use std::path::Path;
use tracing::{debug, info, instrument};

/// Codemod pipeline over a registry.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'a> {
    registry: &'a Registry,
}

impl<'a> Pipeline<'a> {
    /// Construct new pipeline resolving codemods through registry.
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Run codemod invocations in order.
    ///
    /// # Errors
    ///
    /// - Return [`PipelineError::UnknownCodemod`] if invocation names a
    ///   codemod that is not registered.
    /// - Return [`PipelineError::Validate`] if invocation arguments are
    ///   rejected.
    /// - Return [`PipelineError::Apply`] if codemod fails to edit upstream.
    #[instrument(skip(self, invocations), level = "debug")]
    pub fn run(
        &self,
        invocations: &[CodeModInvocation],
        upstream: &Path,
        fork: &Path,
    ) -> Result<()> {
        for (index, invocation) in invocations.iter().enumerate() {
            let codemod = self.registry.resolve(&invocation.mod_name).map_err(|_| {
                PipelineError::UnknownCodemod {
                    index,
                    name: invocation.mod_name.clone(),
                    description: invocation.description.clone(),
                }
            })?;

            info!(
                "run codemod {} ({}): {}",
                index + 1,
                invocation.mod_name,
                invocation.description
            );
            debug!("match {:?} with args {:?}", invocation.pattern, invocation.args);

            codemod
                .validate(upstream, fork, &invocation.pattern, &invocation.args)
                .map_err(|err| PipelineError::Validate {
                    index,
                    mod_name: invocation.mod_name.clone(),
                    description: invocation.description.clone(),
                    source: err,
                })?;

            codemod
                .apply(upstream, fork, &invocation.pattern, &invocation.args)
                .map_err(|err| PipelineError::Apply {
                    index,
                    mod_name: invocation.mod_name.clone(),
                    description: invocation.description.clone(),
                    source: err,
                })?;
        }

        Ok(())
    }
}

/// Pipeline error types.
///
/// Indices are zero-based positions in the codemod listing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invocation names codemod that is not registered.
    #[error("codemod #{index} ({description:?}) names unknown codemod {name:?}")]
    UnknownCodemod {
        index: usize,
        name: String,
        description: String,
    },

    /// Invocation arguments rejected.
    #[error("codemod #{index} ({description:?}) has invalid arguments for {mod_name}")]
    Validate {
        index: usize,
        mod_name: String,
        description: String,
        #[source]
        source: CodemodError,
    },

    /// Codemod failed while editing upstream.
    #[error("codemod #{index} ({description:?}) failed to apply {mod_name}")]
    Apply {
        index: usize,
        mod_name: String,
        description: String,
        #[source]
        source: CodemodError,
    },
}

/// Friendly result alias :3
type Result<T, E = PipelineError> = std::result::Result<T, E>;
