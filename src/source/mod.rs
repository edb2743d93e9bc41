//! Dependency sources: one adapter per package-management ecosystem.
//!
//! Every source implements the same three-step protocol: detect whether its
//! ecosystem applies to the project at all, parse the ecosystem's manifest
//! into declared package names, and resolve each name against the installed
//! environment to a [`Dependency`] record for downstream license detection.
//!
//! - [`pip`] — Python projects managed through a virtualenv and `requirements.txt`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::{Dependency, SourceKind};
use crate::shell::ShellError;

pub mod pip;

/// One ecosystem-specific dependency source.
pub trait Source {
    /// Ecosystem tag stamped on every record this source yields.
    fn kind(&self) -> SourceKind;

    /// Applicability probe. `false` means "this ecosystem is not in play for
    /// this project"; that is the expected outcome for most sources on most
    /// projects, not an error. Must not have side effects.
    fn enabled(&self) -> bool;

    /// Resolve the declared dependencies to installed-package records, in
    /// manifest order. Computed once per source instance and cached; repeat
    /// calls return the same slice without touching the environment again.
    async fn dependencies(&self) -> Result<&[Dependency], SourceError>;
}

/// Fatal resolution failures. Applicability is signalled by [`Source::enabled`]
/// returning `false`, never by an error value.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The manifest could not be read even though detection saw it.
    #[error("failed to read `{}`", path.display())]
    ManifestUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `dependencies()` was called on a source whose `enabled()` gate did not
    /// pass.
    #[error("source `{kind}` is not enabled for this project")]
    Disabled { kind: SourceKind },

    /// The package-manager query for one declared package failed. This aborts
    /// the whole resolution; there are no partial results and no retry.
    #[error("failed to resolve `{name}`")]
    Tool {
        name: String,
        #[source]
        source: ShellError,
    },

    /// The package manager answered but left out a field the record needs.
    #[error("metadata for `{name}` has no `{field}` field")]
    MissingField { name: String, field: &'static str },
}
