//! Services module - external capabilities consumed by operations.
//!
//! Everything here is framework-agnostic: no presenter, no foreground loop.
//! Operations see these services only through [`Capability`] values built
//! by a [`CapabilityFactory`], and file selections through [`StatusQuery`].
//!
//! # Components
//!
//! - [`classifier`]: maps an output line to a [`LineCategory`].
//! - [`subprocess`]: [`SubprocessSpec`] and the streaming driver behind
//!   [`Capability::Subprocess`].
//! - [`git`]: `git add`, `git diff` and the porcelain status query.
//! - [`svn`]: `svn diff`, `svn status` and the `svn prop*` property store.
//! - [`properties`]: the set-then-list properties call over any
//!   [`PropertyStore`].

pub mod classifier;
pub mod git;
pub mod properties;
pub mod subprocess;
pub mod svn;

pub use classifier::{LineCategory, classify};
pub use git::{AddFactory, GitCli};
pub use properties::{PropertiesFactory, PropertyDepth, PropertyEdit, PropertyStore};
pub use subprocess::{ExitPolicy, SubprocessSpec};
pub use svn::SvnCli;

use crate::controller::{CapabilityFactory, OperationRequest};
use crate::error::CapabilityError;
use crate::models::{OperationKind, StatusFlags, StatusRecord};
use crate::operation::Capability;
use camino::Utf8PathBuf;

/// Reports working copy status for a set of paths.
///
/// An empty path set queries the current directory.
#[cfg_attr(test, mockall::automock)]
pub trait StatusQuery {
    fn status(
        &self,
        paths: &[Utf8PathBuf],
        flags: StatusFlags,
    ) -> Result<Vec<StatusRecord>, CapabilityError>;
}

/// Version control system behind a diff.
#[derive(Debug, Clone)]
pub enum Backend {
    Git(GitCli),
    Svn(SvnCli),
}

/// Builds diff operations for either backend.
#[derive(Debug, Clone)]
pub struct DiffFactory {
    backend: Backend,
}

impl DiffFactory {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

impl CapabilityFactory for DiffFactory {
    fn kind(&self) -> OperationKind {
        OperationKind::Diff
    }

    fn build(&self, request: &OperationRequest) -> Result<Capability, CapabilityError> {
        let spec = match &self.backend {
            Backend::Git(git) => git.diff_spec(&request.targets),
            Backend::Svn(svn) => svn.diff_spec(&request.targets),
        };
        Ok(Capability::Subprocess(spec))
    }
}
