//! Non-fatal conversion diagnostics
//!
//! A warning never changes the success path: the affected reference is
//! dropped and the conversion carries on with a best-effort result.

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Broad classification of a [`Warning`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WarningKind {
    /// A reference could not be resolved or is not supported
    Reference,
    /// `<use>` expansion hit the configured depth bound
    DepthLimit,
}

/// A recoverable problem found while converting a document
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Warning {
    #[error("<use> references unknown element #{target}")]
    UnresolvedUse { target: String },

    #[error("<use> without an href was dropped")]
    MissingHref,

    #[error("fill references unknown gradient #{id}")]
    DanglingGradient { id: String },

    #[error("mask references unknown mask #{id}")]
    DanglingMask { id: String },

    #[error("fill references unsupported paint server <{kind}> #{id}")]
    UnsupportedGradient { id: String, kind: String },

    #[error("mask #{mask} contains unsupported shape <{kind}>")]
    UnsupportedMaskShape { mask: String, kind: String },

    #[error("<use> of #{target} exceeds max depth {max_depth}; nested expansion dropped")]
    DepthLimit { target: String, max_depth: usize },
}

impl Warning {
    pub fn kind(&self) -> WarningKind {
        match self {
            Self::DepthLimit { .. } => WarningKind::DepthLimit,
            _ => WarningKind::Reference,
        }
    }
}

/// Warnings gathered during one conversion call, in the order they were raised
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log a warning
    pub fn push(&mut self, warning: Warning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Number of warnings of the given kind
    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind() == kind).count()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Warning> {
        self.warnings.iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Warning;
    type IntoIter = std::slice::Iter<'a, Warning>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
