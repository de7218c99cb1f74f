//! Cross-layer error classification.
//!
//! Each layer owns its own error enum; `ErrorKind` is the shared taxonomy the
//! presentation surface can branch on without matching nested variants.

use std::fmt::{Display, Formatter};

/// Coarse failure category shared by repository, service and controller errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing required field.
    Validation,
    /// Id or unique key collision.
    Duplicate,
    /// Target entity is absent where presence is required.
    NotFound,
    /// Cross-entity reference points at a missing entity.
    Reference,
    /// Acting user is not allowed to perform the operation.
    Permission,
    /// Persistence collaborator or stored data failure.
    Storage,
    /// Request shape could not be understood.
    InvalidRequest,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Duplicate => "duplicate",
            Self::NotFound => "not_found",
            Self::Reference => "reference",
            Self::Permission => "permission",
            Self::Storage => "storage",
            Self::InvalidRequest => "invalid_request",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
