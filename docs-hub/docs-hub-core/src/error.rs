//! Error taxonomy shared by every tree operation.

use crate::persistence::PersistenceError;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, TreeError>;

/// Which table a missing id was looked up in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Section,
    Document,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Section => f.write_str("section"),
            EntityKind::Document => f.write_str("document"),
        }
    }
}

/// Failures surfaced to operators. The `Display` text of each variant is the
/// message shown in the console.
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error("invalid parent: {0}")]
    InvalidParent(String),

    #[error("item {id} is not part of the requested ordering scope")]
    ScopeNotFound { id: Uuid },

    #[error("storage failure: {0}")]
    PersistenceFailure(#[from] PersistenceError),

    #[error("cycle detected while walking ancestors of document {id}")]
    CycleDetected { id: Uuid },
}

impl TreeError {
    pub fn section_not_found(id: Uuid) -> Self {
        TreeError::NotFound {
            kind: EntityKind::Section,
            id,
        }
    }

    pub fn document_not_found(id: Uuid) -> Self {
        TreeError::NotFound {
            kind: EntityKind::Document,
            id,
        }
    }
}
