//! The persistence collaborator consumed by the tree core.
//!
//! Each call is strongly consistent on its own, but there are no multi-call
//! transactions: a sequence of writes that fails halfway stays half applied.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::model::{Document, DocumentPatch, NewDocument, NewSection, Section, SectionPatch};
use async_trait::async_trait;
use std::cmp::Ordering;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("{table} record {id} does not exist")]
    Missing { table: &'static str, id: Uuid },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;

/// Row filter for the `sections` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionFilter {
    All,
    Id(Uuid),
}

impl SectionFilter {
    pub fn matches(&self, section: &Section) -> bool {
        match self {
            SectionFilter::All => true,
            SectionFilter::Id(id) => section.id == *id,
        }
    }
}

/// Row filter for the `documents` table. `None` on a field means "don't
/// filter on it"; `Some(None)` matches null.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub id: Option<Uuid>,
    pub section_id: Option<Option<Uuid>>,
    pub parent_id: Option<Option<Uuid>>,
}

impl DocumentFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn in_section(section_id: Option<Uuid>) -> Self {
        Self {
            section_id: Some(section_id),
            ..Self::default()
        }
    }

    pub fn siblings(section_id: Option<Uuid>, parent_id: Option<Uuid>) -> Self {
        Self {
            id: None,
            section_id: Some(section_id),
            parent_id: Some(parent_id),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.id.map_or(true, |id| doc.id == id)
            && self.section_id.map_or(true, |s| doc.section_id == s)
            && self.parent_id.map_or(true, |p| doc.parent_id == p)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderBy {
    /// `order`, then `created_at`, then id.
    #[default]
    Order,
    CreatedAt,
}

impl OrderBy {
    pub fn compare_sections(&self, a: &Section, b: &Section) -> Ordering {
        match self {
            OrderBy::Order => (a.order, a.created_at, a.id).cmp(&(b.order, b.created_at, b.id)),
            OrderBy::CreatedAt => (a.created_at, a.id).cmp(&(b.created_at, b.id)),
        }
    }

    pub fn compare_documents(&self, a: &Document, b: &Document) -> Ordering {
        match self {
            OrderBy::Order => (a.order, a.created_at, a.id).cmp(&(b.order, b.created_at, b.id)),
            OrderBy::CreatedAt => (a.created_at, a.id).cmp(&(b.created_at, b.id)),
        }
    }
}

/// Table-level operations over sections and documents.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn select_sections(
        &self,
        filter: SectionFilter,
        order_by: OrderBy,
    ) -> PersistenceResult<Vec<Section>>;
    async fn insert_section(&self, record: NewSection) -> PersistenceResult<Section>;
    async fn update_section(&self, id: Uuid, patch: SectionPatch) -> PersistenceResult<Section>;
    async fn delete_section(&self, id: Uuid) -> PersistenceResult<()>;

    async fn select_documents(
        &self,
        filter: DocumentFilter,
        order_by: OrderBy,
    ) -> PersistenceResult<Vec<Document>>;
    async fn insert_document(&self, record: NewDocument) -> PersistenceResult<Document>;
    async fn update_document(&self, id: Uuid, patch: DocumentPatch) -> PersistenceResult<Document>;
    async fn delete_document(&self, id: Uuid) -> PersistenceResult<()>;
}
