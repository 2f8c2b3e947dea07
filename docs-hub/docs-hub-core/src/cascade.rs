//! Multi-record deletions.
//!
//! Neither operation is transactional. A storage failure stops the sequence
//! where it is and earlier writes stay committed; callers re-read and may
//! retry, and a later renumbering pass closes any order gaps left behind.

use crate::error::Result;
use crate::forest::Forest;
use crate::model::{DocumentPatch, NewSection};
use crate::ordering::{OrderingEngine, Scope};
use crate::persistence::Persistence;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

pub const FALLBACK_SECTION_TITLE: &str = "Uncategorized";
pub const FALLBACK_SECTION_ORDER: u32 = 999;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct DocumentDeletion {
    /// Removed ids, deepest descendants first and the requested document last.
    pub deleted: Vec<Uuid>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SectionDeletion {
    pub section_id: Uuid,
    /// Section that received the documents. `None` only when the last
    /// section was deleted while empty.
    pub destination: Option<Uuid>,
    pub created_fallback: bool,
    pub relocated: Vec<Uuid>,
}

#[derive(Clone)]
pub struct CascadingDeletionService {
    backend: Arc<dyn Persistence>,
    ordering: OrderingEngine,
}

impl CascadingDeletionService {
    pub fn new(backend: Arc<dyn Persistence>, ordering: OrderingEngine) -> Self {
        Self { backend, ordering }
    }

    /// Delete `id` together with every transitive descendant, then close the
    /// gap in the sibling group `id` belonged to.
    pub async fn delete_document(&self, id: Uuid) -> Result<DocumentDeletion> {
        let forest = Forest::load(self.backend.as_ref()).await?;
        let doc = forest.require_document(id)?;
        let group = Scope::documents(doc.section_id, doc.parent_id);

        let mut deleted = forest.descendants(id);
        deleted.reverse();
        deleted.push(id);
        for victim in &deleted {
            self.backend.delete_document(*victim).await?;
        }
        tracing::info!(document = %id, count = deleted.len(), "deleted document subtree");

        self.ordering.renumber(group).await?;
        Ok(DocumentDeletion { deleted })
    }

    /// Delete a section record, relocating its documents first.
    ///
    /// Documents go to the remaining section with the lowest order, appended
    /// after that section's existing roots. With no other section a fallback
    /// section is created to hold them, unless the section was empty. No
    /// document is ever deleted here.
    pub async fn delete_section(&self, id: Uuid) -> Result<SectionDeletion> {
        let forest = Forest::load(self.backend.as_ref()).await?;
        forest.require_section(id)?;

        let existing = forest
            .sections_ordered()
            .into_iter()
            .find(|s| s.id != id)
            .map(|s| s.id);
        let has_documents = forest.documents().any(|d| d.section_id == Some(id));
        let (destination, created_fallback) = match existing {
            Some(dest) => (dest, false),
            None if !has_documents => {
                self.backend.delete_section(id).await?;
                tracing::info!(section = %id, "deleted empty last section");
                return Ok(SectionDeletion {
                    section_id: id,
                    destination: None,
                    created_fallback: false,
                    relocated: Vec::new(),
                });
            }
            None => {
                let fallback = self
                    .backend
                    .insert_section(NewSection {
                        title: FALLBACK_SECTION_TITLE.to_string(),
                        description: String::new(),
                        order: FALLBACK_SECTION_ORDER,
                    })
                    .await?;
                tracing::info!(section = %fallback.id, "created fallback section");
                (fallback.id, true)
            }
        };

        let dest_roots = Scope::documents(Some(destination), None);
        let base = self.ordering.next_order(dest_roots).await?;
        let roots = forest.children(Some(id), None);
        let mut relocated = Vec::new();
        for (offset, root) in (0u32..).zip(roots.iter()) {
            self.backend
                .update_document(
                    root.id,
                    DocumentPatch {
                        section_id: Some(Some(destination)),
                        order: Some(base.saturating_add(offset)),
                        ..DocumentPatch::default()
                    },
                )
                .await?;
            relocated.push(root.id);
        }
        let nested: Vec<Uuid> = forest
            .documents()
            .filter(|d| d.section_id == Some(id) && d.parent_id.is_some())
            .map(|d| d.id)
            .collect();
        for doc_id in nested {
            self.backend
                .update_document(doc_id, DocumentPatch::section(Some(destination)))
                .await?;
            relocated.push(doc_id);
        }

        self.backend.delete_section(id).await?;
        tracing::info!(
            section = %id,
            destination = %destination,
            relocated = relocated.len(),
            "deleted section"
        );

        self.ordering.renumber(dest_roots).await?;
        if !created_fallback {
            self.ordering.renumber(Scope::Sections).await?;
        }
        Ok(SectionDeletion {
            section_id: id,
            destination: Some(destination),
            created_fallback,
            relocated,
        })
    }
}
