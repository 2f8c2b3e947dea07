//! Documents unreachable from normal navigation, exposed as a recovery queue.

use crate::cascade::{CascadingDeletionService, DocumentDeletion};
use crate::error::{Result, TreeError};
use crate::forest::Forest;
use crate::model::Document;
use crate::ordering::OrderingEngine;
use crate::persistence::{OrderBy, Persistence};
use crate::tree::Relocation;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct OrphanRegistry {
    backend: Arc<dyn Persistence>,
    ordering: OrderingEngine,
    deletions: CascadingDeletionService,
}

impl OrphanRegistry {
    pub fn new(
        backend: Arc<dyn Persistence>,
        ordering: OrderingEngine,
        deletions: CascadingDeletionService,
    ) -> Self {
        Self {
            backend,
            ordering,
            deletions,
        }
    }

    /// Documents whose section is null or no longer exists, oldest first.
    pub async fn list(&self) -> Result<Vec<Document>> {
        let forest = Forest::load(self.backend.as_ref()).await?;
        let mut orphans: Vec<Document> = forest
            .documents()
            .filter(|d| forest.is_orphan(d))
            .cloned()
            .collect();
        orphans.sort_by(|a, b| OrderBy::CreatedAt.compare_documents(a, b));
        Ok(orphans)
    }

    /// Move an orphan (and its subtree) to the root level of `section_id`.
    pub async fn assign_to_section(&self, id: Uuid, section_id: Uuid) -> Result<Document> {
        let forest = Forest::load(self.backend.as_ref()).await?;
        Self::require_orphan(&forest, id)?;
        let plan = Relocation::plan(&forest, id, Some(section_id), None)?;
        plan.apply(self.backend.as_ref(), &self.ordering, &forest).await
    }

    /// Delete an orphan and everything beneath it.
    pub async fn discard(&self, id: Uuid) -> Result<DocumentDeletion> {
        let forest = Forest::load(self.backend.as_ref()).await?;
        Self::require_orphan(&forest, id)?;
        self.deletions.delete_document(id).await
    }

    fn require_orphan(forest: &Forest, id: Uuid) -> Result<()> {
        let doc = forest.require_document(id)?;
        if forest.is_orphan(doc) {
            Ok(())
        } else {
            Err(TreeError::ScopeNotFound { id })
        }
    }
}
