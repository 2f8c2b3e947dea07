//! Entry point for every operation the console performs on the document tree.

use crate::breadcrumb::{Breadcrumb, BreadcrumbResolver};
use crate::cascade::{CascadingDeletionService, DocumentDeletion, SectionDeletion};
use crate::error::{Result, TreeError};
use crate::events::{EventBus, TreeEvent};
use crate::forest::Forest;
use crate::model::{
    Document, DocumentDraft, DocumentPatch, DocumentUpdate, NewDocument, NewSection, Section,
    SectionPatch, SectionUpdate,
};
use crate::ordering::{is_contiguous, Direction, OrderedList, OrderingEngine, Scope};
use crate::orphans::OrphanRegistry;
use crate::persistence::{DocumentFilter, OrderBy, Persistence, SectionFilter};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

/// Reject a placement that would break the parent invariants. `moving` is the
/// document being placed, if it already exists.
fn check_placement(
    forest: &Forest,
    moving: Option<Uuid>,
    section_id: Option<Uuid>,
    parent_id: Option<Uuid>,
) -> Result<()> {
    if let Some(section) = section_id {
        forest.require_section(section)?;
    }
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    if moving == Some(parent_id) {
        return Err(TreeError::InvalidParent(format!(
            "document {} cannot be its own parent",
            parent_id
        )));
    }
    let parent = forest.require_document(parent_id)?;
    if parent.section_id != section_id {
        return Err(TreeError::InvalidParent(format!(
            "parent {} belongs to a different section",
            parent_id
        )));
    }
    if let Some(moving) = moving {
        for step in forest.lineage(parent_id) {
            if step?.id == moving {
                return Err(TreeError::InvalidParent(format!(
                    "moving {} under {} would create a cycle",
                    moving, parent_id
                )));
            }
        }
    }
    Ok(())
}

/// A validated change of sibling group for one document and its subtree.
pub struct Relocation {
    id: Uuid,
    from: Scope,
    section_id: Option<Uuid>,
    parent_id: Option<Uuid>,
    section_changed: bool,
    edit: DocumentPatch,
}

impl Relocation {
    /// Validate moving `id` under (`section_id`, `parent_id`). Nothing is
    /// written.
    pub fn plan(
        forest: &Forest,
        id: Uuid,
        section_id: Option<Uuid>,
        parent_id: Option<Uuid>,
    ) -> Result<Self> {
        let doc = forest.require_document(id)?;
        check_placement(forest, Some(id), section_id, parent_id)?;
        Ok(Self {
            id,
            from: Scope::documents(doc.section_id, doc.parent_id),
            section_id,
            parent_id,
            section_changed: doc.section_id != section_id,
            edit: DocumentPatch::default(),
        })
    }

    /// Write `title` and `content` in the same record update as the move.
    pub fn with_edit(mut self, title: Option<String>, content: Option<String>) -> Self {
        self.edit.title = title;
        self.edit.content = content;
        self
    }

    pub fn is_noop(&self) -> bool {
        self.from == Scope::documents(self.section_id, self.parent_id)
    }

    /// Close the gap the document leaves behind, append it to its new group,
    /// then carry the subtree's section along.
    pub async fn apply(
        &self,
        backend: &dyn Persistence,
        ordering: &OrderingEngine,
        forest: &Forest,
    ) -> Result<Document> {
        if self.is_noop() {
            return Ok(forest.require_document(self.id)?.clone());
        }
        let order = ordering
            .next_order(Scope::documents(self.section_id, self.parent_id))
            .await?;
        ordering.renumber_excluding(self.from, self.id).await?;
        let moved = backend
            .update_document(
                self.id,
                DocumentPatch {
                    section_id: Some(self.section_id),
                    parent_id: Some(self.parent_id),
                    order: Some(order),
                    ..self.edit.clone()
                },
            )
            .await?;
        if self.section_changed {
            for descendant in forest.descendants(self.id) {
                backend
                    .update_document(descendant, DocumentPatch::section(self.section_id))
                    .await?;
            }
        }
        tracing::info!(
            document = %self.id,
            section = ?self.section_id,
            parent = ?self.parent_id,
            "relocated document"
        );
        Ok(moved)
    }
}

/// A document with its children, rebuilt from the flat table.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct OutlineNode {
    #[serde(flatten)]
    pub document: Document,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    /// Nodes in this subtree, including this one.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(OutlineNode::size).sum::<usize>()
    }
}

/// Nest a section's flat listing. Documents unreachable from a root (a parent
/// cycle, or a parent outside the listing) are left out and logged.
fn outline_of(docs: &[Document]) -> Vec<OutlineNode> {
    let outline = build_outline(docs, None);
    let placed: usize = outline.iter().map(OutlineNode::size).sum();
    if placed < docs.len() {
        tracing::warn!(
            listed = docs.len(),
            placed,
            "documents unreachable from any root were left out of the outline"
        );
    }
    outline
}

fn build_outline(docs: &[Document], parent_id: Option<Uuid>) -> Vec<OutlineNode> {
    let mut level: Vec<&Document> = docs.iter().filter(|d| d.parent_id == parent_id).collect();
    level.sort_by(|a, b| OrderBy::Order.compare_documents(a, b));
    level
        .into_iter()
        .map(|doc| OutlineNode {
            document: doc.clone(),
            children: build_outline(docs, Some(doc.id)),
        })
        .collect()
}

/// Owns the section and document collections and routes each operation to
/// the component responsible for it.
pub struct TreeStore {
    backend: Arc<dyn Persistence>,
    ordering: OrderingEngine,
    breadcrumbs: BreadcrumbResolver,
    deletions: CascadingDeletionService,
    orphans: OrphanRegistry,
    events: EventBus,
    write_gate: Mutex<()>,
    repair_on_read: bool,
}

impl TreeStore {
    pub fn new(backend: Arc<dyn Persistence>) -> Self {
        let ordering = OrderingEngine::new(backend.clone());
        let deletions = CascadingDeletionService::new(backend.clone(), ordering.clone());
        Self {
            breadcrumbs: BreadcrumbResolver::new(backend.clone()),
            orphans: OrphanRegistry::new(backend.clone(), ordering.clone(), deletions.clone()),
            deletions,
            ordering,
            backend,
            events: EventBus::new(),
            write_gate: Mutex::new(()),
            repair_on_read: true,
        }
    }

    /// Toggle eager renumbering of gapped sibling groups during listings.
    pub fn with_repair_on_read(mut self, enabled: bool) -> Self {
        self.repair_on_read = enabled;
        self
    }

    /// Receive a [`TreeEvent`] after each successful structural change.
    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.events.subscribe()
    }

    async fn load(&self) -> Result<Forest> {
        Forest::load(self.backend.as_ref()).await
    }

    // ---- sections ----

    pub async fn list_sections(&self) -> Result<Vec<Section>> {
        let sections = self
            .backend
            .select_sections(SectionFilter::All, OrderBy::Order)
            .await?;
        if !self.repair_on_read || is_contiguous(sections.iter().map(|s| s.order)) {
            return Ok(sections);
        }
        if self.repair(&[Scope::Sections]).await {
            return Ok(self
                .backend
                .select_sections(SectionFilter::All, OrderBy::Order)
                .await?);
        }
        Ok(sections)
    }

    pub async fn get_section(&self, id: Uuid) -> Result<Section> {
        self.backend
            .select_sections(SectionFilter::Id(id), OrderBy::Order)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TreeError::section_not_found(id))
    }

    pub async fn create_section(&self, title: String, description: String) -> Result<Section> {
        let _gate = self.write_gate.lock().await;
        let order = self.ordering.next_order(Scope::Sections).await?;
        let section = self
            .backend
            .insert_section(NewSection {
                title,
                description,
                order,
            })
            .await?;
        tracing::info!(section = %section.id, order, "created section");
        self.events.send(TreeEvent::SectionCreated { id: section.id });
        Ok(section)
    }

    /// Content edit; never changes ordering.
    pub async fn update_section(&self, id: Uuid, update: SectionUpdate) -> Result<Section> {
        let _gate = self.write_gate.lock().await;
        self.get_section(id).await?;
        let section = self
            .backend
            .update_section(
                id,
                SectionPatch {
                    title: update.title,
                    description: update.description,
                    order: None,
                },
            )
            .await?;
        self.events.send(TreeEvent::SectionUpdated { id });
        Ok(section)
    }

    pub async fn move_section(&self, id: Uuid, direction: Direction) -> Result<OrderedList> {
        let _gate = self.write_gate.lock().await;
        let before = self
            .backend
            .select_sections(SectionFilter::Id(id), OrderBy::Order)
            .await?
            .first()
            .map(|s| s.order);
        let list = self
            .ordering
            .move_sibling(Scope::Sections, id, direction)
            .await?;
        if list.iter().any(|item| item.id == id && Some(item.order) != before) {
            self.events.send(TreeEvent::SectionMoved { id });
        }
        Ok(list)
    }

    pub async fn delete_section(&self, id: Uuid) -> Result<SectionDeletion> {
        let _gate = self.write_gate.lock().await;
        let outcome = self.deletions.delete_section(id).await?;
        if let Some(fallback) = outcome.destination.filter(|_| outcome.created_fallback) {
            self.events.send(TreeEvent::SectionCreated { id: fallback });
        }
        self.events.send(TreeEvent::SectionDeleted {
            id,
            relocated_to: outcome.destination,
        });
        Ok(outcome)
    }

    // ---- documents ----

    /// Every document in the section at any depth, sorted by `order`.
    /// Consumers rebuild levels by filtering on `parent_id`.
    pub async fn list_documents(&self, section_id: Uuid) -> Result<Vec<Document>> {
        self.get_section(section_id).await?;
        let filter = DocumentFilter::in_section(Some(section_id));
        let docs = self.backend.select_documents(filter, OrderBy::Order).await?;
        if !self.repair_on_read {
            return Ok(docs);
        }
        let mut groups: BTreeMap<Option<Uuid>, Vec<u32>> = BTreeMap::new();
        for doc in &docs {
            groups.entry(doc.parent_id).or_default().push(doc.order);
        }
        let gapped: Vec<Scope> = groups
            .into_iter()
            .filter(|(_, orders)| !is_contiguous(orders.iter().copied()))
            .map(|(parent, _)| Scope::documents(Some(section_id), parent))
            .collect();
        if !gapped.is_empty() && self.repair(&gapped).await {
            return Ok(self.backend.select_documents(filter, OrderBy::Order).await?);
        }
        Ok(docs)
    }

    /// Nested view of a section's documents.
    pub async fn document_outline(&self, section_id: Uuid) -> Result<Vec<OutlineNode>> {
        let docs = self.list_documents(section_id).await?;
        Ok(outline_of(&docs))
    }

    pub async fn get_document(&self, id: Uuid) -> Result<Document> {
        self.backend
            .select_documents(DocumentFilter::id(id), OrderBy::Order)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TreeError::document_not_found(id))
    }

    /// Create a document at the end of its sibling group. A draft with no
    /// section creates an orphan.
    pub async fn create_document(&self, draft: DocumentDraft) -> Result<Document> {
        let _gate = self.write_gate.lock().await;
        let forest = self.load().await?;
        check_placement(&forest, None, draft.section_id, draft.parent_id)?;
        let order = self
            .ordering
            .next_order(Scope::documents(draft.section_id, draft.parent_id))
            .await?;
        let doc = self
            .backend
            .insert_document(NewDocument {
                section_id: draft.section_id,
                parent_id: draft.parent_id,
                title: draft.title,
                content: draft.content,
                order,
            })
            .await?;
        tracing::info!(document = %doc.id, section = ?doc.section_id, order, "created document");
        self.events.send(TreeEvent::DocumentCreated { id: doc.id });
        Ok(doc)
    }

    /// Edit content and, when `section_id` or `parent_id` is given, relocate
    /// the document. A new section without a parent places it at that
    /// section's root. Placement is validated before anything is written.
    pub async fn update_document(&self, id: Uuid, update: DocumentUpdate) -> Result<Document> {
        let _gate = self.write_gate.lock().await;
        let forest = self.load().await?;
        let current = forest.require_document(id)?;

        let edited = update.title.is_some() || update.content.is_some();
        let relocation = if update.is_relocation() {
            let section_id = update.section_id.unwrap_or(current.section_id);
            let parent_id = match update.parent_id {
                Some(parent) => parent,
                None if section_id != current.section_id => None,
                None => current.parent_id,
            };
            Some(Relocation::plan(&forest, id, section_id, parent_id)?)
                .filter(|plan| !plan.is_noop())
        } else {
            None
        };

        let doc = match relocation {
            Some(plan) => {
                let plan = plan.with_edit(update.title, update.content);
                let doc = plan
                    .apply(self.backend.as_ref(), &self.ordering, &forest)
                    .await?;
                self.events.send(TreeEvent::DocumentReparented {
                    id,
                    section_id: doc.section_id,
                    parent_id: doc.parent_id,
                });
                doc
            }
            None if edited => {
                self.backend
                    .update_document(
                        id,
                        DocumentPatch {
                            title: update.title,
                            content: update.content,
                            ..DocumentPatch::default()
                        },
                    )
                    .await?
            }
            None => current.clone(),
        };
        if edited {
            self.events.send(TreeEvent::DocumentUpdated { id });
        }
        Ok(doc)
    }

    /// Move a document under `parent_id` (or to its section's root) within
    /// the same section.
    pub async fn reparent_document(&self, id: Uuid, parent_id: Option<Uuid>) -> Result<Document> {
        let _gate = self.write_gate.lock().await;
        let forest = self.load().await?;
        let section_id = forest.require_document(id)?.section_id;
        let plan = Relocation::plan(&forest, id, section_id, parent_id)?;
        let doc = plan
            .apply(self.backend.as_ref(), &self.ordering, &forest)
            .await?;
        if !plan.is_noop() {
            self.events.send(TreeEvent::DocumentReparented {
                id,
                section_id: doc.section_id,
                parent_id: doc.parent_id,
            });
        }
        Ok(doc)
    }

    pub async fn move_document(&self, id: Uuid, direction: Direction) -> Result<OrderedList> {
        let _gate = self.write_gate.lock().await;
        let doc = self.get_document(id).await?;
        let list = self
            .ordering
            .move_sibling(Scope::documents(doc.section_id, doc.parent_id), id, direction)
            .await?;
        let moved = list.iter().any(|item| item.id == id && item.order != doc.order);
        if moved {
            self.events.send(TreeEvent::DocumentMoved { id });
        }
        Ok(list)
    }

    pub async fn delete_document(&self, id: Uuid) -> Result<DocumentDeletion> {
        let _gate = self.write_gate.lock().await;
        let outcome = self.deletions.delete_document(id).await?;
        self.events.send(TreeEvent::DocumentsDeleted {
            ids: outcome.deleted.clone(),
        });
        Ok(outcome)
    }

    pub async fn resolve_breadcrumb(&self, id: Uuid) -> Result<Breadcrumb> {
        self.breadcrumbs.resolve(id).await
    }

    // ---- orphans ----

    pub async fn list_orphans(&self) -> Result<Vec<Document>> {
        self.orphans.list().await
    }

    pub async fn assign_orphan(&self, id: Uuid, section_id: Uuid) -> Result<Document> {
        let _gate = self.write_gate.lock().await;
        let doc = self.orphans.assign_to_section(id, section_id).await?;
        self.events.send(TreeEvent::OrphanAssigned { id, section_id });
        Ok(doc)
    }

    pub async fn discard_orphan(&self, id: Uuid) -> Result<DocumentDeletion> {
        let _gate = self.write_gate.lock().await;
        let outcome = self.orphans.discard(id).await?;
        self.events.send(TreeEvent::DocumentsDeleted {
            ids: outcome.deleted.clone(),
        });
        Ok(outcome)
    }

    /// Renumber each scope; returns whether every pass succeeded. Failures are
    /// logged and left for a later pass.
    async fn repair(&self, scopes: &[Scope]) -> bool {
        let _gate = self.write_gate.lock().await;
        let mut ok = true;
        for scope in scopes {
            match self.ordering.renumber(*scope).await {
                Ok(_) => tracing::debug!(?scope, "repaired ordering on read"),
                Err(e) => {
                    tracing::warn!(?scope, error = %e, "ordering repair failed");
                    ok = false;
                }
            }
        }
        ok
    }
}
