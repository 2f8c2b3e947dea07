//! Shared helpers for the tree integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use docs_hub_core::forest::Forest;
use docs_hub_core::model::{
    Document, DocumentDraft, DocumentPatch, NewDocument, NewSection, Section, SectionPatch,
};
use docs_hub_core::persistence::{
    DocumentFilter, MemoryBackend, OrderBy, Persistence, PersistenceError, PersistenceResult,
    SectionFilter,
};
use docs_hub_core::TreeStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub fn memory_store() -> (Arc<MemoryBackend>, TreeStore) {
    let backend = Arc::new(MemoryBackend::new());
    let store = TreeStore::new(backend.clone());
    (backend, store)
}

pub fn draft(section_id: Option<Uuid>, parent_id: Option<Uuid>, title: &str) -> DocumentDraft {
    DocumentDraft {
        section_id,
        parent_id,
        title: title.to_string(),
        content: format!("{} body", title),
    }
}

pub async fn all_documents(backend: &dyn Persistence) -> Vec<Document> {
    backend
        .select_documents(DocumentFilter::all(), OrderBy::Order)
        .await
        .unwrap()
}

pub async fn all_sections(backend: &dyn Persistence) -> Vec<Section> {
    backend
        .select_sections(SectionFilter::All, OrderBy::Order)
        .await
        .unwrap()
}

/// Panic unless every sibling group's orders are exactly `1..=n`.
pub async fn assert_groups_contiguous(backend: &dyn Persistence) {
    let forest = Forest::load(backend).await.unwrap();
    let mut seen = 0;
    for (key, members) in forest.sibling_groups() {
        let orders: Vec<u32> = members.iter().map(|d| d.order).collect();
        let expected: Vec<u32> = (1..=orders.len() as u32).collect();
        assert_eq!(orders, expected, "sibling group {:?} is not contiguous", key);
        seen += members.len();
    }
    assert_eq!(seen, forest.document_count());
}

pub async fn assert_sections_contiguous(backend: &dyn Persistence) {
    let orders: Vec<u32> = all_sections(backend).await.iter().map(|s| s.order).collect();
    let expected: Vec<u32> = (1..=orders.len() as u32).collect();
    assert_eq!(orders, expected);
}

/// Wraps a backend and starts failing every write once `budget` writes have
/// gone through. Reads always succeed.
pub struct FlakyBackend {
    inner: MemoryBackend,
    budget: AtomicUsize,
}

impl FlakyBackend {
    pub fn new(inner: MemoryBackend) -> Self {
        Self {
            inner,
            budget: AtomicUsize::new(usize::MAX),
        }
    }

    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }

    pub fn allow_writes(&self, count: usize) {
        self.budget.store(count, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.budget.store(usize::MAX, Ordering::SeqCst);
    }

    fn spend(&self) -> PersistenceResult<()> {
        let left = self.budget.load(Ordering::SeqCst);
        if left == 0 {
            return Err(PersistenceError::Unavailable("injected failure".into()));
        }
        if left != usize::MAX {
            self.budget.store(left - 1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[async_trait]
impl Persistence for FlakyBackend {
    async fn select_sections(
        &self,
        filter: SectionFilter,
        order_by: OrderBy,
    ) -> PersistenceResult<Vec<Section>> {
        self.inner.select_sections(filter, order_by).await
    }

    async fn insert_section(&self, record: NewSection) -> PersistenceResult<Section> {
        self.spend()?;
        self.inner.insert_section(record).await
    }

    async fn update_section(&self, id: Uuid, patch: SectionPatch) -> PersistenceResult<Section> {
        self.spend()?;
        self.inner.update_section(id, patch).await
    }

    async fn delete_section(&self, id: Uuid) -> PersistenceResult<()> {
        self.spend()?;
        self.inner.delete_section(id).await
    }

    async fn select_documents(
        &self,
        filter: DocumentFilter,
        order_by: OrderBy,
    ) -> PersistenceResult<Vec<Document>> {
        self.inner.select_documents(filter, order_by).await
    }

    async fn insert_document(&self, record: NewDocument) -> PersistenceResult<Document> {
        self.spend()?;
        self.inner.insert_document(record).await
    }

    async fn update_document(&self, id: Uuid, patch: DocumentPatch) -> PersistenceResult<Document> {
        self.spend()?;
        self.inner.update_document(id, patch).await
    }

    async fn delete_document(&self, id: Uuid) -> PersistenceResult<()> {
        self.spend()?;
        self.inner.delete_document(id).await
    }
}
