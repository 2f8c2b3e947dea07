use super::{
    DocumentFilter, OrderBy, Persistence, PersistenceError, PersistenceResult, SectionFilter,
};
use crate::model::{Document, DocumentPatch, NewDocument, NewSection, Section, SectionPatch};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// In-process tables, used by tests and the `memory` server backend.
#[derive(Default)]
pub struct MemoryBackend {
    sections: RwLock<HashMap<Uuid, Section>>,
    documents: RwLock<HashMap<Uuid, Document>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a document row verbatim, bypassing the tree core. Lets operators
    /// (and tests) model external data corrections.
    pub fn put_document(&self, doc: Document) {
        self.documents.write().insert(doc.id, doc);
    }

    pub fn put_section(&self, section: Section) {
        self.sections.write().insert(section.id, section);
    }
}

#[async_trait]
impl Persistence for MemoryBackend {
    async fn select_sections(
        &self,
        filter: SectionFilter,
        order_by: OrderBy,
    ) -> PersistenceResult<Vec<Section>> {
        let mut out: Vec<Section> = self
            .sections
            .read()
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        out.sort_by(|a, b| order_by.compare_sections(a, b));
        Ok(out)
    }

    async fn insert_section(&self, record: NewSection) -> PersistenceResult<Section> {
        let section = Section {
            id: Uuid::new_v4(),
            title: record.title,
            description: record.description,
            order: record.order,
            created_at: Utc::now(),
        };
        self.sections.write().insert(section.id, section.clone());
        Ok(section)
    }

    async fn update_section(&self, id: Uuid, patch: SectionPatch) -> PersistenceResult<Section> {
        let mut sections = self.sections.write();
        let section = sections.get_mut(&id).ok_or(PersistenceError::Missing {
            table: "sections",
            id,
        })?;
        patch.apply(section);
        Ok(section.clone())
    }

    async fn delete_section(&self, id: Uuid) -> PersistenceResult<()> {
        self.sections
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(PersistenceError::Missing {
                table: "sections",
                id,
            })
    }

    async fn select_documents(
        &self,
        filter: DocumentFilter,
        order_by: OrderBy,
    ) -> PersistenceResult<Vec<Document>> {
        let mut out: Vec<Document> = self
            .documents
            .read()
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        out.sort_by(|a, b| order_by.compare_documents(a, b));
        Ok(out)
    }

    async fn insert_document(&self, record: NewDocument) -> PersistenceResult<Document> {
        let doc = Document {
            id: Uuid::new_v4(),
            section_id: record.section_id,
            parent_id: record.parent_id,
            title: record.title,
            content: record.content,
            order: record.order,
            created_at: Utc::now(),
        };
        self.documents.write().insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn update_document(&self, id: Uuid, patch: DocumentPatch) -> PersistenceResult<Document> {
        let mut documents = self.documents.write();
        let doc = documents.get_mut(&id).ok_or(PersistenceError::Missing {
            table: "documents",
            id,
        })?;
        patch.apply(doc);
        Ok(doc.clone())
    }

    async fn delete_document(&self, id: Uuid) -> PersistenceResult<()> {
        self.documents
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(PersistenceError::Missing {
                table: "documents",
                id,
            })
    }
}
