//! Flat, arena-style view of both tables.
//!
//! Records are held in id-keyed maps and the hierarchy is reconstructed on
//! demand by filtering on `parent_id`. No child lists are stored, so there is
//! no ownership cycle to keep in sync with the persisted rows.

use crate::error::{Result, TreeError};
use crate::model::{Document, Section};
use crate::persistence::{DocumentFilter, OrderBy, Persistence, SectionFilter};
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

/// Identifies one sibling group: same section, same parent.
pub type GroupKey = (Option<Uuid>, Option<Uuid>);

#[derive(Clone, Debug, Default)]
pub struct Forest {
    sections: HashMap<Uuid, Section>,
    documents: HashMap<Uuid, Document>,
}

impl Forest {
    pub fn new(sections: Vec<Section>, documents: Vec<Document>) -> Self {
        Self {
            sections: sections.into_iter().map(|s| (s.id, s)).collect(),
            documents: documents.into_iter().map(|d| (d.id, d)).collect(),
        }
    }

    /// Read both tables in full.
    pub async fn load(backend: &dyn Persistence) -> Result<Self> {
        let sections = backend
            .select_sections(SectionFilter::All, OrderBy::Order)
            .await?;
        let documents = backend
            .select_documents(DocumentFilter::all(), OrderBy::Order)
            .await?;
        Ok(Self::new(sections, documents))
    }

    pub fn section(&self, id: Uuid) -> Option<&Section> {
        self.sections.get(&id)
    }

    pub fn document(&self, id: Uuid) -> Option<&Document> {
        self.documents.get(&id)
    }

    pub fn require_section(&self, id: Uuid) -> Result<&Section> {
        self.section(id)
            .ok_or_else(|| TreeError::section_not_found(id))
    }

    pub fn require_document(&self, id: Uuid) -> Result<&Document> {
        self.document(id)
            .ok_or_else(|| TreeError::document_not_found(id))
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// Sections sorted by `order`.
    pub fn sections_ordered(&self) -> Vec<&Section> {
        let mut out: Vec<&Section> = self.sections.values().collect();
        out.sort_by(|a, b| OrderBy::Order.compare_sections(a, b));
        out
    }

    /// Members of one sibling group sorted by `order`.
    pub fn children(&self, section_id: Option<Uuid>, parent_id: Option<Uuid>) -> Vec<&Document> {
        let filter = DocumentFilter::siblings(section_id, parent_id);
        let mut out: Vec<&Document> = self.documents.values().filter(|d| filter.matches(d)).collect();
        out.sort_by(|a, b| OrderBy::Order.compare_documents(a, b));
        out
    }

    /// Every sibling group present in the arena, members sorted by `order`.
    pub fn sibling_groups(&self) -> HashMap<GroupKey, Vec<&Document>> {
        let mut groups: HashMap<GroupKey, Vec<&Document>> = HashMap::new();
        for doc in self.documents.values() {
            groups
                .entry((doc.section_id, doc.parent_id))
                .or_default()
                .push(doc);
        }
        for members in groups.values_mut() {
            members.sort_by(|a, b| OrderBy::Order.compare_documents(a, b));
        }
        groups
    }

    /// A document with a null section, or one pointing at a section that no
    /// longer exists.
    pub fn is_orphan(&self, doc: &Document) -> bool {
        match doc.section_id {
            None => true,
            Some(section_id) => !self.sections.contains_key(&section_id),
        }
    }

    /// Walk from `id` up through its ancestors, starting with `id` itself.
    pub fn lineage(&self, id: Uuid) -> Lineage<'_> {
        Lineage {
            forest: self,
            start: id,
            next: Some(id),
            visited: 0,
            budget: self.documents.len(),
        }
    }

    /// All transitive descendants of `id` in breadth-first order, excluding
    /// `id` itself. Terminates on cyclic data.
    pub fn descendants(&self, id: Uuid) -> Vec<Uuid> {
        let mut by_parent: HashMap<Uuid, Vec<&Document>> = HashMap::new();
        for doc in self.documents.values() {
            if let Some(parent) = doc.parent_id {
                by_parent.entry(parent).or_default().push(doc);
            }
        }
        let mut seen = HashSet::from([id]);
        let mut out = Vec::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            let Some(children) = by_parent.get(&current) else {
                continue;
            };
            for child in children {
                if seen.insert(child.id) {
                    out.push(child.id);
                    queue.push_back(child.id);
                }
            }
        }
        out
    }
}

/// Lazy ancestor walk. Yields the starting document, then each parent in
/// turn, and stops at a root. After more steps than there are documents it
/// yields `CycleDetected` once and ends.
pub struct Lineage<'a> {
    forest: &'a Forest,
    start: Uuid,
    next: Option<Uuid>,
    visited: usize,
    budget: usize,
}

impl<'a> Iterator for Lineage<'a> {
    type Item = Result<&'a Document>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        if self.visited > 0 && self.visited >= self.budget {
            return Some(Err(TreeError::CycleDetected { id: self.start }));
        }
        self.visited += 1;
        match self.forest.document(id) {
            Some(doc) => {
                self.next = doc.parent_id;
                Some(Ok(doc))
            }
            None if id == self.start => Some(Err(TreeError::document_not_found(id))),
            None => {
                tracing::warn!(document = %self.start, parent = %id, "dangling parent reference");
                None
            }
        }
    }
}
