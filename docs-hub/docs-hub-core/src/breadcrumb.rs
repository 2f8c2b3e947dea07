//! Navigation paths from a section down to a document.

use crate::error::Result;
use crate::forest::Forest;
use crate::persistence::Persistence;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CrumbKind {
    Section,
    Document,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Crumb {
    pub id: Uuid,
    pub title: String,
    pub kind: CrumbKind,
}

/// Section first, the requested document last.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Breadcrumb(Vec<Crumb>);

impl Breadcrumb {
    pub fn iter(&self) -> std::slice::Iter<'_, Crumb> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve against an already loaded arena.
    ///
    /// Orphans, and documents whose section no longer exists, get a path with
    /// no section crumb.
    pub fn resolve_in(forest: &Forest, id: Uuid) -> Result<Self> {
        let mut crumbs = Vec::new();
        let mut section_id = None;
        for step in forest.lineage(id) {
            let doc = step?;
            section_id = doc.section_id;
            crumbs.push(Crumb {
                id: doc.id,
                title: doc.title.clone(),
                kind: CrumbKind::Document,
            });
        }
        if let Some(section) = section_id.and_then(|s| forest.section(s)) {
            crumbs.push(Crumb {
                id: section.id,
                title: section.title.clone(),
                kind: CrumbKind::Section,
            });
        }
        crumbs.reverse();
        Ok(Self(crumbs))
    }
}

impl IntoIterator for Breadcrumb {
    type Item = Crumb;
    type IntoIter = std::vec::IntoIter<Crumb>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Breadcrumb {
    type Item = &'a Crumb;
    type IntoIter = std::slice::Iter<'a, Crumb>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Recomputes a breadcrumb from current storage on every call; nothing is
/// cached between calls.
#[derive(Clone)]
pub struct BreadcrumbResolver {
    backend: Arc<dyn Persistence>,
}

impl BreadcrumbResolver {
    pub fn new(backend: Arc<dyn Persistence>) -> Self {
        Self { backend }
    }

    pub async fn resolve(&self, id: Uuid) -> Result<Breadcrumb> {
        let forest = Forest::load(self.backend.as_ref()).await?;
        Breadcrumb::resolve_in(&forest, id)
    }
}
