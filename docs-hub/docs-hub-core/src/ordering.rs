//! Contiguous `1..=n` ordering within sibling groups.

use crate::error::{Result, TreeError};
use crate::model::{DocumentPatch, SectionPatch};
use crate::persistence::{DocumentFilter, OrderBy, Persistence, SectionFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// The set of records an ordering operation applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The full section list.
    Sections,
    /// One sibling group of documents.
    Documents {
        section_id: Option<Uuid>,
        parent_id: Option<Uuid>,
    },
}

impl Scope {
    pub fn documents(section_id: Option<Uuid>, parent_id: Option<Uuid>) -> Self {
        Scope::Documents {
            section_id,
            parent_id,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderedItem {
    pub id: Uuid,
    pub order: u32,
}

pub type OrderedList = Vec<OrderedItem>;

/// Whether `orders` (already sorted) is exactly `1..=n`.
pub fn is_contiguous(orders: impl IntoIterator<Item = u32>) -> bool {
    orders
        .into_iter()
        .enumerate()
        .all(|(idx, order)| order as usize == idx + 1)
}

/// Move the item at `index` one step in `direction`. Returns `false` when it
/// is already at that end.
pub fn step(ids: &mut [Uuid], index: usize, direction: Direction) -> bool {
    match direction {
        Direction::Up if index > 0 => {
            ids.swap(index, index - 1);
            true
        }
        Direction::Down if index + 1 < ids.len() => {
            ids.swap(index, index + 1);
            true
        }
        _ => false,
    }
}

/// Assign `1..=n` to `ids` in sequence.
pub fn resequence(ids: &[Uuid]) -> OrderedList {
    ids.iter()
        .zip(1u32..)
        .map(|(id, order)| OrderedItem { id: *id, order })
        .collect()
}

/// Reads and rewrites order values through the persistence collaborator.
///
/// Every pass renumbers the whole scope from its current sequence, so running
/// it again after a partial failure converges on a contiguous range.
#[derive(Clone)]
pub struct OrderingEngine {
    backend: Arc<dyn Persistence>,
}

impl OrderingEngine {
    pub fn new(backend: Arc<dyn Persistence>) -> Self {
        Self { backend }
    }

    /// Current members of `scope`, sorted by `order`.
    pub async fn members(&self, scope: Scope) -> Result<OrderedList> {
        let items = match scope {
            Scope::Sections => self
                .backend
                .select_sections(SectionFilter::All, OrderBy::Order)
                .await?
                .into_iter()
                .map(|s| OrderedItem {
                    id: s.id,
                    order: s.order,
                })
                .collect(),
            Scope::Documents {
                section_id,
                parent_id,
            } => self
                .backend
                .select_documents(DocumentFilter::siblings(section_id, parent_id), OrderBy::Order)
                .await?
                .into_iter()
                .map(|d| OrderedItem {
                    id: d.id,
                    order: d.order,
                })
                .collect(),
        };
        Ok(items)
    }

    /// `max(order) + 1`, or `1` for an empty scope. A scope whose maximum
    /// is already `u32::MAX` is renumbered first.
    pub async fn next_order(&self, scope: Scope) -> Result<u32> {
        let members = self.members(scope).await?;
        let max = members.iter().map(|m| m.order).max().unwrap_or(0);
        if let Some(next) = max.checked_add(1) {
            return Ok(next);
        }
        tracing::warn!(?scope, "order space exhausted, renumbering scope");
        let ids: Vec<Uuid> = members.iter().map(|m| m.id).collect();
        let renumbered = self.persist(scope, &members, &ids).await?;
        let len = u32::try_from(renumbered.len()).unwrap_or(u32::MAX);
        Ok(len.saturating_add(1))
    }

    /// Swap `id` with its neighbour in `direction` and renumber the scope.
    /// At either end this is a no-op and nothing is written.
    pub async fn move_sibling(
        &self,
        scope: Scope,
        id: Uuid,
        direction: Direction,
    ) -> Result<OrderedList> {
        let members = self.members(scope).await?;
        let index = members
            .iter()
            .position(|m| m.id == id)
            .ok_or(TreeError::ScopeNotFound { id })?;
        let mut ids: Vec<Uuid> = members.iter().map(|m| m.id).collect();
        if !step(&mut ids, index, direction) {
            return Ok(members);
        }
        self.persist(scope, &members, &ids).await
    }

    /// Rewrite the scope to `1..=n` in its current sequence.
    pub async fn renumber(&self, scope: Scope) -> Result<OrderedList> {
        let members = self.members(scope).await?;
        let ids: Vec<Uuid> = members.iter().map(|m| m.id).collect();
        self.persist(scope, &members, &ids).await
    }

    /// Renumber the scope as though `leaving` were no longer in it.
    pub async fn renumber_excluding(&self, scope: Scope, leaving: Uuid) -> Result<OrderedList> {
        let members: OrderedList = self
            .members(scope)
            .await?
            .into_iter()
            .filter(|m| m.id != leaving)
            .collect();
        let ids: Vec<Uuid> = members.iter().map(|m| m.id).collect();
        self.persist(scope, &members, &ids).await
    }

    /// Write the new order of every member whose value changes. Each write is
    /// independent; the first failure aborts the rest.
    async fn persist(
        &self,
        scope: Scope,
        current: &[OrderedItem],
        sequence: &[Uuid],
    ) -> Result<OrderedList> {
        let target = resequence(sequence);
        for item in &target {
            let unchanged = current
                .iter()
                .any(|c| c.id == item.id && c.order == item.order);
            if unchanged {
                continue;
            }
            tracing::debug!(id = %item.id, order = item.order, ?scope, "renumber");
            match scope {
                Scope::Sections => {
                    self.backend
                        .update_section(item.id, SectionPatch::order(item.order))
                        .await?;
                }
                Scope::Documents { .. } => {
                    self.backend
                        .update_document(item.id, DocumentPatch::order(item.order))
                        .await?;
                }
            }
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguity() {
        assert!(is_contiguous(Vec::<u32>::new()));
        assert!(is_contiguous([1, 2, 3]));
        assert!(!is_contiguous([1, 3]));
        assert!(!is_contiguous([1, 1, 2]));
        assert!(!is_contiguous([2, 3]));
    }

    #[test]
    fn step_respects_ends() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut ids = vec![a, b, c];
        assert!(!step(&mut ids, 0, Direction::Up));
        assert!(!step(&mut ids, 2, Direction::Down));
        assert_eq!(ids, vec![a, b, c]);
        assert!(step(&mut ids, 2, Direction::Up));
        assert_eq!(ids, vec![a, c, b]);
        assert!(step(&mut ids, 0, Direction::Down));
        assert_eq!(ids, vec![c, a, b]);
    }

    #[test]
    fn resequence_starts_at_one() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let list = resequence(&[b, a]);
        assert_eq!(
            list,
            vec![OrderedItem { id: b, order: 1 }, OrderedItem { id: a, order: 2 }]
        );
    }
}
