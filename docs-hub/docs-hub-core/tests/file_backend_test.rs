mod fixtures;

use anyhow::Result;
use docs_hub_core::model::{DocumentPatch, NewDocument};
use docs_hub_core::persistence::{
    DocumentFilter, FileBackend, OrderBy, Persistence, PersistenceError, SectionFilter,
};
use docs_hub_core::TreeStore;
use fixtures::{assert_groups_contiguous, draft};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

#[tokio::test]
async fn records_round_trip_through_the_directory() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = FileBackend::new(temp_dir.path())?;

    let doc = backend
        .insert_document(NewDocument {
            section_id: None,
            parent_id: None,
            title: "note".into(),
            content: "hello".into(),
            order: 1,
        })
        .await?;
    assert!(temp_dir
        .path()
        .join("documents")
        .join(format!("{}.json", doc.id))
        .exists());

    let updated = backend
        .update_document(doc.id, DocumentPatch::order(4))
        .await?;
    assert_eq!(updated.order, 4);

    let reopened = FileBackend::new(temp_dir.path())?;
    let found = reopened
        .select_documents(DocumentFilter::id(doc.id), OrderBy::Order)
        .await?;
    assert_eq!(found, vec![updated]);

    reopened.delete_document(doc.id).await?;
    assert!(matches!(
        reopened.delete_document(doc.id).await,
        Err(PersistenceError::Missing { .. })
    ));
    assert!(reopened
        .select_sections(SectionFilter::Id(Uuid::new_v4()), OrderBy::Order)
        .await?
        .is_empty());
    Ok(())
}

#[tokio::test]
async fn stray_files_are_ignored() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = FileBackend::new(temp_dir.path())?;
    std::fs::write(temp_dir.path().join("sections").join("README.txt"), "notes")?;
    std::fs::write(temp_dir.path().join("sections").join("draft.json"), "{}")?;
    assert!(backend
        .select_sections(SectionFilter::All, OrderBy::Order)
        .await?
        .is_empty());
    Ok(())
}

#[tokio::test]
async fn tree_operations_persist_across_reopen() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = TreeStore::new(Arc::new(FileBackend::new(temp_dir.path())?));
    let a = store.create_section("A".into(), String::new()).await?;
    let top = store.create_document(draft(Some(a.id), None, "top")).await?;
    store.create_document(draft(Some(a.id), Some(top.id), "child")).await?;
    store.create_document(draft(Some(a.id), None, "second")).await?;
    store.delete_section(a.id).await?;

    let backend = Arc::new(FileBackend::new(temp_dir.path())?);
    let store = TreeStore::new(backend.clone());
    let sections = store.list_sections().await?;
    assert_eq!(sections.len(), 1);
    let docs = store.list_documents(sections[0].id).await?;
    assert_eq!(docs.len(), 3);
    assert_groups_contiguous(backend.as_ref()).await;
    Ok(())
}
