use super::{
    DocumentFilter, OrderBy, Persistence, PersistenceError, PersistenceResult, SectionFilter,
};
use crate::model::{Document, DocumentPatch, NewDocument, NewSection, Section, SectionPatch};
use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

const SECTIONS_DIR: &str = "sections";
const DOCUMENTS_DIR: &str = "documents";

/// Directory-backed tables: one JSON file per record, named `<uuid>.json`.
///
/// Nothing is cached; every select rereads the directory.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(dir.join(SECTIONS_DIR))?;
        std::fs::create_dir_all(dir.join(DOCUMENTS_DIR))?;
        Ok(Self { dir })
    }

    /// Directory where records are persisted.
    pub fn data_dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, table: &str, id: Uuid) -> PathBuf {
        self.dir.join(table).join(format!("{}.json", id))
    }

    async fn load_all<T: DeserializeOwned>(&self, table: &str) -> PersistenceResult<Vec<T>> {
        let mut out: Vec<T> = Vec::new();
        let mut entries = fs::read_dir(self.dir.join(table)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let is_record = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map_or(false, |s| Uuid::parse_str(s).is_ok());
            if !is_record {
                continue;
            }
            let bytes = fs::read(&path).await?;
            out.push(serde_json::from_slice(&bytes)?);
        }
        Ok(out)
    }

    async fn load<T: DeserializeOwned>(
        &self,
        table: &'static str,
        id: Uuid,
    ) -> PersistenceResult<T> {
        match fs::read(self.path(table, id)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PersistenceError::Missing { table, id })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a temporary file then rename so a record is never half written.
    async fn save<T: Serialize>(&self, table: &str, id: Uuid, record: &T) -> PersistenceResult<()> {
        let path = self.path(table, id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(record)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, table: &'static str, id: Uuid) -> PersistenceResult<()> {
        match fs::remove_file(self.path(table, id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PersistenceError::Missing { table, id })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Persistence for FileBackend {
    async fn select_sections(
        &self,
        filter: SectionFilter,
        order_by: OrderBy,
    ) -> PersistenceResult<Vec<Section>> {
        let mut out: Vec<Section> = match filter {
            SectionFilter::Id(id) => match self.load(SECTIONS_DIR, id).await {
                Ok(section) => vec![section],
                Err(PersistenceError::Missing { .. }) => Vec::new(),
                Err(e) => return Err(e),
            },
            SectionFilter::All => self.load_all(SECTIONS_DIR).await?,
        };
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
        self.save(SECTIONS_DIR, section.id, &section).await?;
        Ok(section)
    }

    async fn update_section(&self, id: Uuid, patch: SectionPatch) -> PersistenceResult<Section> {
        let mut section: Section = self.load(SECTIONS_DIR, id).await?;
        patch.apply(&mut section);
        self.save(SECTIONS_DIR, id, &section).await?;
        Ok(section)
    }

    async fn delete_section(&self, id: Uuid) -> PersistenceResult<()> {
        self.remove(SECTIONS_DIR, id).await
    }

    async fn select_documents(
        &self,
        filter: DocumentFilter,
        order_by: OrderBy,
    ) -> PersistenceResult<Vec<Document>> {
        let candidates: Vec<Document> = match filter.id {
            Some(id) => match self.load(DOCUMENTS_DIR, id).await {
                Ok(doc) => vec![doc],
                Err(PersistenceError::Missing { .. }) => Vec::new(),
                Err(e) => return Err(e),
            },
            None => self.load_all(DOCUMENTS_DIR).await?,
        };
        let mut out: Vec<Document> = candidates
            .into_iter()
            .filter(|d| filter.matches(d))
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
        self.save(DOCUMENTS_DIR, doc.id, &doc).await?;
        Ok(doc)
    }

    async fn update_document(&self, id: Uuid, patch: DocumentPatch) -> PersistenceResult<Document> {
        let mut doc: Document = self.load(DOCUMENTS_DIR, id).await?;
        patch.apply(&mut doc);
        self.save(DOCUMENTS_DIR, id, &doc).await?;
        Ok(doc)
    }

    async fn delete_document(&self, id: Uuid) -> PersistenceResult<()> {
        self.remove(DOCUMENTS_DIR, id).await
    }
}
