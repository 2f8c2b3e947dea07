//! Records stored in the `sections` and `documents` tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub order: u32,
    pub created_at: DateTime<Utc>,
}

/// A node in a section's document tree.
///
/// `section_id = None` marks the document as orphaned; `parent_id = None`
/// makes it a root of its section.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub id: Uuid,
    pub section_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub order: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewSection {
    pub title: String,
    pub description: String,
    pub order: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewDocument {
    pub section_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub order: u32,
}

/// Partial update for a section. Absent fields are left untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub order: Option<u32>,
}

/// Partial update for a document.
///
/// Nullable foreign keys use `Option<Option<_>>`: the outer layer says whether
/// the field is being written, the inner layer is the stored value.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentPatch {
    pub section_id: Option<Option<Uuid>>,
    pub parent_id: Option<Option<Uuid>>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub order: Option<u32>,
}

impl SectionPatch {
    pub fn order(order: u32) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }

    pub fn apply(&self, section: &mut Section) {
        if let Some(title) = &self.title {
            section.title = title.clone();
        }
        if let Some(description) = &self.description {
            section.description = description.clone();
        }
        if let Some(order) = self.order {
            section.order = order;
        }
    }
}

impl DocumentPatch {
    pub fn order(order: u32) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }

    pub fn section(section_id: Option<Uuid>) -> Self {
        Self {
            section_id: Some(section_id),
            ..Self::default()
        }
    }

    pub fn apply(&self, doc: &mut Document) {
        if let Some(section_id) = self.section_id {
            doc.section_id = section_id;
        }
        if let Some(parent_id) = self.parent_id {
            doc.parent_id = parent_id;
        }
        if let Some(title) = &self.title {
            doc.title = title.clone();
        }
        if let Some(content) = &self.content {
            doc.content = content.clone();
        }
        if let Some(order) = self.order {
            doc.order = order;
        }
    }
}

/// Content edits a caller may request for a section.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SectionUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Input for creating a document through the tree store.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DocumentDraft {
    pub section_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Edits a caller may request for a document. Setting `section_id` or
/// `parent_id` relocates the document (and its subtree).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default, with = "double_option")]
    pub section_id: Option<Option<Uuid>>,
    #[serde(default, with = "double_option")]
    pub parent_id: Option<Option<Uuid>>,
}

impl DocumentUpdate {
    pub fn is_relocation(&self) -> bool {
        self.section_id.is_some() || self.parent_id.is_some()
    }
}

/// Distinguishes an absent JSON field (`None`) from an explicit `null`
/// (`Some(None)`).
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_distinguishes_null_from_absent() {
        let absent: DocumentUpdate = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(absent.section_id, None);
        assert!(!absent.is_relocation());

        let null: DocumentUpdate = serde_json::from_str(r#"{"section_id":null}"#).unwrap();
        assert_eq!(null.section_id, Some(None));
        assert!(null.is_relocation());

        let id = Uuid::new_v4();
        let set: DocumentUpdate =
            serde_json::from_str(&format!(r#"{{"parent_id":"{}"}}"#, id)).unwrap();
        assert_eq!(set.parent_id, Some(Some(id)));
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let mut doc = Document {
            id: Uuid::new_v4(),
            section_id: Some(Uuid::new_v4()),
            parent_id: None,
            title: "a".into(),
            content: "body".into(),
            order: 3,
            created_at: Utc::now(),
        };
        DocumentPatch {
            section_id: Some(None),
            order: Some(1),
            ..DocumentPatch::default()
        }
        .apply(&mut doc);
        assert_eq!(doc.section_id, None);
        assert_eq!(doc.order, 1);
        assert_eq!(doc.title, "a");
        assert_eq!(doc.content, "body");
    }
}
