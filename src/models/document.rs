//! Store-level document and snapshot types.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field map written to the store. Produced by serializing a validated record.
pub type Fields = Map<String, Value>;

/// Keys owned by the store; never taken from caller-supplied fields.
pub const RESERVED_KEYS: [&str; 4] = ["id", "createdAt", "updatedAt", "version"];

/// The collections held by the content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Alerts,
    Banner,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Alerts => "alerts",
            Collection::Banner => "banner",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "alerts" => Some(Collection::Alerts),
            "banner" => Some(Collection::Banner),
            _ => None,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document with its store-assigned metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Write counter, starts at 1
    pub version: i64,
}

impl Document {
    /// Decode into a typed record. Metadata is merged in under its camelCase keys.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let mut object = self.fields.clone();
        object.insert("id".to_string(), Value::String(self.id.clone()));
        if let Some(created_at) = self.created_at {
            object.insert("createdAt".to_string(), serde_json::to_value(created_at)?);
        }
        if let Some(updated_at) = self.updated_at {
            object.insert("updatedAt".to_string(), serde_json::to_value(updated_at)?);
        }
        object.insert("version".to_string(), Value::from(self.version));
        serde_json::from_value(Value::Object(object))
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Full current contents of one collection at a store revision.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub collection: Collection,
    pub revision: i64,
    pub documents: Vec<Document>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.iter().any(|d| d.id == id)
    }

    /// Copy of this snapshot restricted to documents matching `filter`.
    pub fn filtered(&self, filter: &Filter) -> Snapshot {
        Snapshot {
            collection: self.collection,
            revision: self.revision,
            documents: self
                .documents
                .iter()
                .filter(|d| filter.matches(d))
                .cloned()
                .collect(),
        }
    }
}

/// Store-side query predicate for filtered subscriptions.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every document
    All,
    /// Documents whose field equals the value
    Eq { field: String, value: Value },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq { field, value } => document.field(field) == Some(value),
        }
    }
}

/// Drop reserved metadata keys from caller-supplied fields.
pub fn strip_reserved(mut fields: Fields) -> Fields {
    for key in RESERVED_KEYS {
        fields.remove(key);
    }
    fields
}
