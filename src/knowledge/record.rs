//! Schema-less knowledge records.
//!
//! Records carry arbitrary field sets; only the identifying fields are
//! recognized, everything else flows through the chunk engine untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which knowledge base a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnowledgeKind {
    Disease,
    Crop,
    Treatment,
}

impl KnowledgeKind {
    /// Fields that identify a record instead of carrying content
    pub fn identifying_fields(&self) -> &'static [&'static str] {
        match self {
            KnowledgeKind::Disease => &["病害名称", "作物"],
            KnowledgeKind::Crop => &["作物名称"],
            KnowledgeKind::Treatment => &["病害名称"],
        }
    }

    /// Primary name field, used by the lexical fallback lookup
    pub fn name_field(&self) -> &'static str {
        match self {
            KnowledgeKind::Disease | KnowledgeKind::Treatment => "病害名称",
            KnowledgeKind::Crop => "作物名称",
        }
    }

    /// Header line prepended to retrieval output for this source
    pub fn header(&self) -> &'static str {
        match self {
            KnowledgeKind::Disease => "【植物病害知识】",
            KnowledgeKind::Crop => "【作物背景知识】",
            KnowledgeKind::Treatment => "【病害防治与管理建议】",
        }
    }

    /// Short label used in log messages
    pub fn label(&self) -> &'static str {
        match self {
            KnowledgeKind::Disease => "disease",
            KnowledgeKind::Crop => "crop",
            KnowledgeKind::Treatment => "treatment",
        }
    }

    /// Semantic chunk prefix for one content field of a record
    pub fn chunk_prefix(&self, record: &KnowledgeRecord, field: &str) -> String {
        match self {
            KnowledgeKind::Disease => format!(
                "病害名称:{} 作物:{} {}",
                record.field_str("病害名称").unwrap_or("未知病害"),
                record.field_str("作物").unwrap_or("未知作物"),
                field
            ),
            KnowledgeKind::Crop => format!(
                "作物:{} {}",
                record.field_str("作物名称").unwrap_or("未知作物"),
                field
            ),
            KnowledgeKind::Treatment => format!(
                "病害名称:{} 防治:{}",
                record.field_str("病害名称").unwrap_or("未知病害"),
                field
            ),
        }
    }
}

/// One knowledge record: an open map from field name to scalar, list or
/// nested mapping. Read-only after load.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct KnowledgeRecord {
    pub fields: Map<String, Value>,
}

impl KnowledgeRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// String value of a field, if present and a string
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// The record's primary name under the given kind
    pub fn name(&self, kind: KnowledgeKind) -> Option<&str> {
        self.field_str(kind.name_field())
    }

    /// Content fields in map order, identifying fields excluded
    pub fn content_fields(
        &self,
        kind: KnowledgeKind,
    ) -> impl Iterator<Item = (&String, &Value)> {
        let skip = kind.identifying_fields();
        self.fields
            .iter()
            .filter(move |(key, _)| !skip.contains(&key.as_str()))
    }
}
