//! Knowledge source loading.
//!
//! Each source (disease, crop, treatment) loads its JSON record file once,
//! chunks it at load time, and keeps the raw records around for the lexical
//! fallback lookup. Missing or malformed input degrades to an empty source.

use std::path::Path;

use serde_json::Value;
use tracing::warn;

use crate::knowledge::record::{KnowledgeKind, KnowledgeRecord};
use crate::knowledge::splitter::{flatten_value, Chunk, ChunkSplitter};

/// Per-source retrieval parameters
#[derive(Debug, Clone)]
pub struct SourceParams {
    pub top_k: usize,
    pub score_threshold: f32,
    pub chunk_size_budget: usize,
    /// When false, vector retrieval is skipped in favor of the lexical lookup
    pub eager: bool,
}

impl SourceParams {
    pub fn new(top_k: usize, score_threshold: f32, chunk_size_budget: usize) -> Self {
        Self {
            top_k,
            score_threshold,
            chunk_size_budget,
            eager: true,
        }
    }
}

/// One loaded knowledge source
pub struct KnowledgeSource {
    pub kind: KnowledgeKind,
    pub records: Vec<KnowledgeRecord>,
    pub chunks: Vec<Chunk>,
    pub params: SourceParams,
}

impl KnowledgeSource {
    /// Load a source from a JSON array file and chunk it.
    ///
    /// A missing file, unparsable document or non-object record is logged
    /// and skipped; the pipeline keeps running without that knowledge.
    pub fn load(
        kind: KnowledgeKind,
        path: &Path,
        max_words: usize,
        params: SourceParams,
    ) -> Self {
        let records = load_records(kind, path);
        let chunks = ChunkSplitter::new(kind, max_words).split(&records);
        Self {
            kind,
            records,
            chunks,
            params,
        }
    }

    /// Build a source directly from records, chunking them in place
    pub fn from_records(
        kind: KnowledgeKind,
        records: Vec<KnowledgeRecord>,
        max_words: usize,
        params: SourceParams,
    ) -> Self {
        let chunks = ChunkSplitter::new(kind, max_words).split(&records);
        Self {
            kind,
            records,
            chunks,
            params,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Lexical fallback: dump every field of each record whose name occurs
    /// as a substring of the query.
    pub fn lexical_lookup(&self, query: &str) -> String {
        let mut out = String::new();
        for record in &self.records {
            let name = record.name(self.kind).unwrap_or("");
            if !name.is_empty() && query.contains(name) {
                for (key, value) in &record.fields {
                    out.push_str(&format!("{key}: {}\n", render_field(value)));
                }
            }
        }
        out
    }
}

fn render_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => flatten_value(other),
    }
}

fn load_records(kind: KnowledgeKind, path: &Path) -> Vec<KnowledgeRecord> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(
                source = kind.label(),
                path = %path.display(),
                "knowledge file unreadable, skipping this source: {err}"
            );
            return Vec::new();
        }
    };

    let values: Vec<Value> = match serde_json::from_str(&raw) {
        Ok(values) => values,
        Err(err) => {
            warn!(
                source = kind.label(),
                path = %path.display(),
                "knowledge file is not a JSON array, skipping this source: {err}"
            );
            return Vec::new();
        }
    };

    values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(fields) => Some(KnowledgeRecord::new(fields)),
            other => {
                warn!(
                    source = kind.label(),
                    "skipping non-object knowledge record: {other}"
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn params() -> SourceParams {
        SourceParams::new(8, 100.0, 512)
    }

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_chunks_at_load_time() {
        let file = write_temp(
            r#"[{"病害名称": "稻瘟病", "作物": "水稻", "症状": "叶斑。", "成因": "真菌。"}]"#,
        );
        let source = KnowledgeSource::load(KnowledgeKind::Disease, file.path(), 512, params());
        assert_eq!(source.records.len(), 1);
        assert_eq!(source.chunks.len(), 2);
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let source = KnowledgeSource::load(
            KnowledgeKind::Crop,
            Path::new("/nonexistent/crops.json"),
            512,
            params(),
        );
        assert!(source.is_empty());
        assert!(source.records.is_empty());
    }

    #[test]
    fn test_non_object_records_skipped() {
        let file = write_temp(r#"[{"病害名称": "X", "症状": "a。"}, 42, "text"]"#);
        let source = KnowledgeSource::load(KnowledgeKind::Treatment, file.path(), 512, params());
        assert_eq!(source.records.len(), 1);
    }

    #[test]
    fn test_malformed_document_degrades_to_empty() {
        let file = write_temp("{not json");
        let source = KnowledgeSource::load(KnowledgeKind::Disease, file.path(), 512, params());
        assert!(source.is_empty());
    }

    #[test]
    fn test_lexical_lookup_matches_name_substring() {
        let records: Vec<KnowledgeRecord> = serde_json::from_value(json!([
            {"作物名称": "水稻", "生育期": "分蘖期、孕穗期", "易感病害": ["稻瘟病", "纹枯病"]},
            {"作物名称": "小麦", "生育期": "拔节期"}
        ]))
        .unwrap();
        let source =
            KnowledgeSource::from_records(KnowledgeKind::Crop, records, 512, params());

        let hit = source.lexical_lookup("田间水稻出现病斑");
        assert!(hit.contains("作物名称: 水稻"));
        assert!(hit.contains("易感病害: 稻瘟病；纹枯病"));
        assert!(!hit.contains("小麦"));

        assert!(source.lexical_lookup("玉米").is_empty());
    }
}
