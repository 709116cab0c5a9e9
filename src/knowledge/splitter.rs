//! Chunk engine.
//!
//! Flattens record field values to plain text, splits overlong text on
//! terminal punctuation and greedily packs sentences into bounded chunks,
//! each carrying a semantic prefix and positional metadata.

use serde_json::Value;

use crate::knowledge::record::{KnowledgeKind, KnowledgeRecord};

/// One retrieval-ready text unit
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Full chunk text, `{prefix}：{body}`
    pub text: String,
    /// Semantic prefix shared by every chunk of the same field
    pub prefix: String,
    /// Originating record+field group
    pub source_id: usize,
    /// Global emission order, equal to the chunk's position in the output
    pub sequence_index: usize,
}

/// Splits knowledge records into bounded chunks
pub struct ChunkSplitter {
    kind: KnowledgeKind,
    max_words: usize,
}

impl ChunkSplitter {
    pub fn new(kind: KnowledgeKind, max_words: usize) -> Self {
        Self { kind, max_words }
    }

    /// Split all records into chunks, in record and field order
    pub fn split(&self, records: &[KnowledgeRecord]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut source_id = 0usize;

        for record in records {
            for (field, value) in record.content_fields(self.kind) {
                let text = flatten_value(value);
                let prefix = self.kind.chunk_prefix(record, field);

                for body in cut_into_pieces(&text, self.max_words) {
                    let sequence_index = chunks.len();
                    chunks.push(Chunk {
                        text: format!("{prefix}：{body}"),
                        prefix: prefix.clone(),
                        source_id,
                        sequence_index,
                    });
                }
                source_id += 1;
            }
        }

        chunks
    }
}

/// Flatten a field value to plain text: nested maps as `k:v` pairs and
/// lists as scalars, both joined by `；`.
pub(crate) fn flatten_value(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}:{}", flatten_value(v)))
            .collect::<Vec<_>>()
            .join("；"),
        Value::Array(items) => items
            .iter()
            .map(flatten_value)
            .collect::<Vec<_>>()
            .join("；"),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Split on 。！？, keeping the terminal punctuation with its sentence
fn cut_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        if matches!(ch, '。' | '！' | '？') {
            let end = idx + ch.len_utf8();
            let sentence = &text[start..end];
            if !sentence.trim().is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    if start < text.len() {
        let tail = &text[start..];
        if !tail.trim().is_empty() {
            sentences.push(tail);
        }
    }

    sentences
}

/// Greedy sentence packing under a character budget.
///
/// Text within budget passes through as a single piece. A sentence longer
/// than the budget is emitted alone and unsplit, never dropped or padded
/// with an empty leading piece.
fn cut_into_pieces(text: &str, max_words: usize) -> Vec<String> {
    if text.chars().count() <= max_words {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0usize;

    for sentence in cut_sentences(text) {
        let sentence_chars = sentence.chars().count();
        if buffer_chars + sentence_chars <= max_words {
            buffer.push_str(sentence);
            buffer_chars += sentence_chars;
        } else {
            if !buffer.is_empty() {
                pieces.push(std::mem::take(&mut buffer));
            }
            buffer = sentence.to_string();
            buffer_chars = sentence_chars;
        }
    }

    if !buffer.is_empty() {
        pieces.push(buffer);
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: serde_json::Value) -> Vec<KnowledgeRecord> {
        serde_json::from_value(value).unwrap()
    }

    fn sentence(ch: char, body_len: usize, terminal: char) -> String {
        let mut s: String = std::iter::repeat(ch).take(body_len).collect();
        s.push(terminal);
        s
    }

    #[test]
    fn test_short_text_single_chunk() {
        let recs = records(json!([
            {"病害名称": "X", "作物": "Y", "症状": "叶面出现褐色斑点。"}
        ]));
        let chunks = ChunkSplitter::new(KnowledgeKind::Disease, 512).split(&recs);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "病害名称:X 作物:Y 症状：叶面出现褐色斑点。");
        assert_eq!(chunks[0].source_id, 0);
        assert_eq!(chunks[0].sequence_index, 0);
    }

    #[test]
    fn test_600_char_field_splits_into_two() {
        // Three 200-char sentences: the first two pack together, the third
        // overflows the 512 budget and starts a new chunk.
        let text = format!(
            "{}{}{}",
            sentence('啊', 199, '。'),
            sentence('哦', 199, '。'),
            sentence('嗯', 199, '。')
        );
        let recs = records(json!([
            {"病害名称": "X", "作物": "Y", "症状": text}
        ]));
        let chunks = ChunkSplitter::new(KnowledgeKind::Disease, 512).split(&recs);
        assert_eq!(chunks.len(), 2);
        for chunk in &chunks {
            assert_eq!(chunk.prefix, "病害名称:X 作物:Y 症状");
            assert!(chunk.text.starts_with("病害名称:X 作物:Y 症状："));
        }
        assert_eq!(chunks[0].source_id, chunks[1].source_id);
    }

    #[test]
    fn test_packed_bodies_stay_within_budget() {
        let text = format!(
            "{}{}{}{}",
            sentence('一', 99, '。'),
            sentence('二', 99, '！'),
            sentence('三', 99, '？'),
            sentence('四', 99, '。')
        );
        let pieces = cut_into_pieces(&text, 250);
        assert_eq!(pieces.len(), 2);
        for piece in &pieces {
            assert!(piece.chars().count() <= 250);
        }
    }

    #[test]
    fn test_oversized_single_sentence_passes_through() {
        let text = sentence('长', 599, '。');
        let pieces = cut_into_pieces(&text, 512);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0], text);
    }

    #[test]
    fn test_oversized_head_sentence_emitted_alone() {
        let head = sentence('长', 599, '。');
        let tail = sentence('短', 10, '。');
        let text = format!("{head}{tail}");
        let pieces = cut_into_pieces(&text, 512);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0], head);
        assert_eq!(pieces[1], tail);
        assert!(pieces.iter().all(|p| !p.is_empty()));
    }

    #[test]
    fn test_flatten_nested_map_and_list() {
        assert_eq!(
            flatten_value(&json!({"温度": "25度", "湿度": "高"})),
            "温度:25度；湿度:高"
        );
        assert_eq!(flatten_value(&json!(["轮作", "清园", "排水"])), "轮作；清园；排水");
        assert_eq!(flatten_value(&json!(30)), "30");
    }

    #[test]
    fn test_source_id_increments_per_field_group() {
        let recs = records(json!([
            {"病害名称": "X", "作物": "Y", "症状": "a。", "成因": "b。"},
            {"病害名称": "Z", "作物": "W", "症状": "c。"}
        ]));
        let chunks = ChunkSplitter::new(KnowledgeKind::Disease, 512).split(&recs);
        assert_eq!(chunks.len(), 3);
        let ids: Vec<usize> = chunks.iter().map(|c| c.source_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        let seq: Vec<usize> = chunks.iter().map(|c| c.sequence_index).collect();
        assert_eq!(seq, vec![0, 1, 2]);
    }

    #[test]
    fn test_sentence_cut_keeps_punctuation() {
        let sentences = cut_sentences("第一句。第二句！第三句？尾巴");
        assert_eq!(sentences, vec!["第一句。", "第二句！", "第三句？", "尾巴"]);
    }
}
