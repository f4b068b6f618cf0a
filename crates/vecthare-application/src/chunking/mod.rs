//! Chunking
//!
//! Splits source artifacts (chat messages, documents, lorebook entries)
//! into hashed text fragments. Strategy selection decides how chat history
//! maps onto chunks; long texts are cut with sentence-aware boundaries.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use vecthare_domain::hash::string_hash;
use vecthare_domain::value_objects::{Chunk, ChatMessage, ChunkMetadata, Document, LorebookEntry};

/// How chat history becomes chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// One chunk per message
    #[default]
    PerMessage,
    /// One chunk per conversational turn (a user message and the replies
    /// that follow it)
    ConversationTurns,
    /// Fixed-size groups of consecutive messages
    MessageBatch,
    /// Fixed chunk size with sentence-aware boundary search
    Adaptive,
}

/// Chunker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Strategy for chat history
    pub strategy: ChunkingStrategy,
    /// Messages per group for [`ChunkingStrategy::MessageBatch`]
    pub batch_size: usize,
    /// Target characters per chunk for adaptive splitting
    pub chunk_size: usize,
    /// Deduplication window in messages; 0 means unlimited
    pub deduplication_depth: usize,
    /// Messages shorter than this never vectorize; 0 keeps everything
    pub min_chat_length: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::PerMessage,
            batch_size: 5,
            chunk_size: 400,
            deduplication_depth: 0,
            min_chat_length: 0,
        }
    }
}

/// Splits source artifacts into hashed chunks
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a chunker with the given configuration
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Chunk chat history with the configured strategy, then deduplicate
    /// within the configured window.
    pub fn chunk_messages(&self, messages: &[ChatMessage]) -> Vec<Chunk> {
        let eligible: Vec<ChatMessage> = messages
            .iter()
            .filter(|m| m.text.trim().chars().count() >= self.config.min_chat_length)
            .cloned()
            .collect();

        let chunks = match self.config.strategy {
            ChunkingStrategy::PerMessage => self.per_message(&eligible),
            ChunkingStrategy::ConversationTurns => self.conversation_turns(&eligible),
            ChunkingStrategy::MessageBatch => self.message_batch(&eligible),
            ChunkingStrategy::Adaptive => self.adaptive_messages(&eligible),
        };
        self.deduplicate(chunks, messages)
    }

    /// Chunk a document with sentence-aware adaptive splitting
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        let pieces = adaptive_split(&document.text, self.config.chunk_size);
        let total = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let mut metadata = ChunkMetadata::with_source("doc");
                metadata.chunk_index = Some(i);
                metadata.total_chunks = Some(total);
                metadata
                    .extra
                    .insert("documentId".to_string(), document.id.clone().into());
                Chunk::new(text, i, metadata)
            })
            .collect()
    }

    /// Chunk a lorebook entry; long content splits adaptively
    pub fn chunk_lorebook_entry(&self, entry: &LorebookEntry) -> Vec<Chunk> {
        let pieces = adaptive_split(&entry.content, self.config.chunk_size);
        let total = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let mut metadata = ChunkMetadata::with_source("lorebook");
                metadata.chunk_index = Some(i);
                metadata.total_chunks = Some(total);
                metadata
                    .extra
                    .insert("entryUid".to_string(), entry.uid.clone().into());
                if !entry.comment.is_empty() {
                    metadata
                        .extra
                        .insert("comment".to_string(), entry.comment.clone().into());
                }
                Chunk::new(text, i, metadata)
            })
            .collect()
    }

    fn per_message(&self, messages: &[ChatMessage]) -> Vec<Chunk> {
        messages
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.text.trim().is_empty())
            .map(|(i, message)| {
                Chunk::new(
                    format_message(message),
                    i,
                    chat_metadata(message, 0, 1),
                )
            })
            .collect()
    }

    fn conversation_turns(&self, messages: &[ChatMessage]) -> Vec<Chunk> {
        let mut groups: Vec<Vec<&ChatMessage>> = Vec::new();
        for message in messages {
            let start_new = message.is_user || groups.is_empty();
            if start_new {
                groups.push(Vec::new());
            }
            if let Some(group) = groups.last_mut() {
                group.push(message);
            }
        }
        groups
            .into_iter()
            .filter(|g| !g.is_empty())
            .enumerate()
            .map(|(i, group)| self.group_chunk(i, &group))
            .collect()
    }

    fn message_batch(&self, messages: &[ChatMessage]) -> Vec<Chunk> {
        let size = self.config.batch_size.max(1);
        messages
            .chunks(size)
            .enumerate()
            .map(|(i, window)| {
                let group: Vec<&ChatMessage> = window.iter().collect();
                self.group_chunk(i, &group)
            })
            .collect()
    }

    fn adaptive_messages(&self, messages: &[ChatMessage]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for message in messages {
            let pieces = adaptive_split(&format_message(message), self.config.chunk_size);
            let total = pieces.len();
            for (i, text) in pieces.into_iter().enumerate() {
                chunks.push(Chunk::new(
                    text,
                    chunks.len(),
                    chat_metadata(message, i, total),
                ));
            }
        }
        chunks
    }

    /// One chunk for a group of messages; ages track the newest member
    fn group_chunk(&self, index: usize, group: &[&ChatMessage]) -> Chunk {
        let text = group
            .iter()
            .map(|m| format_message(m))
            .collect::<Vec<_>>()
            .join("\n");
        let newest = group.iter().map(|m| m.index).max().unwrap_or(0);
        let mut metadata = ChunkMetadata::with_source("chat");
        metadata.message_id = Some(newest);
        metadata.original_message_hash = Some(string_hash(&text));
        metadata.chunk_index = Some(0);
        metadata.total_chunks = Some(1);
        Chunk::new(text, index, metadata)
    }

    /// Drop repeated hashes among chunks from the most recent
    /// `deduplication_depth` messages (0 covers the whole history).
    fn deduplicate(&self, chunks: Vec<Chunk>, messages: &[ChatMessage]) -> Vec<Chunk> {
        let newest = messages.iter().map(|m| m.index).max().unwrap_or(0);
        let cutoff = if self.config.deduplication_depth == 0 {
            i64::MIN
        } else {
            newest - self.config.deduplication_depth as i64
        };

        let mut seen: HashSet<u32> = HashSet::new();
        chunks
            .into_iter()
            .filter(|chunk| {
                let in_window = chunk
                    .metadata
                    .message_id
                    .is_none_or(|id| id > cutoff || self.config.deduplication_depth == 0);
                if !in_window {
                    return true;
                }
                seen.insert(chunk.hash)
            })
            .collect()
    }
}

fn format_message(message: &ChatMessage) -> String {
    format!("{}: {}", message.name, message.text)
}

fn chat_metadata(message: &ChatMessage, chunk_index: usize, total_chunks: usize) -> ChunkMetadata {
    let mut metadata = ChunkMetadata::with_source("chat");
    metadata.message_id = Some(message.index);
    metadata.original_message_hash = Some(string_hash(&message.text));
    metadata.chunk_index = Some(chunk_index);
    metadata.total_chunks = Some(total_chunks);
    metadata
}

/// Split text into chunks of roughly `chunk_size` characters, pulling each
/// cut back to the nearest sentence boundary within a small back-window.
pub fn adaptive_split(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() <= chunk_size {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    // Search this many characters back from the hard cut for a boundary
    let back_window = (chunk_size / 5).max(20).min(chunk_size - 1);

    let mut pieces = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let mut end = hard_end;

        if hard_end < chars.len() {
            let floor = hard_end.saturating_sub(back_window).max(start + 1);
            for i in (floor..hard_end).rev() {
                if matches!(chars[i], '.' | '!' | '?' | '\n') {
                    end = i + 1;
                    break;
                }
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        start = end;
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(messages: &[(&str, &str, bool)]) -> Vec<ChatMessage> {
        messages
            .iter()
            .enumerate()
            .map(|(i, (name, text, is_user))| ChatMessage {
                index: i as i64,
                name: (*name).to_string(),
                is_user: *is_user,
                text: (*text).to_string(),
            })
            .collect()
    }

    #[test]
    fn per_message_makes_one_chunk_each() {
        let chunker = Chunker::new(ChunkerConfig::default());
        let messages = chat(&[
            ("Alice", "Hello there", true),
            ("Bob", "General greetings", false),
        ]);
        let chunks = chunker.chunk_messages(&messages);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Alice: Hello there");
        assert_eq!(chunks[0].metadata.message_id, Some(0));
        assert!(chunks[0].metadata.is_chat_source());
        assert_eq!(chunks[0].hash, string_hash("Alice: Hello there"));
    }

    #[test]
    fn short_messages_are_skipped_when_a_minimum_is_set() {
        let config = ChunkerConfig {
            min_chat_length: 10,
            ..ChunkerConfig::default()
        };
        let chunker = Chunker::new(config);
        let messages = chat(&[
            ("Alice", "ok", true),
            ("Bob", "a substantially longer reply", false),
        ]);
        let chunks = chunker.chunk_messages(&messages);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("longer reply"));
    }

    #[test]
    fn per_message_skips_empty_messages() {
        let chunker = Chunker::new(ChunkerConfig::default());
        let messages = chat(&[("Alice", "  ", true), ("Bob", "hi", false)]);
        assert_eq!(chunker.chunk_messages(&messages).len(), 1);
    }

    #[test]
    fn conversation_turns_group_user_and_replies() {
        let config = ChunkerConfig {
            strategy: ChunkingStrategy::ConversationTurns,
            ..ChunkerConfig::default()
        };
        let chunker = Chunker::new(config);
        let messages = chat(&[
            ("Alice", "Question one", true),
            ("Bob", "Answer one", false),
            ("Bob", "Answer continues", false),
            ("Alice", "Question two", true),
            ("Bob", "Answer two", false),
        ]);
        let chunks = chunker.chunk_messages(&messages);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.contains("Question one"));
        assert!(chunks[0].text.contains("Answer continues"));
        // Group age tracks its newest message
        assert_eq!(chunks[0].metadata.message_id, Some(2));
        assert_eq!(chunks[1].metadata.message_id, Some(4));
    }

    #[test]
    fn message_batch_respects_batch_size() {
        let config = ChunkerConfig {
            strategy: ChunkingStrategy::MessageBatch,
            batch_size: 2,
            ..ChunkerConfig::default()
        };
        let chunker = Chunker::new(config);
        let messages = chat(&[
            ("A", "one", true),
            ("B", "two", false),
            ("A", "three", true),
        ]);
        let chunks = chunker.chunk_messages(&messages);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.contains("one"));
        assert!(chunks[0].text.contains("two"));
        assert!(chunks[1].text.contains("three"));
    }

    #[test]
    fn adaptive_split_respects_sentence_boundaries() {
        let text = "First sentence here. Second sentence follows. Third one closes.";
        let pieces = adaptive_split(text, 30);
        assert!(pieces.len() >= 2);
        assert!(pieces[0].ends_with('.'));
        // No piece wildly exceeds the chunk size
        assert!(pieces.iter().all(|p| p.chars().count() <= 30));
    }

    #[test]
    fn adaptive_split_handles_boundary_free_text() {
        let text = "x".repeat(95);
        let pieces = adaptive_split(&text, 30);
        assert_eq!(pieces.len(), 4);
        assert!(pieces[..3].iter().all(|p| p.chars().count() == 30));
    }

    #[test]
    fn adaptive_split_of_short_text_is_identity() {
        assert_eq!(adaptive_split("short", 100), vec!["short".to_string()]);
        assert!(adaptive_split("   ", 100).is_empty());
        assert!(adaptive_split("", 100).is_empty());
    }

    #[test]
    fn deduplication_window_drops_repeats() {
        let config = ChunkerConfig {
            deduplication_depth: 10,
            ..ChunkerConfig::default()
        };
        let chunker = Chunker::new(config);
        let messages = chat(&[
            ("A", "repeated line", true),
            ("A", "repeated line", true),
            ("B", "unique line", false),
        ]);
        let chunks = chunker.chunk_messages(&messages);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn unlimited_window_deduplicates_everything() {
        let chunker = Chunker::new(ChunkerConfig::default());
        let messages = chat(&[
            ("A", "same", true),
            ("A", "same", true),
            ("A", "same", true),
        ]);
        assert_eq!(chunker.chunk_messages(&messages).len(), 1);
    }

    #[test]
    fn document_chunks_carry_document_metadata() {
        let chunker = Chunker::new(ChunkerConfig::default());
        let doc = Document {
            id: "doc-1".into(),
            name: "Guide".into(),
            text: "A body of text. ".repeat(60),
        };
        let chunks = chunker.chunk_document(&doc);
        assert!(chunks.len() > 1);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.chunk_index, Some(i));
            assert_eq!(chunk.metadata.total_chunks, Some(total));
            assert_eq!(
                chunk.metadata.extra.get("documentId").and_then(|v| v.as_str()),
                Some("doc-1")
            );
        }
    }

    #[test]
    fn lorebook_entry_becomes_single_chunk_when_short() {
        let chunker = Chunker::new(ChunkerConfig::default());
        let entry = LorebookEntry {
            uid: "42".into(),
            content: "The dragon guards the mountain pass.".into(),
            comment: "Dragon lore".into(),
            ..LorebookEntry::default()
        };
        let chunks = chunker.chunk_lorebook_entry(&entry);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.source.as_deref(), Some("lorebook"));
    }
}
