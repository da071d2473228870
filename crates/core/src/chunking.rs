use crate::config::ChunkingConfig;
use crate::error::SegmentationError;
use crate::models::{Chunk, SegmentedDocument};
use sha2::{Digest, Sha256};
use tiktoken_rs::CoreBPE;
use tracing::debug;

pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Vec<usize>;
    /// Fails when the tokens do not form whole characters.
    fn decode(&self, tokens: &[usize]) -> Result<String, SegmentationError>;
}

/// `cl100k_base`, the encoding used by `gpt-3.5-turbo`.
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    pub fn cl100k() -> Result<Self, SegmentationError> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|error| SegmentationError::Tokenizer(error.to_string()))?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str) -> Vec<usize> {
        self.bpe.encode_ordinary(text)
    }

    fn decode(&self, tokens: &[usize]) -> Result<String, SegmentationError> {
        self.bpe
            .decode(tokens.to_vec())
            .map_err(|error| SegmentationError::Tokenizer(error.to_string()))
    }
}

/// A UTF-8 character is at most four bytes, so at most four byte-level tokens.
const MAX_CHAR_TOKENS: usize = 4;

/// Consecutive decoded windows over the tokens of a text.
///
/// Each window holds at most `chunk_size` tokens and starts `chunk_size -
/// chunk_overlap` tokens after the previous one; the last window may be short.
/// A window edge that would cut a multi-byte character is pulled back to the
/// nearest token that completes one. Both neighbours use the same rule, so
/// with no overlap the windows still concatenate to the original text.
pub struct TextWindows<'a> {
    tokenizer: &'a dyn Tokenizer,
    tokens: Vec<usize>,
    size: usize,
    stride: usize,
    next_start: Option<usize>,
}

impl<'a> TextWindows<'a> {
    pub fn new(
        tokenizer: &'a dyn Tokenizer,
        tokens: Vec<usize>,
        config: ChunkingConfig,
    ) -> Result<Self, SegmentationError> {
        config.validate()?;
        let next_start = (!tokens.is_empty()).then_some(0);
        Ok(Self {
            tokenizer,
            tokens,
            size: config.chunk_size,
            stride: config.stride(),
            next_start,
        })
    }

    /// `start` always sits on a character boundary, so `tokens[start..end]`
    /// decodes exactly when `end` is on one as well.
    fn decode_to(&self, start: usize, end: usize) -> Option<String> {
        self.tokenizer.decode(&self.tokens[start..end]).ok()
    }

    /// Latest boundary at or before `target`, else the first one after it.
    fn window_end(&self, start: usize, target: usize) -> Option<(usize, String)> {
        let total = self.tokens.len();
        (start + 1..=target)
            .rev()
            .take(MAX_CHAR_TOKENS)
            .chain((target + 1..=total).take(MAX_CHAR_TOKENS))
            .find_map(|end| self.decode_to(start, end).map(|text| (end, text)))
    }
}

impl Iterator for TextWindows<'_> {
    type Item = Result<String, SegmentationError>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start.take()?;
        let total = self.tokens.len();
        let target = (start + self.size).min(total);

        let Some((end, text)) = self.window_end(start, target) else {
            return Some(Err(SegmentationError::Tokenizer(format!(
                "tokens {start}..{target} do not decode to text"
            ))));
        };

        if end < total {
            let next = (start + 1..=start + self.stride)
                .rev()
                .take(MAX_CHAR_TOKENS)
                .find(|&position| self.decode_to(start, position).is_some())
                .unwrap_or(end);
            self.next_start = Some(next.min(end));
        }
        Some(Ok(text))
    }
}

pub struct Segmenter<'a> {
    tokenizer: &'a dyn Tokenizer,
}

impl<'a> Segmenter<'a> {
    pub fn new(tokenizer: &'a dyn Tokenizer) -> Self {
        Self { tokenizer }
    }

    /// Lazily decodes each token window of `text`.
    pub fn split_text(
        &self,
        text: &str,
        config: ChunkingConfig,
    ) -> Result<TextWindows<'a>, SegmentationError> {
        TextWindows::new(self.tokenizer, self.tokenizer.encode(text), config)
    }

    /// Question chunks come from the raw text; answer chunks subdivide each
    /// question chunk rather than the raw text.
    pub fn segment(
        &self,
        text: &str,
        question_config: ChunkingConfig,
        answer_config: ChunkingConfig,
    ) -> Result<SegmentedDocument, SegmentationError> {
        answer_config.validate()?;

        let question_chunks = self
            .split_text(text, question_config)?
            .enumerate()
            .map(|(index, piece)| piece.map(|piece| self.make_chunk(index, None, piece)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut answer_chunks = Vec::new();
        for parent in &question_chunks {
            for piece in self.split_text(&parent.text, answer_config)? {
                let index = answer_chunks.len();
                answer_chunks.push(self.make_chunk(index, Some(parent.chunk_index), piece?));
            }
        }

        debug!(
            question_chunks = question_chunks.len(),
            answer_chunks = answer_chunks.len(),
            "text segmented"
        );

        Ok(SegmentedDocument {
            question_chunks,
            answer_chunks,
        })
    }

    fn make_chunk(&self, chunk_index: usize, parent_index: Option<usize>, text: String) -> Chunk {
        Chunk {
            chunk_id: make_chunk_id(parent_index, chunk_index, &text),
            chunk_index,
            parent_index,
            token_count: self.tokenizer.encode(&text).len(),
            text,
        }
    }
}

fn make_chunk_id(parent_index: Option<usize>, index: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(parent) = parent_index {
        hasher.update((parent as u64).to_le_bytes());
    }
    hasher.update((index as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
