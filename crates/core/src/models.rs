use crate::error::AnswerGenerationError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub type Embedding = Vec<f32>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Ordered page texts read once from a PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub source_path: PathBuf,
    pub pages: Vec<PageText>,
}

impl Document {
    /// Page texts concatenated in page order, without separators.
    pub fn full_text(&self) -> String {
        self.pages.iter().map(|page| page.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: String,
    pub chunk_index: usize,
    pub parent_index: Option<usize>,
    pub token_count: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct SegmentedDocument {
    pub question_chunks: Vec<Chunk>,
    pub answer_chunks: Vec<Chunk>,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub distance: f32,
}

#[derive(Debug)]
pub struct QaResult {
    pub question: String,
    pub answer: Result<String, AnswerGenerationError>,
}

impl QaResult {
    pub fn answer_text(&self) -> String {
        match &self.answer {
            Ok(answer) => answer.clone(),
            Err(error) => format!("Error generating answer: {error}"),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.answer.is_err()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisReport {
    pub output_file: PathBuf,
    pub question_count: usize,
    pub failed_answers: usize,
}
