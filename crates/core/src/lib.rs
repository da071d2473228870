pub mod answers;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod models;
pub mod openai;
pub mod orchestrator;
pub mod prompts;
pub mod questions;
pub mod report;
pub mod traits;

pub use answers::AnswerGenerator;
pub use chunking::{Segmenter, TextWindows, TiktokenTokenizer, Tokenizer};
pub use config::{ChunkingConfig, PipelineConfig, RetryPolicy};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{
    AnswerGenerationError, ConfigError, DocumentLoadError, GenerationError, IndexBuildError,
    ModelError, PipelineError, ReportError, SegmentationError,
};
pub use extractor::{load_document, load_document_with, LopdfExtractor, PdfExtractor};
pub use index::VectorIndex;
pub use models::{
    AnalysisReport, Chunk, Document, Embedding, PageText, QaResult, ScoredChunk, SegmentedDocument,
};
pub use openai::{OpenAiChatModel, OpenAiClient, OpenAiEmbedder};
pub use orchestrator::{PreparedDocument, QaPipeline};
pub use questions::{filter_questions, QuestionGenerator};
pub use report::{write_qa_csv, write_qa_rows, CSV_HEADER};
pub use traits::{ChatMessage, ChatModel, DocumentAnalyzer, Retriever, Role};
