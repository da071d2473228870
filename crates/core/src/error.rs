use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is not set; export it or add it to a .env file")]
    MissingApiKey,

    #[error("invalid api base url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("model api returned {status}: {details}")]
    Api { status: u16, details: String },

    #[error("unexpected model response: {0}")]
    InvalidResponse(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: usize, last: Box<ModelError> },
}

impl ModelError {
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::Http(error) => error.is_timeout() || error.is_connect(),
            ModelError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum DocumentLoadError {
    #[error("pdf not found: {0}")]
    NotFound(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("pdf had no readable page text: {0}")]
    NoText(PathBuf),
}

#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("invalid chunking config: {0}")]
    InvalidConfig(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no question chunks to generate from")]
    EmptyInput,

    #[error("question generation failed at chunk {chunk_index}: {source}")]
    Model {
        chunk_index: usize,
        #[source]
        source: ModelError,
    },
}

#[derive(Debug, Error)]
pub enum IndexBuildError {
    #[error("no answer chunks to index")]
    Empty,

    #[error("embedding request failed: {0}")]
    Embedding(#[from] ModelError),

    #[error("embedding count {embeddings} doesn't match chunk count {chunks}")]
    CountMismatch { chunks: usize, embeddings: usize },

    #[error("embedding dimension {found} != {expected} for chunk {chunk_index}")]
    DimensionMismatch {
        chunk_index: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum AnswerGenerationError {
    #[error("context retrieval failed: {0}")]
    Retrieval(#[source] ModelError),

    #[error("answer model failed: {0}")]
    Model(#[source] ModelError),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not persist report: {0}")]
    Persist(#[from] tempfile::PersistError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    DocumentLoad(#[from] DocumentLoadError),

    #[error(transparent)]
    Segmentation(#[from] SegmentationError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    IndexBuild(#[from] IndexBuildError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("background task failed: {0}")]
    Task(String),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
