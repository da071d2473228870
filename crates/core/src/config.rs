use crate::error::{ConfigError, SegmentationError};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1/";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Token window parameters for one pass of the segmenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    pub const QUESTIONS: Self = Self {
        chunk_size: 10_000,
        chunk_overlap: 200,
    };

    pub const ANSWERS: Self = Self {
        chunk_size: 1_000,
        chunk_overlap: 100,
    };

    pub fn validate(&self) -> Result<(), SegmentationError> {
        if self.chunk_size == 0 {
            return Err(SegmentationError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(SegmentationError::InvalidConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    pub(crate) fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given (1-based) failed attempt.
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub api_key: String,
    pub api_base: Url,
    pub chat_model: String,
    pub embedding_model: String,
    /// Embed answer chunks locally with character trigrams instead of the
    /// hosted embeddings endpoint. Chat calls still go to the API.
    pub offline_embeddings: bool,
    pub question_temperature: f32,
    pub answer_temperature: f32,
    pub question_chunking: ChunkingConfig,
    pub answer_chunking: ChunkingConfig,
    pub retrieval_top_k: usize,
    pub embedding_batch_size: usize,
    pub answer_concurrency: usize,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub output_dir: PathBuf,
    pub output_file_name: String,
}

impl PipelineConfig {
    pub fn new(api_key: Option<String>) -> Result<Self, ConfigError> {
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(Self {
            api_key,
            api_base: Url::parse(DEFAULT_API_BASE)?,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            offline_embeddings: false,
            question_temperature: 0.3,
            answer_temperature: 0.1,
            question_chunking: ChunkingConfig::QUESTIONS,
            answer_chunking: ChunkingConfig::ANSWERS,
            retrieval_top_k: 4,
            embedding_batch_size: 100,
            answer_concurrency: 4,
            request_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            output_dir: PathBuf::from("static/output"),
            output_file_name: "QA.csv".to_string(),
        })
    }

    /// Sets the API base, normalizing it so relative endpoint joins keep its path.
    pub fn with_api_base(mut self, api_base: &str) -> Result<Self, ConfigError> {
        let mut base = Url::parse(api_base.trim())?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        self.api_base = base;
        Ok(self)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file_name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, chunking) in [
            ("question_chunking", self.question_chunking),
            ("answer_chunking", self.answer_chunking),
        ] {
            chunking
                .validate()
                .map_err(|error| ConfigError::Invalid(format!("{name}: {error}")))?;
        }

        let positive = [
            ("retrieval_top_k", self.retrieval_top_k),
            ("embedding_batch_size", self.embedding_batch_size),
            ("answer_concurrency", self.answer_concurrency),
            ("retry.max_attempts", self.retry.max_attempts),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
        }

        for (name, temperature) in [
            ("question_temperature", self.question_temperature),
            ("answer_temperature", self.answer_temperature),
        ] {
            if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within 0.0..=2.0, got {temperature}"
                )));
            }
        }

        if self.chat_model.trim().is_empty() || self.embedding_model.trim().is_empty() {
            return Err(ConfigError::Invalid("model names must not be empty".to_string()));
        }

        if self.output_file_name.trim().is_empty() {
            return Err(ConfigError::Invalid("output_file_name must not be empty".to_string()));
        }

        Ok(())
    }
}
