use crate::answers::AnswerGenerator;
use crate::chunking::{Segmenter, TiktokenTokenizer, Tokenizer};
use crate::config::PipelineConfig;
use crate::embeddings::{CharacterNgramEmbedder, Embedder};
use crate::error::{PipelineError, Result};
use crate::extractor::load_document;
use crate::index::VectorIndex;
use crate::models::{AnalysisReport, Document, QaResult};
use crate::openai::{OpenAiChatModel, OpenAiClient, OpenAiEmbedder};
use crate::questions::{filter_questions, QuestionGenerator};
use crate::report::write_qa_csv;
use crate::traits::{ChatModel, DocumentAnalyzer};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// A document ready for answering: the filtered questions and the answer
/// chain bound to that document's own index.
pub struct PreparedDocument {
    pub answerer: AnswerGenerator,
    pub questions: Vec<String>,
}

pub struct QaPipeline {
    config: PipelineConfig,
    tokenizer: Arc<dyn Tokenizer>,
    question_model: Arc<dyn ChatModel>,
    answer_model: Arc<dyn ChatModel>,
    embedder: Arc<dyn Embedder>,
}

impl QaPipeline {
    /// Pipeline backed by the hosted chat API, and by the hosted embeddings
    /// API unless `offline_embeddings` is set.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(OpenAiClient::new(&config)?);
        let question_model = Arc::new(OpenAiChatModel::new(
            client.clone(),
            config.chat_model.clone(),
            config.question_temperature,
        ));
        let answer_model = Arc::new(OpenAiChatModel::new(
            client.clone(),
            config.chat_model.clone(),
            config.answer_temperature,
        ));
        let embedder: Arc<dyn Embedder> = if config.offline_embeddings {
            info!("answer index uses local character trigram embeddings");
            Arc::new(CharacterNgramEmbedder::default())
        } else {
            Arc::new(OpenAiEmbedder::new(
                client,
                config.embedding_model.clone(),
                config.embedding_batch_size,
            ))
        };
        let tokenizer = Arc::new(TiktokenTokenizer::cl100k()?);

        Ok(Self::with_components(
            config,
            tokenizer,
            question_model,
            answer_model,
            embedder,
        ))
    }

    pub fn with_components(
        config: PipelineConfig,
        tokenizer: Arc<dyn Tokenizer>,
        question_model: Arc<dyn ChatModel>,
        answer_model: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            config,
            tokenizer,
            question_model,
            answer_model,
            embedder,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Loads the PDF off the async runtime, then prepares it.
    pub async fn prepare(&self, pdf_path: &Path) -> Result<PreparedDocument> {
        let path = pdf_path.to_path_buf();
        let document = tokio::task::spawn_blocking(move || load_document(&path))
            .await
            .map_err(|error| PipelineError::Task(error.to_string()))??;
        info!(
            path = %pdf_path.display(),
            pages = document.pages.len(),
            "document loaded"
        );
        self.prepare_document(&document).await
    }

    /// Segment, draft questions, build the answer index. Every failure here is
    /// fatal for the run.
    pub async fn prepare_document(&self, document: &Document) -> Result<PreparedDocument> {
        let segmented = Segmenter::new(self.tokenizer.as_ref()).segment(
            &document.full_text(),
            self.config.question_chunking,
            self.config.answer_chunking,
        )?;
        info!(
            question_chunks = segmented.question_chunks.len(),
            answer_chunks = segmented.answer_chunks.len(),
            "document segmented"
        );

        let raw_questions = QuestionGenerator::new(self.question_model.clone())
            .generate(&segmented.question_chunks)
            .await?;
        let questions = filter_questions(&raw_questions);
        info!(questions = questions.len(), "questions generated");

        let index = VectorIndex::build(
            segmented.answer_chunks,
            self.embedder.clone(),
            self.config.retrieval_top_k,
        )
        .await?;

        Ok(PreparedDocument {
            answerer: AnswerGenerator::new(self.answer_model.clone(), Arc::new(index)),
            questions,
        })
    }

    /// One result per question, in question order. Failures stay per question.
    pub async fn answer_all(&self, prepared: &PreparedDocument) -> Vec<QaResult> {
        let total = prepared.questions.len();
        let answerer = &prepared.answerer;

        stream::iter(prepared.questions.clone().into_iter().enumerate())
            .map(move |(position, question)| async move {
                info!(question = position + 1, total, "answering question");
                let answer = answerer.answer(&question).await;
                if let Err(error) = &answer {
                    warn!(question = position + 1, %error, "answer generation failed");
                }
                QaResult { question, answer }
            })
            .buffered(self.config.answer_concurrency.max(1))
            .collect()
            .await
    }

    pub async fn run(&self, pdf_path: &Path) -> Result<AnalysisReport> {
        let prepared = self.prepare(pdf_path).await?;
        let results = self.answer_all(&prepared).await;
        let failed_answers = results.iter().filter(|result| result.is_failure()).count();

        let output_path = self.config.output_path();
        let output_file = write_csv_off_runtime(output_path, results).await?;
        info!(
            output = %output_file.display(),
            rows = prepared.questions.len(),
            failed_answers,
            "question/answer csv written"
        );

        Ok(AnalysisReport {
            output_file,
            question_count: prepared.questions.len(),
            failed_answers,
        })
    }
}

async fn write_csv_off_runtime(path: PathBuf, results: Vec<QaResult>) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || write_qa_csv(&path, &results))
        .await
        .map_err(|error| PipelineError::Task(error.to_string()))?
        .map_err(PipelineError::from)
}

#[async_trait]
impl DocumentAnalyzer for QaPipeline {
    async fn analyze(&self, pdf_path: &Path) -> Result<AnalysisReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("analysis", %run_id, path = %pdf_path.display());
        self.run(pdf_path).instrument(span).await
    }
}
