use crate::error::AnswerGenerationError;
use crate::prompts;
use crate::traits::{ChatModel, Retriever};
use std::sync::Arc;
use tracing::debug;

/// Answers one question from the chunks the retriever returns for it.
pub struct AnswerGenerator {
    model: Arc<dyn ChatModel>,
    retriever: Arc<dyn Retriever>,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn ChatModel>, retriever: Arc<dyn Retriever>) -> Self {
        Self { model, retriever }
    }

    pub async fn answer(&self, question: &str) -> Result<String, AnswerGenerationError> {
        let hits = self
            .retriever
            .retrieve(question)
            .await
            .map_err(AnswerGenerationError::Retrieval)?;
        debug!(context_chunks = hits.len(), "context retrieved");

        let messages =
            prompts::answer_messages(question, hits.iter().map(|hit| hit.chunk.text.as_str()));
        self.model
            .complete(&messages)
            .await
            .map_err(AnswerGenerationError::Model)
    }
}
