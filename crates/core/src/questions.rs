use crate::error::GenerationError;
use crate::models::Chunk;
use crate::prompts;
use crate::traits::ChatModel;
use futures::{stream, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info};

/// Refine-style question drafting over the ordered question chunks.
pub struct QuestionGenerator {
    model: Arc<dyn ChatModel>,
}

impl QuestionGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// The first chunk seeds a draft; every later chunk refines it. Any model
    /// failure aborts generation for the whole document.
    pub async fn generate(&self, chunks: &[Chunk]) -> Result<String, GenerationError> {
        let (first, rest) = chunks.split_first().ok_or(GenerationError::EmptyInput)?;

        let seed = self
            .model
            .complete(&prompts::question_messages(&first.text))
            .await
            .map_err(|source| GenerationError::Model {
                chunk_index: first.chunk_index,
                source,
            })?;
        debug!(chunk = first.chunk_index, "initial question draft");

        let draft = stream::iter(rest.iter().map(Ok::<&Chunk, GenerationError>))
            .try_fold(seed, |draft, chunk| async move {
                let refined = self
                    .model
                    .complete(&prompts::refine_messages(&draft, &chunk.text))
                    .await
                    .map_err(|source| GenerationError::Model {
                        chunk_index: chunk.chunk_index,
                        source,
                    })?;
                debug!(chunk = chunk.chunk_index, "question draft refined");
                Ok(refined)
            })
            .await?;

        info!(chunks = chunks.len(), "question draft complete");
        Ok(draft)
    }
}

/// Keeps trimmed, non-empty lines ending in `?` or `.`; duplicates are kept.
pub fn filter_questions(raw: &str) -> Vec<String> {
    raw.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty() && (line.ends_with('?') || line.ends_with('.')))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::traits::ChatMessage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies from a fixed script and records every prompt it saw.
    pub(crate) struct ScriptedChat {
        replies: Mutex<Vec<Result<String, ModelError>>>,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl ScriptedChat {
        pub(crate) fn new(replies: Vec<Result<String, ModelError>>) -> Self {
            let mut replies = replies;
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChat {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
            let prompt = messages
                .iter()
                .map(|message| message.content.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            self.prompts.lock().expect("prompt log").push(prompt);
            self.replies
                .lock()
                .expect("reply script")
                .pop()
                .unwrap_or_else(|| Err(ModelError::InvalidResponse("script exhausted".to_string())))
        }
    }

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            chunk_id: format!("q-{index}"),
            chunk_index: index,
            parent_index: None,
            token_count: text.len(),
            text: text.to_string(),
        }
    }

    #[test]
    fn filter_keeps_only_terminated_lines() {
        let raw = "What is X?\nThis is a note\nDefine Y.\n";
        assert_eq!(filter_questions(raw), vec!["What is X?", "Define Y."]);
    }

    #[test]
    fn filter_trims_and_keeps_duplicates() {
        let raw = "  What is X?  \r\n\n   \nWhat is X?\n1. Explain Z:";
        assert_eq!(filter_questions(raw), vec!["What is X?", "What is X?"]);
    }

    #[test]
    fn filter_of_empty_text_is_empty() {
        assert!(filter_questions("").is_empty());
    }

    #[tokio::test]
    async fn each_chunk_refines_the_previous_draft() -> Result<(), GenerationError> {
        let model = Arc::new(ScriptedChat::new(vec![
            Ok("draft-1".to_string()),
            Ok("draft-2".to_string()),
            Ok("draft-3".to_string()),
        ]));
        let generator = QuestionGenerator::new(model.clone());

        let output = generator
            .generate(&[chunk(0, "alpha"), chunk(1, "beta"), chunk(2, "gamma")])
            .await?;
        assert_eq!(output, "draft-3");

        let prompts = model.prompts.lock().expect("prompt log");
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("alpha"));
        assert!(prompts[1].contains("draft-1") && prompts[1].contains("beta"));
        assert!(prompts[2].contains("draft-2") && prompts[2].contains("gamma"));
        Ok(())
    }

    #[tokio::test]
    async fn a_failed_refinement_aborts_generation() {
        let model = Arc::new(ScriptedChat::new(vec![
            Ok("draft-1".to_string()),
            Err(ModelError::Api {
                status: 400,
                details: "context length exceeded".to_string(),
            }),
            Ok("never used".to_string()),
        ]));
        let generator = QuestionGenerator::new(model);

        let result = generator
            .generate(&[chunk(0, "alpha"), chunk(1, "beta"), chunk(2, "gamma")])
            .await;
        assert!(matches!(
            result,
            Err(GenerationError::Model { chunk_index: 1, .. })
        ));
    }

    #[tokio::test]
    async fn no_chunks_is_an_error() {
        let generator = QuestionGenerator::new(Arc::new(ScriptedChat::new(Vec::new())));
        assert!(matches!(
            generator.generate(&[]).await,
            Err(GenerationError::EmptyInput)
        ));
    }
}
