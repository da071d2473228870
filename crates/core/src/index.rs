use crate::embeddings::Embedder;
use crate::error::{IndexBuildError, ModelError};
use crate::models::{Chunk, Embedding, ScoredChunk};
use crate::traits::Retriever;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Exact in-memory index ranking chunks by squared L2 distance to the query.
pub struct VectorIndex {
    entries: Vec<(Chunk, Embedding)>,
    dimensions: usize,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl VectorIndex {
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: Arc<dyn Embedder>,
        top_k: usize,
    ) -> Result<Self, IndexBuildError> {
        if chunks.is_empty() {
            return Err(IndexBuildError::Empty);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = embedder.embed_documents(&texts).await?;
        let index = Self::from_embeddings(chunks, embeddings, embedder, top_k)?;

        info!(
            chunks = index.len(),
            dimensions = index.dimensions,
            top_k,
            "vector index built"
        );
        Ok(index)
    }

    pub fn from_embeddings(
        chunks: Vec<Chunk>,
        embeddings: Vec<Embedding>,
        embedder: Arc<dyn Embedder>,
        top_k: usize,
    ) -> Result<Self, IndexBuildError> {
        if chunks.len() != embeddings.len() {
            return Err(IndexBuildError::CountMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }

        let dimensions = embeddings.first().map(Vec::len).ok_or(IndexBuildError::Empty)?;
        for (chunk, embedding) in chunks.iter().zip(&embeddings) {
            if embedding.len() != dimensions {
                return Err(IndexBuildError::DimensionMismatch {
                    chunk_index: chunk.chunk_index,
                    expected: dimensions,
                    found: embedding.len(),
                });
            }
        }

        Ok(Self {
            entries: chunks.into_iter().zip(embeddings).collect(),
            dimensions,
            embedder,
            top_k: top_k.max(1),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Nearest `k` chunks, closest first; equal distances keep insertion order.
    pub fn search_by_vector(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, ModelError> {
        if query.len() != self.dimensions {
            return Err(ModelError::InvalidResponse(format!(
                "query vector dim {} is not {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, (_, vector))| (position, squared_l2(query, vector)))
            .collect();
        scored.sort_by(|left, right| left.1.total_cmp(&right.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(position, distance)| ScoredChunk {
                chunk: self.entries[position].0.clone(),
                distance,
            })
            .collect())
    }
}

#[async_trait]
impl Retriever for VectorIndex {
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>, ModelError> {
        let vector = self.embedder.embed_query(query).await?;
        self.search_by_vector(&vector, self.top_k)
    }
}

fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| (a - b) * (a - b))
        .sum()
}
