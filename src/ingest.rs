//! Pipeline orchestration.
//!
//! Coordinates the per-document flow: segmentation → merging → tagging →
//! author resolution → item assembly. A [`Pipeline`] is built once from
//! configuration (the only fallible step) and then processes any number of
//! documents. It holds no mutable state, so one instance can be shared
//! across threads.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::assemble;
use crate::author::AuthorResolver;
use crate::chunk::Segmenter;
use crate::config::Config;
use crate::llm::{self, LlmClient};
use crate::models::{AuthorMode, AuthorResult, Chunk, Document, IngestionPayload, Item, RawPayload};
use crate::tags::{NlpPipeline, TagExtractor};

pub struct Pipeline {
    segmenter: Segmenter,
    tagger: TagExtractor,
    resolver: AuthorResolver,
}

impl Pipeline {
    /// Build a pipeline with the LLM client named by `config.llm` and no NLP
    /// pipeline.
    pub fn new(config: &Config) -> Result<Self> {
        let llm: Arc<dyn LlmClient> = Arc::from(llm::create_client(&config.llm)?);
        Self::with_capabilities(config, llm, None)
    }

    /// Build a pipeline around caller-supplied capabilities.
    pub fn with_capabilities(
        config: &Config,
        llm: Arc<dyn LlmClient>,
        nlp: Option<Arc<dyn NlpPipeline>>,
    ) -> Result<Self> {
        let pipeline = Self {
            segmenter: Segmenter::new(config)?,
            tagger: TagExtractor::new(&config.tags, nlp)?,
            resolver: AuthorResolver::new(&config.author, llm)?,
        };
        debug!(
            tags = pipeline.tagger.backend_name(),
            author_mode = %pipeline.resolver.mode(),
            "pipeline ready"
        );
        Ok(pipeline)
    }

    pub fn with_author_mode(mut self, mode: AuthorMode) -> Self {
        self.resolver = self.resolver.with_mode(mode);
        self
    }

    pub fn author_mode(&self) -> AuthorMode {
        self.resolver.mode()
    }

    /// Segmented, merged, and tagged chunks. No author resolution.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let mut chunks = self.segmenter.chunk(document);
        self.tagger.tag_chunks(&mut chunks);
        chunks
    }

    pub fn resolve_author(&self, document: &Document) -> AuthorResult {
        self.resolver.resolve(document)
    }

    /// Chunks with the document's resolved author attached to each.
    ///
    /// The author is resolved only when there is at least one chunk.
    pub fn process(&self, document: &Document) -> Vec<Chunk> {
        let mut chunks = self.chunk(document);
        if chunks.is_empty() {
            return chunks;
        }

        let author = self.resolve_author(document);
        for chunk in &mut chunks {
            chunk.metadata.apply_author(&author);
        }
        info!(
            chunks = chunks.len(),
            method = %author.method,
            "processed document"
        );
        chunks
    }

    pub fn items(&self, document: &Document, user_id: &str) -> Vec<Item> {
        assemble::to_items(&self.process(document), user_id)
    }

    pub fn ingestion_payload(
        &self,
        document: &Document,
        team_id: &str,
        user_id: &str,
    ) -> IngestionPayload {
        assemble::ingestion_payload(team_id, self.items(document, user_id))
    }

    /// Pass-through payload. Never chunks and never resolves an author.
    pub fn raw_payload(&self, document: &Document, team_id: &str, user_id: &str) -> RawPayload {
        assemble::raw_payload(document, team_id, user_id)
    }
}
