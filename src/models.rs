//! Core data models used throughout docsplit.
//!
//! These types represent the documents, chunks, and ingestion items that flow
//! through the segmentation pipeline.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// One text line extracted from a paged source, with its typography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRecord {
    pub text: String,
    #[serde(default)]
    pub font_size: f64,
    #[serde(default)]
    pub vertical_position: Option<f64>,
    #[serde(default = "default_page_number")]
    pub page_number: u32,
}

fn default_page_number() -> u32 {
    1
}

impl LineRecord {
    pub fn new(text: impl Into<String>, font_size: f64, page_number: u32) -> Self {
        Self {
            text: text.into(),
            font_size,
            vertical_position: None,
            page_number,
        }
    }
}

/// Document body as supplied by the fetch/parse layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentContent {
    Text(String),
    Lines(Vec<LineRecord>),
}

impl Default for DocumentContent {
    fn default() -> Self {
        DocumentContent::Text(String::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

const PLACEHOLDER_TITLES: &[&str] = &["", "no title found", "untitled"];

/// The trimmed title, unless it is missing or a scraper placeholder.
pub fn meaningful_title(title: Option<&str>) -> Option<&str> {
    title.map(str::trim).filter(|t| {
        let lower = t.to_lowercase();
        !PLACEHOLDER_TITLES.contains(&lower.as_str())
    })
}

impl DocumentMetadata {
    /// Title if meaningful, else the source URL. Used to identify the
    /// document to the LLM author fallback.
    pub fn title_or_url(&self) -> &str {
        meaningful_title(self.title.as_deref())
            .or(self.source_url.as_deref())
            .unwrap_or("")
    }
}

/// Accepts `null`, a comma-separated string, or a list of strings.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTags {
        Joined(String),
        List(Vec<String>),
    }

    let raw: Option<RawTags> = Option::deserialize(deserializer)?;
    let tags = match raw {
        None => Vec::new(),
        Some(RawTags::Joined(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        Some(RawTags::List(list)) => list
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    };
    Ok(tags)
}

/// Read-only pipeline input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub content: DocumentContent,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn from_text(text: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            content: DocumentContent::Text(text.into()),
            metadata,
        }
    }

    pub fn from_lines(lines: Vec<LineRecord>, metadata: DocumentMetadata) -> Self {
        Self {
            content: DocumentContent::Lines(lines),
            metadata,
        }
    }
}

/// Cost/accuracy profile for the LLM author fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorMode {
    CostSaving,
    Balanced,
    Accuracy,
}

impl AuthorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorMode::CostSaving => "cost_saving",
            AuthorMode::Balanced => "balanced",
            AuthorMode::Accuracy => "accuracy",
        }
    }
}

impl fmt::Display for AuthorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "cost_saving" => Ok(AuthorMode::CostSaving),
            "balanced" => Ok(AuthorMode::Balanced),
            "accuracy" => Ok(AuthorMode::Accuracy),
            other => anyhow::bail!(
                "Unknown author mode: '{}'. Must be cost_saving, balanced, or accuracy.",
                other
            ),
        }
    }
}

/// How a document's author was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorMethod {
    RuleBased,
    ExternalLlm(AuthorMode),
    Fallback,
}

impl fmt::Display for AuthorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorMethod::RuleBased => f.write_str("rule_based"),
            AuthorMethod::ExternalLlm(mode) => write!(f, "external_llm_{}", mode),
            AuthorMethod::Fallback => f.write_str("fallback"),
        }
    }
}

impl Serialize for AuthorMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Document-level author resolution outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorResult {
    pub name: Option<String>,
    pub method: AuthorMethod,
}

impl AuthorResult {
    pub fn fallback() -> Self {
        Self {
            name: None,
            method: AuthorMethod::Fallback,
        }
    }
}

/// Document metadata as carried by each chunk, plus per-chunk resolutions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkMetadata {
    pub source_url: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub tags: Vec<String>,
    pub content_type: Option<String>,
    pub author_method: Option<AuthorMethod>,
}

impl From<&DocumentMetadata> for ChunkMetadata {
    fn from(meta: &DocumentMetadata) -> Self {
        Self {
            source_url: meta.source_url.clone(),
            title: meta.title.clone(),
            author: meta.author.clone(),
            date: meta.date.clone(),
            tags: meta.tags.clone(),
            content_type: meta.content_type.clone(),
            author_method: None,
        }
    }
}

impl ChunkMetadata {
    pub fn apply_author(&mut self, author: &AuthorResult) {
        self.author = author.name.clone();
        self.author_method = Some(author.method);
    }
}

/// A titled span of document content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub id: String,
    pub source_url: Option<String>,
    pub content: String,
    /// SHA-256 of `content`, kept in step by [`Chunk::set_content`].
    pub hash: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(content: String, metadata: ChunkMetadata) -> Self {
        let hash = content_hash(&content);
        Self {
            id: Uuid::new_v4().to_string(),
            source_url: metadata.source_url.clone(),
            content,
            hash,
            metadata,
        }
    }

    pub fn set_content(&mut self, content: String) {
        self.hash = content_hash(&content);
        self.content = content;
    }

    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Blog,
    PodcastTranscript,
    CallTranscript,
    LinkedinPost,
    RedditComment,
    Book,
    Other,
}

impl FromStr for ContentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "blog" => Ok(ContentType::Blog),
            "podcast_transcript" => Ok(ContentType::PodcastTranscript),
            "call_transcript" => Ok(ContentType::CallTranscript),
            "linkedin_post" => Ok(ContentType::LinkedinPost),
            "reddit_comment" => Ok(ContentType::RedditComment),
            "book" => Ok(ContentType::Book),
            "other" => Ok(ContentType::Other),
            other => anyhow::bail!("Unknown content type: '{}'", other),
        }
    }
}

/// Final ingestion record, one per chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub content: String,
    pub content_type: ContentType,
    pub source_url: Option<String>,
    pub author: String,
    pub author_method: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionPayload {
    pub team_id: String,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RawData {
    pub raw_text: String,
    pub metadata: DocumentMetadata,
}

/// Unprocessed document text and metadata, produced without chunking.
#[derive(Debug, Clone, Serialize)]
pub struct RawPayload {
    pub team_id: String,
    pub user_id: String,
    pub raw_data: RawData,
    pub extraction_timestamp: String,
}
