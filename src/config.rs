//! TOML configuration.
//!
//! Every table and field carries a default, so an empty file (or no file at
//! all, via [`Config::default`]) yields a working pipeline. Heuristic pattern
//! lists live here as data; the modules that use them compile them once at
//! construction.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::models::AuthorMode;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub code: CodeConfig,
    #[serde(default)]
    pub tags: TagsConfig,
    #[serde(default)]
    pub author: AuthorConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SegmentationConfig {
    /// Line-record chunks (other than the first) shorter than this are folded
    /// into their predecessor. Text documents are never merged.
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,
    /// Percentile of observed PDF font sizes used as the heading font gate.
    #[serde(default = "default_heading_percentile")]
    pub heading_percentile: f64,
    /// Keep PDF lines that precede the first heading as an untitled chunk.
    #[serde(default = "default_true")]
    pub keep_preamble: bool,
    #[serde(default = "default_heading_patterns")]
    pub heading_patterns: Vec<String>,
    #[serde(default)]
    pub garbage_patterns: Vec<String>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            min_chunk_chars: default_min_chunk_chars(),
            heading_percentile: default_heading_percentile(),
            keep_preamble: true,
            heading_patterns: default_heading_patterns(),
            garbage_patterns: Vec::new(),
        }
    }
}

fn default_min_chunk_chars() -> usize {
    300
}
fn default_heading_percentile() -> f64 {
    0.9
}
fn default_true() -> bool {
    true
}

fn default_heading_patterns() -> Vec<String> {
    [
        r"(?i)^chapter\s*\d+",
        r"(?i)^section\s*\d+",
        r"(?i)^part\s*\d+",
        r"(?i)^ch\s*\d+",
        r"^\d+\.\s+",
        r"^\d+\s+",
        r"^\d+\.\d+",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CodeConfig {
    /// Phrases that mark a web line as navigation or boilerplate, never code.
    #[serde(default = "default_boilerplate_phrases")]
    pub boilerplate_phrases: Vec<String>,
    /// Statement keywords recognized at the start of a PDF line.
    #[serde(default = "default_pdf_keywords")]
    pub pdf_keywords: Vec<String>,
    /// DDL/DML keywords recognized anywhere in a web line (whole word).
    #[serde(default = "default_web_keywords")]
    pub web_keywords: Vec<String>,
    /// Minimum share of code punctuation among non-whitespace characters.
    #[serde(default = "default_punctuation_density")]
    pub punctuation_density: f64,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            boilerplate_phrases: default_boilerplate_phrases(),
            pdf_keywords: default_pdf_keywords(),
            web_keywords: default_web_keywords(),
            punctuation_density: default_punctuation_density(),
        }
    }
}

fn default_boilerplate_phrases() -> Vec<String> {
    [
        "quickstart",
        "navigation",
        "admin portal",
        "create a dashboard",
        "learn more",
        "search",
        "ask ai",
        "copy",
        "to create a read-only user",
        "do the following",
        "grant connect privileges",
        "grant usage on the schema",
        "grant select privileges",
        "the connection string",
        "go to",
        "if you're using",
        "for more information",
        "create a cleaned schema",
        "next steps",
        "once you have",
        "check out our guides",
        "build your first dashboard",
        "powered by",
        "on this page",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

const SQL_KEYWORDS: &[&str] = &[
    "CREATE", "GRANT", "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "USE", "SHOW",
    "DESCRIBE",
];

fn default_pdf_keywords() -> Vec<String> {
    let mut keywords = vec!["def".to_string(), "class".to_string()];
    keywords.extend(SQL_KEYWORDS.iter().map(|s| s.to_string()));
    keywords
}

fn default_web_keywords() -> Vec<String> {
    SQL_KEYWORDS.iter().map(|s| s.to_string()).collect()
}

fn default_punctuation_density() -> f64 {
    0.15
}

#[derive(Debug, Deserialize, Clone)]
pub struct TagsConfig {
    /// `tfidf` or `disabled`. An NLP pipeline is injected in code, not configured.
    #[serde(default = "default_tags_backend")]
    pub backend: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_max_features")]
    pub max_features: usize,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            backend: default_tags_backend(),
            top_n: default_top_n(),
            max_features: default_max_features(),
        }
    }
}

fn default_tags_backend() -> String {
    "tfidf".to_string()
}
fn default_top_n() -> usize {
    5
}
fn default_max_features() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthorConfig {
    #[serde(default = "default_author_mode")]
    pub mode: String,
    /// Pages of a paged source included in the author preview.
    #[serde(default = "default_preview_pages")]
    pub preview_pages: usize,
    /// Standalone lines that look like names but are known not to be.
    #[serde(default = "default_stop_phrases")]
    pub stop_phrases: Vec<String>,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            mode: default_author_mode(),
            preview_pages: default_preview_pages(),
            stop_phrases: default_stop_phrases(),
        }
    }
}

impl AuthorConfig {
    pub fn mode(&self) -> Result<AuthorMode> {
        self.mode.parse()
    }
}

fn default_author_mode() -> String {
    "balanced".to_string()
}
fn default_preview_pages() -> usize {
    10
}

fn default_stop_phrases() -> Vec<String> {
    [
        "beyond cracking",
        "coding interview",
        "technical interview",
        "careercup llc",
        "palo alto ca",
        "copyright",
        "all rights reserved",
        "introduction",
        "preface",
        "table of contents",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `openai` or `disabled`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_standard_model")]
    pub standard_model: String,
    #[serde(default = "default_advanced_model")]
    pub advanced_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: default_base_url(),
            standard_model: default_standard_model(),
            advanced_model: default_advanced_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_standard_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_advanced_model() -> String {
    "gpt-4".to_string()
}
fn default_timeout_secs() -> u64 {
    15
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let p = config.segmentation.heading_percentile;
    if !(p > 0.0 && p <= 1.0) {
        anyhow::bail!("segmentation.heading_percentile must be in (0.0, 1.0]");
    }

    let d = config.code.punctuation_density;
    if !(d > 0.0 && d <= 1.0) {
        anyhow::bail!("code.punctuation_density must be in (0.0, 1.0]");
    }

    if config.tags.top_n == 0 {
        anyhow::bail!("tags.top_n must be > 0");
    }
    if config.tags.max_features == 0 {
        anyhow::bail!("tags.max_features must be > 0");
    }
    match config.tags.backend.as_str() {
        "tfidf" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown tags backend: '{}'. Must be tfidf or disabled.",
            other
        ),
    }

    config.author.mode()?;
    if config.author.preview_pages == 0 {
        anyhow::bail!("author.preview_pages must be > 0");
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if config.llm.timeout_secs == 0 {
        anyhow::bail!("llm.timeout_secs must be > 0");
    }

    Ok(())
}
