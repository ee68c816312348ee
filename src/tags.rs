//! Per-chunk keyword tags.
//!
//! Three tiers, chosen once when the [`TagExtractor`] is built:
//!
//! 1. **NLP**: an injected [`NlpPipeline`] supplies noun phrases, named
//!    entities, and lemmatized tokens for each chunk.
//! 2. **TF-IDF**: a built-in vectorizer fitted jointly over every chunk of a
//!    document; each chunk takes its highest-weighted terms.
//! 3. **Disabled**: every chunk gets an empty tag list.
//!
//! Tagging never fails. An empty vocabulary (all stopwords) yields empty
//! tag lists.

use anyhow::{bail, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::config::TagsConfig;
use crate::models::Chunk;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst", "an",
    "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "anywhere", "are",
    "around", "as", "at", "back", "be", "became", "because", "become", "becomes", "been",
    "before", "beforehand", "behind", "being", "below", "beside", "besides", "between",
    "beyond", "both", "but", "by", "can", "cannot", "could", "did", "do", "does", "done",
    "down", "due", "during", "each", "either", "else", "elsewhere", "enough", "etc", "even",
    "ever", "every", "everyone", "everything", "everywhere", "except", "few", "first", "for",
    "former", "formerly", "from", "further", "get", "give", "go", "had", "has", "have", "he",
    "hence", "her", "here", "hereafter", "hereby", "herein", "hers", "herself", "him",
    "himself", "his", "how", "however", "i", "ie", "if", "in", "indeed", "into", "is", "it",
    "its", "itself", "just", "last", "latter", "least", "less", "ltd", "made", "many", "may",
    "me", "meanwhile", "might", "mine", "more", "moreover", "most", "mostly", "much", "must",
    "my", "myself", "namely", "neither", "never", "nevertheless", "next", "no", "nobody",
    "none", "nor", "not", "nothing", "now", "nowhere", "of", "off", "often", "on", "once",
    "one", "only", "onto", "or", "other", "others", "otherwise", "our", "ours", "ourselves",
    "out", "over", "own", "per", "perhaps", "please", "put", "rather", "re", "same", "see",
    "seem", "seemed", "seeming", "seems", "several", "she", "should", "since", "so", "some",
    "somehow", "someone", "something", "sometime", "sometimes", "somewhere", "still", "such",
    "than", "that", "the", "their", "them", "themselves", "then", "thence", "there",
    "thereafter", "thereby", "therefore", "therein", "these", "they", "this", "those",
    "though", "through", "throughout", "thru", "thus", "to", "together", "too", "toward",
    "towards", "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well", "were",
    "what", "whatever", "when", "whence", "whenever", "where", "whereas", "whereby", "wherein",
    "whether", "which", "while", "who", "whoever", "whole", "whom", "whose", "why", "will",
    "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

static STOPWORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ENGLISH_STOPWORDS.iter().copied().collect());

/// One token as seen by an NLP pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct NlpToken {
    pub lemma: String,
    pub is_alpha: bool,
    pub is_stop: bool,
}

/// Linguistic annotations for one text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NlpAnalysis {
    /// Lemmatized noun phrases.
    pub noun_phrases: Vec<String>,
    /// Named-entity surface text.
    pub entities: Vec<String>,
    pub tokens: Vec<NlpToken>,
}

/// An external NLP capability (tokenizer, lemmatizer, NER).
///
/// Implementations must be safe to share across threads; the extractor holds
/// one for its whole lifetime and never re-probes it.
pub trait NlpPipeline: Send + Sync {
    fn name(&self) -> &str;
    fn analyze(&self, text: &str) -> NlpAnalysis;
}

enum Backend {
    Nlp(Arc<dyn NlpPipeline>),
    TfIdf,
    Disabled,
}

/// Attaches keyword tags to chunks.
pub struct TagExtractor {
    backend: Backend,
    top_n: usize,
    max_features: usize,
}

impl TagExtractor {
    /// Pick the tagging tier. An injected NLP pipeline always wins;
    /// otherwise `tags.backend` chooses between TF-IDF and no tags.
    pub fn new(config: &TagsConfig, nlp: Option<Arc<dyn NlpPipeline>>) -> Result<Self> {
        let backend = match (nlp, config.backend.as_str()) {
            (Some(pipeline), _) => Backend::Nlp(pipeline),
            (None, "tfidf") => Backend::TfIdf,
            (None, "disabled") => Backend::Disabled,
            (None, other) => bail!(
                "Unknown tags backend: '{}'. Must be tfidf or disabled.",
                other
            ),
        };
        Ok(Self {
            backend,
            top_n: config.top_n,
            max_features: config.max_features,
        })
    }

    pub fn backend_name(&self) -> &str {
        match &self.backend {
            Backend::Nlp(pipeline) => pipeline.name(),
            Backend::TfIdf => "tfidf",
            Backend::Disabled => "disabled",
        }
    }

    /// Tags for each text, in input order.
    pub fn extract(&self, texts: &[&str]) -> Vec<Vec<String>> {
        match &self.backend {
            Backend::Nlp(pipeline) => texts
                .iter()
                .map(|text| nlp_tags(pipeline.as_ref(), text, self.top_n))
                .collect(),
            Backend::TfIdf => tfidf_tags(texts, self.top_n, self.max_features),
            Backend::Disabled => vec![Vec::new(); texts.len()],
        }
    }

    /// Extend each chunk's metadata tags with extracted ones.
    pub fn tag_chunks(&self, chunks: &mut [Chunk]) {
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let extracted = self.extract(&texts);
        debug!(backend = self.backend_name(), chunks = chunks.len(), "tagged chunks");

        for (chunk, tags) in chunks.iter_mut().zip(extracted) {
            for tag in tags {
                if !chunk.metadata.tags.contains(&tag) {
                    chunk.metadata.tags.push(tag);
                }
            }
        }
    }
}

fn nlp_tags(pipeline: &dyn NlpPipeline, text: &str, top_n: usize) -> Vec<String> {
    let analysis = pipeline.analyze(text);
    let mut tags: Vec<String> = Vec::new();

    for phrase in analysis.noun_phrases.iter().chain(&analysis.entities) {
        push_unique(&mut tags, phrase.trim().to_lowercase());
    }

    for token in &analysis.tokens {
        if tags.len() >= top_n {
            break;
        }
        if token.is_alpha && !token.is_stop {
            push_unique(&mut tags, token.lemma.trim().to_lowercase());
        }
    }

    tags.truncate(top_n);
    tags
}

fn push_unique(tags: &mut Vec<String>, tag: String) {
    if !tag.is_empty() && !tags.contains(&tag) {
        tags.push(tag);
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD.find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| !STOPWORDS.contains(*w))
        .map(str::to_string)
        .collect()
}

/// Fit TF-IDF over `texts` jointly and return the `top_n` positive-weight
/// terms of each text, highest weight first.
///
/// The vocabulary keeps the `max_features` most frequent terms across the
/// corpus. IDF is smoothed (`ln((1 + n) / (1 + df)) + 1`) and rows are
/// L2-normalized.
pub fn tfidf_tags(texts: &[&str], top_n: usize, max_features: usize) -> Vec<Vec<String>> {
    let docs: Vec<Vec<String>> = texts.iter().map(|t| tokenize(t)).collect();

    let mut corpus_counts: HashMap<&str, usize> = HashMap::new();
    for token in docs.iter().flatten() {
        *corpus_counts.entry(token.as_str()).or_insert(0) += 1;
    }
    if corpus_counts.is_empty() {
        return vec![Vec::new(); texts.len()];
    }

    let mut vocabulary: Vec<(&str, usize)> = corpus_counts.into_iter().collect();
    vocabulary.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    vocabulary.truncate(max_features);
    let vocabulary: HashSet<&str> = vocabulary.into_iter().map(|(term, _)| term).collect();

    let n = docs.len() as f64;
    let mut document_frequency: HashMap<&str, usize> = HashMap::new();
    for doc in &docs {
        let unique: HashSet<&str> = doc
            .iter()
            .map(String::as_str)
            .filter(|t| vocabulary.contains(*t))
            .collect();
        for term in unique {
            *document_frequency.entry(term).or_insert(0) += 1;
        }
    }

    docs.iter()
        .map(|doc| {
            let mut counts: HashMap<&str, f64> = HashMap::new();
            for term in doc.iter().map(String::as_str).filter(|t| vocabulary.contains(*t)) {
                *counts.entry(term).or_insert(0.0) += 1.0;
            }

            let mut weights: Vec<(&str, f64)> = counts
                .into_iter()
                .map(|(term, tf)| {
                    let df = document_frequency[term] as f64;
                    let idf = ((1.0 + n) / (1.0 + df)).ln() + 1.0;
                    (term, tf * idf)
                })
                .collect();

            let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                for (_, w) in &mut weights {
                    *w /= norm;
                }
            }

            weights.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            weights
                .into_iter()
                .filter(|(_, w)| *w > 0.0)
                .take(top_n)
                .map(|(term, _)| term.to_string())
                .collect()
        })
        .collect()
}
