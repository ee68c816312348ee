//! Document-level author resolution.
//!
//! Resolution is a two-step cascade run once per document:
//!
//! 1. **Rules.** A set of byline extractors (`By …`, `Author: …`,
//!    `Written by …`, mid-line `by …`, and standalone name-like lines) runs
//!    over a bounded preview of the document. Candidates are deduplicated and
//!    filtered through [`is_valid_human_name`]. Any survivor ends resolution
//!    with method `rule_based`.
//! 2. **LLM fallback.** Otherwise one chat completion is requested with the
//!    prompt, budget, and model tier of the active [`AuthorMode`]. `Unknown`,
//!    an empty answer, or any client error resolves to `fallback`.
//!
//! Resolution never fails.

use anyhow::Result;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::config::AuthorConfig;
use crate::llm::{CompletionRequest, LlmClient, ModelTier};
use crate::models::{
    AuthorMethod, AuthorMode, AuthorResult, Document, DocumentContent, LineRecord,
};

const NAME: &str = r"[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)+";

static BY_NAMES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b[Bb]y[ \t]+({NAME}(?:[ \t]+and[ \t]+{NAME})*)")).unwrap()
});
static AUTHOR_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i:author):[ \t]*({NAME})")).unwrap());
static WRITTEN_BY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i:written[ \t]+by)[ \t]+({NAME})")).unwrap());
static MID_LINE_BY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:by)[ \t]+([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)*)").unwrap()
});
static AND_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+and[ \t]+").unwrap());
static PROPER_CASE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*$").unwrap());
static ALL_CAPS_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z .\-]{4,}$").unwrap());
static BYLINE_OPENER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:by|author|written\s+by)\b").unwrap());

/// Bare keywords that the extractors can capture on their own.
const KEYWORDS: &[&str] = &["by", "author", "written", "co-author", "contributors"];

/// Which prompt the LLM fallback sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    /// Asks directly, from the title or URL alone.
    Simple,
    /// Asks the model to look the document up and validate the answer as a
    /// human name, with a content preview.
    Instructed,
}

/// Fixed cost/accuracy settings of an [`AuthorMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeProfile {
    pub content_length: usize,
    pub max_output_tokens: u32,
    pub tier: ModelTier,
    pub template: PromptTemplate,
}

pub fn mode_profile(mode: AuthorMode) -> ModeProfile {
    match mode {
        AuthorMode::CostSaving => ModeProfile {
            content_length: 2000,
            max_output_tokens: 64,
            tier: ModelTier::Standard,
            template: PromptTemplate::Simple,
        },
        AuthorMode::Balanced => ModeProfile {
            content_length: 5000,
            max_output_tokens: 128,
            tier: ModelTier::Standard,
            template: PromptTemplate::Instructed,
        },
        AuthorMode::Accuracy => ModeProfile {
            content_length: 10000,
            max_output_tokens: 256,
            tier: ModelTier::Advanced,
            template: PromptTemplate::Instructed,
        },
    }
}

pub fn render_prompt(template: PromptTemplate, title_or_url: &str, preview: &str) -> String {
    match template {
        PromptTemplate::Simple => format!(
            "Who is/are the author(s):\n{title_or_url}\n\n\
             If multiple authors, list them separated by commas.\n\
             Give me only the author name(s)."
        ),
        PromptTemplate::Instructed => format!(
            "You are an expert assistant in finding author names from documents. \
             You are given a title or a URL and a content preview.\n\
             You should use the internet to find the author name.\n\
             Task: Extract the name(s) of the author(s) by searching the internet based on \
             the title or the content preview.\n\n\
             If there are multiple authors, list them all separated by commas.\n\
             You are not allowed to make up an author name.\n\
             If there is only one author, provide just that name.\n\
             If no author can be determined, respond with \"Unknown\".\n\
             After finding the authors, re-analyze the content to check if it is a valid \
             human name. If not, remove the author from the list.\n\n\
             Respond only with the author name(s). Do not say anything else.\n\n\
             Title or URL: {title_or_url}\n\n\
             Content Preview:\n{preview}\n"
        ),
    }
}

/// Whether `name` plausibly names a person.
///
/// Rejects short strings, all-caps acronyms of up to three words, strings
/// with characters other than letters, spaces, `.`, `'` and `-`, and
/// anything that is not at least two words of the form `Xxxx`.
pub fn is_valid_human_name(name: &str) -> bool {
    let name = name.trim();
    if name.chars().count() < 5 {
        return false;
    }

    let parts: Vec<&str> = name.split_whitespace().collect();
    let squeezed: String = parts.concat();
    let all_caps = squeezed.chars().any(char::is_uppercase)
        && !squeezed.chars().any(char::is_lowercase);
    if all_caps && parts.len() <= 3 {
        return false;
    }

    if name
        .chars()
        .any(|c| !(c.is_alphabetic() || c.is_whitespace() || matches!(c, '.' | '\'' | '-')))
    {
        return false;
    }

    parts.len() >= 2
        && parts
            .iter()
            .filter(|p| p.chars().count() > 1)
            .all(|p| is_capitalized_word(p))
}

fn is_capitalized_word(word: &str) -> bool {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let rest = chars.as_str();
    first.is_uppercase()
        && rest.chars().any(char::is_alphabetic)
        && !rest.chars().any(char::is_uppercase)
}

/// The rule-based step of the cascade.
#[derive(Debug, Clone)]
pub struct BylineRules {
    stop_phrases: Vec<String>,
}

impl BylineRules {
    pub fn new(config: &AuthorConfig) -> Self {
        Self {
            stop_phrases: config
                .stop_phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .collect(),
        }
    }

    /// Raw candidates from every extractor, trimmed and deduplicated
    /// case-insensitively, before name validation.
    pub fn candidates(&self, preview: &str) -> Vec<String> {
        let mut raw: Vec<&str> = Vec::new();

        for caps in BY_NAMES.captures_iter(preview) {
            if let Some(names) = caps.get(1) {
                raw.extend(AND_SEPARATOR.split(names.as_str()));
            }
        }
        for re in [&*AUTHOR_LABEL, &*WRITTEN_BY, &*MID_LINE_BY] {
            raw.extend(re.captures_iter(preview).filter_map(|c| c.get(1)).map(|m| m.as_str()));
        }
        raw.extend(preview.lines().map(str::trim).filter(|l| self.is_name_line(l)));

        let mut unique: Vec<String> = Vec::new();
        for candidate in raw.into_iter().map(str::trim) {
            if candidate.chars().count() < 3 || KEYWORDS.contains(&candidate.to_lowercase().as_str())
            {
                continue;
            }
            if !unique.iter().any(|u| u.eq_ignore_ascii_case(candidate)) {
                unique.push(candidate.to_string());
            }
        }
        unique
    }

    fn is_name_line(&self, line: &str) -> bool {
        let words = line.split_whitespace().count();
        (2..=4).contains(&words)
            && (PROPER_CASE_LINE.is_match(line) || ALL_CAPS_LINE.is_match(line))
            && !BYLINE_OPENER.is_match(line)
            && !self.stop_phrases.contains(&line.to_lowercase())
    }

    /// Valid names found in `preview`, comma-joined.
    pub fn extract(&self, preview: &str) -> Option<String> {
        let names: Vec<String> = self
            .candidates(preview)
            .into_iter()
            .filter(|c| is_valid_human_name(c))
            .collect();
        (!names.is_empty()).then(|| names.join(", "))
    }
}

/// Resolves one author per document.
pub struct AuthorResolver {
    rules: BylineRules,
    mode: AuthorMode,
    preview_pages: usize,
    llm: Arc<dyn LlmClient>,
}

impl AuthorResolver {
    pub fn new(config: &AuthorConfig, llm: Arc<dyn LlmClient>) -> Result<Self> {
        Ok(Self {
            rules: BylineRules::new(config),
            mode: config.mode()?,
            preview_pages: config.preview_pages,
            llm,
        })
    }

    pub fn with_mode(mut self, mode: AuthorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> AuthorMode {
        self.mode
    }

    /// Bounded slice of the document used as resolution context.
    ///
    /// Text documents contribute their first `content_length` characters
    /// (the active mode's budget). Paged documents contribute their first
    /// `preview_pages` pages, each introduced by a `--- Page N ---` marker.
    pub fn preview(&self, document: &Document) -> String {
        match &document.content {
            DocumentContent::Text(text) => {
                let budget = mode_profile(self.mode).content_length;
                text.chars().take(budget).collect()
            }
            DocumentContent::Lines(lines) => page_preview(lines, self.preview_pages),
        }
    }

    pub fn resolve(&self, document: &Document) -> AuthorResult {
        let preview = self.preview(document);
        self.resolve_preview(document.metadata.title_or_url(), &preview)
    }

    /// Run the cascade over an already-built preview.
    pub fn resolve_preview(&self, title_or_url: &str, preview: &str) -> AuthorResult {
        if let Some(name) = self.rules.extract(preview) {
            info!(author = %name, "author resolved by byline rules");
            return AuthorResult {
                name: Some(name),
                method: AuthorMethod::RuleBased,
            };
        }

        let profile = mode_profile(self.mode);
        let preview = truncate_preview(preview, profile.content_length);
        let request = CompletionRequest {
            prompt: render_prompt(profile.template, title_or_url, &preview),
            max_tokens: profile.max_output_tokens,
            tier: profile.tier,
        };
        debug!(
            mode = %self.mode,
            provider = self.llm.name(),
            preview_chars = preview.chars().count(),
            "no byline found, asking LLM"
        );

        match self.llm.complete(&request) {
            Ok(answer) => {
                let answer = answer.trim();
                if answer.is_empty() || answer.eq_ignore_ascii_case("unknown") {
                    info!(mode = %self.mode, "LLM could not determine author");
                    AuthorResult::fallback()
                } else {
                    info!(author = %answer, mode = %self.mode, "author resolved by LLM");
                    AuthorResult {
                        name: Some(answer.to_string()),
                        method: AuthorMethod::ExternalLlm(self.mode),
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "LLM author lookup failed, using fallback");
                AuthorResult::fallback()
            }
        }
    }
}

fn truncate_preview(preview: &str, max_chars: usize) -> String {
    match preview.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &preview[..cut]),
        None => preview.to_string(),
    }
}

/// Concatenate the first `max_pages` distinct pages, in order of appearance.
fn page_preview(lines: &[LineRecord], max_pages: usize) -> String {
    let mut pages: Vec<(u32, Vec<&str>)> = Vec::new();
    for line in lines {
        if let Some((_, texts)) = pages.iter_mut().find(|(page, _)| *page == line.page_number) {
            texts.push(line.text.as_str());
        } else if pages.len() < max_pages {
            pages.push((line.page_number, vec![line.text.as_str()]));
        }
    }

    pages
        .into_iter()
        .map(|(page, texts)| format!("--- Page {} ---\n{}", page, texts.join("\n")))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::models::DocumentMetadata;
    use std::sync::Mutex;

    /// Records prompts and replays a fixed answer.
    struct ScriptedLlm {
        answer: Option<String>,
        prompts: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        fn answering(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Some(answer.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                answer: None,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<CompletionRequest> {
            self.prompts.lock().unwrap().clone()
        }
    }

    impl LlmClient for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }

        fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(request.clone());
            self.answer
                .clone()
                .ok_or_else(|| LlmError::InvalidResponse("boom".to_string()))
        }
    }

    fn resolver(llm: Arc<ScriptedLlm>) -> AuthorResolver {
        AuthorResolver::new(&AuthorConfig::default(), llm).unwrap()
    }

    #[test]
    fn test_name_validator() {
        assert!(is_valid_human_name("Aline Lerner"));
        assert!(is_valid_human_name("Gayle Laakmann Mcdowell"));
        assert!(!is_valid_human_name("J. Doe"));
        assert!(!is_valid_human_name("NASA JPL"));
        assert!(!is_valid_human_name("C C I"));
        assert!(!is_valid_human_name("Jane"));
        assert!(!is_valid_human_name("Jane Sm1th"));
        assert!(!is_valid_human_name("Jane SMITH"));
        assert!(is_valid_human_name("Jane Q Public"));
    }

    #[test]
    fn test_byline_candidates() {
        let rules = BylineRules::new(&AuthorConfig::default());
        let text = "A Post\nBy Jane Smith and John Doe\nAuthor: Ada Lovelace\n\
                    Notes written by Grace Hopper today";
        let candidates = rules.candidates(text);
        assert_eq!(
            &candidates[..4],
            &["Jane Smith", "John Doe", "Grace Hopper", "Ada Lovelace"]
        );
        assert_eq!(
            rules.extract(text).as_deref(),
            Some("Jane Smith, John Doe, Grace Hopper, Ada Lovelace")
        );
    }

    #[test]
    fn test_names_do_not_cross_lines() {
        let rules = BylineRules::new(&AuthorConfig::default());
        assert_eq!(rules.extract("Posted by Jane\nSmith wrote more"), None);
    }

    #[test]
    fn test_standalone_name_lines() {
        let rules = BylineRules::new(&AuthorConfig::default());
        let text = "CRACKING THE CODING INTERVIEW\nGayle Laakmann Mcdowell\nTable Of Contents";
        assert_eq!(rules.extract(text).as_deref(), Some("Gayle Laakmann Mcdowell"));

        let stop = "Technical Interview\nAll Rights Reserved";
        assert_eq!(rules.candidates(stop), Vec::<String>::new());
    }

    #[test]
    fn test_rule_based_short_circuits_llm() {
        let llm = ScriptedLlm::answering("Someone Else");
        let result = resolver(llm.clone()).resolve_preview("t", "Intro\nBy Jane Smith\nBody text");
        assert_eq!(result.name.as_deref(), Some("Jane Smith"));
        assert_eq!(result.method, AuthorMethod::RuleBased);
        assert!(llm.calls().is_empty());
    }

    #[test]
    fn test_llm_unknown_is_fallback() {
        let llm = ScriptedLlm::answering("Unknown");
        let result = resolver(llm.clone()).resolve_preview("t", "no byline here at all");
        assert_eq!(result, AuthorResult::fallback());
        assert_eq!(llm.calls().len(), 1);

        let result = resolver(ScriptedLlm::answering("  \n")).resolve_preview("t", "nothing");
        assert_eq!(result, AuthorResult::fallback());
    }

    #[test]
    fn test_llm_error_is_fallback() {
        let result = resolver(ScriptedLlm::failing()).resolve_preview("t", "nothing");
        assert_eq!(result, AuthorResult::fallback());
    }

    #[test]
    fn test_llm_answer_uses_mode_profile() {
        let llm = ScriptedLlm::answering(" Aline Lerner \n");
        let result = resolver(llm.clone())
            .with_mode(AuthorMode::Accuracy)
            .resolve_preview("https://example.com/post", &"x".repeat(12_000));
        assert_eq!(result.name.as_deref(), Some("Aline Lerner"));
        assert_eq!(result.method.to_string(), "external_llm_accuracy");

        let calls = llm.calls();
        assert_eq!(calls[0].max_tokens, 256);
        assert_eq!(calls[0].tier, ModelTier::Advanced);
        assert!(calls[0].prompt.contains("Title or URL: https://example.com/post"));
        assert!(calls[0].prompt.contains(&format!("{}...", "x".repeat(10_000))));
        assert!(!calls[0].prompt.contains(&"x".repeat(10_001)));
    }

    #[test]
    fn test_cost_saving_prompt_omits_preview() {
        let llm = ScriptedLlm::answering("Unknown");
        resolver(llm.clone())
            .with_mode(AuthorMode::CostSaving)
            .resolve_preview("My Title", "secret preview words");
        let calls = llm.calls();
        assert_eq!(calls[0].max_tokens, 64);
        assert!(calls[0].prompt.contains("My Title"));
        assert!(!calls[0].prompt.contains("secret preview words"));
    }

    #[test]
    fn test_text_preview_bounded_by_mode() {
        let r = resolver(ScriptedLlm::answering("Unknown")).with_mode(AuthorMode::CostSaving);
        let doc = Document::from_text("é".repeat(3000), DocumentMetadata::default());
        assert_eq!(r.preview(&doc).chars().count(), 2000);
    }

    #[test]
    fn test_page_preview_limits_pages() {
        let config = AuthorConfig {
            preview_pages: 2,
            ..Default::default()
        };
        let r = AuthorResolver::new(&config, ScriptedLlm::answering("Unknown")).unwrap();
        let lines = vec![
            LineRecord::new("Title", 20.0, 1),
            LineRecord::new("By Jane Smith", 11.0, 1),
            LineRecord::new("Page two", 11.0, 2),
            LineRecord::new("Page three", 11.0, 3),
        ];
        let doc = Document::from_lines(lines, DocumentMetadata::default());
        assert_eq!(
            r.preview(&doc),
            "--- Page 1 ---\nTitle\nBy Jane Smith\n\n--- Page 2 ---\nPage two"
        );
        assert_eq!(r.resolve(&doc).name.as_deref(), Some("Jane Smith"));
    }
}
