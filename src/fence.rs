//! Code-fence normalizer.
//!
//! Finds runs of code-like lines outside existing ``` fences and wraps each
//! run in a fence of its own. Existing fences are passed through untouched,
//! so running the normalizer over its own output changes nothing.
//!
//! Classification is mode-specific. PDF text loses most punctuation cues
//! during extraction, so [`FenceMode::Pdf`] only looks at statement keywords,
//! deep indentation, and shell prompts. Scraped web text keeps its
//! punctuation but is full of navigation chrome, so [`FenceMode::Web`] first
//! rejects boilerplate phrases and then looks at punctuation density,
//! indentation, REPL markers, SQL keywords, and credentialed URLs.

use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;

use crate::config::CodeConfig;
use crate::markdown::{is_atx_heading, is_bullet_line, is_fence_delimiter};

const FENCE: &str = "```";

static REPL_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:>>>|\$|--|\|)").unwrap());
static CREDENTIAL_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"://\S*@\S*:").unwrap());
static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]\s]*)\]\([^)\s]*\)").unwrap());

const CODE_PUNCTUATION: &[char] = &[
    ';', '{', '}', '<', '>', '=', '(', ')', '[', ']', '`', '@', '$', '#',
];

/// Which classification rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceMode {
    Web,
    Pdf,
}

/// Compiled code-line classification rules.
#[derive(Debug, Clone)]
pub struct CodeRules {
    boilerplate: Vec<String>,
    pdf_statement: Regex,
    web_keyword: Regex,
    punctuation_density: f64,
}

impl CodeRules {
    pub fn new(config: &CodeConfig) -> Result<Self> {
        let pdf_statement = Regex::new(&format!(r"^(?:{})\s", alternation(&config.pdf_keywords)))
            .context("failed to compile pdf statement keyword regex")?;
        let web_keyword = Regex::new(&format!(r"\b(?:{})\b", alternation(&config.web_keywords)))
            .context("failed to compile web keyword regex")?;

        Ok(Self {
            boilerplate: config
                .boilerplate_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            pdf_statement,
            web_keyword,
            punctuation_density: config.punctuation_density,
        })
    }

    /// Whether a single line looks like code under `mode`. Blank lines never do.
    pub fn is_code_line(&self, line: &str, mode: FenceMode) -> bool {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return false;
        }
        match mode {
            FenceMode::Pdf => self.is_pdf_code_line(line, trimmed),
            FenceMode::Web => self.is_web_code_line(line, trimmed),
        }
    }

    fn is_pdf_code_line(&self, line: &str, trimmed: &str) -> bool {
        self.pdf_statement.is_match(trimmed)
            || leading_whitespace(line) >= 4
            || trimmed.starts_with(['$', '#'])
    }

    fn is_web_code_line(&self, line: &str, trimmed: &str) -> bool {
        let lower = trimmed.to_lowercase();
        if self.boilerplate.iter().any(|phrase| lower.contains(phrase.as_str())) {
            return false;
        }
        if is_atx_heading(trimmed) {
            return false;
        }

        self.is_punctuation_dense(trimmed)
            || trimmed.ends_with([';', '{', '}'])
            || (leading_whitespace(line) >= 2 && !is_bullet_line(trimmed))
            || REPL_MARKER.is_match(trimmed)
            || self.web_keyword.is_match(trimmed)
            || CREDENTIAL_URL.is_match(trimmed)
    }

    /// Link syntax is counted as its text only.
    fn is_punctuation_dense(&self, trimmed: &str) -> bool {
        let unlinked = MARKDOWN_LINK.replace_all(trimmed, "$1");
        let mut visible = 0usize;
        let mut punctuation = 0usize;
        for c in unlinked.chars().filter(|c| !c.is_whitespace()) {
            visible += 1;
            if CODE_PUNCTUATION.contains(&c) {
                punctuation += 1;
            }
        }
        punctuation >= 2 && punctuation as f64 / visible as f64 >= self.punctuation_density
    }

    /// Wrap every run of code-like lines outside existing fences in a fence.
    ///
    /// A blank line ends the current run and is kept outside the fence.
    pub fn normalize(&self, text: &str, mode: FenceMode) -> String {
        let mut output: Vec<&str> = Vec::new();
        let mut buffer: Vec<&str> = Vec::new();
        let mut in_fence = false;

        for line in text.lines() {
            if is_fence_delimiter(line) {
                flush_code_run(&mut buffer, &mut output);
                output.push(line);
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                output.push(line);
                continue;
            }
            if self.is_code_line(line, mode) {
                buffer.push(line);
            } else {
                flush_code_run(&mut buffer, &mut output);
                output.push(line);
            }
        }
        flush_code_run(&mut buffer, &mut output);

        output.join("\n")
    }
}

fn flush_code_run<'a>(buffer: &mut Vec<&'a str>, output: &mut Vec<&'a str>) {
    let start = output.len();
    output.extend(buffer.drain(..).filter(|l| !l.trim().is_empty()));
    if output.len() > start {
        output.insert(start, FENCE);
        output.push(FENCE);
    }
}

fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

fn alternation(words: &[String]) -> String {
    if words.is_empty() {
        // Matches nothing.
        return r"\b\B".to_string();
    }
    words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> CodeRules {
        CodeRules::new(&CodeConfig::default()).unwrap()
    }

    #[test]
    fn test_web_wraps_indented_command() {
        let text = "Install it with pip\n  pip install docsplit\nThen you are done";
        let out = rules().normalize(text, FenceMode::Web);
        assert_eq!(
            out,
            "Install it with pip\n```\n  pip install docsplit\n```\nThen you are done"
        );
    }

    #[test]
    fn test_web_keeps_headings_and_prose() {
        let text = "# Intro\nHello world\n\n## Details\nPlain words here";
        assert_eq!(rules().normalize(text, FenceMode::Web), text);
    }

    #[test]
    fn test_web_dense_punctuation_and_sql() {
        let r = rules();
        assert!(r.is_code_line("let x = foo(bar);", FenceMode::Web));
        assert!(r.is_code_line("SELECT id FROM users", FenceMode::Web));
        assert!(r.is_code_line(">>> import docsplit", FenceMode::Web));
        assert!(r.is_code_line("postgres://admin@db.internal:5432/app", FenceMode::Web));
        assert!(!r.is_code_line("Please select an option below", FenceMode::Web));
        assert!(!r.is_code_line("  - nested bullet", FenceMode::Web));
    }

    #[test]
    fn test_web_boilerplate_is_never_code() {
        let r = rules();
        assert!(!r.is_code_line("Copy the SELECT statement;", FenceMode::Web));
        assert!(!r.is_code_line("  On this page", FenceMode::Web));
    }

    #[test]
    fn test_pdf_rules() {
        let r = rules();
        assert!(r.is_code_line("def main():", FenceMode::Pdf));
        assert!(r.is_code_line("CREATE TABLE users (id int)", FenceMode::Pdf));
        assert!(r.is_code_line("    return value", FenceMode::Pdf));
        assert!(r.is_code_line("$ cargo build", FenceMode::Pdf));
        assert!(!r.is_code_line("Define the problem first.", FenceMode::Pdf));
        assert!(!r.is_code_line("x = compute(y);", FenceMode::Pdf));
    }

    #[test]
    fn test_blank_line_ends_code_run() {
        let text = "Example:\ndef a():\n\n    pass\nDone";
        let out = rules().normalize(text, FenceMode::Pdf);
        assert_eq!(
            out,
            "Example:\n```\ndef a():\n```\n\n```\n    pass\n```\nDone"
        );
    }

    #[test]
    fn test_existing_fence_not_rewrapped() {
        let text = "Intro\n```\nlet x = 1;\n  indented();\n```\nOutro";
        let r = rules();
        let once = r.normalize(text, FenceMode::Web);
        assert_eq!(once, text);
        assert_eq!(r.normalize(&once, FenceMode::Web), once);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let text = "Run this\n  cargo test --all\n  cargo fmt\nThat is all";
        let r = rules();
        let once = r.normalize(text, FenceMode::Web);
        assert_eq!(once.matches("```").count(), 2);
        assert_eq!(r.normalize(&once, FenceMode::Web), once);
    }

    #[test]
    fn test_link_syntax_not_counted_as_code() {
        let r = rules();
        assert!(!r.is_code_line("[http://a.io](http://a.io)", FenceMode::Web));
        assert!(!r.is_code_line("See [www.x.io](http://www.x.io) today", FenceMode::Web));
        assert!(r.is_code_line("[x](y) = f(a[0]);", FenceMode::Web));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(rules().normalize("", FenceMode::Web), "");
    }
}
