//! Fence-aware markdown cleanup.
//!
//! [`postprocess`] is the cosmetic pass applied to every finalized chunk:
//! bullets, bare links, and whitespace are normalized outside ``` fences while
//! fenced lines pass through verbatim. It is idempotent, which the segmenter
//! relies on when it re-runs over merged chunks.
//!
//! [`format_for_ingestion`] is the layout pass applied to item content just
//! before it leaves the pipeline.

use regex::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;

const FENCE: &str = "```";

static ATX_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})[ \t]+(\S.*)$").unwrap());
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*\u{2022}\u{25E6}\u{25AA}\u{1}\u{2}\u{3}]\s+").unwrap());
static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// A ``` line opening or closing a fenced block.
pub fn is_fence_delimiter(line: &str) -> bool {
    line.trim_start().starts_with(FENCE)
}

/// An ATX heading (`#` through `######`, then whitespace, then text) starting
/// at column zero.
pub fn is_atx_heading(line: &str) -> bool {
    ATX_HEADING.is_match(line.trim_end())
}

/// Heading text without its `#` markers, if `line` is an ATX heading.
pub fn heading_text(line: &str) -> Option<&str> {
    ATX_HEADING
        .captures(line.trim())
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().trim())
}

pub fn is_bullet_line(trimmed: &str) -> bool {
    BULLET.is_match(trimmed)
}

/// Normalize chunk markdown outside fences.
///
/// Lines are trimmed, bullet markers become `* `, bare `http(s)://` and
/// `www.` tokens become links, space runs collapse, and blank-line runs
/// collapse to a single blank line. An unterminated fence is closed.
pub fn postprocess(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_fence = false;
    let mut last_blank = false;

    for line in text.lines() {
        if is_fence_delimiter(line) {
            out.push(if in_fence {
                FENCE.to_string()
            } else {
                line.trim().to_string()
            });
            in_fence = !in_fence;
            last_blank = false;
            continue;
        }
        if in_fence {
            out.push(line.to_string());
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !last_blank {
                out.push(String::new());
            }
            last_blank = true;
            continue;
        }

        let bulleted = BULLET.replace(trimmed, "* ");
        let collapsed = SPACE_RUN.replace_all(&bulleted, " ");
        out.push(linkify(&collapsed));
        last_blank = false;
    }

    if in_fence {
        out.push(FENCE.to_string());
    }

    out.join("\n").trim().to_string()
}

/// Turn bare URL tokens into markdown links. Tokens that are already part of
/// a link (or wrapped in punctuation) are left alone.
fn linkify(line: &str) -> String {
    line.split(' ')
        .map(|token| {
            let (url, trailing) = split_trailing_punctuation(token);
            if url.starts_with("http://") || url.starts_with("https://") {
                format!("[{url}]({url}){trailing}")
            } else if url.starts_with("www.") && url.len() > 4 {
                format!("[{url}](http://{url}){trailing}")
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A closing `)` is trailing only when the token has no `(` to match it.
fn split_trailing_punctuation(token: &str) -> (&str, &str) {
    let mut url = token.trim_end_matches(['.', ',', ';', ':', '!', '?']);
    while url.ends_with(')') && url.matches('(').count() < url.matches(')').count() {
        url = url[..url.len() - 1].trim_end_matches(['.', ',', ';', ':', '!', '?']);
    }
    (url, &token[url.len()..])
}

/// Lay out item content for the ingestion payload.
///
/// Escaped `\n` sequences become real newlines, line endings are normalized,
/// fence delimiters get their own lines, and outside fences every non-empty
/// line is separated from the next by exactly one blank line. Fenced content
/// is left as is.
pub fn format_for_ingestion(text: &str) -> String {
    let text = text
        .replace("\\n", "\n")
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    let mut pending: VecDeque<String> = text.lines().map(str::to_string).collect();
    let mut out: Vec<String> = Vec::new();
    let mut in_fence = false;

    while let Some(line) = pending.pop_front() {
        let trimmed = line.trim_start();

        if in_fence {
            if trimmed.starts_with(FENCE) {
                let rest = trimmed[FENCE.len()..].trim();
                out.push(FENCE.to_string());
                in_fence = false;
                if !rest.is_empty() {
                    pending.push_front(rest.to_string());
                }
            } else {
                out.push(line);
            }
            continue;
        }

        if let Some(pos) = line.find(FENCE) {
            if !line[..pos].trim().is_empty() {
                pending.push_front(line[pos..].to_string());
                pending.push_front(line[..pos].trim_end().to_string());
                continue;
            }
        }

        if trimmed.is_empty() {
            if out.last().is_some_and(|l| !l.is_empty()) {
                out.push(String::new());
            }
            continue;
        }

        if out.last().is_some_and(|l| !l.is_empty()) {
            out.push(String::new());
        }
        if trimmed.starts_with(FENCE) {
            in_fence = true;
            out.push(trimmed.trim_end().to_string());
        } else {
            out.push(line.trim_end().to_string());
        }
    }

    out.join("\n").trim().to_string()
}
