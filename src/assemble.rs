//! Chunk → [`Item`] conversion and payload envelopes.
//!
//! Items are the final records handed to the ingestion writer. Each one gets
//! a title, a content type guessed from metadata or source, ingestion-ready
//! markdown, and the document-level author. [`raw_payload`] is the
//! pass-through alternative that skips chunking and author resolution.

use chrono::Utc;

use crate::chunk::join_wrapped_lines;
use crate::markdown::{format_for_ingestion, heading_text, is_fence_delimiter};
use crate::models::{
    meaningful_title, Chunk, ChunkMetadata, ContentType, Document, DocumentContent,
    IngestionPayload, Item, RawData, RawPayload,
};

pub const DEFAULT_USER_ID: &str = "default_user";

const MAX_METADATA_TITLE_CHARS: usize = 120;
const MAX_LINE_TITLE_CHARS: usize = 80;

/// Title for a chunk: metadata title, then first heading, then first line.
pub fn extract_title(content: &str, metadata: &ChunkMetadata) -> String {
    if let Some(title) = meaningful_title(metadata.title.as_deref()) {
        return title.chars().take(MAX_METADATA_TITLE_CHARS).collect();
    }

    let mut in_fence = false;
    for line in content.lines() {
        if is_fence_delimiter(line) {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence {
            if let Some(heading) = heading_text(line) {
                return heading.to_string();
            }
        }
    }

    content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.chars().take(MAX_LINE_TITLE_CHARS).collect())
        .unwrap_or_else(|| "Untitled".to_string())
}

pub fn guess_content_type(chunk: &Chunk) -> ContentType {
    if let Some(explicit) = chunk
        .metadata
        .content_type
        .as_deref()
        .and_then(|t| t.trim().parse().ok())
    {
        return explicit;
    }

    let Some(source) = chunk.source_url.as_deref() else {
        return ContentType::Other;
    };
    let lower = source.to_lowercase();
    if lower.contains(".pdf") || lower.contains("book") {
        ContentType::Book
    } else if lower.starts_with("http://") || lower.starts_with("https://") {
        ContentType::Blog
    } else {
        ContentType::Other
    }
}

/// One item per chunk, in chunk order. A blank `user_id` becomes
/// [`DEFAULT_USER_ID`].
pub fn to_items(chunks: &[Chunk], user_id: &str) -> Vec<Item> {
    let user_id = if user_id.trim().is_empty() {
        DEFAULT_USER_ID
    } else {
        user_id
    };

    chunks
        .iter()
        .map(|chunk| Item {
            title: extract_title(&chunk.content, &chunk.metadata),
            content: format_for_ingestion(&chunk.content),
            content_type: guess_content_type(chunk),
            source_url: chunk.source_url.clone(),
            author: chunk.metadata.author.clone().unwrap_or_default(),
            author_method: chunk
                .metadata
                .author_method
                .map(|m| m.to_string())
                .unwrap_or_default(),
            user_id: user_id.to_string(),
        })
        .collect()
}

pub fn ingestion_payload(team_id: &str, items: Vec<Item>) -> IngestionPayload {
    IngestionPayload {
        team_id: team_id.to_string(),
        items,
    }
}

/// Unprocessed document text plus metadata. Paged sources contribute their
/// line texts after wrapped lines are rejoined, one per line.
pub fn raw_payload(document: &Document, team_id: &str, user_id: &str) -> RawPayload {
    let raw_text = match &document.content {
        DocumentContent::Text(text) => text.clone(),
        DocumentContent::Lines(lines) => join_wrapped_lines(lines)
            .into_iter()
            .map(|l| l.text)
            .collect::<Vec<_>>()
            .join("\n"),
    };

    RawPayload {
        team_id: team_id.to_string(),
        user_id: if user_id.trim().is_empty() {
            DEFAULT_USER_ID.to_string()
        } else {
            user_id.to_string()
        },
        raw_data: RawData {
            raw_text,
            metadata: document.metadata.clone(),
        },
        extraction_timestamp: Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthorMethod, AuthorMode, AuthorResult, DocumentMetadata, LineRecord};

    fn chunk(content: &str, source: Option<&str>) -> Chunk {
        Chunk::new(
            content.to_string(),
            ChunkMetadata {
                source_url: source.map(str::to_string),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_title_prefers_metadata() {
        let meta = ChunkMetadata {
            title: Some(format!("  {}  ", "T".repeat(200))),
            ..Default::default()
        };
        assert_eq!(extract_title("# Heading", &meta), "T".repeat(120));

        let placeholder = ChunkMetadata {
            title: Some("No Title Found".to_string()),
            ..Default::default()
        };
        assert_eq!(extract_title("# Heading\nbody", &placeholder), "Heading");
    }

    #[test]
    fn test_title_skips_fenced_comments() {
        let meta = ChunkMetadata::default();
        let content = "Intro line\n```\n# just a comment\n```\n## Real Heading";
        assert_eq!(extract_title(content, &meta), "Real Heading");
    }

    #[test]
    fn test_title_first_line_and_untitled() {
        let meta = ChunkMetadata::default();
        let long = format!("\n  {}\nmore", "w".repeat(100));
        assert_eq!(extract_title(&long, &meta), "w".repeat(80));
        assert_eq!(extract_title("   \n", &meta), "Untitled");
    }

    #[test]
    fn test_content_type_guess() {
        assert_eq!(
            guess_content_type(&chunk("x", Some("https://example.com/post"))),
            ContentType::Blog
        );
        assert_eq!(
            guess_content_type(&chunk("x", Some("/tmp/Guide.PDF"))),
            ContentType::Book
        );
        assert_eq!(
            guess_content_type(&chunk("x", Some("https://books.example.com/ch1"))),
            ContentType::Book
        );
        assert_eq!(guess_content_type(&chunk("x", Some("notes.txt"))), ContentType::Other);
        assert_eq!(guess_content_type(&chunk("x", None)), ContentType::Other);

        let mut explicit = chunk("x", Some("https://example.com/post"));
        explicit.metadata.content_type = Some("podcast_transcript".to_string());
        assert_eq!(guess_content_type(&explicit), ContentType::PodcastTranscript);
        explicit.metadata.content_type = Some("tweet".to_string());
        assert_eq!(guess_content_type(&explicit), ContentType::Blog);
    }

    #[test]
    fn test_items_carry_author() {
        let mut c = chunk("## Intro\nHello there", Some("https://example.com"));
        c.metadata.apply_author(&AuthorResult {
            name: Some("Jane Smith".to_string()),
            method: AuthorMethod::ExternalLlm(AuthorMode::Balanced),
        });
        let unresolved = {
            let mut u = chunk("Body", None);
            u.metadata.apply_author(&AuthorResult::fallback());
            u
        };

        let items = to_items(&[c, unresolved], "  ");
        assert_eq!(items[0].title, "Intro");
        assert_eq!(items[0].content, "## Intro\n\nHello there");
        assert_eq!(items[0].author, "Jane Smith");
        assert_eq!(items[0].author_method, "external_llm_balanced");
        assert_eq!(items[0].user_id, DEFAULT_USER_ID);
        assert_eq!(items[1].author, "");
        assert_eq!(items[1].author_method, "fallback");

        let payload = ingestion_payload("team-7", items);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["team_id"], "team-7");
        assert_eq!(json["items"][0]["content_type"], "blog");
    }

    #[test]
    fn test_raw_payload_passthrough() {
        let doc = Document::from_lines(
            vec![
                LineRecord::new("A wrapped", 11.0, 1),
                LineRecord::new("line here", 11.0, 1),
                LineRecord::new("Next", 11.0, 1),
            ],
            DocumentMetadata {
                title: Some("Doc".to_string()),
                ..Default::default()
            },
        );
        let raw = raw_payload(&doc, "team", "u1");
        assert_eq!(raw.raw_data.raw_text, "A wrapped line here\nNext");
        assert_eq!(raw.raw_data.metadata.title.as_deref(), Some("Doc"));
        assert_eq!(raw.user_id, "u1");
        assert!(chrono::DateTime::parse_from_rfc3339(&raw.extraction_timestamp).is_ok());

        let text = Document::from_text("  untouched\n\n\ntext ", DocumentMetadata::default());
        assert_eq!(raw_payload(&text, "t", "").raw_data.raw_text, "  untouched\n\n\ntext ");
    }
}
