//! # docsplit
//!
//! Heading-aware document segmentation, tagging, and author resolution for
//! ingestion pipelines.
//!
//! docsplit turns scraped web text or PDF line records into titled markdown
//! chunks, attaches keyword tags and a document-level author, and emits
//! ingestion items. Fetching, crawling, and binary parsing happen upstream;
//! persistence happens downstream.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │ Document │──▶│  Fence   │──▶│ Segment  │──▶│  Merge   │──▶│   Tags   │
//! │ text/PDF │   │ normalize│   │ headings │   │  small   │   │ (tf-idf) │
//! └──────────┘   └──────────┘   └──────────┘   └──────────┘   └────┬─────┘
//!                                                                  │
//!                ┌──────────┐   ┌──────────────────────────┐       │
//!                │  Items   │◀──│ Author: rules → LLM      │◀──────┘
//!                └──────────┘   └──────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docsplit chunk doc.json                 # print merged, tagged chunks
//! docsplit ingest doc.json --team-id t1   # print the ingestion payload
//! docsplit raw doc.json                   # print the pass-through payload
//! docsplit author doc.json --mode accuracy
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`fence`] | Code-fence normalizer |
//! | [`markdown`] | Markdown postprocessing and ingestion layout |
//! | [`chunk`] | Heading segmentation and chunk merging |
//! | [`tags`] | Keyword tag extraction |
//! | [`llm`] | Chat-completion client abstraction |
//! | [`author`] | Rule-based / LLM author resolution |
//! | [`assemble`] | Item and payload assembly |
//! | [`ingest`] | Pipeline orchestration |

pub mod assemble;
pub mod author;
pub mod chunk;
pub mod config;
pub mod fence;
pub mod ingest;
pub mod llm;
pub mod markdown;
pub mod models;
pub mod tags;
