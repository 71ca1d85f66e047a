//! Content extractor plugins and their registry.
//!
//! Each extractor is a capability pair: a pure predicate deciding whether it
//! recognizes an [`ExtractionContext`], and a transform producing zero or
//! more [`ExtractedArtifact`]s. The registry preserves registration order
//! and selects every matching extractor — callers run all matches and merge
//! the artifacts. There is no priority field; extractors are expected to be
//! narrow and non-overlapping by convention.
//!
//! Built-in extractors cover the formats the intake pipeline sees most:
//! plain text, Markdown, JSON, and PDF. Custom extractors implement
//! [`Extractor`] and are added with [`ExtractorRegistry::register`].

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::models::{ExtractedArtifact, ExtractionContext};

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_JSON: &str = "application/json";
pub const MIME_PDF: &str = "application/pdf";

/// A pluggable content extractor.
///
/// `can_extract` and `extract` must be deterministic with respect to the
/// context's fields (primarily `mime_type`) and must not mutate shared
/// state — the pipeline may call them from concurrent ingestions.
pub trait Extractor: Send + Sync {
    /// The extractor's self-reported identifier, recorded as each produced
    /// artifact's `method` (e.g. `"text/plain"`).
    fn id(&self) -> &str;

    /// One-line description for `intake extractors` output.
    fn description(&self) -> &str;

    /// Pure predicate: does this extractor recognize the context?
    fn can_extract(&self, ctx: &ExtractionContext) -> bool;

    /// Transform the raw payload into artifacts. An error here fails the
    /// ingestion's `extract` stage.
    fn extract(&self, ctx: &ExtractionContext) -> Result<Vec<ExtractedArtifact>>;
}

/// Ordered collection of extractor plugins.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Create an empty extractor registry.
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Create a registry pre-loaded with the built-in extractors enabled in
    /// the config.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        if config.extractors.text {
            registry.register(Box::new(PlainTextExtractor));
        }
        if config.extractors.markdown {
            registry.register(Box::new(MarkdownExtractor));
        }
        if config.extractors.json {
            registry.register(Box::new(JsonExtractor));
        }
        if config.extractors.pdf {
            registry.register(Box::new(PdfExtractor));
        }
        registry
    }

    /// Register an extractor. Registration order is the only ordering the
    /// registry maintains.
    pub fn register(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    /// Every registered extractor whose predicate accepts `ctx`, in
    /// registration order. Unrecognized content yields an empty list, never
    /// an error.
    pub fn matching(&self, ctx: &ExtractionContext) -> Vec<&dyn Extractor> {
        self.extractors
            .iter()
            .filter(|e| e.can_extract(ctx))
            .map(|e| e.as_ref())
            .collect()
    }

    /// Get all registered extractors.
    pub fn extractors(&self) -> &[Box<dyn Extractor>] {
        &self.extractors
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn mime_is(ctx: &ExtractionContext, mime: &str) -> bool {
    ctx.mime_type.as_deref() == Some(mime)
}

/// Infer a mime type from a file extension, for submissions that carry a
/// path instead of an explicit type. Unknown extensions yield `None` — the
/// pipeline then runs with no mime, which matches no built-in extractor.
pub fn mime_for_path(path: &std::path::Path) -> Option<&'static str> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("txt") => Some(MIME_TEXT),
        Some("md") | Some("markdown") => Some(MIME_MARKDOWN),
        Some("json") => Some(MIME_JSON),
        Some("pdf") => Some(MIME_PDF),
        _ => None,
    }
}

/// Plain text: validates UTF-8 and passes the text through unchanged.
pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn id(&self) -> &str {
        MIME_TEXT
    }

    fn description(&self) -> &str {
        "Validate UTF-8 and pass plain text through"
    }

    fn can_extract(&self, ctx: &ExtractionContext) -> bool {
        mime_is(ctx, MIME_TEXT)
    }

    fn extract(&self, ctx: &ExtractionContext) -> Result<Vec<ExtractedArtifact>> {
        let text = std::str::from_utf8(&ctx.payload).context("payload is not valid UTF-8")?;
        Ok(vec![ExtractedArtifact {
            payload: text.as_bytes().to_vec(),
            mime_type: MIME_TEXT.to_string(),
            method: MIME_TEXT.to_string(),
        }])
    }
}

/// Markdown: strips structural markup, yielding plain text.
pub struct MarkdownExtractor;

impl Extractor for MarkdownExtractor {
    fn id(&self) -> &str {
        MIME_MARKDOWN
    }

    fn description(&self) -> &str {
        "Strip Markdown markup down to plain text"
    }

    fn can_extract(&self, ctx: &ExtractionContext) -> bool {
        mime_is(ctx, MIME_MARKDOWN)
    }

    fn extract(&self, ctx: &ExtractionContext) -> Result<Vec<ExtractedArtifact>> {
        let text = std::str::from_utf8(&ctx.payload).context("payload is not valid UTF-8")?;
        Ok(vec![ExtractedArtifact {
            payload: strip_markdown(text).into_bytes(),
            mime_type: MIME_TEXT.to_string(),
            method: MIME_MARKDOWN.to_string(),
        }])
    }
}

/// Line-based markup strip: headings, blockquotes, list bullets, fences,
/// inline code spans. Anything heavier belongs in a dedicated extractor.
fn strip_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_fence = false;
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            out.push_str(line);
            out.push('\n');
            continue;
        }
        let stripped = trimmed
            .trim_start_matches('#')
            .trim_start_matches('>')
            .trim_start();
        let stripped = stripped
            .strip_prefix("- ")
            .or_else(|| stripped.strip_prefix("* "))
            .unwrap_or(stripped);
        out.push_str(&stripped.replace('`', ""));
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// JSON: collects every string value into newline-joined searchable text.
pub struct JsonExtractor;

impl Extractor for JsonExtractor {
    fn id(&self) -> &str {
        MIME_JSON
    }

    fn description(&self) -> &str {
        "Collect string values from a JSON document"
    }

    fn can_extract(&self, ctx: &ExtractionContext) -> bool {
        mime_is(ctx, MIME_JSON)
    }

    fn extract(&self, ctx: &ExtractionContext) -> Result<Vec<ExtractedArtifact>> {
        let value: serde_json::Value =
            serde_json::from_slice(&ctx.payload).context("payload is not valid JSON")?;
        let mut strings = Vec::new();
        collect_strings(&value, &mut strings);
        Ok(vec![ExtractedArtifact {
            payload: strings.join("\n").into_bytes(),
            mime_type: MIME_TEXT.to_string(),
            method: MIME_JSON.to_string(),
        }])
    }
}

fn collect_strings(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect_strings(item, out);
            }
        }
        _ => {}
    }
}

/// PDF: text extraction via `pdf-extract`.
pub struct PdfExtractor;

impl Extractor for PdfExtractor {
    fn id(&self) -> &str {
        MIME_PDF
    }

    fn description(&self) -> &str {
        "Extract text content from PDF documents"
    }

    fn can_extract(&self, ctx: &ExtractionContext) -> bool {
        mime_is(ctx, MIME_PDF)
    }

    fn extract(&self, ctx: &ExtractionContext) -> Result<Vec<ExtractedArtifact>> {
        let text = match pdf_extract::extract_text_from_mem(&ctx.payload) {
            Ok(t) => t,
            Err(e) => bail!("PDF extraction failed: {}", e),
        };
        Ok(vec![ExtractedArtifact {
            payload: text.into_bytes(),
            mime_type: MIME_TEXT.to_string(),
            method: MIME_PDF.to_string(),
        }])
    }
}
