//! Load a page from disk into a `Document`.

use std::path::Path;

use anyhow::{Context, Result};
use dv_core::Document;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};

pub fn load_document(path: &Path) -> Result<Document> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_markdown = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e, "md" | "markdown"));
    Ok(if is_markdown {
        markdown_document(&content)
    } else {
        Document::from_text(&content)
    })
}

/// Prose becomes text segments; code and raw HTML are kept as excluded
/// content so they render but are never tokenized.
pub fn markdown_document(markdown: &str) -> Document {
    let mut doc = Document::new();
    let mut in_code_block = false;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                doc.push_text("\n");
            }
            Event::Text(text) if in_code_block => {
                doc.push_excluded(&text);
            }
            Event::Text(text) => {
                doc.push_text(&text);
            }
            Event::Code(code) | Event::Html(code) | Event::InlineHtml(code) => {
                doc.push_excluded(&code);
            }
            Event::SoftBreak | Event::HardBreak => {
                doc.push_text("\n");
            }
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item) => {
                doc.push_text("\n");
            }
            _ => {}
        }
    }
    doc
}
