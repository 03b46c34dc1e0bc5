//! The host document, as far as the engine needs to see it.
//!
//! The engine reads leaf text segments and may replace a segment with inline
//! content carrying markers. Node ownership stays with the surface; the engine
//! only ever holds segment ids and marker descriptors.

use crate::classify::WordClass;

pub type SegmentId = u64;

/// A rendered annotation: displayed text plus its class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkerDescriptor {
    pub text: String,
    pub class: WordClass,
}

impl MarkerDescriptor {
    pub fn new(text: &str, class: WordClass) -> Self {
        Self {
            text: text.to_string(),
            class,
        }
    }
}

/// What immediately contains a text segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Plain,
    Marker(WordClass),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    pub id: SegmentId,
    pub text: String,
    pub container: Container,
}

/// Replacement content for one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Marker(MarkerDescriptor),
}

pub trait DocumentSurface {
    /// Live leaf text in document order. Script/style/no-render content is
    /// never returned.
    fn text_segments(&self) -> Vec<TextSegment>;

    /// Markers currently rendered, in document order.
    fn markers(&self) -> Vec<MarkerDescriptor>;

    /// Atomically swap a segment for `replacement`. Returns false, changing
    /// nothing, if the segment no longer exists.
    fn replace_segment(&mut self, id: SegmentId, replacement: Vec<Inline>) -> bool;

    /// Unwrap every marker back into plain text. Returns how many were removed.
    fn clear_markers(&mut self) -> usize;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Text(String),
    /// Text the engine must not see (code, scripts, raw markup).
    Excluded(String),
    Marker(MarkerDescriptor),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    id: SegmentId,
    kind: NodeKind,
}

/// In-memory document: a flat run of text, excluded text and marker nodes
/// with stable ids.
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Node>,
    next_id: SegmentId,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// One segment per line, newlines kept as their own segments.
    pub fn from_text(text: &str) -> Self {
        let mut doc = Self::new();
        for line in text.split_inclusive('\n') {
            match line.strip_suffix('\n') {
                Some(body) => {
                    doc.push_text(body);
                    doc.push_text("\n");
                }
                None => {
                    doc.push_text(line);
                }
            }
        }
        doc
    }

    fn alloc(&mut self) -> SegmentId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn push(&mut self, kind: NodeKind) -> SegmentId {
        let id = self.alloc();
        self.nodes.push(Node { id, kind });
        id
    }

    pub fn push_text(&mut self, text: &str) -> SegmentId {
        self.push(NodeKind::Text(text.to_string()))
    }

    pub fn push_excluded(&mut self, text: &str) -> SegmentId {
        self.push(NodeKind::Excluded(text.to_string()))
    }

    pub fn push_marker(&mut self, marker: MarkerDescriptor) -> SegmentId {
        self.push(NodeKind::Marker(marker))
    }

    /// Concatenated text of every node, markers included.
    pub fn plain_text(&self) -> String {
        self.nodes
            .iter()
            .map(|n| match &n.kind {
                NodeKind::Text(t) | NodeKind::Excluded(t) => t.as_str(),
                NodeKind::Marker(m) => m.text.as_str(),
            })
            .collect()
    }

    /// Render as HTML: plain text escaped, markers as classed spans.
    pub fn render_html(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            match &node.kind {
                NodeKind::Text(t) | NodeKind::Excluded(t) => out.push_str(&escape_html(t)),
                NodeKind::Marker(m) => {
                    out.push_str(&format!(
                        "<span class=\"{}\">{}</span>",
                        m.class.css_class(),
                        escape_html(&m.text)
                    ));
                }
            }
        }
        out
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl DocumentSurface for Document {
    fn text_segments(&self) -> Vec<TextSegment> {
        self.nodes
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Text(t) => Some(TextSegment {
                    id: n.id,
                    text: t.clone(),
                    container: Container::Plain,
                }),
                NodeKind::Marker(m) => Some(TextSegment {
                    id: n.id,
                    text: m.text.clone(),
                    container: Container::Marker(m.class),
                }),
                NodeKind::Excluded(_) => None,
            })
            .collect()
    }

    fn markers(&self) -> Vec<MarkerDescriptor> {
        self.nodes
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Marker(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    fn replace_segment(&mut self, id: SegmentId, replacement: Vec<Inline>) -> bool {
        let Some(pos) = self
            .nodes
            .iter()
            .position(|n| n.id == id && matches!(n.kind, NodeKind::Text(_)))
        else {
            return false;
        };

        let mut fresh = Vec::with_capacity(replacement.len());
        for inline in replacement {
            let kind = match inline {
                Inline::Text(t) => NodeKind::Text(t),
                Inline::Marker(m) => NodeKind::Marker(m),
            };
            fresh.push(Node {
                id: self.alloc(),
                kind,
            });
        }
        self.nodes.splice(pos..=pos, fresh);
        true
    }

    fn clear_markers(&mut self) -> usize {
        let mut cleared = 0;
        for node in &mut self.nodes {
            if let NodeKind::Marker(m) = &node.kind {
                node.kind = NodeKind::Text(m.text.clone());
                cleared += 1;
            }
        }
        cleared
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
