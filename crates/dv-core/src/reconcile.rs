//! Incremental re-annotation of a live document.
//!
//! Each pass derives token spans for every plain text segment, reusing the
//! spans of a cached fragment with identical text, and replaces only segments
//! that gain at least one marker. Markers already on the page
//! are indexed by their displayed text; a token with identical text reuses that
//! descriptor verbatim, wherever it now sits. Passes closer together than the
//! debounce window are dropped, not queued.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::classify::{Classifier, WordClass};
use crate::config::EngineConfig;
use crate::document::{Container, DocumentSurface, Inline, MarkerDescriptor};
use crate::pipeline::TokenizedFragment;
use crate::script::ScriptPolicy;
use crate::tokenizer::{TokenSpan, tokenize_spans};
use crate::vocabulary::VocabularySnapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub segments_replaced: usize,
    pub segments_skipped: usize,
    pub markers_created: usize,
    pub markers_reused: usize,
    /// Segments laid out from cached spans instead of being re-tokenized.
    pub spans_reused: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Inside the debounce window; nothing was touched.
    Suppressed,
    Rendered(ReconcileReport),
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    window: Duration,
    mark_new: bool,
    policy: ScriptPolicy,
    last_render: Option<Instant>,
}

impl Reconciler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            window: config.debounce(),
            mark_new: config.mark_new,
            policy: config.script_policy(),
            last_render: None,
        }
    }

    pub fn last_render(&self) -> Option<Instant> {
        self.last_render
    }

    pub fn reconcile<D: DocumentSurface + ?Sized>(
        &mut self,
        surface: &mut D,
        snapshot: &VocabularySnapshot,
        classifier: &Classifier,
        now: Instant,
    ) -> ReconcileOutcome {
        self.reconcile_with_fragments(surface, snapshot, classifier, &[], now)
    }

    /// Like [`Reconciler::reconcile`], taking spans from `fragments` for any
    /// segment whose text matches one exactly.
    pub fn reconcile_with_fragments<D: DocumentSurface + ?Sized>(
        &mut self,
        surface: &mut D,
        snapshot: &VocabularySnapshot,
        classifier: &Classifier,
        fragments: &[TokenizedFragment],
        now: Instant,
    ) -> ReconcileOutcome {
        if let Some(last) = self.last_render
            && now.saturating_duration_since(last) < self.window
        {
            tracing::trace!("render suppressed by debounce window");
            return ReconcileOutcome::Suppressed;
        }
        self.last_render = Some(now);

        let rendered: HashMap<String, MarkerDescriptor> = surface
            .markers()
            .into_iter()
            .map(|m| (m.text.clone(), m))
            .collect();
        let cached: HashMap<&str, &[TokenSpan]> = fragments
            .iter()
            .map(|f| (f.text.as_str(), f.spans.as_slice()))
            .collect();

        let mut report = ReconcileReport::default();
        for segment in surface.text_segments() {
            if matches!(segment.container, Container::Marker(_)) || segment.text.trim().is_empty() {
                report.segments_skipped += 1;
                continue;
            }

            let spans = match cached.get(segment.text.as_str()) {
                Some(spans) => {
                    report.spans_reused += 1;
                    spans.to_vec()
                }
                None => tokenize_spans(&segment.text, self.policy),
            };
            let Some(layout) = self.layout(&segment.text, spans, &rendered, snapshot, classifier)
            else {
                continue;
            };
            if surface.replace_segment(segment.id, layout.inlines) {
                report.segments_replaced += 1;
                report.markers_created += layout.created;
                report.markers_reused += layout.reused;
            }
        }

        tracing::debug!(
            replaced = report.segments_replaced,
            created = report.markers_created,
            reused = report.markers_reused,
            spans_reused = report.spans_reused,
            "document reconciled"
        );
        ReconcileOutcome::Rendered(report)
    }

    /// Unwrap every marker and reset the debounce timer.
    pub fn clear<D: DocumentSurface + ?Sized>(&mut self, surface: &mut D) -> usize {
        self.last_render = None;
        surface.clear_markers()
    }

    /// Lay a segment out in document order. `None` when no token earns a
    /// marker, i.e. the segment would render exactly as it already does.
    fn layout(
        &self,
        text: &str,
        mut spans: Vec<TokenSpan>,
        rendered: &HashMap<String, MarkerDescriptor>,
        snapshot: &VocabularySnapshot,
        classifier: &Classifier,
    ) -> Option<Layout> {
        spans.sort_by_key(|s| s.range.start);

        let mut layout = Layout::default();
        let mut cursor = 0;
        for span in spans {
            layout.push_text(&text[cursor..span.range.start]);
            cursor = span.range.end;

            let raw = &text[span.range];
            if let Some(marker) = rendered.get(raw) {
                layout.reused += 1;
                layout.inlines.push(Inline::Marker(marker.clone()));
                continue;
            }
            if span.text.is_empty() {
                layout.push_text(raw);
                continue;
            }

            match classifier.classify(&span.text, snapshot) {
                WordClass::New if !self.mark_new => layout.push_text(raw),
                class => {
                    layout.created += 1;
                    layout
                        .inlines
                        .push(Inline::Marker(MarkerDescriptor::new(raw, class)));
                }
            }
        }
        layout.push_text(&text[cursor..]);

        if layout.created + layout.reused == 0 {
            None
        } else {
            Some(layout)
        }
    }
}

#[derive(Default)]
struct Layout {
    inlines: Vec<Inline>,
    created: usize,
    reused: usize,
}

impl Layout {
    /// Append plain text, merging with a preceding text run.
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Inline::Text(last)) = self.inlines.last_mut() {
            last.push_str(text);
        } else {
            self.inlines.push(Inline::Text(text.to_string()));
        }
    }
}
