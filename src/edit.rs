//! Text edits and the rendering of manifests in the file's own style.

use std::ops::Range;

use crate::{
    ast::ParsedSource,
    error::{Error, Result},
    rename::RenameEdit,
    resolve::Resolution,
    target::{Anchor, InjectableTarget, Slot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    Insert,
    Delete,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationEdit {
    /// Original text consumed; empty for insertions.
    pub range: Range<usize>,
    pub op: EditOp,
    pub text: String,
    /// Identifier the replaced text carried before a rename.
    pub original_name: Option<String>,
    /// Closers of inline arrays go first among insertions at one offset.
    closer: bool,
    order: usize,
}

impl AnnotationEdit {
    pub fn insert(at: usize, text: impl Into<String>, order: usize) -> Self {
        Self {
            range: at..at,
            op: EditOp::Insert,
            text: text.into(),
            original_name: None,
            closer: false,
            order,
        }
    }

    pub fn delete(range: Range<usize>) -> Self {
        let order = range.start;
        Self {
            range,
            op: EditOp::Delete,
            text: String::new(),
            original_name: None,
            closer: false,
            order,
        }
    }

    pub fn replace(range: Range<usize>, text: impl Into<String>) -> Self {
        let order = range.start;
        Self {
            range,
            op: EditOp::Replace,
            text: text.into(),
            original_name: None,
            closer: false,
            order,
        }
    }

    fn closing(at: usize, text: impl Into<String>, order: usize) -> Self {
        Self {
            closer: true,
            ..Self::insert(at, text, order)
        }
    }

    /// The same text change applied over `range` instead of at the insertion point.
    pub fn in_place_of(&self, range: Range<usize>) -> Self {
        Self::replace(range, self.text.clone())
    }
}

impl From<RenameEdit> for AnnotationEdit {
    fn from(edit: RenameEdit) -> Self {
        Self {
            original_name: Some(edit.original),
            ..Self::replace(edit.range, edit.text)
        }
    }
}

// -----------------------------------------------------------------------------
// Rendering
// -----------------------------------------------------------------------------

pub struct Renderer<'a> {
    src: &'a ParsedSource,
    resolution: &'a Resolution,
}

impl<'a> Renderer<'a> {
    pub fn new(src: &'a ParsedSource, resolution: &'a Resolution) -> Self {
        Self { src, resolution }
    }

    /// `"a", "b"` with the quote of the closest string literal.
    pub fn entries(&self, target: &InjectableTarget) -> String {
        let quote = self.resolution.quote_near(target.span.start);
        target
            .names()
            .iter()
            .map(|name| format!("{quote}{name}{quote}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Edits that create the manifest of `target` where none exists.
    pub fn insertion(&self, target: &InjectableTarget) -> Vec<AnnotationEdit> {
        let entries = self.entries(target);
        let eol = self.src.eol();
        match &target.slot {
            Slot::Inline => {
                let open = if entries.is_empty() {
                    "[".to_string()
                } else {
                    format!("[{entries}, ")
                };
                vec![
                    AnnotationEdit::insert(target.span.start, open, target.span.start),
                    AnnotationEdit::closing(target.span.end, "]", usize::MAX - target.span.start),
                ]
            }
            Slot::Property { name, anchor } => {
                let statement = format!("{name}.$inject = [{entries}];");
                // Code sharing the anchor's line keeps the statement on that line too.
                let text = match anchor {
                    Anchor::After { pos, .. } if !self.ends_line(*pos) => format!(" {statement}"),
                    Anchor::After { indent, .. } => format!("{eol}{indent}{statement}"),
                    Anchor::Before { pos, .. } if !self.starts_line(*pos) => {
                        format!("{statement} ")
                    }
                    Anchor::Before { indent, .. } => format!("{statement}{eol}{indent}"),
                };
                let (Anchor::After { pos, .. } | Anchor::Before { pos, .. }) = anchor;
                let edit = AnnotationEdit::insert(*pos, text, target.span.start);
                vec![edit]
            }
        }
    }
}

impl Renderer<'_> {
    fn ends_line(&self, pos: usize) -> bool {
        let rest = self.src.text_at(pos..self.src.text().len());
        rest.split('\n').next().unwrap_or("").trim().is_empty()
    }

    fn starts_line(&self, pos: usize) -> bool {
        let before = self.src.text_at(0..pos);
        before.rsplit('\n').next().unwrap_or("").trim().is_empty()
    }
}

// -----------------------------------------------------------------------------
// Ordering
// -----------------------------------------------------------------------------

/// Sorts edits for a single forward sweep and rejects overlaps.
pub fn synthesize(mut edits: Vec<AnnotationEdit>) -> Result<Vec<AnnotationEdit>> {
    edits.sort_by_key(|e| (e.range.start, !e.range.is_empty(), !e.closer, e.order));

    let mut covered: Option<Range<usize>> = None;
    for edit in &edits {
        if let Some(prev) = &covered {
            if edit.range.start < prev.end {
                return Err(Error::InternalConsistency {
                    first: prev.clone(),
                    second: edit.range.clone(),
                });
            }
        }
        if !edit.range.is_empty() {
            covered = Some(edit.range.clone());
        }
    }
    Ok(edits)
}
