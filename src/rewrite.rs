use std::ops::Range;

use crate::edit::{AnnotationEdit, EditOp};

/// How a stretch of the output relates to the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Unchanged {
        original: Range<usize>,
        generated: Range<usize>,
    },
    Inserted {
        at: usize,
        generated: Range<usize>,
    },
    Deleted {
        original: Range<usize>,
        at: usize,
    },
    Replaced {
        original: Range<usize>,
        generated: Range<usize>,
        name: Option<String>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Rewrite {
    pub text: String,
    pub segments: Vec<Segment>,
}

/// Applies sorted, non-overlapping edits in one forward pass.
pub fn apply(text: &str, edits: &[AnnotationEdit]) -> Rewrite {
    let growth: usize = edits.iter().map(|e| e.text.len()).sum();
    let mut out = String::with_capacity(text.len() + growth);
    let mut segments = Vec::with_capacity(edits.len() * 2 + 1);
    let mut cursor = 0;

    for edit in edits {
        if edit.range.start > cursor {
            let start = out.len();
            out.push_str(&text[cursor..edit.range.start]);
            segments.push(Segment::Unchanged {
                original: cursor..edit.range.start,
                generated: start..out.len(),
            });
        }
        let start = out.len();
        out.push_str(&edit.text);
        segments.push(match edit.op {
            EditOp::Insert => Segment::Inserted {
                at: edit.range.start,
                generated: start..out.len(),
            },
            EditOp::Delete => Segment::Deleted {
                original: edit.range.clone(),
                at: start,
            },
            EditOp::Replace => Segment::Replaced {
                original: edit.range.clone(),
                generated: start..out.len(),
                name: edit.original_name.clone(),
            },
        });
        cursor = cursor.max(edit.range.end);
    }
    if cursor < text.len() {
        let start = out.len();
        out.push_str(&text[cursor..]);
        segments.push(Segment::Unchanged {
            original: cursor..text.len(),
            generated: start..out.len(),
        });
    }

    Rewrite {
        text: out,
        segments,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_apply_tracks_segments() {
        let text = "abcdef";
        let edits = vec![
            AnnotationEdit::insert(1, "XY", 1),
            AnnotationEdit::delete(2..3),
            AnnotationEdit::replace(4..5, "Z"),
        ];
        let rewrite = apply(text, &edits);
        assert_eq!(rewrite.text, "aXYbdZf");
        assert_eq!(
            rewrite.segments,
            vec![
                Segment::Unchanged {
                    original: 0..1,
                    generated: 0..1
                },
                Segment::Inserted {
                    at: 1,
                    generated: 1..3
                },
                Segment::Unchanged {
                    original: 1..2,
                    generated: 3..4
                },
                Segment::Deleted {
                    original: 2..3,
                    at: 4
                },
                Segment::Unchanged {
                    original: 3..4,
                    generated: 4..5
                },
                Segment::Replaced {
                    original: 4..5,
                    generated: 5..6,
                    name: None
                },
                Segment::Unchanged {
                    original: 5..6,
                    generated: 6..7
                },
            ]
        );
    }

    #[test]
    fn test_no_edits_is_identity() {
        let rewrite = apply("same", &[]);
        assert_eq!(rewrite.text, "same");
        assert_eq!(rewrite.segments.len(), 1);
    }
}
