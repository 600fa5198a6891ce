//! Thin facade over the swc parser.
//!
//! Everything downstream works on byte offsets into the original text; this module owns the
//! conversion from swc spans, the comment index used for marker lookups and the line table used
//! for diagnostics and source maps.

use std::ops::Range;

use swc_core::{
    common::{
        comments::SingleThreadedComments, sync::Lrc, BytePos, FileName, Globals, Mark, SourceFile,
        SourceMap, Span, Spanned, GLOBALS,
    },
    ecma::{
        ast::{EsVersion, Program},
        parser::{parse_file_as_program, EsSyntax, Syntax},
        transforms::base::resolver,
        visit::VisitMutWith,
    },
};

use crate::error::{Error, Result};

/// Runs `f` with a fresh set of swc globals (marks, syntax contexts).
///
/// Every transform gets its own scope so concurrent calls on different threads share nothing.
pub fn with_globals<R>(f: impl FnOnce() -> R) -> R {
    GLOBALS.set(&Globals::new(), f)
}

// -----------------------------------------------------------------------------
// Parsed source
// -----------------------------------------------------------------------------

pub struct ParsedSource {
    text: String,
    file: Lrc<SourceFile>,
    program: Program,
    comments: CommentIndex,
    lines: LineIndex,
}

impl ParsedSource {
    /// Parses `text` and runs scope resolution over the tree.
    ///
    /// Must be called inside [`with_globals`].
    pub fn parse(name: &str, text: &str) -> Result<Self> {
        let cm: Lrc<SourceMap> = Default::default();
        let file = cm.new_source_file(
            Lrc::new(FileName::Custom(name.to_string())),
            text.to_string(),
        );
        let lines = LineIndex::new(text);
        let comments = SingleThreadedComments::default();
        let mut recovered = Vec::new();

        let parsed = parse_file_as_program(
            &file,
            Syntax::Es(EsSyntax::default()),
            EsVersion::latest(),
            Some(&comments),
            &mut recovered,
        );
        let mut program = match parsed {
            Ok(program) => program,
            Err(e) => {
                return Err(syntax_error(text, &lines, &file, e.span(), &e.kind().msg()));
            }
        };
        if let Some(e) = recovered.first() {
            return Err(syntax_error(text, &lines, &file, e.span(), &e.kind().msg()));
        }

        let unresolved_mark = Mark::new();
        let top_level_mark = Mark::new();
        program.visit_mut_with(&mut resolver(unresolved_mark, top_level_mark, false));

        let comments = CommentIndex::new(&comments, file.start_pos);
        tracing::debug!(
            "parsed {} ({} bytes, {} comments)",
            name,
            text.len(),
            comments.len()
        );

        Ok(Self {
            text: text.to_string(),
            file,
            program,
            comments,
            lines,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn comments(&self) -> &CommentIndex {
        &self.comments
    }

    pub fn offset(&self, pos: BytePos) -> usize {
        pos.0.saturating_sub(self.file.start_pos.0) as usize
    }

    pub fn range(&self, span: Span) -> Range<usize> {
        self.offset(span.lo)..self.offset(span.hi)
    }

    pub fn slice(&self, span: Span) -> &str {
        let range = self.range(span);
        self.text.get(range).unwrap_or("")
    }

    pub fn text_at(&self, range: Range<usize>) -> &str {
        self.text.get(range).unwrap_or("")
    }

    /// 1-based line and 0-based UTF-16 column of `offset`.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let (line, column) = self.lines.position(&self.text, offset);
        (line as usize + 1, column as usize)
    }

    /// Leading whitespace of the line containing `offset`.
    pub fn indent_at(&self, offset: usize) -> &str {
        let start = self.lines.line_start(offset);
        let line = &self.text[start..];
        let width = line
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(line.len());
        &line[..width]
    }

    pub fn eol(&self) -> &'static str {
        if self.text.contains("\r\n") {
            "\r\n"
        } else {
            "\n"
        }
    }
}

fn syntax_error(
    text: &str,
    lines: &LineIndex,
    file: &SourceFile,
    span: Span,
    message: &str,
) -> Error {
    let offset = span.lo.0.saturating_sub(file.start_pos.0) as usize;
    let (line, column) = lines.position(text, offset.min(text.len()));
    Error::Syntax {
        line: line as usize + 1,
        column: column as usize,
        message: message.to_string(),
    }
}

// -----------------------------------------------------------------------------
// Line table
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { starts }
    }

    pub fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        }
    }

    pub fn line_start(&self, offset: usize) -> usize {
        self.starts[self.line_of(offset)]
    }

    /// 0-based line and UTF-16 column.
    pub fn position(&self, text: &str, offset: usize) -> (u32, u32) {
        let line = self.line_of(offset);
        let start = self.starts[line];
        let column = text
            .get(start..offset)
            .map(|s| s.encode_utf16().count())
            .unwrap_or(0);
        (line as u32, column as u32)
    }
}

// -----------------------------------------------------------------------------
// Comments
// -----------------------------------------------------------------------------

/// All comments of a file, ordered by position.
///
/// swc files a comment either as leading (next token) or trailing (previous token); lookups here
/// only care about where the comment sits in the text.
pub struct CommentIndex {
    comments: Vec<(Range<usize>, String)>,
}

impl CommentIndex {
    fn new(comments: &SingleThreadedComments, start: BytePos) -> Self {
        let to_offset = |pos: BytePos| pos.0.saturating_sub(start.0) as usize;
        let (leading, trailing) = comments.borrow_all();
        let mut all: Vec<(Range<usize>, String)> = leading
            .values()
            .chain(trailing.values())
            .flatten()
            .map(|c| (to_offset(c.span.lo)..to_offset(c.span.hi), c.text.to_string()))
            .collect();
        all.sort_by_key(|(range, _)| range.start);
        all.dedup_by_key(|(range, _)| range.start);
        Self { comments: all }
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Texts of the comments directly in front of `offset`, nearest first. Only whitespace may
    /// separate them from each other and from `offset`.
    pub fn before<'s>(&'s self, text: &str, offset: usize) -> Vec<&'s str> {
        let mut out = Vec::new();
        let mut pos = offset;
        loop {
            pos = text[..pos].trim_end().len();
            let found = self
                .comments
                .binary_search_by_key(&pos, |(range, _)| range.end)
                .ok();
            match found {
                Some(idx) => {
                    let (range, body) = &self.comments[idx];
                    out.push(body.as_str());
                    pos = range.start;
                }
                _ => break,
            }
        }
        out
    }

    pub fn any_within(&self, range: &Range<usize>) -> bool {
        self.comments
            .iter()
            .any(|(c, _)| c.start >= range.start && c.end <= range.end)
    }
}
