//! Source maps for rewritten output, fresh or chained through an input map.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;
use sourcemap::{SourceMap, SourceMapBuilder};

use crate::{
    ast::LineIndex,
    error::{Error, Result},
    options::SourceMapOptions,
    rewrite::{Rewrite, Segment},
};

/// Source name recorded in a fresh map when no `in_file` is configured.
pub const DEFAULT_SOURCE: &str = "source.js";

const INLINE_MAP: &str = r"(?m)^[ \t]*//[#@][ \t]+sourceMappingURL=data:application/json(?:;charset[=:][^;,\s]+)?;base64,([A-Za-z0-9+/=]+)[ \t]*$";
const DATA_URL_PREFIX: &str = "data:application/json;charset=utf-8;base64,";

/// A decoded v3 source map.
#[derive(Debug, Clone)]
pub struct SourceMapArtifact {
    map: SourceMap,
}

/// Where a generated position came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: String,
    /// 0-based.
    pub line: u32,
    /// 0-based, UTF-16 units.
    pub column: u32,
    pub name: Option<String>,
}

impl SourceMapArtifact {
    pub fn from_json(json: &str) -> Result<Self> {
        let map = SourceMap::from_slice(json.as_bytes())?;
        Ok(Self { map })
    }

    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.map.to_writer(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// `data:` URL as used in an inline `sourceMappingURL` comment.
    pub fn to_data_url(&self) -> Result<String> {
        Ok(format!("{DATA_URL_PREFIX}{}", STANDARD.encode(self.to_json()?)))
    }

    /// Source names as written in the map, without the source root.
    pub fn sources(&self) -> Vec<String> {
        self.map
            .sources()
            .map(|s| self.unrooted(s).to_string())
            .collect()
    }

    /// Source names with the source root applied.
    pub fn resolved_sources(&self) -> Vec<String> {
        self.map.sources().map(|s| s.to_string()).collect()
    }

    pub fn source_root(&self) -> Option<&str> {
        self.map.get_source_root()
    }

    /// Embedded contents of `source`, given as written in the map.
    pub fn source_contents(&self, source: &str) -> Option<&str> {
        (0..self.map.get_source_count())
            .find(|idx| {
                self.map
                    .get_source(*idx)
                    .is_some_and(|s| self.unrooted(s) == source)
            })
            .and_then(|idx| self.map.get_source_contents(idx))
    }

    /// `name` with the source root prefix taken off, if the map carries one.
    fn unrooted<'s>(&self, name: &'s str) -> &'s str {
        let Some(root) = self.source_root().filter(|root| !root.is_empty()) else {
            return name;
        };
        match name.strip_prefix(root) {
            Some(rest) if root.ends_with('/') => rest,
            Some(rest) => rest.strip_prefix('/').unwrap_or(name),
            None => name,
        }
    }

    /// Original position of the closest mapping at or before `column` on `line` (both 0-based).
    pub fn lookup(&self, line: u32, column: u32) -> Option<OriginalPosition> {
        let token = self.map.lookup_token(line, column)?;
        if token.get_dst_line() != line {
            return None;
        }
        Some(OriginalPosition {
            source: self.unrooted(token.get_source()?).to_string(),
            line: token.get_src_line(),
            column: token.get_src_col(),
            name: token.get_name().map(|n| n.to_string()),
        })
    }
}

// -----------------------------------------------------------------------------
// Inline comments
// -----------------------------------------------------------------------------

/// Finds the last inline source-map comment, returning the text without it and the decoded map.
pub fn extract_inline(text: &str) -> Result<Option<(String, SourceMapArtifact)>> {
    let pattern = Regex::new(INLINE_MAP)
        .map_err(|e| Error::Configuration(format!("inline map pattern: {e}")))?;
    let Some(captures) = pattern.captures_iter(text).last() else {
        return Ok(None);
    };
    let (Some(comment), Some(payload)) = (captures.get(0), captures.get(1)) else {
        return Ok(None);
    };
    let decoded = STANDARD
        .decode(payload.as_str())
        .map_err(|e| Error::Configuration(format!("invalid inline source map: {e}")))?;
    let map = SourceMap::from_slice(&decoded)
        .map_err(|e| Error::Configuration(format!("invalid inline source map: {e}")))?;

    let mut stripped = String::with_capacity(text.len() - comment.len());
    stripped.push_str(&text[..comment.start()]);
    stripped.push_str(&text[comment.end()..]);
    tracing::debug!("using inline input map ({} bytes)", decoded.len());
    Ok(Some((stripped, SourceMapArtifact { map })))
}

/// Appends `map` to `text` as an inline comment on its own line.
pub fn append_inline(text: &mut String, eol: &str, map: &SourceMapArtifact) -> Result<()> {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push_str(eol);
    }
    text.push_str("//# sourceMappingURL=");
    text.push_str(&map.to_data_url()?);
    text.push_str(eol);
    Ok(())
}

// -----------------------------------------------------------------------------
// Building
// -----------------------------------------------------------------------------

/// One (generated, original) correspondence in byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingPoint {
    pub generated: usize,
    pub original: usize,
    pub name: Option<String>,
}

/// Correspondences at every token start of unchanged text, at insertion points and at replaced
/// identifiers. Non-decreasing in `generated`.
pub fn mapping_points(original: &str, rewrite: &Rewrite) -> Vec<MappingPoint> {
    let mut points = Vec::new();
    for segment in &rewrite.segments {
        match segment {
            Segment::Unchanged {
                original: range,
                generated,
            } => {
                let mut prev_ident = false;
                for (i, c) in original[range.clone()].char_indices() {
                    let ident = is_ident_char(c);
                    if !c.is_whitespace() && (i == 0 || !ident || !prev_ident) {
                        points.push(MappingPoint {
                            generated: generated.start + i,
                            original: range.start + i,
                            name: None,
                        });
                    }
                    prev_ident = ident;
                }
            }
            Segment::Inserted { at, generated } if !generated.is_empty() => {
                points.push(MappingPoint {
                    generated: generated.start,
                    original: *at,
                    name: None,
                });
            }
            Segment::Replaced {
                original: range,
                generated,
                name,
            } if !generated.is_empty() => {
                points.push(MappingPoint {
                    generated: generated.start,
                    original: range.start,
                    name: name.clone(),
                });
            }
            _ => {}
        }
    }
    points
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Maps `rewrite` back to `original`, or through `input` to whatever `original` was built from.
pub fn build(
    original: &str,
    rewrite: &Rewrite,
    options: &SourceMapOptions,
    input: Option<&SourceMapArtifact>,
) -> SourceMapArtifact {
    let original_lines = LineIndex::new(original);
    let generated_lines = LineIndex::new(&rewrite.text);
    let mut builder = SourceMapBuilder::new(None);

    let root = options
        .source_root
        .as_deref()
        .or_else(|| input.and_then(|map| map.source_root()));
    if let Some(root) = root {
        builder.set_source_root(Some(root));
    }

    let fresh_source = options.in_file.as_deref().unwrap_or(DEFAULT_SOURCE);
    // Input source name -> name in the output. Names stay relative to the input root unless the
    // caller replaces that root, in which case they keep it baked in.
    let mut input_sources: HashMap<String, String> = HashMap::new();
    match input {
        None => {
            let id = builder.add_source(fresh_source);
            builder.set_source_contents(id, Some(original));
        }
        Some(input) => {
            let keep_input_root = options.source_root.is_some()
                && input.source_root().is_some_and(|root| !root.is_empty());
            for (source, resolved) in input.sources().into_iter().zip(input.resolved_sources()) {
                let output_name = if keep_input_root { resolved } else { source.clone() };
                let id = builder.add_source(output_name.as_str());
                if let Some(contents) = input.source_contents(&source) {
                    builder.set_source_contents(id, Some(contents));
                }
                input_sources.insert(source, output_name);
            }
        }
    }

    let mut dropped = 0usize;
    for point in mapping_points(original, rewrite) {
        let (dst_line, dst_col) = generated_lines.position(&rewrite.text, point.generated);
        let (src_line, src_col) = original_lines.position(original, point.original);
        match input {
            None => {
                builder.add(
                    dst_line,
                    dst_col,
                    src_line,
                    src_col,
                    Some(fresh_source),
                    point.name.as_deref(),
                    false,
                );
            }
            Some(input) => match input.lookup(src_line, src_col) {
                Some(found) => {
                    let name = point.name.as_deref().or(found.name.as_deref());
                    let source = input_sources
                        .get(&found.source)
                        .map_or(found.source.as_str(), String::as_str);
                    builder.add(
                        dst_line,
                        dst_col,
                        found.line,
                        found.column,
                        Some(source),
                        name,
                        false,
                    );
                }
                None => dropped += 1,
            },
        }
    }
    if dropped > 0 {
        tracing::debug!("{} positions without a counterpart in the input map", dropped);
    }

    SourceMapArtifact {
        map: builder.into_sourcemap(),
    }
}
