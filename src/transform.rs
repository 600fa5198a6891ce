use std::borrow::Cow;

use crate::{
    ast::{with_globals, ParsedSource},
    catalog::Catalog,
    edit::{synthesize, AnnotationEdit},
    error::{Result, Warning},
    mapping::{self, SourceMapArtifact, DEFAULT_SOURCE},
    options::Options,
    plan::{plan, Decision},
    rename::rename,
    resolve::resolve,
    rewrite,
};

/// Result of a successful transform.
#[derive(Debug, Clone)]
pub struct Output {
    pub text: String,
    /// Present when `Options::source_map` was set.
    pub map: Option<SourceMapArtifact>,
    pub warnings: Vec<Warning>,
}

/// Adds, removes or rebuilds dependency manifests in `source`.
///
/// Options are validated before the source is looked at. On error nothing is produced; the
/// source text is never partially rewritten.
pub fn transform(source: &str, options: &Options) -> Result<Output> {
    options.validate()?;
    let catalog = Catalog::new(options.name_filter.as_deref(), options.plugins.clone())?;
    let mode = options.mode();

    let extracted = match &options.source_map {
        Some(_) => mapping::extract_inline(source)?,
        None => None,
    };
    let (text, inline_map) = match extracted {
        Some((stripped, map)) => (Cow::Owned(stripped), Some(map)),
        None => (Cow::Borrowed(source), None),
    };
    let input_map = options
        .source_map
        .as_ref()
        .and_then(|m| m.input_map.as_ref())
        .or(inline_map.as_ref());
    let file_name = options
        .source_map
        .as_ref()
        .and_then(|m| m.in_file.as_deref())
        .unwrap_or(DEFAULT_SOURCE);

    with_globals(|| {
        let src = ParsedSource::parse(file_name, &text)?;
        let mut resolution = resolve(&src, &catalog);
        let renames = rename(&src, &mut resolution, &options.rename);
        let plan = plan(&src, &resolution, mode);

        let changed = plan
            .decisions
            .iter()
            .filter(|(_, decision)| {
                matches!(decision, Decision::Insert | Decision::Delete | Decision::Replace)
            })
            .count();
        let mut edits = plan.edits;
        edits.extend(renames.into_iter().map(AnnotationEdit::from));
        let edits = synthesize(edits)?;
        tracing::debug!(
            "{:?}: {} targets, {} changed, {} edits, {} warnings",
            mode,
            resolution.targets.len(),
            changed,
            edits.len(),
            plan.warnings.len()
        );

        let rewrite = rewrite::apply(src.text(), &edits);
        let map = options
            .source_map
            .as_ref()
            .map(|map_options| mapping::build(src.text(), &rewrite, map_options, input_map));

        let mut text = rewrite.text;
        if let (Some(map), Some(map_options)) = (&map, &options.source_map) {
            if map_options.inline {
                mapping::append_inline(&mut text, src.eol(), map)?;
            }
        }

        Ok(Output {
            text,
            map,
            warnings: plan.warnings,
        })
    })
}
