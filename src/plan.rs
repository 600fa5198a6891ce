//! Per-target decisions for add, remove and rebuild.

use crate::{
    ast::ParsedSource,
    edit::{AnnotationEdit, Renderer},
    error::{Warning, WarningKind},
    options::Mode,
    resolve::Resolution,
    target::{ExistingManifest, InjectableTarget, TargetId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Insert,
    Delete,
    /// Rewrite a machine-authored manifest in place.
    Replace,
    Keep,
    /// A manifest is present but cannot be touched safely.
    Ambiguous,
}

#[derive(Debug, Default)]
pub struct Plan {
    pub edits: Vec<AnnotationEdit>,
    pub decisions: Vec<(TargetId, Decision)>,
    pub warnings: Vec<Warning>,
}

pub fn plan(src: &ParsedSource, resolution: &Resolution, mode: Mode) -> Plan {
    let renderer = Renderer::new(src, resolution);
    let mut plan = Plan::default();

    for target in &resolution.targets {
        let insertion = renderer.insertion(target);
        let unchanged = target
            .existing
            .as_ref()
            .is_some_and(|existing| renders_identically(src, existing, &insertion));
        let decision = decide(target, mode, unchanged);
        tracing::debug!("{:?} {:?}: {:?}", target.id, target.kind, decision);

        match (decision, &target.existing) {
            (Decision::Insert, _) => plan.edits.extend(insertion),
            (Decision::Delete, Some(existing)) => plan
                .edits
                .extend(existing.removal.iter().cloned().map(AnnotationEdit::delete)),
            (Decision::Replace, Some(existing)) => plan.edits.extend(
                existing
                    .removal
                    .iter()
                    .zip(&insertion)
                    .map(|(range, edit)| edit.in_place_of(range.clone())),
            ),
            (Decision::Ambiguous, Some(existing)) => {
                plan.warnings.push(ambiguous(src, target, existing, mode));
            }
            _ => {}
        }
        plan.decisions.push((target.id, decision));
    }
    plan
}

/// Mode semantics for a single target; `unchanged` tells whether re-rendering the manifest would
/// reproduce the existing text.
pub fn decide(target: &InjectableTarget, mode: Mode, unchanged: bool) -> Decision {
    let Some(existing) = &target.existing else {
        return match mode {
            Mode::Add | Mode::Rebuild => Decision::Insert,
            Mode::Remove | Mode::RenameOnly => Decision::Keep,
        };
    };
    let matches = existing.matches(&target.names());
    match mode {
        Mode::Remove if existing.machine_authored => Decision::Delete,
        Mode::Remove => Decision::Ambiguous,
        Mode::Rebuild if existing.machine_authored && unchanged => Decision::Keep,
        Mode::Rebuild if existing.machine_authored => Decision::Replace,
        _ if matches => Decision::Keep,
        _ if existing.machine_authored => Decision::Replace,
        Mode::RenameOnly => Decision::Keep,
        Mode::Add | Mode::Rebuild => Decision::Ambiguous,
    }
}

fn renders_identically(
    src: &ParsedSource,
    existing: &ExistingManifest,
    insertion: &[AnnotationEdit],
) -> bool {
    existing.removal.len() == insertion.len()
        && existing
            .removal
            .iter()
            .zip(insertion)
            .all(|(range, edit)| src.text_at(range.clone()) == edit.text)
}

fn ambiguous(
    src: &ParsedSource,
    target: &InjectableTarget,
    existing: &ExistingManifest,
    mode: Mode,
) -> Warning {
    let (line, column) = src.position(existing.span.start);
    let action = match mode {
        Mode::Remove => "removed",
        _ => "updated",
    };
    let owner = match &target.context {
        Some(context) => format!("{}.{}", context.callee, context.method),
        None => target.matcher.name().to_string(),
    };
    let message = format!(
        "{owner} manifest for ({}) not {action}: it is not machine-authored",
        target.names().join(", ")
    );
    tracing::warn!("{}:{}: {}", line, column, message);
    Warning {
        kind: WarningKind::AmbiguousManifest,
        line,
        column,
        message,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        ast::with_globals,
        catalog::{Catalog, PluginRegistry},
        resolve::resolve,
    };

    fn decisions(text: &str, mode: Mode) -> (Vec<Decision>, usize) {
        with_globals(|| {
            let src = ParsedSource::parse("t.js", text).unwrap();
            let catalog = Catalog::new(None, PluginRegistry::default()).unwrap();
            let resolution = resolve(&src, &catalog);
            let plan = plan(&src, &resolution, mode);
            (
                plan.decisions.into_iter().map(|(_, d)| d).collect(),
                plan.warnings.len(),
            )
        })
    }

    const BARE: &str = "myMod.factory(\"f\", function ($http) {});";
    const ANNOTATED: &str = "myMod.factory(\"f\", [\"$http\", function ($http) {}]);";
    const STALE: &str = "myMod.factory(\"f\", [\"$q\", function ($http) {}]);";
    const HAND_WRITTEN: &str = "myMod.factory(\"f\", [dep, function ($http) {}]);";

    #[test]
    fn test_add_decisions() {
        assert_eq!(decisions(BARE, Mode::Add), (vec![Decision::Insert], 0));
        assert_eq!(decisions(ANNOTATED, Mode::Add), (vec![Decision::Keep], 0));
        assert_eq!(decisions(STALE, Mode::Add), (vec![Decision::Replace], 0));
        assert_eq!(
            decisions(HAND_WRITTEN, Mode::Add),
            (vec![Decision::Ambiguous], 1)
        );
    }

    #[test]
    fn test_remove_decisions() {
        assert_eq!(decisions(BARE, Mode::Remove), (vec![Decision::Keep], 0));
        assert_eq!(decisions(ANNOTATED, Mode::Remove), (vec![Decision::Delete], 0));
        assert_eq!(
            decisions(HAND_WRITTEN, Mode::Remove),
            (vec![Decision::Ambiguous], 1)
        );
    }

    #[test]
    fn test_ambiguous_warning_names_the_registration() {
        let warnings = with_globals(|| {
            let src = ParsedSource::parse("t.js", HAND_WRITTEN).unwrap();
            let catalog = Catalog::new(None, PluginRegistry::default()).unwrap();
            plan(&src, &resolve(&src, &catalog), Mode::Remove).warnings
        });
        assert_eq!(warnings.len(), 1);
        assert_eq!((warnings[0].line, warnings[0].column), (1, 19));
        assert!(warnings[0].message.starts_with("myMod.factory manifest for ($http) not removed"));
    }

    #[test]
    fn test_rebuild_keeps_identical_text() {
        assert_eq!(decisions(ANNOTATED, Mode::Rebuild), (vec![Decision::Keep], 0));
        let single_quoted = "myMod.factory(\"f\", ['$http', function ($http) {}]);";
        assert_eq!(
            decisions(single_quoted, Mode::Rebuild),
            (vec![Decision::Replace], 0)
        );
    }
}
