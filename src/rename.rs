//! Parameter renames inside injectable targets.
//!
//! Bindings are matched by scope-resolved identity, so a nested function that re-declares the
//! same name keeps its own binding untouched.

use std::{
    collections::{HashMap, HashSet},
    ops::Range,
};

use swc_core::{
    common::Span,
    ecma::{
        ast::*,
        visit::{Visit, VisitWith},
    },
};

use crate::{ast::ParsedSource, options::RenameRule, resolve::Resolution};

/// Replacement of one identifier occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameEdit {
    pub range: Range<usize>,
    pub text: String,
    /// Name before the rename, kept for named source-map entries.
    pub original: String,
}

/// Renames parameters of every target per `rules`, recording the new names on the bindings.
pub fn rename(
    src: &ParsedSource,
    resolution: &mut Resolution,
    rules: &[RenameRule],
) -> Vec<RenameEdit> {
    if rules.is_empty() {
        return Vec::new();
    }

    let wanted: HashSet<(usize, usize)> = resolution
        .targets
        .iter()
        .filter(|t| t.params.iter().any(|p| rule_for(rules, &p.name).is_some()))
        .map(|t| (t.span.start, t.span.end))
        .collect();
    if wanted.is_empty() {
        return Vec::new();
    }

    let mut finder = Finder {
        src,
        wanted,
        scopes: HashMap::new(),
    };
    src.program().visit_with(&mut finder);
    let scopes = finder.scopes;

    let mut edits = Vec::new();
    for target in &mut resolution.targets {
        let Some(scope) = scopes.get(&(target.span.start, target.span.end)) else {
            continue;
        };
        for param in &mut target.params {
            let Some(rule) = rule_for(rules, &param.name) else {
                continue;
            };
            if scope.names.contains(&rule.to) {
                tracing::warn!(
                    "not renaming {} to {} at {:?}: {} is already used there",
                    rule.from,
                    rule.to,
                    param.span,
                    rule.to
                );
                continue;
            }
            for occurrence in scope.occurrences.iter().filter(|o| o.id == param.id) {
                let text = if occurrence.shorthand {
                    format!("{}: {}", rule.from, rule.to)
                } else {
                    rule.to.clone()
                };
                edits.push(RenameEdit {
                    range: occurrence.range.clone(),
                    text,
                    original: rule.from.clone(),
                });
            }
            param.renamed_to = Some(rule.to.clone());
        }
    }

    edits.sort_by_key(|e| e.range.start);
    edits.dedup_by_key(|e| e.range.start);
    tracing::debug!("{} identifier occurrences renamed", edits.len());
    edits
}

fn rule_for<'r>(rules: &'r [RenameRule], name: &str) -> Option<&'r RenameRule> {
    rules.iter().find(|r| r.from == name)
}

// -----------------------------------------------------------------------------
// Occurrence collection
// -----------------------------------------------------------------------------

struct Occurrence {
    id: Id,
    range: Range<usize>,
    /// `{ $a }`: the key has to be spelled out when the value is renamed.
    shorthand: bool,
}

#[derive(Default)]
struct Scope {
    occurrences: Vec<Occurrence>,
    /// Every identifier name used anywhere in the target.
    names: HashSet<String>,
}

struct Finder<'a> {
    src: &'a ParsedSource,
    wanted: HashSet<(usize, usize)>,
    scopes: HashMap<(usize, usize), Scope>,
}

impl Finder<'_> {
    fn collect<N>(&mut self, span: Span, node: &N)
    where
        N: for<'c> VisitWith<Collector<'c>>,
    {
        let range = self.src.range(span);
        let key = (range.start, range.end);
        if !self.wanted.contains(&key) || self.scopes.contains_key(&key) {
            return;
        }
        let mut collector = Collector {
            src: self.src,
            scope: Scope::default(),
        };
        node.visit_children_with(&mut collector);
        self.scopes.insert(key, collector.scope);
    }
}

impl Visit for Finder<'_> {
    fn visit_function(&mut self, f: &Function) {
        self.collect(f.span, f);
        f.visit_children_with(self);
    }

    fn visit_arrow_expr(&mut self, a: &ArrowExpr) {
        self.collect(a.span, a);
        a.visit_children_with(self);
    }

    fn visit_class(&mut self, c: &Class) {
        self.collect(c.span, c);
        c.visit_children_with(self);
    }
}

struct Collector<'a> {
    src: &'a ParsedSource,
    scope: Scope,
}

impl Collector<'_> {
    fn record(&mut self, ident: &Ident, shorthand: bool) {
        self.scope.names.insert(ident.sym.to_string());
        self.scope.occurrences.push(Occurrence {
            id: ident.to_id(),
            range: self.src.range(ident.span),
            shorthand,
        });
    }
}

impl Visit for Collector<'_> {
    fn visit_ident(&mut self, ident: &Ident) {
        self.record(ident, false);
    }

    fn visit_prop(&mut self, prop: &Prop) {
        if let Prop::Shorthand(ident) = prop {
            self.record(ident, true);
            return;
        }
        prop.visit_children_with(self);
    }

    fn visit_assign_pat_prop(&mut self, prop: &AssignPatProp) {
        self.record(&prop.key.id, true);
        prop.value.visit_with(self);
    }
}
