//! Single traversal that turns matcher hits into [`InjectableTarget`]s.
//!
//! Statement lists are scanned first so declared functions get their property-form slot and any
//! `$inject` statement next to them; expression-level shapes are picked up while descending.
//! Each function or class node becomes at most one target, keyed by its span.

use std::{
    collections::{HashMap, HashSet},
    ops::Range,
};

use swc_core::{
    common::{Span, Spanned},
    ecma::{
        ast::*,
        visit::{Visit, VisitWith},
    },
};

use crate::{
    ast::ParsedSource,
    catalog::{
        directive, dotted_path, injectable_fn, marker_before, object_entries, unparen, unquote,
        Catalog, FnNode, FunctionMatch, Marker, Matcher,
    },
    target::{
        Anchor, ExistingManifest, InjectableTarget, ManifestState, RegistrationContext, Slot,
        TargetId, TargetKind,
    },
};

/// Targets in document order plus what the renderer needs to match the file's style.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub targets: Vec<InjectableTarget>,
    /// Start offset and quote character of every string literal outside a manifest.
    pub quotes: Vec<(usize, char)>,
}

impl Resolution {
    /// Quote of the string literal nearest to `offset`, `"` when the file has none.
    pub fn quote_near(&self, offset: usize) -> char {
        let idx = self.quotes.partition_point(|(start, _)| *start < offset);
        let before = idx.checked_sub(1).and_then(|i| self.quotes.get(i));
        let after = self.quotes.get(idx);
        match (before, after) {
            (Some(b), Some(a)) if a.0 - offset < offset - b.0 => a.1,
            (Some(b), _) => b.1,
            (None, Some(a)) => a.1,
            (None, None) => '"',
        }
    }
}

pub fn resolve(src: &ParsedSource, catalog: &Catalog) -> Resolution {
    let mut resolver = Resolver {
        src,
        catalog,
        targets: Vec::new(),
        seen: HashMap::new(),
        suppressed: HashSet::new(),
        manifest_ranges: Vec::new(),
        strings: Vec::new(),
    };
    src.program().visit_with(&mut resolver);

    let Resolver {
        mut targets,
        manifest_ranges,
        strings,
        ..
    } = resolver;

    targets.sort_by_key(|t| t.span.start);
    for (idx, target) in targets.iter_mut().enumerate() {
        target.id = TargetId(idx);
    }

    let mut quotes: Vec<(usize, char)> = strings
        .into_iter()
        .filter(|(start, _)| !manifest_ranges.iter().any(|r| r.contains(start)))
        .collect();
    quotes.sort_unstable();

    tracing::debug!(
        "resolved {} targets ({} quote samples)",
        targets.len(),
        quotes.len()
    );
    Resolution { targets, quotes }
}

/// A function or class bound to a name by a statement.
struct Declared<'n> {
    name: String,
    node: FnNode<'n>,
    kind: TargetKind,
    /// Whole declaring statement, `export` included.
    stmt: Span,
    marker_offsets: Vec<usize>,
    hoistable: bool,
}

/// One element of a statement list; module items may be import/export declarations.
#[derive(Clone, Copy)]
enum Entry<'n> {
    Stmt(&'n Stmt),
    Module(&'n ModuleDecl),
}

impl<'n> Entry<'n> {
    fn span(&self) -> Span {
        match self {
            Entry::Stmt(stmt) => stmt.span(),
            Entry::Module(decl) => decl.span(),
        }
    }

    fn stmt(&self) -> Option<&'n Stmt> {
        match *self {
            Entry::Stmt(stmt) => Some(stmt),
            Entry::Module(_) => None,
        }
    }
}

/// `Name.$inject = rhs;` found in a statement list.
struct InjectStmt<'n> {
    name: String,
    rhs: &'n Expr,
    span: Span,
}

struct Resolver<'a> {
    src: &'a ParsedSource,
    catalog: &'a Catalog,
    targets: Vec<InjectableTarget>,
    seen: HashMap<(usize, usize), TargetId>,
    suppressed: HashSet<usize>,
    manifest_ranges: Vec<Range<usize>>,
    strings: Vec<(usize, char)>,
}

impl<'a> Resolver<'a> {
    fn key(&self, node: FnNode<'_>) -> (usize, usize) {
        let range = self.src.range(node.span());
        (range.start, range.end)
    }

    fn is_known(&self, node: FnNode<'_>) -> bool {
        let key = self.key(node);
        self.seen.contains_key(&key) || self.suppressed.contains(&key.0)
    }

    fn push(&mut self, mut target: InjectableTarget) {
        let key = (target.span.start, target.span.end);
        if self.seen.contains_key(&key) {
            return;
        }
        let id = TargetId(self.targets.len());
        target.id = id;
        tracing::debug!(
            "target at {:?} via {} ({} params)",
            target.span,
            target.matcher.name(),
            target.params.len()
        );
        self.seen.insert(key, id);
        self.targets.push(target);
    }

    fn manifest_state(
        &self,
        node: FnNode<'_>,
        existing: &Option<ExistingManifest>,
        inline: bool,
    ) -> ManifestState {
        match existing {
            Some(_) if inline => ManifestState::InlineArrayCall,
            Some(_) => ManifestState::ArrayLiteral,
            None => {
                let directive = node.body().and_then(|body| directive(self.src, body));
                if directive == Some(Marker::Inject) {
                    ManifestState::PrologueDirective
                } else {
                    ManifestState::Absent
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Statement lists
    // -------------------------------------------------------------------------

    fn scan_list(&mut self, stmts: &[Entry<'_>]) {
        let injects: Vec<Option<InjectStmt<'_>>> = stmts
            .iter()
            .map(|entry| entry.stmt().and_then(|stmt| inject_stmt(self.src, stmt)))
            .collect();
        let exit = stmts.iter().position(|entry| {
            matches!(entry, Entry::Stmt(Stmt::Return(_) | Stmt::Throw(_)))
        });

        for (idx, entry) in stmts.iter().enumerate() {
            let declared = match entry {
                Entry::Module(decl) => export_declarations(self.src, decl),
                Entry::Stmt(stmt) => declarations(self.src, stmt),
            };
            for declared in declared {
                let hoisted_exit = exit.filter(|exit| declared.hoistable && *exit < idx);
                self.declare(stmts, &injects, idx, hoisted_exit, declared);
            }
        }
    }

    fn declare(
        &mut self,
        stmts: &[Entry<'_>],
        injects: &[Option<InjectStmt<'_>>],
        idx: usize,
        hoisted_exit: Option<usize>,
        declared: Declared<'_>,
    ) {
        let src = self.src;
        let (slot, run) = match hoisted_exit {
            Some(exit) => {
                let exit_lo = src.offset(stmts[exit].span().lo);
                let anchor = Anchor::Before {
                    pos: exit_lo,
                    indent: src.indent_at(exit_lo).to_string(),
                };
                (anchor, run_before(src, stmts, injects, exit))
            }
            None => {
                let stmt_lo = src.offset(declared.stmt.lo);
                let anchor = Anchor::After {
                    pos: src.offset(declared.stmt.hi),
                    indent: src.indent_at(stmt_lo).to_string(),
                };
                (anchor, run_after(src, stmts, injects, idx))
            }
        };

        let adjacent = run
            .iter()
            .find(|(i, _)| injects[*i].as_ref().is_some_and(|s| s.name == declared.name));
        let existing = match adjacent {
            Some((i, removal)) => injects[*i]
                .as_ref()
                .map(|s| self.property_manifest(s, removal.clone(), true)),
            None => injects
                .iter()
                .flatten()
                .find(|s| s.name == declared.name)
                .map(|s| self.property_manifest(s, Vec::new(), false)),
        };

        let node = declared.node;
        if self.is_known(node) {
            return;
        }
        let matched = self.catalog.match_function(
            src,
            node,
            &declared.marker_offsets,
            adjacent.is_some(),
        );
        let matcher = match matched {
            FunctionMatch::Flagged(matcher) => matcher,
            FunctionMatch::Suppressed => {
                let start = self.key(node).0;
                self.suppressed.insert(start);
                return;
            }
            // Class syntax has no slot for an inline manifest; constructor parameters are enough.
            FunctionMatch::Unmatched
                if node
                    .constructor()
                    .is_some_and(|ctor| !ctor.params.is_empty()) =>
            {
                Matcher::ClassConstructor
            }
            FunctionMatch::Unmatched => return,
        };
        let Some(params) = node.params(src) else {
            tracing::debug!("skipping {}: non-identifier parameters", declared.name);
            return;
        };

        let manifest = self.manifest_state(node, &existing, false);
        self.push(InjectableTarget {
            id: TargetId(0),
            span: src.range(node.span()),
            kind: declared.kind,
            matcher,
            params,
            manifest,
            existing,
            slot: Slot::Property {
                name: declared.name,
                anchor: slot,
            },
            context: None,
        });
    }

    fn property_manifest(
        &mut self,
        stmt: &InjectStmt<'_>,
        removal: Vec<Range<usize>>,
        adjacent: bool,
    ) -> ExistingManifest {
        let span = self.src.range(stmt.span);
        self.manifest_ranges.push(span.clone());
        let names = match unparen(stmt.rhs) {
            Expr::Array(array) => string_elements(self.src, &array.elems),
            _ => None,
        };
        let machine_authored =
            adjacent && names.is_some() && !self.src.comments().any_within(&span);
        ExistingManifest {
            names,
            machine_authored,
            removal: if machine_authored { removal } else { Vec::new() },
            span,
        }
    }

    // -------------------------------------------------------------------------
    // Expressions
    // -------------------------------------------------------------------------

    /// Registration-call candidate: a function, or an inline array ending in one.
    fn call_target(&mut self, matcher: Matcher, expr: &Expr, context: RegistrationContext) {
        let Some(node) = injectable_fn(expr) else {
            return;
        };
        if self.is_known(node) || self.catalog.is_suppressed(self.src, node) {
            return;
        }
        let Some(params) = node.params(self.src) else {
            return;
        };
        let existing = self.inline_manifest(expr, node);
        if params.is_empty() && existing.is_none() {
            return;
        }
        let manifest = self.manifest_state(node, &existing, true);
        self.push(InjectableTarget {
            id: TargetId(0),
            span: self.src.range(node.span()),
            kind: TargetKind::RegistrationCall,
            matcher,
            params,
            manifest,
            existing,
            slot: Slot::Inline,
            context: Some(context),
        });
    }

    /// Function in expression position carrying its own marker or directive.
    fn inline_target(&mut self, expr: &Expr, marker_offsets: &[usize], forced: Option<Matcher>) {
        let Some(node) = injectable_fn(expr) else {
            return;
        };
        if self.is_known(node) {
            return;
        }
        let outer = self.src.offset(unparen(expr).span().lo);
        let mut offsets = marker_offsets.to_vec();
        offsets.push(outer);
        let matcher = match (self.catalog.match_function(self.src, node, &offsets, false), forced) {
            (FunctionMatch::Suppressed, _) => {
                let start = self.key(node).0;
                self.suppressed.insert(start);
                return;
            }
            (FunctionMatch::Flagged(matcher), _) => matcher,
            (FunctionMatch::Unmatched, Some(matcher)) => matcher,
            (FunctionMatch::Unmatched, None) => return,
        };
        let Some(params) = node.params(self.src) else {
            return;
        };
        let existing = self.inline_manifest(expr, node);
        let manifest = self.manifest_state(node, &existing, true);
        self.push(InjectableTarget {
            id: TargetId(0),
            span: self.src.range(node.span()),
            kind: node.kind(),
            matcher,
            params,
            manifest,
            existing,
            slot: Slot::Inline,
            context: None,
        });
    }

    /// `["a", "b", fn]` around `node`, if `expr` is one.
    fn inline_manifest(&mut self, expr: &Expr, node: FnNode<'_>) -> Option<ExistingManifest> {
        let Expr::Array(array) = unparen(expr) else {
            return None;
        };
        let src = self.src;
        let span = src.range(array.span);
        let inner = src.range(node.span());
        let elems = &array.elems[..array.elems.len().saturating_sub(1)];
        let names = string_elements(src, elems);
        let machine_authored = names.is_some() && !src.comments().any_within(&span);
        self.manifest_ranges.push(span.start..inner.start);
        Some(ExistingManifest {
            names,
            machine_authored,
            removal: if machine_authored {
                vec![span.start..inner.start, inner.end..span.end]
            } else {
                Vec::new()
            },
            span,
        })
    }
}

impl Visit for Resolver<'_> {
    fn visit_module_items(&mut self, items: &[ModuleItem]) {
        let list: Vec<Entry<'_>> = items
            .iter()
            .map(|item| match item {
                ModuleItem::Stmt(stmt) => Entry::Stmt(stmt),
                ModuleItem::ModuleDecl(decl) => Entry::Module(decl),
            })
            .collect();
        self.scan_list(&list);
        items.visit_children_with(self);
    }

    fn visit_stmts(&mut self, stmts: &[Stmt]) {
        let list: Vec<Entry<'_>> = stmts.iter().map(Entry::Stmt).collect();
        self.scan_list(&list);
        stmts.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, call: &CallExpr) {
        // An immediately invoked function cannot be wrapped in place.
        if let Callee::Expr(callee) = &call.callee {
            if let Some(node) = FnNode::from_expr(callee) {
                let start = self.key(node).0;
                self.suppressed.insert(start);
            }
        }
        for found in self.catalog.match_call(self.src, call) {
            self.call_target(found.matcher, found.expr, found.context);
        }
        call.visit_children_with(self);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Fn(_) | Expr::Arrow(_) | Expr::Class(_) | Expr::Array(_) => {
                self.inline_target(expr, &[], None);
            }
            Expr::Object(_) => {
                let offset = self.src.offset(expr.span().lo);
                if marker_before(self.src, offset) == Some(Marker::Inject) {
                    for (_, value) in object_entries(expr) {
                        self.inline_target(value, &[], Some(Matcher::MarkerComment));
                    }
                }
            }
            _ => {}
        }
        expr.visit_children_with(self);
    }

    fn visit_str(&mut self, s: &Str) {
        let quote = self.src.slice(s.span).chars().next();
        if let Some(quote @ ('"' | '\'')) = quote {
            self.strings.push((self.src.offset(s.span.lo), quote));
        }
    }
}

/// Statement indices directly after `idx` that are `$inject` assignments separated by whitespace
/// only, with the range each one's removal covers.
fn run_after(
    src: &ParsedSource,
    stmts: &[Entry<'_>],
    injects: &[Option<InjectStmt<'_>>],
    idx: usize,
) -> Vec<(usize, Vec<Range<usize>>)> {
    let mut run = Vec::new();
    let mut prev_end = src.offset(stmts[idx].span().hi);
    for next in idx + 1..stmts.len() {
        let Some(inject) = &injects[next] else {
            break;
        };
        let range = src.range(inject.span);
        if !src.text_at(prev_end..range.start).trim().is_empty() {
            break;
        }
        run.push((next, vec![prev_end..range.end]));
        prev_end = range.end;
    }
    run
}

/// Same as [`run_after`], for the statements directly before `exit`.
fn run_before(
    src: &ParsedSource,
    stmts: &[Entry<'_>],
    injects: &[Option<InjectStmt<'_>>],
    exit: usize,
) -> Vec<(usize, Vec<Range<usize>>)> {
    let mut run = Vec::new();
    let mut next_start = src.offset(stmts[exit].span().lo);
    for prev in (0..exit).rev() {
        let Some(inject) = &injects[prev] else {
            break;
        };
        let range = src.range(inject.span);
        if !src.text_at(range.end..next_start).trim().is_empty() {
            break;
        }
        run.push((prev, vec![range.start..next_start]));
        next_start = range.start;
    }
    run
}

fn inject_stmt<'n>(src: &ParsedSource, stmt: &'n Stmt) -> Option<InjectStmt<'n>> {
    let Stmt::Expr(ExprStmt { expr, span }) = stmt else {
        return None;
    };
    let Expr::Assign(assign) = &**expr else {
        return None;
    };
    if assign.op != AssignOp::Assign {
        return None;
    }
    let AssignTarget::Simple(SimpleAssignTarget::Member(member)) = &assign.left else {
        return None;
    };
    let MemberProp::Ident(prop) = &member.prop else {
        return None;
    };
    if &*prop.sym != "$inject" {
        return None;
    }
    Some(InjectStmt {
        name: src.slice(member.obj.span()).to_string(),
        rhs: &assign.right,
        span: *span,
    })
}

/// Entries of an array that holds nothing but plain string literals.
fn string_elements(src: &ParsedSource, elems: &[Option<ExprOrSpread>]) -> Option<Vec<String>> {
    elems
        .iter()
        .map(|elem| {
            let elem = elem.as_ref()?;
            if elem.spread.is_some() {
                return None;
            }
            match &*elem.expr {
                Expr::Lit(Lit::Str(s)) => unquote(src.slice(s.span)).map(str::to_string),
                _ => None,
            }
        })
        .collect()
}

fn declarations<'n>(src: &ParsedSource, stmt: &'n Stmt) -> Vec<Declared<'n>> {
    let lo = src.offset(stmt.span().lo);
    match stmt {
        Stmt::Decl(decl) => decl_declarations(src, decl, stmt.span(), lo),
        Stmt::Expr(ExprStmt { expr, .. }) => {
            let Expr::Assign(assign) = &**expr else {
                return Vec::new();
            };
            if assign.op != AssignOp::Assign {
                return Vec::new();
            }
            let name = match &assign.left {
                AssignTarget::Simple(SimpleAssignTarget::Ident(id)) => id.id.sym.to_string(),
                AssignTarget::Simple(SimpleAssignTarget::Member(member))
                    if matches!(member.prop, MemberProp::Ident(_))
                        && dotted_path(&member.obj).is_some() =>
                {
                    src.slice(member.span).to_string()
                }
                _ => return Vec::new(),
            };
            let Some(node) = FnNode::from_expr(&assign.right) else {
                return Vec::new();
            };
            vec![Declared {
                name,
                node,
                kind: node.kind(),
                stmt: stmt.span(),
                marker_offsets: vec![lo],
                hoistable: false,
            }]
        }
        _ => Vec::new(),
    }
}

fn export_declarations<'n>(src: &ParsedSource, decl: &'n ModuleDecl) -> Vec<Declared<'n>> {
    let lo = src.offset(decl.span().lo);
    match decl {
        ModuleDecl::ExportDecl(export) => decl_declarations(src, &export.decl, export.span, lo),
        ModuleDecl::ExportDefaultDecl(export) => {
            let (ident, node) = match &export.decl {
                DefaultDecl::Fn(f) => (f.ident.as_ref(), FnNode::Function(&f.function)),
                DefaultDecl::Class(c) => (c.ident.as_ref(), FnNode::Class(&c.class)),
                DefaultDecl::TsInterfaceDecl(_) => return Vec::new(),
            };
            let Some(ident) = ident else {
                return Vec::new();
            };
            let kind = match node {
                FnNode::Class(_) => TargetKind::ClassConstructor,
                _ => TargetKind::Declaration,
            };
            vec![Declared {
                name: ident.sym.to_string(),
                node,
                kind,
                stmt: export.span,
                marker_offsets: vec![lo],
                hoistable: false,
            }]
        }
        _ => Vec::new(),
    }
}

fn decl_declarations<'n>(
    src: &ParsedSource,
    decl: &'n Decl,
    stmt: Span,
    lo: usize,
) -> Vec<Declared<'n>> {
    match decl {
        Decl::Fn(f) => vec![Declared {
            name: f.ident.sym.to_string(),
            node: FnNode::Function(&f.function),
            kind: TargetKind::Declaration,
            stmt,
            marker_offsets: vec![lo],
            hoistable: true,
        }],
        Decl::Class(c) => vec![Declared {
            name: c.ident.sym.to_string(),
            node: FnNode::Class(&c.class),
            kind: TargetKind::ClassConstructor,
            stmt,
            marker_offsets: vec![lo],
            hoistable: false,
        }],
        Decl::Var(var) => var
            .decls
            .iter()
            .filter_map(|declarator| {
                let Pat::Ident(binding) = &declarator.name else {
                    return None;
                };
                let node = FnNode::from_expr(declarator.init.as_deref()?)?;
                Some(Declared {
                    name: binding.id.sym.to_string(),
                    node,
                    kind: node.kind(),
                    stmt,
                    marker_offsets: vec![lo, src.offset(declarator.span.lo)],
                    hoistable: false,
                })
            })
            .collect(),
        _ => Vec::new(),
    }
}
