//! Pattern catalog: the syntactic shapes that make a function an injection target.
//!
//! Shapes are a closed set of [`Matcher`] variants evaluated in a fixed order. Call-shaped
//! recognisers supplied by the caller extend the list through [`Plugin`] values, which always run
//! after the built-in ones.

pub mod dashboard;
pub mod plugin;
pub mod registration;

use regex::Regex;
use swc_core::{
    common::{Span, Spanned},
    ecma::ast::*,
};

use crate::{
    ast::ParsedSource,
    error::{Error, Result},
    target::{ParameterBinding, RegistrationContext, TargetKind},
};

pub use plugin::{Plugin, PluginRegistry};

/// Any plain identifier chain (`app`, `app.sub`, `$provide`).
pub const DEFAULT_NAME_FILTER: &str = r"^[a-zA-Z0-9_\$\.\s]+$";

const INJECT_COMMENT: &str = "@ngInject";
const NO_INJECT_COMMENT: &str = "@ngNoInject";
const INJECT_DIRECTIVE: &str = "ngInject";
const NO_INJECT_DIRECTIVE: &str = "ngNoInject";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Inject,
    NoInject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// `"ngInject"` at the top of the function (or constructor) body.
    PrologueDirective,
    /// `/** @ngInject */` in front of the function or its declaring statement.
    MarkerComment,
    /// `/** @ngInject */` in front of a class constructor, or a declared class whose constructor
    /// takes parameters.
    ClassConstructor,
    /// `angular.module(...).controller("name", fn)` and short forms.
    ModuleRegistration,
    /// `$provide.factory(...)`, `$injector.invoke(fn)` and friends.
    ProviderRegistration,
    /// Controllers and resolves in route, state and dialog configuration objects.
    RouteConfig,
    /// A declaration followed by its own `Name.$inject = [...]`.
    ExistingManifest,
    Plugin(&'static str),
}

impl Matcher {
    pub const BUILTIN: [Matcher; 7] = [
        Matcher::PrologueDirective,
        Matcher::MarkerComment,
        Matcher::ClassConstructor,
        Matcher::ModuleRegistration,
        Matcher::ProviderRegistration,
        Matcher::RouteConfig,
        Matcher::ExistingManifest,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Matcher::PrologueDirective => "prologue-directive",
            Matcher::MarkerComment => "marker-comment",
            Matcher::ClassConstructor => "class-constructor",
            Matcher::ModuleRegistration => "module-registration",
            Matcher::ProviderRegistration => "provider-registration",
            Matcher::RouteConfig => "route-config",
            Matcher::ExistingManifest => "existing-manifest",
            Matcher::Plugin(name) => *name,
        }
    }
}

/// Outcome of the function-level matchers for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionMatch {
    Flagged(Matcher),
    Suppressed,
    Unmatched,
}

/// A function-valued expression found inside a registration call.
#[derive(Debug, Clone)]
pub struct CallMatch<'n> {
    pub matcher: Matcher,
    pub expr: &'n Expr,
    pub context: RegistrationContext,
}

// -----------------------------------------------------------------------------
// Catalog
// -----------------------------------------------------------------------------

/// Read-only matcher configuration for one transform call.
pub struct Catalog {
    name_filter: Regex,
    plugins: PluginRegistry,
}

impl Catalog {
    pub fn new(name_filter: Option<&str>, plugins: PluginRegistry) -> Result<Self> {
        let pattern = name_filter.unwrap_or(DEFAULT_NAME_FILTER);
        let name_filter = Regex::new(pattern).map_err(|e| {
            Error::Configuration(format!("invalid name filter {pattern:?}: {e}"))
        })?;
        Ok(Self {
            name_filter,
            plugins,
        })
    }

    pub fn name_filter(&self) -> &Regex {
        &self.name_filter
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Runs the function-level matchers in catalog order.
    ///
    /// `marker_offsets` are the starts of the enclosing constructs a marker comment may precede
    /// (declaring statement, declarator, assignment); the node's own start is always checked.
    pub fn match_function(
        &self,
        src: &ParsedSource,
        node: FnNode<'_>,
        marker_offsets: &[usize],
        has_manifest: bool,
    ) -> FunctionMatch {
        let mut flagged = None;
        for matcher in Matcher::BUILTIN {
            let marker = match matcher {
                Matcher::PrologueDirective => node.body().and_then(|body| directive(src, body)),
                Matcher::MarkerComment => {
                    let own = src.offset(node.span().lo);
                    marker_offsets
                        .iter()
                        .copied()
                        .chain(std::iter::once(own))
                        .find_map(|offset| marker_before(src, offset))
                }
                Matcher::ClassConstructor => node
                    .constructor()
                    .and_then(|ctor| marker_before(src, src.offset(ctor.span.lo))),
                Matcher::ExistingManifest => has_manifest.then_some(Marker::Inject),
                _ => None,
            };
            match marker {
                Some(Marker::NoInject) => return FunctionMatch::Suppressed,
                Some(Marker::Inject) if flagged.is_none() => flagged = Some(matcher),
                _ => {}
            }
        }
        flagged.map_or(FunctionMatch::Unmatched, FunctionMatch::Flagged)
    }

    /// Only the suppression markers, for functions reached through registration calls.
    pub fn is_suppressed(&self, src: &ParsedSource, node: FnNode<'_>) -> bool {
        let directive = node.body().and_then(|body| directive(src, body));
        let comment = marker_before(src, src.offset(node.span().lo));
        directive == Some(Marker::NoInject) || comment == Some(Marker::NoInject)
    }

    /// Built-in call matchers in catalog order, then plugins in registration order.
    pub fn match_call<'n>(&self, src: &ParsedSource, call: &'n CallExpr) -> Vec<CallMatch<'n>> {
        let mut out = registration::module_registration(self, src, call);
        out.extend(registration::provider_registration(src, call));
        out.extend(registration::route_config(src, call));
        for plugin in self.plugins.iter() {
            if !(plugin.matches)(call) {
                continue;
            }
            let context = call_context(src, call, plugin.name);
            out.extend((plugin.extract)(call).into_iter().map(|expr| CallMatch {
                matcher: Matcher::Plugin(plugin.name),
                expr,
                context: context.clone(),
            }));
        }
        out
    }
}

fn call_context(src: &ParsedSource, call: &CallExpr, fallback: &str) -> RegistrationContext {
    match member_call(call) {
        Some((obj, method)) => RegistrationContext {
            callee: src.slice(obj.span()).to_string(),
            method: method.to_string(),
        },
        None => RegistrationContext {
            callee: fallback.to_string(),
            method: String::new(),
        },
    }
}

// -----------------------------------------------------------------------------
// Function shapes
// -----------------------------------------------------------------------------

/// Borrowed view of anything that can take injected parameters.
#[derive(Debug, Clone, Copy)]
pub enum FnNode<'n> {
    Function(&'n Function),
    Arrow(&'n ArrowExpr),
    Class(&'n Class),
}

impl<'n> FnNode<'n> {
    pub fn from_expr(expr: &'n Expr) -> Option<Self> {
        match unparen(expr) {
            Expr::Fn(f) => Some(FnNode::Function(&f.function)),
            Expr::Arrow(a) => Some(FnNode::Arrow(a)),
            Expr::Class(c) => Some(FnNode::Class(&c.class)),
            _ => None,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            FnNode::Function(f) => f.span,
            FnNode::Arrow(a) => a.span,
            FnNode::Class(c) => c.span,
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            FnNode::Function(_) => TargetKind::Expression,
            FnNode::Arrow(_) => TargetKind::Arrow,
            FnNode::Class(_) => TargetKind::ClassConstructor,
        }
    }

    pub fn constructor(&self) -> Option<&'n Constructor> {
        let FnNode::Class(class) = self else {
            return None;
        };
        class.body.iter().find_map(|member| match member {
            ClassMember::Constructor(ctor) => Some(ctor),
            _ => None,
        })
    }

    /// Statement body that may carry a prologue directive.
    pub fn body(&self) -> Option<&'n BlockStmt> {
        match self {
            FnNode::Function(f) => f.body.as_ref(),
            FnNode::Arrow(a) => match &*a.body {
                BlockStmtOrExpr::BlockStmt(block) => Some(block),
                BlockStmtOrExpr::Expr(_) => None,
            },
            FnNode::Class(_) => self.constructor().and_then(|ctor| ctor.body.as_ref()),
        }
    }

    /// Parameter bindings in order, or `None` when one of them is not a plain identifier.
    pub fn params(&self, src: &ParsedSource) -> Option<Vec<ParameterBinding>> {
        match self {
            FnNode::Function(f) => f.params.iter().map(|p| binding(src, &p.pat)).collect(),
            FnNode::Arrow(a) => a.params.iter().map(|p| binding(src, p)).collect(),
            FnNode::Class(_) => match self.constructor() {
                Some(ctor) => ctor
                    .params
                    .iter()
                    .map(|p| match p {
                        ParamOrTsParamProp::Param(p) => binding(src, &p.pat),
                        ParamOrTsParamProp::TsParamProp(_) => None,
                    })
                    .collect(),
                None => Some(Vec::new()),
            },
        }
    }
}

fn binding(src: &ParsedSource, pat: &Pat) -> Option<ParameterBinding> {
    match pat {
        Pat::Ident(b) => Some(ParameterBinding {
            name: b.id.sym.to_string(),
            span: src.range(b.id.span),
            id: b.id.to_id(),
            renamed_to: None,
        }),
        Pat::Assign(a) => binding(src, &a.left),
        _ => None,
    }
}

/// A function either bare or as the last element of an inline array manifest.
pub fn injectable_fn(expr: &Expr) -> Option<FnNode<'_>> {
    match unparen(expr) {
        Expr::Array(array) => {
            let last = array.elems.last()?.as_ref()?;
            if last.spread.is_some() {
                return None;
            }
            FnNode::from_expr(&last.expr)
        }
        other => FnNode::from_expr(other),
    }
}

// -----------------------------------------------------------------------------
// Markers
// -----------------------------------------------------------------------------

/// Marker carried by the comments directly in front of `offset`.
pub fn marker_before(src: &ParsedSource, offset: usize) -> Option<Marker> {
    let comments = src.comments().before(src.text(), offset);
    if comments.iter().any(|c| c.contains(NO_INJECT_COMMENT)) {
        Some(Marker::NoInject)
    } else if comments.iter().any(|c| c.contains(INJECT_COMMENT)) {
        Some(Marker::Inject)
    } else {
        None
    }
}

/// Marker carried by the prologue of `body`.
pub fn directive(src: &ParsedSource, body: &BlockStmt) -> Option<Marker> {
    for stmt in &body.stmts {
        let Stmt::Expr(ExprStmt { expr, .. }) = stmt else {
            break;
        };
        let Expr::Lit(Lit::Str(s)) = &**expr else {
            break;
        };
        match unquote(src.slice(s.span)) {
            Some(INJECT_DIRECTIVE) => return Some(Marker::Inject),
            Some(NO_INJECT_DIRECTIVE) => return Some(Marker::NoInject),
            _ => {}
        }
    }
    None
}

/// Contents of a string literal written without escapes.
pub fn unquote(raw: &str) -> Option<&str> {
    let quote = raw.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = raw.strip_prefix(quote)?.strip_suffix(quote)?;
    (!inner.contains('\\') && !inner.contains(quote)).then_some(inner)
}

// -----------------------------------------------------------------------------
// Expression helpers shared by matchers and plugins
// -----------------------------------------------------------------------------

pub fn unparen(mut expr: &Expr) -> &Expr {
    while let Expr::Paren(p) = expr {
        expr = &p.expr;
    }
    expr
}

/// `obj.method(...)` with a plain identifier as method name.
pub fn member_call(call: &CallExpr) -> Option<(&Expr, &str)> {
    let Callee::Expr(callee) = &call.callee else {
        return None;
    };
    let Expr::Member(member) = unparen(callee) else {
        return None;
    };
    let MemberProp::Ident(prop) = &member.prop else {
        return None;
    };
    Some((&member.obj, prop.sym.as_ref()))
}

/// Call arguments, or `None` when any of them is spread.
pub fn plain_args(call: &CallExpr) -> Option<Vec<&Expr>> {
    call.args
        .iter()
        .map(|arg| arg.spread.is_none().then_some(&*arg.expr))
        .collect()
}

pub fn is_ident(expr: &Expr, name: &str) -> bool {
    matches!(unparen(expr), Expr::Ident(i) if &*i.sym == name)
}

pub fn is_string(expr: &Expr) -> bool {
    matches!(unparen(expr), Expr::Lit(Lit::Str(_)))
}

/// Dotted path of a static member chain (`$httpProvider.interceptors`).
pub fn dotted_path(expr: &Expr) -> Option<String> {
    match unparen(expr) {
        Expr::Ident(i) => Some(i.sym.to_string()),
        Expr::This(_) => Some("this".to_string()),
        Expr::Member(m) => {
            let MemberProp::Ident(prop) = &m.prop else {
                return None;
            };
            let mut path = dotted_path(&m.obj)?;
            path.push('.');
            path.push_str(prop.sym.as_ref());
            Some(path)
        }
        _ => None,
    }
}

/// Root object of a call chain: `$routeProvider` for `$routeProvider.when(a).when(b)`.
pub fn chain_root(mut expr: &Expr) -> &Expr {
    while let Expr::Call(call) = unparen(expr) {
        match member_call(call) {
            Some((obj, _)) => expr = obj,
            None => break,
        }
    }
    unparen(expr)
}

fn prop_name(key: &PropName) -> Option<&str> {
    match key {
        PropName::Ident(i) => Some(i.sym.as_ref()),
        PropName::Str(s) => s.raw.as_ref().and_then(|raw| unquote(raw)),
        _ => None,
    }
}

/// Key/value entries of an object literal; other property kinds are skipped.
pub fn object_entries(expr: &Expr) -> Vec<(&str, &Expr)> {
    let Expr::Object(object) = unparen(expr) else {
        return Vec::new();
    };
    object
        .props
        .iter()
        .filter_map(|prop| match prop {
            PropOrSpread::Prop(prop) => match &**prop {
                Prop::KeyValue(kv) => Some((prop_name(&kv.key)?, &*kv.value)),
                _ => None,
            },
            PropOrSpread::Spread(_) => None,
        })
        .collect()
}

pub fn object_prop<'n>(expr: &'n Expr, key: &str) -> Option<&'n Expr> {
    object_entries(expr)
        .into_iter()
        .find_map(|(k, v)| (k == key).then_some(v))
}
