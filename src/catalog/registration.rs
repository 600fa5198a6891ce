//! Built-in registration-call matchers.

use swc_core::{common::Spanned, ecma::ast::*};

use super::{
    chain_root, dotted_path, injectable_fn, is_ident, is_string, member_call, object_entries,
    object_prop, plain_args, unparen, CallMatch, Catalog, FnNode, Matcher,
};
use crate::{ast::ParsedSource, target::RegistrationContext};

/// Method names that register a component on a module.
pub const REGISTRATION_METHODS: &[&str] = &[
    "provider",
    "value",
    "constant",
    "bootstrap",
    "config",
    "factory",
    "directive",
    "filter",
    "run",
    "controller",
    "service",
    "animation",
    "invoke",
    "store",
    "decorator",
    "component",
];

/// Registered but never injected.
const NON_INJECTABLE: &[&str] = &["value", "constant", "bootstrap"];

/// Configuration-object keys holding injectable functions.
const ROUTE_KEYS: &[&str] = &[
    "controller",
    "controllerProvider",
    "templateProvider",
    "onEnter",
    "onExit",
];

fn found<'n>(
    matcher: Matcher,
    exprs: Vec<&'n Expr>,
    context: RegistrationContext,
) -> Vec<CallMatch<'n>> {
    exprs
        .into_iter()
        .map(|expr| CallMatch {
            matcher,
            expr,
            context: context.clone(),
        })
        .collect()
}

fn context(src: &ParsedSource, obj: &Expr, method: &str) -> RegistrationContext {
    RegistrationContext {
        callee: src.slice(obj.span()).to_string(),
        method: method.to_string(),
    }
}

// -----------------------------------------------------------------------------
// Module registrations
// -----------------------------------------------------------------------------

/// `angular.module("app").controller("Name", fn)`, chained forms and short forms whose object
/// passes the name filter.
pub(super) fn module_registration<'n>(
    catalog: &Catalog,
    src: &ParsedSource,
    call: &'n CallExpr,
) -> Vec<CallMatch<'n>> {
    let Some((obj, method)) = member_call(call) else {
        return Vec::new();
    };
    let Some(args) = plain_args(call) else {
        return Vec::new();
    };

    if is_ident(obj, "angular") && method == "module" {
        // angular.module("name", ["deps"], configFn)
        return match args.as_slice() {
            [_, _, config] => found(
                Matcher::ModuleRegistration,
                vec![*config],
                context(src, obj, method),
            ),
            _ => Vec::new(),
        };
    }
    if is_ident(obj, "$stateProvider") && method == "decorator" {
        return Vec::new();
    }
    if !REGISTRATION_METHODS.contains(&method) || NON_INJECTABLE.contains(&method) {
        return Vec::new();
    }
    if !is_module_chain(catalog, src, obj) {
        return Vec::new();
    }

    let target = match (method, args.as_slice()) {
        ("config" | "run", [target]) => *target,
        (_, [name, target]) if is_string(name) => *target,
        _ => return Vec::new(),
    };
    let exprs = match method {
        "component" => object_prop(target, "controller").into_iter().collect(),
        "directive" => {
            let mut exprs = vec![target];
            exprs.extend(returned_controller(target));
            exprs
        }
        "provider" => {
            let mut exprs = vec![target];
            exprs.extend(provider_get(target));
            exprs
        }
        _ => vec![target],
    };
    found(Matcher::ModuleRegistration, exprs, context(src, obj, method))
}

/// Whether `obj` is a module: `angular.module(...)`, a registration call on a module, or a short
/// form accepted by the name filter.
fn is_module_chain(catalog: &Catalog, src: &ParsedSource, obj: &Expr) -> bool {
    match unparen(obj) {
        Expr::Call(inner) => match member_call(inner) {
            Some((inner_obj, "module")) if is_ident(inner_obj, "angular") => true,
            Some((inner_obj, inner_method)) => {
                REGISTRATION_METHODS.contains(&inner_method)
                    && is_module_chain(catalog, src, inner_obj)
            }
            None => false,
        },
        other => catalog.name_filter().is_match(src.slice(other.span())),
    }
}

/// `controller` of the object a directive factory returns at its top level.
fn returned_controller(factory: &Expr) -> Option<&Expr> {
    let body = injectable_fn(factory)?.body()?;
    body.stmts.iter().find_map(|stmt| match stmt {
        Stmt::Return(ReturnStmt { arg: Some(arg), .. }) => object_prop(arg, "controller"),
        _ => None,
    })
}

/// `$get` of a provider, as object property or `this.$get = fn` in the provider body.
fn provider_get(provider: &Expr) -> Option<&Expr> {
    if let Some(get) = object_prop(provider, "$get") {
        return Some(get);
    }
    let FnNode::Function(function) = injectable_fn(provider)? else {
        return None;
    };
    function.body.as_ref()?.stmts.iter().find_map(|stmt| {
        let Stmt::Expr(ExprStmt { expr, .. }) = stmt else {
            return None;
        };
        let Expr::Assign(assign) = &**expr else {
            return None;
        };
        let AssignTarget::Simple(SimpleAssignTarget::Member(member)) = &assign.left else {
            return None;
        };
        let is_this_get = matches!(&*member.obj, Expr::This(_))
            && matches!(&member.prop, MemberProp::Ident(p) if &*p.sym == "$get");
        is_this_get.then_some(&*assign.right)
    })
}

// -----------------------------------------------------------------------------
// Service providers
// -----------------------------------------------------------------------------

/// Registrations on the injector's own providers, independent of the name filter.
pub(super) fn provider_registration<'n>(
    src: &ParsedSource,
    call: &'n CallExpr,
) -> Vec<CallMatch<'n>> {
    let Some((obj, method)) = member_call(call) else {
        return Vec::new();
    };
    let Some(path) = dotted_path(obj) else {
        return Vec::new();
    };
    let Some(args) = plain_args(call) else {
        return Vec::new();
    };

    let exprs = match (path.as_str(), method, args.as_slice()) {
        ("$provide", "decorator" | "service" | "factory" | "provider", [name, target])
        | (
            "$controllerProvider" | "$filterProvider" | "$animateProvider",
            "register",
            [name, target],
        )
        | ("$compileProvider", "directive", [name, target])
            if is_string(name) =>
        {
            vec![*target]
        }
        ("$injector", "invoke", [target]) => vec![*target],
        ("$httpProvider.interceptors", "push", targets) => targets.to_vec(),
        _ => return Vec::new(),
    };
    found(
        Matcher::ProviderRegistration,
        exprs,
        context(src, obj, method),
    )
}

// -----------------------------------------------------------------------------
// Route, state and dialog configuration
// -----------------------------------------------------------------------------

pub(super) fn route_config<'n>(src: &ParsedSource, call: &'n CallExpr) -> Vec<CallMatch<'n>> {
    let Some((obj, method)) = member_call(call) else {
        return Vec::new();
    };
    let Some(root) = dotted_path(chain_root(obj)) else {
        return Vec::new();
    };
    let Some(args) = plain_args(call) else {
        return Vec::new();
    };

    let config = match (root.as_str(), method, args.as_slice()) {
        ("$routeProvider", "when", [_, config])
        | ("$routeProvider", "otherwise", [config])
        | ("$stateProvider", "state", [_, config] | [config])
        | ("$modal" | "$uibModal", "open", [config])
        | ("$mdDialog" | "$mdToast" | "$mdBottomSheet", "show", [config]) => *config,
        _ => return Vec::new(),
    };
    found(
        Matcher::RouteConfig,
        config_functions(config),
        context(src, obj, method),
    )
}

/// Function-valued entries of a route or state configuration object.
pub fn config_functions(config: &Expr) -> Vec<&Expr> {
    let mut out = Vec::new();
    for (key, value) in object_entries(config) {
        match key {
            "resolve" => out.extend(object_entries(value).into_iter().map(|(_, v)| v)),
            "views" => {
                for (_, view) in object_entries(value) {
                    out.extend(config_functions(view));
                }
            }
            _ if ROUTE_KEYS.contains(&key) => out.push(value),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ast::with_globals, catalog::PluginRegistry};

    /// Source text of every function picked up from the first call statement.
    fn matched(text: &str, filter: Option<&str>) -> Vec<(Matcher, String)> {
        with_globals(|| {
            let src = ParsedSource::parse("t.js", text).unwrap();
            let catalog = Catalog::new(filter, PluginRegistry::default()).unwrap();
            let Program::Script(script) = src.program() else {
                panic!("expected script");
            };
            let Stmt::Expr(ExprStmt { expr, .. }) = &script.body[0] else {
                panic!("expected expression statement");
            };
            let Expr::Call(call) = &**expr else {
                panic!("expected call");
            };
            catalog
                .match_call(&src, call)
                .into_iter()
                .map(|m| (m.matcher, src.slice(m.expr.span()).to_string()))
                .collect()
        })
    }

    #[test]
    fn test_long_form_controller() {
        let found = matched(
            "angular.module(\"app\").controller(\"Ctrl\", function ($scope) {});",
            None,
        );
        assert_eq!(
            found,
            vec![(
                Matcher::ModuleRegistration,
                "function ($scope) {}".to_string()
            )]
        );
    }

    #[test]
    fn test_value_and_constant_are_skipped() {
        assert!(matched("myMod.value(\"v\", function ($a) {});", None).is_empty());
        assert!(matched("myMod.constant(\"c\", function ($a) {});", None).is_empty());
    }

    #[test]
    fn test_name_filter_applies_to_short_form() {
        let text = "other.factory(\"f\", function ($http) {});";
        assert!(matched(text, Some("^myMod")).is_empty());
        assert_eq!(matched(text, None).len(), 1);
    }

    #[test]
    fn test_chained_registration_is_always_eligible() {
        let text = "angular.module(\"m\").value(\"v\", 1).run(function ($rootScope) {});";
        let found = matched(text, Some("^nothing$"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, "function ($rootScope) {}");
    }

    #[test]
    fn test_directive_returned_controller() {
        let text = "myMod.directive(\"d\", function ($a) { return { controller: function ($b) {} }; });";
        let found: Vec<String> = matched(text, None).into_iter().map(|(_, s)| s).collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1], "function ($b) {}");
    }

    #[test]
    fn test_provider_get_assignment() {
        let text = "myMod.provider(\"p\", function ($a) { this.$get = function ($b) {}; });";
        let found: Vec<String> = matched(text, None).into_iter().map(|(_, s)| s).collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1], "function ($b) {}");
    }

    #[test]
    fn test_state_resolve_and_views() {
        let text = "$stateProvider.state(\"s\", { resolve: { a: function ($x) {} }, views: { main: { controller: function ($y) {} } } });";
        let found: Vec<String> = matched(text, None).into_iter().map(|(_, s)| s).collect();
        assert_eq!(found, vec!["function ($x) {}", "function ($y) {}"]);
    }

    #[test]
    fn test_state_decorator_is_not_registration() {
        assert!(matched("$stateProvider.decorator(\"x\", function ($a) {});", None).is_empty());
    }

    #[test]
    fn test_http_interceptors_push() {
        let found = matched(
            "$httpProvider.interceptors.push(function ($q) {}, function ($log) {});",
            None,
        );
        assert_eq!(found.len(), 2);
        assert!(found
            .iter()
            .all(|(m, _)| *m == Matcher::ProviderRegistration));
    }
}
