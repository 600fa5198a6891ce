//! angular-dashboard-framework widgets: `dashboardProvider.widget("name", {...})`.

use swc_core::ecma::ast::{CallExpr, Expr};

use super::{is_ident, is_string, member_call, object_entries, object_prop, plain_args, Plugin};

pub const NAME: &str = "angular-dashboard-framework";

pub fn plugin() -> Plugin {
    Plugin {
        name: NAME,
        matches,
        extract,
    }
}

fn matches(call: &CallExpr) -> bool {
    let Some((obj, "widget")) = member_call(call) else {
        return false;
    };
    is_ident(obj, "dashboardProvider")
        && matches!(plain_args(call).as_deref(), Some([name, _]) if is_string(name))
}

fn extract(call: &CallExpr) -> Vec<&Expr> {
    let Some(config) = call.args.get(1).map(|arg| &*arg.expr) else {
        return Vec::new();
    };
    let mut out = widget_functions(config);
    if let Some(edit) = object_prop(config, "edit") {
        out.extend(widget_functions(edit));
        out.extend(object_prop(edit, "apply"));
    }
    out
}

fn widget_functions(config: &Expr) -> Vec<&Expr> {
    let mut out: Vec<&Expr> = object_prop(config, "controller").into_iter().collect();
    if let Some(resolve) = object_prop(config, "resolve") {
        out.extend(object_entries(resolve).into_iter().map(|(_, v)| v));
    }
    out
}
