use inject_annotate::{
    catalog::{member_call, plain_args, plugin::builtin},
    mapping, transform, Error, Options, Plugin, RenameRule, SourceMapArtifact, SourceMapOptions,
    WarningKind,
};
use pretty_assertions::assert_eq;
use swc_core::ecma::ast::{CallExpr, Expr};

fn add(text: &str) -> String {
    transform(text, &Options::add()).unwrap().text
}

fn remove(text: &str) -> String {
    transform(text, &Options::remove()).unwrap().text
}

fn rebuild(text: &str) -> String {
    transform(text, &Options::rebuild()).unwrap().text
}

/// 0-based line and UTF-16 column of the first occurrence of `needle`.
fn find(text: &str, needle: &str) -> (u32, u32) {
    let offset = text
        .find(needle)
        .unwrap_or_else(|| panic!("{needle:?} not found"));
    let before = &text[..offset];
    let line = before.matches('\n').count() as u32;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = text[line_start..offset].encode_utf16().count() as u32;
    (line, column)
}

const ORIGINAL: &str = r#"angular.module("app", [])
    .controller("MainCtrl", function ($scope, $http) {
        $scope.items = [];
    })
    .directive("widget", function ($timeout) {
        return {
            controller: function ($element) {}
        };
    })
    .value("version", "1.0");

myMod.factory("svc", ($q, $log) => $q.when($log));

/* @ngInject */
function Routes($routeProvider) {
    $routeProvider.when("/", {
        controller: function ($location) {},
        resolve: { data: function (api) { return api.get(); } }
    });
}
"#;

const ANNOTATED: &str = r#"angular.module("app", [])
    .controller("MainCtrl", ["$scope", "$http", function ($scope, $http) {
        $scope.items = [];
    }])
    .directive("widget", ["$timeout", function ($timeout) {
        return {
            controller: ["$element", function ($element) {}]
        };
    }])
    .value("version", "1.0");

myMod.factory("svc", ["$q", "$log", ($q, $log) => $q.when($log)]);

/* @ngInject */
function Routes($routeProvider) {
    $routeProvider.when("/", {
        controller: ["$location", function ($location) {}],
        resolve: { data: ["api", function (api) { return api.get(); }] }
    });
}
Routes.$inject = ["$routeProvider"];
"#;

#[test]
fn test_add_annotates_every_shape() {
    assert_eq!(add(ORIGINAL), ANNOTATED);
}

#[test]
fn test_add_is_idempotent() {
    assert_eq!(add(ANNOTATED), ANNOTATED);
}

#[test]
fn test_remove_restores_original() {
    assert_eq!(remove(ANNOTATED), ORIGINAL);
}

#[test]
fn test_rebuild_matches_repeated_add() {
    assert_eq!(rebuild(ORIGINAL), add(&add(ORIGINAL)));
    assert_eq!(rebuild(ANNOTATED), ANNOTATED);
}

#[test]
fn test_prologue_directive_declaration() {
    let original = "function Ctrl($log) {\n    \"ngInject\";\n}\n";
    let annotated = add(original);
    assert_eq!(
        annotated,
        "function Ctrl($log) {\n    \"ngInject\";\n}\nCtrl.$inject = [\"$log\"];\n"
    );
    assert_eq!(remove(&annotated), original);
}

#[test]
fn test_crlf_line_endings_are_kept() {
    let original = "function Ctrl($log) {\r\n    \"ngInject\";\r\n}\r\n";
    assert_eq!(
        add(original),
        "function Ctrl($log) {\r\n    \"ngInject\";\r\n}\r\nCtrl.$inject = [\"$log\"];\r\n"
    );
}

#[test]
fn test_order_is_preserved() {
    let annotated = add("myMod.service(\"s\", function (c, a, b) {});");
    assert_eq!(
        annotated,
        "myMod.service(\"s\", [\"c\", \"a\", \"b\", function (c, a, b) {}]);"
    );
}

#[test]
fn test_single_quotes_are_followed() {
    let annotated = add("myMod.service('s', function ($http) {});");
    assert_eq!(annotated, "myMod.service('s', ['$http', function ($http) {}]);");
}

#[test]
fn test_name_filter_scoping() {
    let original = r#"myMod.controller("A", function ($a) {});
other.controller("B", function ($b) {});
"#;
    let options = Options {
        name_filter: Some("^myMod".to_string()),
        ..Options::add()
    };
    let annotated = transform(original, &options).unwrap().text;
    assert_eq!(
        annotated,
        r#"myMod.controller("A", ["$a", function ($a) {}]);
other.controller("B", function ($b) {});
"#
    );
}

#[test]
fn test_rename_is_scoped_to_the_target() {
    let original = r#"myMod.controller("A", function ($a, $b) {
    return $a.get($b);
});
function unrelated($a) {
    return $a;
}
"#;
    let options = Options {
        rename: vec![RenameRule::new("$a", "$aRenamed")],
        ..Options::add()
    };
    let output = transform(original, &options).unwrap();
    assert_eq!(
        output.text,
        r#"myMod.controller("A", ["$aRenamed", "$b", function ($aRenamed, $b) {
    return $aRenamed.get($b);
}]);
function unrelated($a) {
    return $a;
}
"#
    );
}

#[test]
fn test_hand_written_manifests_survive_remove() {
    let separated = r#"/* @ngInject */
function Svc($http) {}
var x = 1;
Svc.$inject = ["$http"];
"#;
    let output = transform(separated, &Options::remove()).unwrap();
    assert_eq!(output.text, separated);
    assert_eq!(output.warnings.len(), 1);
    assert_eq!(output.warnings[0].kind, WarningKind::AmbiguousManifest);
    assert_eq!(output.warnings[0].line, 4);

    let computed = "myMod.factory(\"f\", [dep, function (dep) {}]);";
    let output = transform(computed, &Options::remove()).unwrap();
    assert_eq!(output.text, computed);
    assert_eq!(output.warnings.len(), 1);

    let json = serde_json::to_value(&output.warnings[0]).unwrap();
    assert_eq!(json["kind"], "ambiguous-manifest");
}

#[test]
fn test_stale_property_manifest_is_replaced() {
    let original = "function Svc($http, $q) {}\nSvc.$inject = [\"$http\"];\n";
    assert_eq!(
        add(original),
        "function Svc($http, $q) {}\nSvc.$inject = [\"$http\", \"$q\"];\n"
    );
    assert_eq!(remove(original), "function Svc($http, $q) {}\n");
}

#[test]
fn test_classes() {
    let original = r#"class Plain {
    constructor($log) {}
}
/** @ngInject */
class Marked {
    constructor($log) {}
}
class MarkedConstructor {
    /** @ngInject */
    constructor($log) {}
}
let Expr = class {
    constructor($log) {
        "ngInject";
    }
};
"#;
    let annotated = add(original);
    assert_eq!(
        annotated,
        r#"class Plain {
    constructor($log) {}
}
Plain.$inject = ["$log"];
/** @ngInject */
class Marked {
    constructor($log) {}
}
Marked.$inject = ["$log"];
class MarkedConstructor {
    /** @ngInject */
    constructor($log) {}
}
MarkedConstructor.$inject = ["$log"];
let Expr = class {
    constructor($log) {
        "ngInject";
    }
};
Expr.$inject = ["$log"];
"#
    );
    assert_eq!(remove(&annotated), original);
}

#[test]
fn test_declaration_after_return_is_hoisted() {
    let original = r#"function outer() {
    return Inner;

    /* @ngInject */
    function Inner($q) {}
}
"#;
    let annotated = add(original);
    assert_eq!(
        annotated,
        r#"function outer() {
    Inner.$inject = ["$q"];
    return Inner;

    /* @ngInject */
    function Inner($q) {}
}
"#
    );
    assert_eq!(remove(&annotated), original);
}

#[test]
fn test_no_inject_marker() {
    let original = "myMod.controller(\"A\", function ($a) {\n    \"ngNoInject\";\n});\n";
    assert_eq!(add(original), original);
}

#[test]
fn test_dashboard_plugin() {
    let original = r#"dashboardProvider.widget("news", {
    controller: function ($scope, feed) {},
    resolve: {
        feed: function ($http) {}
    }
});
"#;
    assert_eq!(add(original), original);

    let plugin = builtin("angular-dashboard-framework").unwrap();
    let options = Options::add().with_plugin(plugin);
    let annotated = transform(original, &options).unwrap().text;
    assert_eq!(
        annotated,
        r#"dashboardProvider.widget("news", {
    controller: ["$scope", "feed", function ($scope, feed) {}],
    resolve: {
        feed: ["$http", function ($http) {}]
    }
});
"#
    );

    let options = Options::remove().with_plugin(plugin);
    assert_eq!(transform(&annotated, &options).unwrap().text, original);
}

fn any_controller(call: &CallExpr) -> bool {
    matches!(member_call(call), Some((_, "controller")))
}

fn second_argument(call: &CallExpr) -> Vec<&Expr> {
    plain_args(call)
        .and_then(|args| args.get(1).copied())
        .into_iter()
        .collect()
}

#[test]
fn test_plugin_and_builtin_on_the_same_call_annotate_once() {
    let plugin = Plugin {
        name: "any-controller",
        matches: any_controller,
        extract: second_argument,
    };
    let original = "myMod.controller(\"A\", function ($a) {});\n";
    let annotated = "myMod.controller(\"A\", [\"$a\", function ($a) {}]);\n";

    let output = transform(original, &Options::add().with_plugin(plugin)).unwrap();
    assert_eq!(output.text, annotated);
    assert!(output.warnings.is_empty());

    // Only the plugin knows this callee.
    let filtered = Options {
        name_filter: Some("^nothing$".to_string()),
        ..Options::add().with_plugin(plugin)
    };
    assert_eq!(transform(original, &filtered).unwrap().text, annotated);

    let options = Options::remove().with_plugin(plugin);
    assert_eq!(transform(annotated, &options).unwrap().text, original);
}

#[test]
fn test_one_line_block_keeps_its_layout() {
    let original = "if (x) { /* @ngInject */ function A($a) {} }\n";
    let annotated = add(original);
    assert_eq!(
        annotated,
        "if (x) { /* @ngInject */ function A($a) {} A.$inject = [\"$a\"]; }\n"
    );
    assert_eq!(add(&annotated), annotated);
    assert_eq!(remove(&annotated), original);
}

const NEEDLES: &str = r#""before";
angular.module("m").controller("ctrl1", function (ctrl1_param1, ctrl1_param2) {
    "ctrl1 body";
});
myMod.factory("ctrl2", function (ctrl2_param1, ctrl2_param2) {
    "ctrl2 body";
});
/* @ngInject */
function ctrl3(ctrl3_param1, ctrl3_param2) {
    "ctrl3 body";
}
myMod.service("ctrl4", function (ctrl4_param1, ctrl4_param2) {
    "ctrl4 body";
});
"after";
"#;

fn needles() -> Vec<String> {
    let mut out = vec!["\"before\"".to_string()];
    for i in 1..=4 {
        out.push(format!("(ctrl{i}_param1, ctrl{i}_param2)"));
        out.push(format!("\"ctrl{i} body\""));
    }
    out.push("\"after\"".to_string());
    out
}

#[test]
fn test_source_map_resolves_needles() {
    let options = Options {
        source_map: Some(SourceMapOptions {
            source_root: Some("/source/root/dir".to_string()),
            ..Default::default()
        }),
        ..Options::rebuild()
    };
    let output = transform(NEEDLES, &options).unwrap();
    let map = output.map.unwrap();
    assert_eq!(map.source_root(), Some("/source/root/dir"));
    assert_eq!(map.sources(), vec![mapping::DEFAULT_SOURCE.to_string()]);

    for needle in needles() {
        let (line, column) = find(&output.text, &needle);
        let found = map.lookup(line, column).unwrap();
        assert_eq!((found.line, found.column), find(NEEDLES, &needle), "{needle}");
    }
}

#[test]
fn test_source_map_chains_through_inline_input() {
    // First pass strips the manifests; its map points back at the annotated text.
    let annotated = add(NEEDLES);
    let first = transform(
        &annotated,
        &Options {
            source_map: Some(SourceMapOptions {
                in_file: Some("annotated.js".to_string()),
                ..Default::default()
            }),
            ..Options::remove()
        },
    )
    .unwrap();
    assert_eq!(first.text, NEEDLES);

    let mut chained_input = first.text.clone();
    mapping::append_inline(&mut chained_input, "\n", first.map.as_ref().unwrap()).unwrap();

    let second = transform(
        &chained_input,
        &Options {
            source_map: Some(SourceMapOptions {
                inline: true,
                in_file: Some("stripped.js".to_string()),
                ..Default::default()
            }),
            ..Options::add()
        },
    )
    .unwrap();

    let (stripped, map) = mapping::extract_inline(&second.text).unwrap().unwrap();
    assert!(stripped.starts_with(&annotated));
    assert_eq!(map.sources(), vec!["annotated.js".to_string()]);

    for needle in needles() {
        let (line, column) = find(&stripped, &needle);
        let found = map.lookup(line, column).unwrap();
        assert_eq!(found.source, "annotated.js");
        assert_eq!((found.line, found.column), find(&annotated, &needle), "{needle}");
    }
}

#[test]
fn test_source_map_chains_through_input_root() {
    let input = SourceMapArtifact::from_json(
        r#"{"version":3,"sourceRoot":"/r","sources":["a.coffee"],"names":[],"mappings":"AAAA"}"#,
    )
    .unwrap();
    let options = Options {
        source_map: Some(SourceMapOptions {
            input_map: Some(input),
            ..Default::default()
        }),
        ..Options::add()
    };
    let map = transform("x;\n", &options).unwrap().map.unwrap();
    let json: serde_json::Value = serde_json::from_str(&map.to_json().unwrap()).unwrap();
    assert_eq!(json["sources"], serde_json::json!(["a.coffee"]));
    assert_eq!(json["sourceRoot"], "/r");
    assert_eq!(map.resolved_sources(), vec!["/r/a.coffee".to_string()]);
}

#[test]
fn test_errors() {
    let bad_filter = Options {
        name_filter: Some("(".to_string()),
        ..Options::add()
    };
    assert!(matches!(
        transform("var a;", &bad_filter),
        Err(Error::Configuration(_))
    ));

    match transform("var a = 1;\nfunction (", &Options::add()) {
        Err(Error::Syntax { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected syntax error, got {other:?}"),
    }
}
