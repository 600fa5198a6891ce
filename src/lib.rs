//! Adds, removes and rebuilds dependency-injection manifests in JavaScript sources.
//!
//! Functions whose parameters name injected dependencies are found through a fixed catalog of
//! syntactic shapes (registration calls, `"ngInject"` directives, `@ngInject` comments, existing
//! `$inject` statements) plus caller-supplied plugins, and get an explicit manifest:
//!
//! ```text
//! angular.module("app").controller("Ctrl", function ($scope, $http) {});
//! // becomes
//! angular.module("app").controller("Ctrl", ["$scope", "$http", function ($scope, $http) {}]);
//! ```
//!
//! Edits are minimal and textual; untouched code keeps its formatting byte for byte. A source
//! map can be produced for the rewritten text, optionally chained through an input map.

pub mod ast;
pub mod catalog;
pub mod edit;
pub mod error;
pub mod mapping;
pub mod options;
pub mod plan;
pub mod rename;
pub mod resolve;
pub mod rewrite;
pub mod target;
mod transform;

pub use catalog::{Plugin, PluginRegistry};
pub use error::{Error, Result, Warning, WarningKind};
pub use mapping::SourceMapArtifact;
pub use options::{Mode, Options, RenameRule, SourceMapOptions};
pub use transform::{transform, Output};
