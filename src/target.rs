//! Resolved injectable targets and their manifest state.

use std::ops::Range;

use swc_core::ecma::ast::Id;

use crate::catalog::Matcher;

/// Arena index of a target, assigned in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Declaration,
    Expression,
    Arrow,
    ClassConstructor,
    RegistrationCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestState {
    Absent,
    /// `Name.$inject = [...]`
    ArrayLiteral,
    /// `["a", "b", function (a, b) {}]`
    InlineArrayCall,
    /// Only a `"ngInject"` directive; no array yet.
    PrologueDirective,
}

#[derive(Debug, Clone)]
pub struct ParameterBinding {
    pub name: String,
    pub span: Range<usize>,
    /// Scope-resolved identity of the binding; references share it.
    pub id: Id,
    pub renamed_to: Option<String>,
}

impl ParameterBinding {
    pub fn effective_name(&self) -> &str {
        self.renamed_to.as_deref().unwrap_or(&self.name)
    }
}

/// The registration call a target was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationContext {
    /// Source text of the object the method is called on (`angular.module("app")`, `myMod`).
    pub callee: String,
    pub method: String,
}

/// Where a manifest lives for this target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// The function is wrapped in an array literal at its own position.
    Inline,
    /// `name.$inject = [...];` as a separate statement.
    Property { name: String, anchor: Anchor },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// Own line right after the declaring statement, which ends at `pos`.
    After { pos: usize, indent: String },
    /// Own line right before the statement starting at `pos` (hoisted above a `return`).
    Before { pos: usize, indent: String },
}

/// A manifest found in the source for a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingManifest {
    /// Entries when every element is a plain string literal.
    pub names: Option<Vec<String>>,
    pub machine_authored: bool,
    /// Ranges a removal deletes. Pairs up with the ranges an insertion would create.
    pub removal: Vec<Range<usize>>,
    pub span: Range<usize>,
}

impl ExistingManifest {
    pub fn matches(&self, names: &[String]) -> bool {
        self.names.as_deref() == Some(names)
    }
}

#[derive(Debug, Clone)]
pub struct InjectableTarget {
    pub id: TargetId,
    /// Range of the function or class node.
    pub span: Range<usize>,
    pub kind: TargetKind,
    pub matcher: Matcher,
    pub params: Vec<ParameterBinding>,
    pub manifest: ManifestState,
    pub existing: Option<ExistingManifest>,
    pub slot: Slot,
    pub context: Option<RegistrationContext>,
}

impl InjectableTarget {
    /// Dependency names in parameter order, after renames.
    pub fn names(&self) -> Vec<String> {
        self.params
            .iter()
            .map(|p| p.effective_name().to_string())
            .collect()
    }
}
