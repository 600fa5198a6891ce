use std::fmt;

use swc_core::ecma::ast::{CallExpr, Expr};

use super::dashboard;
use crate::error::{Error, Result};

/// Caller-supplied recogniser for a registration API outside the built-in catalog.
///
/// Both functions are pure; `extract` returns the candidate function expressions (bare functions,
/// arrows, classes or inline arrays ending in one). Anything else it returns is ignored.
#[derive(Clone, Copy)]
pub struct Plugin {
    pub name: &'static str,
    pub matches: fn(&CallExpr) -> bool,
    pub extract: fn(&CallExpr) -> Vec<&Expr>,
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin").field("name", &self.name).finish()
    }
}

impl PartialEq for Plugin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Ordered plugins for one transform call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginRegistry {
    plugins: Vec<Plugin>,
}

impl PluginRegistry {
    pub fn new(plugins: Vec<Plugin>) -> Self {
        Self { plugins }
    }

    /// Resolves built-in optional plugins by name, keeping the given order.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let plugins = names
            .iter()
            .map(|name| {
                builtin(name.as_ref()).ok_or_else(|| {
                    Error::Configuration(format!("unknown plugin {:?}", name.as_ref()))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { plugins })
    }

    pub fn push(&mut self, plugin: Plugin) {
        self.plugins.push(plugin);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plugin> {
        self.plugins.iter()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Built-in optional plugins, addressable from configuration.
pub fn builtin(name: &str) -> Option<Plugin> {
    match name {
        dashboard::NAME | "adf" => Some(dashboard::plugin()),
        _ => None,
    }
}
