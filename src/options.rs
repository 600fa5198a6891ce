use std::collections::HashMap;

use crate::{
    catalog::{Plugin, PluginRegistry},
    error::{Error, Result},
    mapping::SourceMapArtifact,
};

/// One parameter rename; `from` and `to` must both be identifiers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct RenameRule {
    pub from: String,
    pub to: String,
}

impl RenameRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceMapOptions {
    /// Append the map to the output as a base64 data-url comment.
    pub inline: bool,
    /// Map of a previous transform to chain through.
    pub input_map: Option<SourceMapArtifact>,
    pub source_root: Option<String>,
    /// Source name recorded in a fresh map.
    pub in_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Add,
    Remove,
    Rebuild,
    /// Neither add nor remove: only renames are applied.
    RenameOnly,
}

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub add: bool,
    pub remove: bool,
    pub rename: Vec<RenameRule>,
    /// Pattern over the object of short-form registrations (`myMod` in `myMod.factory(...)`).
    pub name_filter: Option<String>,
    pub plugins: PluginRegistry,
    pub source_map: Option<SourceMapOptions>,
}

impl Options {
    pub fn add() -> Self {
        Self {
            add: true,
            ..Default::default()
        }
    }

    pub fn remove() -> Self {
        Self {
            remove: true,
            ..Default::default()
        }
    }

    pub fn rebuild() -> Self {
        Self {
            add: true,
            remove: true,
            ..Default::default()
        }
    }

    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn mode(&self) -> Mode {
        match (self.add, self.remove) {
            (true, true) => Mode::Rebuild,
            (true, false) => Mode::Add,
            (false, true) => Mode::Remove,
            (false, false) => Mode::RenameOnly,
        }
    }

    /// Builds options from a JSON-style config map.
    ///
    /// Keys: `add`, `remove`, `rename` (`[{"from", "to"}]`), `regexp` / `nameFilter`,
    /// `plugin` / `plugins` (built-in plugin names), `map` / `sourceMap` (`true` or
    /// `{"inline", "inFile", "sourceRoot", "inputMap"}`). Unknown keys are ignored.
    pub fn from_config(mut config: HashMap<String, serde_json::Value>) -> Result<Self> {
        let add = config
            .remove("add")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let remove = config
            .remove("remove")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let rename = match config.remove("rename") {
            Some(value) => serde_json::from_value::<Vec<RenameRule>>(value)
                .map_err(|e| Error::Configuration(format!("invalid rename table: {e}")))?,
            None => Vec::new(),
        };

        let name_filter = take_alias(&mut config, "regexp", "nameFilter")
            .map(|v| match v {
                serde_json::Value::String(s) => Ok(s),
                other => Err(Error::Configuration(format!(
                    "name filter must be a string, got {other}"
                ))),
            })
            .transpose()?;

        let plugins = match take_alias(&mut config, "plugin", "plugins") {
            Some(serde_json::Value::String(name)) => PluginRegistry::from_names(&[name])?,
            Some(serde_json::Value::Array(names)) => {
                let names = names
                    .iter()
                    .map(|n| {
                        n.as_str().ok_or_else(|| {
                            Error::Configuration(format!("plugin name must be a string, got {n}"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                PluginRegistry::from_names(&names)?
            }
            Some(other) => {
                return Err(Error::Configuration(format!(
                    "plugins must be a name or a list of names, got {other}"
                )))
            }
            None => PluginRegistry::default(),
        };

        let source_map = match take_alias(&mut config, "map", "sourceMap") {
            None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => None,
            Some(serde_json::Value::Bool(true)) => Some(SourceMapOptions::default()),
            Some(serde_json::Value::Object(mut map)) => Some(SourceMapOptions {
                inline: map
                    .remove("inline")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
                source_root: map
                    .remove("sourceRoot")
                    .and_then(|v| v.as_str().map(|s| s.to_string())),
                in_file: map
                    .remove("inFile")
                    .and_then(|v| v.as_str().map(|s| s.to_string())),
                input_map: map.remove("inputMap").map(input_map).transpose()?,
            }),
            Some(other) => {
                return Err(Error::Configuration(format!(
                    "map must be a boolean or an object, got {other}"
                )))
            }
        };

        if !config.is_empty() {
            tracing::debug!("ignoring unknown options: {:?}", config.keys());
        }

        let options = Self {
            add,
            remove,
            rename,
            name_filter,
            plugins,
            source_map,
        };
        options.validate()?;
        Ok(options)
    }

    /// Checks what can be checked without the source; the name filter is compiled by the catalog.
    pub fn validate(&self) -> Result<()> {
        for rule in &self.rename {
            for name in [&rule.from, &rule.to] {
                if !is_identifier(name) {
                    return Err(Error::Configuration(format!(
                        "rename {:?} -> {:?}: {name:?} is not an identifier",
                        rule.from, rule.to
                    )));
                }
            }
        }
        Ok(())
    }
}

fn take_alias(
    config: &mut HashMap<String, serde_json::Value>,
    key: &str,
    alias: &str,
) -> Option<serde_json::Value> {
    let value = config.remove(key);
    let aliased = config.remove(alias);
    value.or(aliased)
}

fn input_map(value: serde_json::Value) -> Result<SourceMapArtifact> {
    let parsed = match &value {
        serde_json::Value::String(json) => SourceMapArtifact::from_json(json),
        _ => SourceMapArtifact::from_json(&value.to_string()),
    };
    parsed.map_err(|e| Error::Configuration(format!("invalid input map: {e}")))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn config(value: serde_json::Value) -> HashMap<String, serde_json::Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_mode_from_flags() {
        assert_eq!(Options::add().mode(), Mode::Add);
        assert_eq!(Options::remove().mode(), Mode::Remove);
        assert_eq!(Options::rebuild().mode(), Mode::Rebuild);
        assert_eq!(Options::default().mode(), Mode::RenameOnly);
    }

    #[test]
    fn test_from_config_reads_all_keys() {
        let options = Options::from_config(config(json!({
            "add": true,
            "rename": [{"from": "$a", "to": "$aRenamed"}],
            "regexp": "^myMod",
            "plugin": ["angular-dashboard-framework"],
            "map": {"inline": true, "inFile": "app.js", "sourceRoot": "/src"},
            "single_quotes": true
        })))
        .unwrap();

        assert_eq!(options.mode(), Mode::Add);
        assert_eq!(options.rename, vec![RenameRule::new("$a", "$aRenamed")]);
        assert_eq!(options.name_filter.as_deref(), Some("^myMod"));
        assert_eq!(options.plugins.len(), 1);
        let map = options.source_map.unwrap();
        assert!(map.inline);
        assert_eq!(map.in_file.as_deref(), Some("app.js"));
        assert_eq!(map.source_root.as_deref(), Some("/src"));
        assert!(map.input_map.is_none());
    }

    #[test]
    fn test_from_config_map_true_and_aliases() {
        let options = Options::from_config(config(json!({
            "remove": true,
            "nameFilter": "^app",
            "sourceMap": true
        })))
        .unwrap();
        assert_eq!(options.mode(), Mode::Remove);
        assert_eq!(options.name_filter.as_deref(), Some("^app"));
        assert!(options.source_map.is_some());
    }

    #[test]
    fn test_from_config_input_map_object() {
        let options = Options::from_config(config(json!({
            "add": true,
            "map": {"inputMap": {
                "version": 3,
                "sources": ["orig.js"],
                "names": [],
                "mappings": "AAAA"
            }}
        })))
        .unwrap();
        let input = options.source_map.unwrap().input_map.unwrap();
        assert_eq!(input.sources(), vec!["orig.js".to_string()]);
    }

    #[test]
    fn test_configuration_errors() {
        let bad_rename = Options::from_config(config(json!({
            "rename": [{"from": "$a", "to": "not an identifier"}]
        })));
        assert!(matches!(bad_rename, Err(Error::Configuration(_))));

        let bad_plugin = Options::from_config(config(json!({"plugin": "nope"})));
        assert!(matches!(bad_plugin, Err(Error::Configuration(_))));

        let bad_map = Options::from_config(config(json!({"map": {"inputMap": "{oops"}})));
        assert!(matches!(bad_map, Err(Error::Configuration(_))));

        let bad_filter = Options::from_config(config(json!({"regexp": 3})));
        assert!(matches!(bad_filter, Err(Error::Configuration(_))));
    }
}
