//! Compiler configuration.
//!
//! Options are read-only for the duration of a compile call. They can be
//! built in code or deserialized from the JSON shape used by the component
//! runtime tooling (`camelCase` keys, every field optional).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Default registration callee emitted in statement mode.
pub const DEFAULT_REGISTRAR: &str = "riot.tag2";

/// Parts of a tag that can be left out of the compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Part {
    Attribs,
    Html,
    Js,
    Css,
}

/// Per-domain option bags forwarded verbatim to adapters.
///
/// Each field is replaced wholesale when given, so passing `style: {}`
/// drops the default `prefixCSS` flag and with it selector scoping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    pub template: Map<String, Value>,
    pub js: Map<String, Value>,
    pub style: Map<String, Value>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        let mut style = Map::new();
        style.insert("prefixCSS".to_string(), Value::Bool(true));
        Self {
            template: Map::new(),
            js: Map::new(),
            style,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Template language for the whole-document pre-pass.
    pub template: Option<String>,
    /// Default script language.
    #[serde(rename = "type")]
    pub script_type: Option<String>,
    /// Default style language.
    pub style: Option<String>,
    /// Compile expressions through the default script adapter.
    pub expr: bool,
    /// Keep markup whitespace as written.
    pub whitespace: bool,
    /// Drop blanks between adjacent tags.
    pub compact: bool,
    /// Custom delimiter pair, e.g. `"[[ ]]"`.
    pub brackets: Option<String>,
    pub exclude: Vec<Part>,
    /// Put each registration argument on its own line.
    pub debug: bool,
    /// Return tag records instead of generated source.
    pub entities: bool,
    pub parser_options: ParserOptions,
    pub registrar: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            template: None,
            script_type: None,
            style: None,
            expr: false,
            whitespace: false,
            compact: false,
            brackets: None,
            exclude: Vec::new(),
            debug: false,
            entities: false,
            parser_options: ParserOptions::default(),
            registrar: DEFAULT_REGISTRAR.to_string(),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads options from a JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn includes(&self, part: Part) -> bool {
        !self.exclude.contains(&part)
    }

    pub fn with_entities(mut self, entities: bool) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_brackets(mut self, pair: &str) -> Self {
        self.brackets = Some(pair.to_string());
        self
    }

    pub fn with_script_type(mut self, lang: &str) -> Self {
        self.script_type = Some(lang.to_string());
        self
    }

    pub fn with_style(mut self, lang: &str) -> Self {
        self.style = Some(lang.to_string());
        self
    }

    pub fn with_template(mut self, lang: &str) -> Self {
        self.template = Some(lang.to_string());
        self
    }

    pub fn excluding(mut self, part: Part) -> Self {
        self.exclude.push(part);
        self
    }
}

/// Shallow merge of `extra` over `base`, as used for the `options` attribute.
pub(crate) fn merge_over(base: &Map<String, Value>, extra: Option<Map<String, Value>>) -> Value {
    let mut merged = base.clone();
    if let Some(extra) = extra {
        for (key, value) in extra {
            merged.insert(key, value);
        }
    }
    Value::Object(merged)
}

/// Truthiness of an option flag the way adapters' option bags expect it.
pub(crate) fn flag(options: &Value, key: &str) -> bool {
    match options.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let opts = Options::default();
        assert_eq!(opts.registrar, "riot.tag2");
        assert_eq!(opts.parser_options.style.get("prefixCSS"), Some(&json!(true)));
        assert!(opts.includes(Part::Html));
    }

    #[test]
    fn test_from_json() {
        let opts = Options::from_json(
            r#"{
                "type": "none",
                "compact": true,
                "exclude": ["css", "attribs"],
                "parserOptions": { "js": { "presets": ["x"] } }
            }"#,
        )
        .unwrap();
        assert_eq!(opts.script_type.as_deref(), Some("none"));
        assert!(opts.compact);
        assert!(!opts.includes(Part::Css));
        assert!(!opts.includes(Part::Attribs));
        assert!(opts.includes(Part::Js));
        // style bag keeps its default when not given
        assert_eq!(opts.parser_options.style.get("prefixCSS"), Some(&json!(true)));
        assert_eq!(opts.parser_options.js.get("presets"), Some(&json!(["x"])));
    }

    #[test]
    fn test_replaced_style_bag_drops_prefix() {
        let opts = Options::from_json(r#"{ "parserOptions": { "style": {} } }"#).unwrap();
        assert!(opts.parser_options.style.is_empty());
    }

    #[test]
    fn test_invalid_json() {
        assert!(Options::from_json(r#"{ "compact": "yes" }"#).is_err());
    }

    #[test]
    fn test_merge_and_flag() {
        let mut base = Map::new();
        base.insert("prefixCSS".into(), json!(true));
        let extra = json!({ "prefixCSS": false, "x": 1 });
        let merged = merge_over(&base, extra.as_object().cloned());
        assert!(!flag(&merged, "prefixCSS"));
        assert!(flag(&merged, "x"));
        assert!(!flag(&merged, "missing"));
    }
}
