//! External language adapters.
//!
//! An adapter turns one domain's alternate-language source (a templating
//! dialect, a script dialect, a stylesheet preprocessor) into the base
//! language of that domain. The compiler never links any of them: callers
//! register what they need in an [`AdapterRegistry`] and hand it to
//! [`Compiler::new`](crate::Compiler::new). Lookups happen by name, only when
//! a document asks for the language.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::error::{BoxError, CompileError, Result};

/// The three adapter domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Template,
    Script,
    Style,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Template => write!(f, "template"),
            Domain::Script => write!(f, "script"),
            Domain::Style => write!(f, "style"),
        }
    }
}

/// Whole-document pre-pass (e.g. an indentation based templating language).
pub trait TemplateAdapter: Send + Sync {
    fn compile(&self, source: &str, options: &Value, filename: &str)
        -> std::result::Result<String, BoxError>;
}

/// Script dialect to plain script.
pub trait ScriptAdapter: Send + Sync {
    fn compile(&self, source: &str, options: &Value, filename: &str)
        -> std::result::Result<String, BoxError>;
}

/// Stylesheet dialect to plain CSS. Receives the component tag name.
pub trait StyleAdapter: Send + Sync {
    fn compile(
        &self,
        tag_name: &str,
        source: &str,
        options: &Value,
        filename: &str,
    ) -> std::result::Result<String, BoxError>;
}

impl<F> TemplateAdapter for F
where
    F: Fn(&str, &Value, &str) -> std::result::Result<String, BoxError> + Send + Sync,
{
    fn compile(
        &self,
        source: &str,
        options: &Value,
        filename: &str,
    ) -> std::result::Result<String, BoxError> {
        self(source, options, filename)
    }
}

impl<F> ScriptAdapter for F
where
    F: Fn(&str, &Value, &str) -> std::result::Result<String, BoxError> + Send + Sync,
{
    fn compile(
        &self,
        source: &str,
        options: &Value,
        filename: &str,
    ) -> std::result::Result<String, BoxError> {
        self(source, options, filename)
    }
}

impl<F> StyleAdapter for F
where
    F: Fn(&str, &str, &Value, &str) -> std::result::Result<String, BoxError> + Send + Sync,
{
    fn compile(
        &self,
        tag_name: &str,
        source: &str,
        options: &Value,
        filename: &str,
    ) -> std::result::Result<String, BoxError> {
        self(tag_name, source, options, filename)
    }
}

/// Script adapter that returns its input untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl ScriptAdapter for Passthrough {
    fn compile(
        &self,
        source: &str,
        _options: &Value,
        _filename: &str,
    ) -> std::result::Result<String, BoxError> {
        Ok(source.to_string())
    }
}

/// Name-keyed adapters, one table per domain.
#[derive(Default)]
pub struct AdapterRegistry {
    templates: HashMap<String, Box<dyn TemplateAdapter>>,
    scripts: HashMap<String, Box<dyn ScriptAdapter>>,
    styles: HashMap<String, Box<dyn StyleAdapter>>,
}

impl AdapterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in `none` and `javascript` script adapters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_script("none", Passthrough);
        registry.register_script("javascript", Passthrough);
        registry
    }

    pub fn register_template(&mut self, name: &str, adapter: impl TemplateAdapter + 'static) {
        self.templates.insert(name.to_string(), Box::new(adapter));
    }

    pub fn register_script(&mut self, name: &str, adapter: impl ScriptAdapter + 'static) {
        self.scripts.insert(name.to_string(), Box::new(adapter));
    }

    pub fn register_style(&mut self, name: &str, adapter: impl StyleAdapter + 'static) {
        self.styles.insert(name.to_string(), Box::new(adapter));
    }

    pub fn template(&self, name: &str) -> Result<&dyn TemplateAdapter> {
        self.templates
            .get(name)
            .map(|a| a.as_ref())
            .ok_or_else(|| missing(Domain::Template, name))
    }

    pub fn script(&self, name: &str) -> Result<&dyn ScriptAdapter> {
        self.scripts
            .get(name)
            .map(|a| a.as_ref())
            .ok_or_else(|| missing(Domain::Script, name))
    }

    pub fn style(&self, name: &str) -> Result<&dyn StyleAdapter> {
        self.styles
            .get(name)
            .map(|a| a.as_ref())
            .ok_or_else(|| missing(Domain::Style, name))
    }

    /// Runs the template pre-pass adapter `lang`.
    pub(crate) fn run_template(
        &self,
        lang: &str,
        source: &str,
        options: &Value,
        filename: &str,
    ) -> Result<String> {
        tracing::trace!(lang, "running template adapter");
        self.template(lang)?
            .compile(source, options, filename)
            .map_err(|source| failure(Domain::Template, lang, source))
    }

    /// Runs the script adapter `lang`.
    pub(crate) fn run_script(
        &self,
        lang: &str,
        source: &str,
        options: &Value,
        filename: &str,
    ) -> Result<String> {
        tracing::trace!(lang, "running script adapter");
        self.script(lang)?
            .compile(source, options, filename)
            .map_err(|source| failure(Domain::Script, lang, source))
    }

    /// Runs the style adapter `lang`.
    pub(crate) fn run_style(
        &self,
        lang: &str,
        tag_name: &str,
        source: &str,
        options: &Value,
        filename: &str,
    ) -> Result<String> {
        tracing::trace!(lang, tag_name, "running style adapter");
        self.style(lang)?
            .compile(tag_name, source, options, filename)
            .map_err(|source| failure(Domain::Style, lang, source))
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |map: Vec<&String>| {
            let mut v: Vec<String> = map.into_iter().cloned().collect();
            v.sort();
            v
        };
        f.debug_struct("AdapterRegistry")
            .field("templates", &names(self.templates.keys().collect()))
            .field("scripts", &names(self.scripts.keys().collect()))
            .field("styles", &names(self.styles.keys().collect()))
            .finish()
    }
}

fn missing(domain: Domain, lang: &str) -> CompileError {
    CompileError::MissingAdapter {
        domain,
        lang: lang.to_string(),
    }
}

fn failure(domain: Domain, lang: &str, source: BoxError) -> CompileError {
    CompileError::AdapterFailure {
        domain,
        lang: lang.to_string(),
        source,
    }
}
