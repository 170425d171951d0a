//! Tag compilation entry points.
//!
//! A document is scanned for top-level custom tag blocks. Each block is
//! split into attributes, markup, stylesheets and script, every part is
//! compiled on its own, and the block is replaced by a registration call
//! (or collected as a [`TagRecord`] in entity mode). Text between blocks is
//! copied through untouched.

use std::collections::HashMap;
use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::adapters::AdapterRegistry;
use crate::attributes::parse_attribs;
use crate::blocks::split_blocks;
use crate::brackets::{Brackets, DelimiterMatcher, Delimiters};
use crate::error::Result;
use crate::expression::ExpressionTable;
use crate::html::compile_fragment;
use crate::options::{merge_over, Options, Part};
use crate::script::{hoist_imports, rewrite_methods};
use crate::source::{clean_source, normalize_output, TRIM_TRAIL};
use crate::style;
use crate::zones::{take_zones, Zone, ZoneKind};

lazy_static! {
    /// Opening tag at a line start: indent, name and optional attribute text.
    static ref TAG_OPEN: Regex = Regex::new(concat!(
        r#"(?m)^([ \t]*)<(-?[A-Za-z][-0-9A-Za-z_\x{A0}-\x{FF}]*)"#,
        r#"(?:\s+([^'"/>]+(?:(?:"[^"\\]*(?:\\[\s\S][^"\\]*)*"|'[^'\\]*(?:\\[\s\S][^'\\]*)*'|/[^>])[^'"/>]*)*)|\s*)?"#,
    ))
    .unwrap();

    static ref EXTRA_NEWLINES: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Compiled parts of one tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRecord {
    pub tag_name: String,
    pub html: String,
    pub css: String,
    pub attribs: String,
    pub js: String,
    pub imports: String,
}

/// Result of [`Compiler::compile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Generated source, one registration call per tag.
    Source(String),
    /// Tag records in document order.
    Entities(Vec<TagRecord>),
}

impl Output {
    pub fn source(&self) -> Option<&str> {
        match self {
            Output::Source(s) => Some(s.as_str()),
            Output::Entities(_) => None,
        }
    }

    pub fn entities(&self) -> Option<&[TagRecord]> {
        match self {
            Output::Entities(records) => Some(records.as_slice()),
            Output::Source(_) => None,
        }
    }
}

/// Options for a standalone [`Compiler::compile_css`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleOptions {
    /// Tag the selectors are scoped to; empty disables scoping.
    pub tag_name: String,
    /// Style adapter options; `prefixCSS: false` disables scoping.
    pub parser_options: Option<Value>,
    pub url: String,
}

/// Body of a matched block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Body<'s> {
    SelfClosing,
    /// Lines between the opening tag and a closing tag at the same indent.
    Block(&'s str),
    /// Text between opening and closing tag on one line.
    Inline(&'s str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TagBlock<'s> {
    range: Range<usize>,
    indent: &'s str,
    name: &'s str,
    attribs: Option<&'s str>,
    body: Body<'s>,
}

/// Close patterns built during one compile call, keyed by indent and name.
#[derive(Debug, Default)]
struct ClosePatterns {
    built: HashMap<(String, String), Option<Regex>>,
}

impl ClosePatterns {
    /// Body and closing tag following an opening tag named `name`. `None`
    /// when the pattern cannot be built.
    fn get(&mut self, indent: &str, name: &str) -> Option<&Regex> {
        self.built
            .entry((indent.to_string(), name.to_string()))
            .or_insert_with(|| match close_pattern(indent, name) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::trace!(tag = name, error = %e, "close pattern rejected");
                    None
                }
            })
            .as_ref()
    }
}

/// Finds the next tag block at or after `from`.
///
/// The block closes at the last closing tag of the same name sitting at the
/// start of a line with exactly the opening tag's indent. Openings without
/// such a close are skipped and left in the text.
fn next_tag_block<'s>(
    src: &'s str,
    from: usize,
    closers: &mut ClosePatterns,
) -> Option<TagBlock<'s>> {
    let mut pos = from;

    while let Some(open) = TAG_OPEN.captures_at(src, pos) {
        let whole = open.get(0)?;
        let indent = open.get(1).map_or("", |m| m.as_str());
        let name = open.get(2)?.as_str();
        let rest = &src[whole.end()..];

        let close = closers.get(indent, name).and_then(|re| re.captures(rest));

        if let Some(close) = close {
            let body = match (close.get(1), close.get(2)) {
                (Some(block), _) => Body::Block(block.as_str()),
                (None, Some(inline)) => Body::Inline(inline.as_str()),
                (None, None) => Body::SelfClosing,
            };
            let end = whole.end() + close.get(0)?.end();
            return Some(TagBlock {
                range: whole.start()..end,
                indent,
                name,
                attribs: open.get(3).map(|m| m.as_str()),
                body,
            });
        }

        tracing::trace!(tag = name, offset = whole.start(), "no closing tag, left as is");
        pos = whole.start() + 1;
    }

    None
}

fn close_pattern(indent: &str, name: &str) -> std::result::Result<Regex, regex::Error> {
    let name = regex::escape(name);
    Regex::new(&format!(
        r"(?im)\A(?:/>|>[ \t]*\n?([\s\S]*)^{indent}</{name}\s*>|>(.*)</{name}\s*>)",
        indent = regex::escape(indent),
        name = name,
    ))
}

/// Strips `indent` from the start of every line.
fn dedent(body: &str, indent: &str) -> String {
    if indent.is_empty() {
        return body.to_string();
    }
    body.split_inclusive('\n')
        .map(|line| line.strip_prefix(indent).unwrap_or(line))
        .collect()
}

/// Quotes `s` as a single-quoted script string.
fn quote(s: &str, escape_newlines: bool) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    let quoted = format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"));
    if escape_newlines {
        quoted.replace('\n', "\\n")
    } else {
        quoted
    }
}

/// Registration call for one compiled tag.
fn registration(record: &TagRecord, options: &Options) -> String {
    let sep = if options.debug { ",\n  " } else { ", " };
    let close = if !record.js.is_empty() && !record.js.ends_with('\n') {
        "\n});"
    } else {
        "});"
    };

    format!(
        "{imports}{registrar}('{name}'{sep}{html}{sep}{css}{sep}{attribs}, function(opts) {{\n{js}{close}",
        imports = record.imports,
        registrar = options.registrar,
        name = record.tag_name,
        sep = sep,
        html = quote(&record.html, true),
        css = quote(&record.css, false),
        attribs = quote(&record.attribs, false),
        js = record.js,
        close = close,
    )
}

/// Everything one compile call shares across its tags.
pub(crate) struct CompileContext<'a> {
    registry: &'a AdapterRegistry,
    matcher: &'a dyn DelimiterMatcher,
    pub options: &'a Options,
    delimiters: &'a Delimiters,
    url: &'a str,
}

impl<'a> CompileContext<'a> {
    pub fn new(
        registry: &'a AdapterRegistry,
        matcher: &'a dyn DelimiterMatcher,
        options: &'a Options,
        delimiters: &'a Delimiters,
        url: &'a str,
    ) -> Self {
        Self {
            registry,
            matcher,
            options,
            delimiters,
            url,
        }
    }

    /// Moves the expressions of `html` into `table`, compiling them through
    /// the default script adapter when `expr` is on.
    pub fn extract_expressions(&self, html: &str, table: &mut ExpressionTable) -> Result<String> {
        if self.options.expr && self.options.script_type.is_some() {
            let empty = Value::Object(Map::new());
            let compile = |expr: &str| self.compile_js(expr, None, &empty);
            table.extract(html, self.matcher, Some(&compile))
        } else {
            table.extract(html, self.matcher, None)
        }
    }

    /// Compiles script code. Without a language (given or default) the
    /// shorthand method rewrite is applied.
    pub fn compile_js(&self, js: &str, lang: Option<&str>, parser_options: &Value) -> Result<String> {
        if js.trim().is_empty() {
            return Ok(String::new());
        }

        let lang = lang
            .filter(|l| !l.is_empty())
            .or(self.options.script_type.as_deref());
        let code = match lang {
            Some(lang) => self
                .registry
                .run_script(lang, js, parser_options, self.url)?,
            None => rewrite_methods(js, self.matcher)?,
        };

        Ok(normalize_output(&code))
    }

    /// Compiles one `<script>` region; `None` when it refers to an external file.
    fn compile_script_zone(&self, zone: &Zone) -> Result<Option<String>> {
        if zone.src().is_some() {
            return Ok(None);
        }
        let parser_options = merge_over(&self.options.parser_options.js, zone.parser_options()?);
        let code = self.compile_js(&zone.code, zone.lang().as_deref(), &parser_options)?;
        Ok(Some(code).filter(|c| !c.is_empty()))
    }

    /// Compiles one `<style>` region scoped to `tag`.
    fn compile_style_zone(&self, zone: &Zone, tag: &str) -> Result<Option<String>> {
        if zone.src().is_some() {
            return Ok(None);
        }
        let parser_options =
            merge_over(&self.options.parser_options.style, zone.parser_options()?);
        let lang = zone.lang().or_else(|| self.options.style.clone());
        let css = style::compile_css(
            self.registry,
            &zone.code,
            tag,
            lang.as_deref(),
            Some(&parser_options),
            self.url,
        )?;
        Ok(Some(css))
    }

    fn compile_block(&self, block: &TagBlock) -> Result<TagRecord> {
        let options = self.options;
        let mut table = ExpressionTable::new(self.delimiters);
        let mut record = TagRecord {
            tag_name: block.name.to_lowercase(),
            ..TagRecord::default()
        };

        if let Some(attribs) = block.attribs.filter(|a| !a.is_empty()) {
            if options.includes(Part::Attribs) {
                let attribs = self.extract_expressions(attribs, &mut table)?;
                record.attribs = table.restore(&parse_attribs(&attribs, &table));
            }
        }

        match block.body {
            Body::Inline(body) if !body.trim().is_empty() => {
                if options.includes(Part::Html) {
                    record.html = compile_fragment(self, body, &mut table)?;
                }
            }
            Body::Block(body) if !body.trim().is_empty() => {
                self.compile_block_body(&mut record, body, block.indent, &mut table)?;
            }
            _ => {}
        }

        record.js = if record.js.trim().is_empty() {
            String::new()
        } else {
            EXTRA_NEWLINES.replace_all(&record.js, "\n\n").into_owned()
        };

        Ok(record)
    }

    fn compile_block_body(
        &self,
        record: &mut TagRecord,
        body: &str,
        indent: &str,
        table: &mut ExpressionTable,
    ) -> Result<()> {
        let options = self.options;
        let body = dedent(body, indent);

        let (body, scripts) = take_zones(&body, ZoneKind::Script);
        if options.includes(Part::Js) {
            for zone in &scripts {
                if let Some(code) = self.compile_script_zone(zone)? {
                    push_joined(&mut record.js, &code, "\n");
                }
            }
        }

        let (body, styles) = take_zones(&body, ZoneKind::Style);
        if options.includes(Part::Css) {
            for zone in &styles {
                if let Some(css) = self.compile_style_zone(zone, &record.tag_name)? {
                    push_joined(&mut record.css, &css, " ");
                }
            }
        }

        let (markup, script) = split_blocks(&TRIM_TRAIL.replace_all(&body, ""));

        if options.includes(Part::Html) {
            record.html = compile_fragment(self, &markup, table)?;
        }

        if options.includes(Part::Js) {
            let js_options = Value::Object(options.parser_options.js.clone());
            let code = self.compile_js(&script, None, &js_options)?;
            if !code.is_empty() {
                push_joined(&mut record.js, &code, "\n");
            }
            let (js, imports) = hoist_imports(&record.js);
            record.js = js;
            record.imports = imports;
        }

        Ok(())
    }
}

fn push_joined(buf: &mut String, part: &str, sep: &str) {
    if !buf.is_empty() {
        buf.push_str(sep);
    }
    buf.push_str(part);
}

/// Component tag compiler.
///
/// Holds only the adapter registry and the delimiter matcher, so one
/// compiler can serve any number of compile calls, from any thread.
pub struct Compiler {
    registry: AdapterRegistry,
    matcher: Box<dyn DelimiterMatcher>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(AdapterRegistry::with_defaults())
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Compiler {
    pub fn new(registry: AdapterRegistry) -> Self {
        Self {
            registry,
            matcher: Box::new(Brackets),
        }
    }

    /// Replaces the delimiter matcher.
    pub fn with_matcher(mut self, matcher: impl DelimiterMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Compiles every tag block of `source`.
    ///
    /// `url` is handed to adapters as the file name. The first error aborts
    /// the whole document.
    pub fn compile(&self, source: &str, options: &Options, url: &str) -> Result<Output> {
        let delimiters = self.matcher.normalize(options.brackets.as_deref())?;
        let ctx = CompileContext::new(&self.registry, self.matcher.as_ref(), options, &delimiters, url);

        let source = match options.template.as_deref().filter(|t| !t.is_empty()) {
            Some(lang) => {
                let template_options = Value::Object(options.parser_options.template.clone());
                self.registry
                    .run_template(lang, source, &template_options, url)?
            }
            None => source.to_string(),
        };
        let src = clean_source(&source);

        let mut out = String::with_capacity(src.len());
        let mut records = Vec::new();
        let mut last = 0;
        let mut closers = ClosePatterns::default();

        while let Some(block) = next_tag_block(&src, last, &mut closers) {
            let record = ctx.compile_block(&block)?;
            tracing::debug!(
                tag = %record.tag_name,
                html = record.html.len(),
                css = record.css.len(),
                js = record.js.len(),
                "compiled tag"
            );

            out.push_str(&src[last..block.range.start]);
            if options.entities {
                records.push(record);
            } else {
                out.push_str(&registration(&record, options));
            }
            last = block.range.end;
        }

        if options.entities {
            return Ok(Output::Entities(records));
        }
        out.push_str(&src[last..]);
        Ok(Output::Source(out))
    }

    /// Compiles a standalone markup fragment.
    pub fn compile_html(&self, html: &str, options: &Options) -> Result<String> {
        let delimiters = self.matcher.normalize(options.brackets.as_deref())?;
        let ctx = CompileContext::new(&self.registry, self.matcher.as_ref(), options, &delimiters, "");
        let mut table = ExpressionTable::new(&delimiters);
        compile_fragment(&ctx, &clean_source(html), &mut table)
    }

    /// Compiles a standalone stylesheet, through the `lang` style adapter
    /// unless it is plain CSS.
    pub fn compile_css(&self, css: &str, lang: Option<&str>, options: &StyleOptions) -> Result<String> {
        style::compile_css(
            &self.registry,
            css,
            &options.tag_name,
            lang,
            options.parser_options.as_ref(),
            &options.url,
        )
    }

    /// Compiles standalone script code, through the `lang` script adapter or
    /// with the shorthand method rewrite when no language is given.
    pub fn compile_js(
        &self,
        js: &str,
        lang: Option<&str>,
        parser_options: &Value,
        url: &str,
    ) -> Result<String> {
        let options = Options::default();
        let delimiters = Delimiters::default();
        let ctx = CompileContext::new(&self.registry, self.matcher.as_ref(), &options, &delimiters, url);
        ctx.compile_js(js, lang, parser_options)
    }
}
