//! Markup normalization.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::attributes::parse_attribs;
use crate::compiler::CompileContext;
use crate::error::Result;
use crate::expression::ExpressionTable;
use crate::source::TRIM_TRAIL;

/// Stands in for a protected `<pre>` block while whitespace is collapsed.
const PRE_MARK: &str = "\u{2}";

lazy_static! {
    static ref HTML_TAGS: Regex = Regex::new(
        r#"<(-?[A-Za-z][-0-9A-Za-z_\x{A0}-\x{FF}]*)(?:\s+([^"'/>]*(?:(?:"[^"]*"|'[^']*'|/[^>])[^'"/>]*)*)|\s*)(/?)>"#
    )
    .unwrap();

    static ref VOID_TAGS: Regex = Regex::new(
        r"^(?:input|img|br|wbr|hr|area|base|col|embed|keygen|link|meta|param|source|track)$"
    )
    .unwrap();

    static ref HAS_PRE: Regex = Regex::new(r"<pre[\s>]").unwrap();

    static ref PRE_TAGS: Regex =
        Regex::new(r#"(?i)<pre(?:\s+(?:[^">]*|"[^"]*")*)?>([\s\S]+?)</pre\s*>"#).unwrap();

    static ref PRE_MARKS: Regex = Regex::new(r"\x02").unwrap();

    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();

    /// Blanks between the end of a tag and the start of the next one.
    static ref HTML_PACK: Regex = Regex::new(r">[ \t]+<(-?[A-Za-z]|/[-A-Za-z])").unwrap();
}

pub fn is_void_tag(name: &str) -> bool {
    VOID_TAGS.is_match(name)
}

/// Normalizes one markup fragment, sharing `table` with the rest of the tag.
pub(crate) fn compile_fragment(
    ctx: &CompileContext,
    html: &str,
    table: &mut ExpressionTable,
) -> Result<String> {
    if html.trim().is_empty() {
        return Ok(String::new());
    }

    let html = ctx.extract_expressions(html, table)?;
    let table = &*table;

    let html = HTML_TAGS.replace_all(&html, |caps: &Captures| {
        let name = caps[1].to_lowercase();
        let ends = if !caps[3].is_empty() && !is_void_tag(&name) {
            format!("></{}", name)
        } else {
            String::new()
        };
        match caps.get(2).map(|m| m.as_str()).filter(|a| !a.is_empty()) {
            Some(attribs) => format!("<{} {}{}>", name, parse_attribs(attribs, table), ends),
            None => format!("<{}{}>", name, ends),
        }
    });

    let mut html = html.into_owned();

    if !ctx.options.whitespace {
        html = collapse_whitespace(&html);
    }

    if ctx.options.compact {
        html = HTML_PACK.replace_all(&html, "><$1").into_owned();
    }

    let html = table.restore(&html);
    Ok(TRIM_TRAIL.replace_all(&html, "").into_owned())
}

/// Collapses whitespace runs to one space, leaving `<pre>` blocks as written.
fn collapse_whitespace(html: &str) -> String {
    let mut protected = Vec::new();
    let html = if HAS_PRE.is_match(html) {
        PRE_TAGS
            .replace_all(html, |caps: &Captures| {
                protected.push(caps[0].to_string());
                PRE_MARK
            })
            .into_owned()
    } else {
        html.to_string()
    };

    let html = WHITESPACE.replace_all(html.trim(), " ");
    if protected.is_empty() {
        return html.into_owned();
    }

    let mut blocks = protected.into_iter();
    PRE_MARKS
        .replace_all(&html, |_: &Captures| blocks.next().unwrap_or_default())
        .into_owned()
}
