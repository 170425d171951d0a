//! `<script>` and `<style>` regions of a tag body.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::error::{CompileError, Result};

lazy_static! {
    static ref SCRIPTS: Regex =
        Regex::new(r"(?i)<script(\s+[^>]*)?>\n?([\s\S]*?)</script\s*>").unwrap();

    static ref STYLES: Regex =
        Regex::new(r"(?i)<style(\s+[^>]*)?>\n?([\s\S]*?)</style\s*>").unwrap();

    static ref TYPE_ATTR: Regex =
        Regex::new(r#"(?i)\stype\s*=\s*(?:'(.+?)'|"(.+?)"|(\S+))"#).unwrap();

    static ref SRC_ATTR: Regex = misc_attr("src");

    static ref OPTIONS_ATTR: Regex = misc_attr("options");
}

/// `name=value` where the value is quoted, a `{...}` expression or a bare word.
fn misc_attr(name: &str) -> Regex {
    Regex::new(&format!(
        r#"(?i)\s{}\s*=\s*("[^"\\]*(?:\\[\s\S][^"\\]*)*"|'[^'\\]*(?:\\[\s\S][^'\\]*)*'|\{{[^}}]+\}}|\S+)"#,
        regex::escape(name)
    ))
    .unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ZoneKind {
    Script,
    Style,
}

impl ZoneKind {
    fn pattern(self) -> &'static Regex {
        match self {
            ZoneKind::Script => &SCRIPTS,
            ZoneKind::Style => &STYLES,
        }
    }
}

/// One region: its opening-tag attributes and its content.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Zone {
    pub attribs: String,
    pub code: String,
}

impl Zone {
    /// Language named by `type`, without any `text/` prefix.
    pub fn lang(&self) -> Option<String> {
        let caps = TYPE_ATTR.captures(&self.attribs)?;
        let lang = caps.get(1).or(caps.get(2)).or(caps.get(3))?.as_str();
        Some(lang.replacen("text/", "", 1))
    }

    /// External source reference; such a region compiles to nothing.
    pub fn src(&self) -> Option<String> {
        attrib(&SRC_ATTR, &self.attribs)
    }

    /// Adapter options given inline through the `options` attribute.
    pub fn parser_options(&self) -> Result<Option<Map<String, Value>>> {
        let Some(raw) = attrib(&OPTIONS_ATTR, &self.attribs) else {
            return Ok(None);
        };
        let json = unescape_html(&raw);
        if json.is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(&json)
            .map_err(|e| CompileError::MalformedAttributeOptions {
                reason: e.to_string(),
            })?;
        match value {
            Value::Object(map) => Ok(Some(map)),
            Value::Null => Ok(None),
            other => Err(CompileError::MalformedAttributeOptions {
                reason: format!("expected a JSON object, found {}", other),
            }),
        }
    }
}

/// Removes every region of `kind` from `body`, returning the rest of the
/// body and the regions in document order.
pub(crate) fn take_zones(body: &str, kind: ZoneKind) -> (String, Vec<Zone>) {
    let mut zones = Vec::new();
    let rest = kind.pattern().replace_all(body, |caps: &Captures| {
        zones.push(Zone {
            attribs: caps.get(1).map_or("", |m| m.as_str()).to_string(),
            code: caps[2].to_string(),
        });
        ""
    });
    (rest.into_owned(), zones)
}

fn attrib(re: &Regex, attribs: &str) -> Option<String> {
    let value = re.captures(attribs)?.get(1)?.as_str();
    let value = if value.starts_with(['"', '\'']) {
        value.get(1..value.len() - 1).unwrap_or("")
    } else {
        value
    };
    Some(value.to_string()).filter(|v| !v.is_empty())
}

/// Decodes the entities an HTML serializer puts in attribute values.
pub fn unescape_html(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
}
