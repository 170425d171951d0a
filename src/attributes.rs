//! Attribute list normalization.

use lazy_static::lazy_static;
use regex::Regex;

use crate::expression::{has_placeholder, ExpressionTable};

/// Attributes whose interpolated values the runtime applies itself.
const RUNTIME_ATTRS: &[&str] = &["style", "src", "d", "value"];

/// Prefix given to [`RUNTIME_ATTRS`] holding an expression.
pub const RUNTIME_PREFIX: &str = "riot-";

lazy_static! {
    static ref HTML_ATTRS: Regex = Regex::new(
        r#" *([-0-9A-Za-z_:\x{A0}-\x{FF}]+) ?(?:= ?('[^']*'|"[^"]*"|\S+))?"#
    )
    .unwrap();

    /// Input types whose native value is validated against the type.
    static ref SPECIAL_TYPES: Regex =
        Regex::new(r#"(?i)^"(?:number|date(?:time)?|time|month|email|color)\b"#).unwrap();

    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Normalizes an attribute list with its expressions already extracted.
///
/// Names are lower-cased and every value is double quoted. A typed `<input>`
/// `type` is moved to the end, and turned into an expression when `value`
/// is dynamic, so the runtime sets it before the value.
pub fn parse_attribs(attribs: &str, table: &ExpressionTable) -> String {
    let attribs = WHITESPACE.replace_all(attribs, " ");
    let mut list = Vec::new();
    let mut deferred_type: Option<String> = None;
    let mut dynamic_value = false;

    for caps in HTML_ATTRS.captures_iter(&attribs) {
        let mut name = caps[1].to_lowercase();
        let Some(value) = caps.get(2).map(|m| m.as_str()) else {
            list.push(name);
            continue;
        };

        let value = if value.starts_with('"') {
            value.to_string()
        } else if value.starts_with('\'') {
            let inner = value.get(1..value.len().saturating_sub(1)).unwrap_or("");
            format!("\"{}\"", inner)
        } else {
            format!("\"{}\"", value)
        };

        if name == "type" && SPECIAL_TYPES.is_match(&value) {
            deferred_type = Some(value);
            continue;
        }

        if has_placeholder(&value) {
            if name == "value" {
                dynamic_value = true;
            }
            if RUNTIME_ATTRS.contains(&name.as_str()) {
                name = format!("{}{}", RUNTIME_PREFIX, name);
            }
        }
        list.push(format!("{}={}", name, value));
    }

    if let Some(mut value) = deferred_type {
        if dynamic_value {
            let d = table.delimiters();
            value = format!("\"{}'{}'{}\"", d.open, &value[1..value.len() - 1], d.close);
        }
        list.push(format!("type={}", value));
    }

    list.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brackets::Delimiters;

    fn parse(attribs: &str) -> String {
        let d = Delimiters::default();
        let table = ExpressionTable::new(&d);
        parse_attribs(attribs, &table)
    }

    #[test]
    fn test_quotes_are_normalized() {
        assert_eq!(
            parse("ID=main  class='a b'\n data-x=1 hidden"),
            r#"id="main" class="a b" data-x="1" hidden"#
        );
    }

    #[test]
    fn test_spaces_around_equals() {
        assert_eq!(parse(r#"title = "x""#), r#"title="x""#);
    }

    #[test]
    fn test_runtime_attrs_with_expressions() {
        assert_eq!(
            parse("style=\"\x01#0}\" src=\"\x01#1}\" class=\"\x01#2}\" value=\"v\""),
            "riot-style=\"\x01#0}\" riot-src=\"\x01#1}\" class=\"\x01#2}\" value=\"v\""
        );
    }

    #[test]
    fn test_special_type_is_deferred() {
        assert_eq!(
            parse(r#"type="email" name="a""#),
            r#"name="a" type="email""#
        );
        assert_eq!(parse(r#"type="text" name="a""#), r#"type="text" name="a""#);
    }

    #[test]
    fn test_special_type_with_dynamic_value() {
        assert_eq!(
            parse("type=\"number\" value=\"\x01#0}\""),
            "riot-value=\"\x01#0}\" type=\"{'number'}\""
        );
    }
}
