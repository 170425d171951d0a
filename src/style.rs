//! Stylesheet compilation and selector scoping.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::adapters::AdapterRegistry;
use crate::error::Result;
use crate::options::flag;

/// Stands for the component root inside a selector.
const SCOPE_MARK: &str = ":scope";

/// Selectors never scoped: keyframe steps and the shadow host.
const UNSCOPED_SELECTORS: &[&str] = &["from", "to", ":host"];

lazy_static! {
    /// A selector group right before `{` (the brace itself is part of the
    /// match and handed back), or a quoted string to skip.
    static ref CSS_SELECTOR: Regex = Regex::new(concat!(
        r"([{}]|^)[; ]*((?:[^@ ;{}][^{}]*)?[^@ ;{}:] ?)\{",
        r#"|"[^"\n\\]*(?:\\[\s\S][^"\n\\]*)*""#,
        r"|'[^'\n\\]*(?:\\[\s\S][^'\n\\]*)*'",
    ))
    .unwrap();

    static ref SELECTOR: Regex = Regex::new(r"[^,]+").unwrap();

    static ref CSS_COMMENTS: Regex = Regex::new(r"/\*[^*]*\*+(?:[^*/][^*]*\*+)*/").unwrap();

    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Scopes every top-level selector of `css` to the component `tag`.
pub fn scoped_css(tag: &str, css: &str) -> String {
    let mut out = String::with_capacity(css.len() * 2);
    let mut last = 0;
    let mut pos = 0;

    while let Some(caps) = CSS_SELECTOR.captures_at(css, pos) {
        let Some(whole) = caps.get(0) else { break };
        let Some(selectors) = caps.get(2) else {
            // quoted string
            pos = whole.end();
            continue;
        };

        // the opening brace stays in the text for the next group
        let end = whole.end() - 1;
        let lead = caps.get(1).map_or("", |m| m.as_str());
        let scoped = scope_selectors(tag, selectors.as_str());

        out.push_str(&css[last..whole.start()]);
        if lead.is_empty() {
            out.push_str(&scoped);
        } else {
            out.push_str(lead);
            out.push(' ');
            out.push_str(&scoped);
        }
        last = end;
        pos = end;
    }

    out.push_str(&css[last..]);
    out
}

fn scope_selectors(tag: &str, group: &str) -> String {
    let data_is = format!("[data-is=\"{}\"]", tag);

    SELECTOR
        .replace_all(group, |caps: &Captures| {
            let sel = &caps[0];
            let s = sel.trim();

            if s.starts_with(tag)
                || s.is_empty()
                || UNSCOPED_SELECTORS.contains(&s)
                || s.ends_with('%')
            {
                return sel.to_string();
            }

            if s.contains(SCOPE_MARK) {
                format!(
                    "{},{}",
                    s.replacen(SCOPE_MARK, tag, 1),
                    s.replacen(SCOPE_MARK, &data_is, 1)
                )
            } else {
                format!("{} {},{} {}", tag, s, data_is, s)
            }
        })
        .into_owned()
}

/// Compiles one stylesheet for `tag`.
///
/// `lang` other than `css` goes through the style adapter first. Comments
/// are dropped and whitespace collapsed before scoping, which is on unless
/// the option bag turns `prefixCSS` off.
pub(crate) fn compile_css(
    registry: &AdapterRegistry,
    css: &str,
    tag: &str,
    lang: Option<&str>,
    options: Option<&Value>,
    url: &str,
) -> Result<String> {
    let mut css = css.to_string();

    if let Some(lang) = lang.filter(|l| !l.is_empty() && *l != "css") {
        let empty = Value::Object(Map::new());
        css = registry.run_style(lang, tag, &css, options.unwrap_or(&empty), url)?;
    }

    let css = CSS_COMMENTS.replace_all(&css, "");
    let css = WHITESPACE.replace_all(&css, " ");
    let css = css.trim();

    let prefix = options.map_or(true, |o| flag(o, "prefixCSS"));
    if !tag.is_empty() && prefix {
        Ok(scoped_css(tag, css))
    } else {
        Ok(css.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use serde_json::json;

    #[test]
    fn test_simple_rule() {
        assert_eq!(
            scoped_css("my-tag", "p { color: red; }"),
            r#"my-tag p,[data-is="my-tag"] p{ color: red; }"#
        );
    }

    #[test]
    fn test_selector_lists_and_following_rules() {
        assert_eq!(
            scoped_css("x-a", "h1, .b{ top: 0 } a:hover { x: y }"),
            r#"x-a h1,[data-is="x-a"] h1,x-a .b,[data-is="x-a"] .b{ top: 0 } x-a a:hover,[data-is="x-a"] a:hover{ x: y }"#
        );
    }

    #[test]
    fn test_already_scoped_is_unchanged() {
        let css = "my-tag p { color: red; }";
        assert_eq!(scoped_css("my-tag", css), "my-tag p { color: red; }");
    }

    #[test]
    fn test_scope_marker() {
        assert_eq!(
            scoped_css("my-tag", ":scope { display: block }"),
            r#"my-tag,[data-is="my-tag"]{ display: block }"#
        );
    }

    #[test]
    fn test_keyframes_and_at_rules() {
        let css = "@keyframes spin { from { a: 0 } 50% { a: 1 } to { a: 2 } }";
        assert_eq!(
            scoped_css("t-x", css),
            "@keyframes spin { from { a: 0 } 50% { a: 1 } to { a: 2 } }"
        );
    }

    #[test]
    fn test_quoted_braces_are_skipped() {
        let css = r#"p:after { content: "}" } a { b: c }"#;
        assert_eq!(
            scoped_css("t-x", css),
            r#"t-x p:after,[data-is="t-x"] p:after{ content: "}" } t-x a,[data-is="t-x"] a{ b: c }"#
        );
    }

    #[test]
    fn test_compile_css_collapses_and_strips_comments() {
        let registry = AdapterRegistry::new();
        let out = compile_css(
            &registry,
            "/* c */\np {\n  color: red;\n}\n",
            "my-tag",
            None,
            None,
            "",
        )
        .unwrap();
        assert_eq!(out, r#"my-tag p,[data-is="my-tag"] p{ color: red; }"#);
    }

    #[test]
    fn test_compile_css_prefix_off() {
        let registry = AdapterRegistry::new();
        let opts = json!({ "prefixCSS": false });
        let out = compile_css(&registry, "p { a: b }", "my-tag", Some("css"), Some(&opts), "")
            .unwrap();
        assert_eq!(out, "p { a: b }");
    }

    #[test]
    fn test_compile_css_through_adapter() {
        let mut registry = AdapterRegistry::new();
        registry.register_style(
            "nest",
            |tag: &str, css: &str, _: &Value, _: &str| -> std::result::Result<String, BoxError> {
                Ok(format!("/* {} */ {}", tag, css.replace('$', "")))
            },
        );
        let opts = json!({ "prefixCSS": true });
        let out = compile_css(&registry, "$p { a: b }", "t-x", Some("nest"), Some(&opts), "")
            .unwrap();
        assert_eq!(out, r#"t-x p,[data-is="t-x"] p{ a: b }"#);
    }
}
