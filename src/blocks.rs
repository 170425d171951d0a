//! Splits a tag body into its markup and its untagged script.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HAS_ELEMENT: Regex = Regex::new(r"<[-\w]").unwrap();

    /// A tag closing its line: either `/>` or a whole start/end tag.
    static ref LINE_END_TAG: Regex = Regex::new(concat!(
        r"/>\n|^<(?:/?-?[A-Za-z][-\w\x{A0}-\x{FF}]*\s*",
        r"|-?[A-Za-z][-\w\x{A0}-\x{FF}]*\s+[-\w:\x{A0}-\x{FF}][\s\S]*?)>\n",
    ))
    .unwrap();
}

/// Marks an explicit end of markup; dropped from the markup block.
const MARKUP_END: &str = "<-/>\n";

/// Returns `(markup, script)`.
///
/// Markup runs up to the last line that ends with a tag; everything after
/// it is script. A body without a single line-ending tag is all script.
pub fn split_blocks(body: &str) -> (String, String) {
    if !HAS_ELEMENT.is_match(body) {
        return (String::new(), body.to_string());
    }

    let mut n = body.len();
    while let Some(k) = body[..n].rfind('<') {
        if let Some(m) = LINE_END_TAG.find(&body[k..n]) {
            let split = k + m.end();
            let markup = &body[..split];
            let markup = markup.strip_suffix(MARKUP_END).unwrap_or(markup);
            return (markup.to_string(), body[split..].to_string());
        }
        if k == 0 {
            break;
        }
        n = k;
    }

    (String::new(), body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_then_script() {
        let body = "<h3>{ title }</h3>\n<p>x</p>\nthis.title = 'hi'\n";
        let (html, js) = split_blocks(body);
        assert_eq!(html, "<h3>{ title }</h3>\n<p>x</p>\n");
        assert_eq!(js, "this.title = 'hi'\n");
    }

    #[test]
    fn test_script_only() {
        let (html, js) = split_blocks("var a = 1 < 2\n");
        assert_eq!(html, "");
        assert_eq!(js, "var a = 1 < 2\n");
    }

    #[test]
    fn test_markup_only() {
        let (html, js) = split_blocks("<div>\n  <span/>\n</div>\n");
        assert_eq!(html, "<div>\n  <span/>\n</div>\n");
        assert_eq!(js, "");
    }

    #[test]
    fn test_explicit_markup_end() {
        let (html, js) = split_blocks("<p>a</p>\n<-/>\nfoo() {}\n");
        assert_eq!(html, "<p>a</p>\n");
        assert_eq!(js, "foo() {}\n");
    }

    #[test]
    fn test_comparison_in_script_is_not_markup() {
        let (html, js) = split_blocks("<p/>\nif (a <b) x()\n");
        assert_eq!(html, "<p/>\n");
        assert_eq!(js, "if (a <b) x()\n");
    }

    #[test]
    fn test_no_line_ending_tag() {
        let (html, js) = split_blocks("<b>bold</b> text");
        assert_eq!(html, "");
        assert_eq!(js, "<b>bold</b> text");
    }
}
