//! Source normalization: line endings and HTML comments.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// HTML comment, or a single-line quoted string that may only look like one.
    static ref HTML_COMMENTS: Regex = Regex::new(concat!(
        r"<!--(?:-->|[^>][\s\S]*?-->)",
        r#"|"[^"\n\\]*(?:\\[\s\S][^"\n\\]*)*""#,
        r"|'[^'\n\\]*(?:\\[\s\S][^'\n\\]*)*'",
    ))
    .unwrap();

    static ref LINE_BREAKS: Regex = Regex::new(r"\r\n?").unwrap();

    /// Trailing blanks at the end of each line.
    pub(crate) static ref TRIM_TRAIL: Regex = Regex::new(r"(?m)[ \t]+$").unwrap();
}

/// Normalizes line endings and removes HTML comments that are not part of a
/// quoted string.
pub fn clean_source(src: &str) -> String {
    // Line endings are left alone when the first CR sits at byte 1.
    let mut src = if src.find('\r') != Some(1) {
        LINE_BREAKS.replace_all(src, "\n").into_owned()
    } else {
        src.to_string()
    };

    let mut pos = 0;
    while let Some((range, is_comment)) = HTML_COMMENTS
        .find_at(&src, pos)
        .map(|m| (m.range(), m.as_str().starts_with('<')))
    {
        if is_comment {
            src.replace_range(range, "");
            // removal can join text into a new comment opener
            pos = 0;
        } else {
            pos = range.end;
        }
    }
    src
}

/// Normalizes line endings and strips trailing blanks, for adapter output.
pub(crate) fn normalize_output(code: &str) -> String {
    let code = LINE_BREAKS.replace_all(code, "\n");
    TRIM_TRAIL.replace_all(&code, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_endings() {
        assert_eq!(clean_source("ab\r\nc\rd"), "ab\nc\nd");
    }

    #[test]
    fn test_cr_at_index_one_is_kept() {
        assert_eq!(clean_source("a\r\nb"), "a\r\nb");
    }

    #[test]
    fn test_removes_comments() {
        assert_eq!(clean_source("<p><!-- note --></p>"), "<p></p>");
        assert_eq!(clean_source("a<!---->b"), "ab");
        assert_eq!(clean_source("<!-- one -->x<!-- two\nlines -->"), "x");
    }

    #[test]
    fn test_keeps_quoted_comment_openers() {
        let src = r#"<p title="<!-- not a comment -->">x</p>"#;
        assert_eq!(clean_source(src), src);
        let src = "var s = '<!-- keep -->'";
        assert_eq!(clean_source(src), src);
    }

    #[test]
    fn test_rejoined_comment_is_removed() {
        assert_eq!(clean_source("<!<!-- a -->-- b -->c"), "c");
    }

    #[test]
    fn test_normalize_output() {
        assert_eq!(normalize_output("a  \r\nb\t\n"), "a\nb\n");
    }
}
