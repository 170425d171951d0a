//! Expression extraction and restoration.
//!
//! Markup is normalized with its interpolations taken out: every top-level
//! expression is moved into an [`ExpressionTable`] and replaced by an index
//! placeholder (`\x01#N` followed by the closing delimiter). Once the markup
//! has been rewritten, [`ExpressionTable::restore`] puts the expressions back.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::brackets::{DelimiterMatcher, Delimiters};
use crate::error::Result;

/// Opens every placeholder.
pub const PLACEHOLDER_MARK: &str = "\x01#";

/// Replaces `"` in restored expressions, so callers can wrap the markup in
/// double-quoted strings.
pub const DQ_MARK: &str = "\u{2057}";

/// Marks an expression that must be kept as written.
const RAW_MARK: char = '^';

lazy_static! {
    static ref HAS_PLACEHOLDER: Regex = Regex::new(r"\x01#\d").unwrap();
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\x01#(\d+)").unwrap();
    static ref LINE_BREAKS: Regex = Regex::new(r"[\r\n]+").unwrap();
}

/// Per-tag side table of extracted expressions.
#[derive(Debug)]
pub struct ExpressionTable<'d> {
    delimiters: &'d Delimiters,
    entries: Vec<String>,
}

impl<'d> ExpressionTable<'d> {
    pub fn new(delimiters: &'d Delimiters) -> Self {
        Self {
            delimiters,
            entries: Vec::new(),
        }
    }

    pub fn delimiters(&self) -> &'d Delimiters {
        self.delimiters
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Stores an expression and returns its placeholder.
    pub fn push(&mut self, expr: String) -> String {
        self.entries.push(expr);
        format!(
            "{}{}{}",
            PLACEHOLDER_MARK,
            self.entries.len() - 1,
            self.delimiters.close
        )
    }

    /// Replaces every top-level expression of `fragment` with a placeholder.
    ///
    /// Expressions starting with `^` are stored as written, minus the marker.
    /// Others go through `compile` when given, losing one trailing `;`.
    pub fn extract(
        &mut self,
        fragment: &str,
        matcher: &dyn DelimiterMatcher,
        compile: Option<&dyn Fn(&str) -> Result<String>>,
    ) -> Result<String> {
        if fragment.is_empty() || !matcher.quick_test(fragment, self.delimiters) {
            return Ok(fragment.to_string());
        }

        let mut parts = matcher.split(fragment, 0, self.delimiters);
        for i in (1..parts.len()).step_by(2) {
            let raw = std::mem::take(&mut parts[i]);
            let expr = if let Some(stripped) = raw.strip_prefix(RAW_MARK) {
                stripped.to_string()
            } else if let Some(compile) = compile {
                let compiled = compile(&raw)?;
                let compiled = compiled.trim();
                compiled.strip_suffix(';').unwrap_or(compiled).to_string()
            } else {
                raw
            };
            parts[i] = self.push(expr);
        }

        Ok(parts.concat())
    }

    /// Puts the stored expressions back in place of their placeholders.
    pub fn restore(&self, text: &str) -> String {
        if self.entries.is_empty() {
            return text.to_string();
        }

        PLACEHOLDER_RE
            .replace_all(text, |caps: &Captures| {
                let entry = caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.entries.get(i));
                match entry {
                    Some(expr) => {
                        let expr = LINE_BREAKS.replace_all(expr.trim(), " ");
                        format!("{}{}", self.delimiters.open, expr.replace('"', DQ_MARK))
                    }
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// True when `text` holds at least one placeholder.
pub fn has_placeholder(text: &str) -> bool {
    HAS_PLACEHOLDER.is_match(text)
}

/// Number of placeholders in `text`.
pub fn count_placeholders(text: &str) -> usize {
    PLACEHOLDER_RE.find_iter(text).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brackets::Brackets;

    #[test]
    fn test_no_expression_is_noop() {
        let d = Delimiters::default();
        let mut table = ExpressionTable::new(&d);
        let out = table.extract("<p>plain</p>", &Brackets, None).unwrap();
        assert_eq!(out, "<p>plain</p>");
        assert!(table.is_empty());
        assert_eq!(table.restore(&out), out);
    }

    #[test]
    fn test_round_trip() {
        let d = Delimiters::default();
        let mut table = ExpressionTable::new(&d);
        let out = table
            .extract("<a href={ url } title='{ a }-{ b }'>{ text }</a>", &Brackets, None)
            .unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(count_placeholders(&out), 4);
        assert!(!out.contains("url"));

        let restored = table.restore(&out);
        assert_eq!(count_placeholders(&restored), 0);
        assert_eq!(restored, "<a href={url} title='{a}-{b}'>{text}</a>");
    }

    #[test]
    fn test_raw_marker_and_quotes() {
        let d = Delimiters::default();
        let mut table = ExpressionTable::new(&d);
        let out = table.extract("{^ raw } {a ? \"x\" :\n 'y'}", &Brackets, None).unwrap();
        assert_eq!(table.entries()[0], " raw ");
        let restored = table.restore(&out);
        assert_eq!(restored, "{raw} {a ? \u{2057}x\u{2057} :  'y'}");
    }

    #[test]
    fn test_compiled_expressions_lose_semicolon() {
        let d = Delimiters::default();
        let mut table = ExpressionTable::new(&d);
        let compile = |e: &str| -> Result<String> { Ok(format!("  ({});\n", e.trim())) };
        table.extract("{ a + b }", &Brackets, Some(&compile)).unwrap();
        assert_eq!(table.entries(), &["(a + b)".to_string()]);
    }

    #[test]
    fn test_custom_delimiters() {
        let d = Brackets.normalize(Some("[[ ]]")).unwrap();
        let mut table = ExpressionTable::new(&d);
        let out = table.extract("<p>[[ x ]] {y}</p>", &Brackets, None).unwrap();
        assert_eq!(out, "<p>\x01#0]] {y}</p>");
        assert_eq!(table.restore(&out), "<p>[[x]] {y}</p>");
    }
}
