//! Interpolation delimiters.
//!
//! The compiler consumes delimiter matching through [`DelimiterMatcher`]:
//! deciding whether a string holds an interpolation, splitting it into
//! literal and expression segments at top level, and telling a regex literal
//! from a division inside script code. [`Brackets`] is the stock matcher for
//! the `{ }` syntax and custom pairs such as `[[ ]]`.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{CompileError, Result};

/// Default delimiter pair.
pub const DEFAULT_PAIR: &str = "{ }";

/// Characters a regex literal may follow.
const BEFORE_RE_CHARS: &[u8] = b"[{(,;:?=|&!^~>%*/";

/// Keywords a regex literal may follow.
const BEFORE_RE_WORDS: &[&str] = &[
    "case",
    "default",
    "do",
    "else",
    "in",
    "instanceof",
    "prefix",
    "return",
    "typeof",
    "void",
    "yield",
];

lazy_static! {
    static ref DEFAULT_DELIMITERS: Delimiters = Delimiters::build("{", "}").unwrap();
}

/// Resolved delimiter set. Immutable once built; one per compile call.
///
/// `open` and `close` are the delimiters themselves, `quick` is the fast
/// presence test, `escaped` matches the escaped forms that must be kept
/// literal, and `pair` is the source text the set was built from. The full
/// expression test is [`DelimiterMatcher::split`], which needs balanced
/// scanning rather than a regex.
#[derive(Debug, Clone)]
pub struct Delimiters {
    /// Opening delimiter.
    pub open: String,
    /// Closing delimiter.
    pub close: String,
    /// Fast presence test: an opening delimiter followed later by a closing one.
    quick: Regex,
    /// Escaped delimiter inside an expression (`\{`, `\}`).
    escaped: Regex,
    /// Source pair, e.g. `"{ }"`.
    pair: String,
}

impl Delimiters {
    fn build(open: &str, close: &str) -> std::result::Result<Self, regex::Error> {
        let (o, c) = (regex::escape(open), regex::escape(close));
        let quick = if close.chars().count() == 1 {
            format!("{o}[^{c}]*{c}")
        } else {
            format!(r"{o}[\s\S]*?{c}")
        };
        let escaped = format!(r"\\({o}|{c})");
        Ok(Delimiters {
            open: open.to_string(),
            close: close.to_string(),
            quick: Regex::new(&quick)?,
            escaped: Regex::new(&escaped)?,
            pair: format!("{open} {close}"),
        })
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    fn unescape(&self, expr: &str) -> String {
        self.escaped.replace_all(expr, "$1").into_owned()
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        DEFAULT_DELIMITERS.clone()
    }
}

/// Delimiter matching contract consumed by the compiler.
pub trait DelimiterMatcher: Send + Sync {
    /// Builds the delimiter set for a compile call; `None` selects the default.
    fn normalize(&self, custom: Option<&str>) -> Result<Delimiters>;

    /// Cheap test for an interpolation anywhere in `text`.
    fn quick_test(&self, text: &str, delimiters: &Delimiters) -> bool;

    /// Splits `text` into alternating literal and expression segments.
    /// Even indexes are literals, odd indexes are expressions (delimiters removed).
    fn split(&self, text: &str, from: usize, delimiters: &Delimiters) -> Vec<String>;

    /// Given a `/` at `start`, returns the byte offset just past the regex
    /// literal starting there, or `start + 1` when it is not a regex.
    fn find_regex_end(&self, text: &str, start: usize) -> usize;
}

/// Stock delimiter matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct Brackets;

impl DelimiterMatcher for Brackets {
    fn normalize(&self, custom: Option<&str>) -> Result<Delimiters> {
        let pair = match custom {
            None => return Ok(Delimiters::default()),
            Some(p) if p == DEFAULT_PAIR => return Ok(Delimiters::default()),
            Some(p) => p,
        };

        let parts: Vec<&str> = pair.split(' ').collect();
        let unsupported = pair.chars().any(|c| {
            c.is_ascii_control()
                || c.is_ascii_alphanumeric()
                || matches!(c, '<' | '>' | '\'' | '"' | ',' | ';' | '\\')
        });
        if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) || unsupported {
            return Err(CompileError::UnsupportedDelimiters(pair.to_string()));
        }

        Delimiters::build(parts[0], parts[1])
            .map_err(|_| CompileError::UnsupportedDelimiters(pair.to_string()))
    }

    fn quick_test(&self, text: &str, delimiters: &Delimiters) -> bool {
        delimiters.quick.is_match(text)
    }

    fn split(&self, text: &str, from: usize, delimiters: &Delimiters) -> Vec<String> {
        let open = delimiters.open.as_str();
        let close = delimiters.close.as_str();
        let mut parts = Vec::new();
        let mut start = 0;
        let mut pos = from.min(text.len());
        let mut in_expr = false;

        while pos < text.len() {
            let rest = &text[pos..];

            if rest.starts_with('\\') {
                let escaped = if in_expr { close } else { open };
                if rest[1..].starts_with(escaped) {
                    pos += 1 + escaped.len();
                    continue;
                }
            }

            if !in_expr {
                if rest.starts_with(open) {
                    parts.push(text[start..pos].to_string());
                    pos += open.len();
                    start = pos;
                    in_expr = true;
                } else {
                    pos += char_len(rest);
                }
                continue;
            }

            let ch = rest.as_bytes()[0];
            match ch {
                b'(' | b'[' | b'{' => {
                    pos = self.skip_balanced(text, pos);
                }
                _ if rest.starts_with(close) => {
                    parts.push(delimiters.unescape(&text[start..pos]));
                    pos += close.len();
                    start = pos;
                    in_expr = false;
                }
                b'"' | b'\'' | b'`' => {
                    pos = skip_quoted(text, pos);
                }
                b'/' => {
                    let end = self.find_regex_end(text, pos);
                    pos = if end > pos + 1 { end } else { pos + 1 };
                }
                _ => pos += char_len(rest),
            }
        }

        if start < text.len() {
            let tail = &text[start..];
            parts.push(if in_expr {
                delimiters.unescape(tail)
            } else {
                tail.to_string()
            });
        }

        parts
    }

    fn find_regex_end(&self, text: &str, start: usize) -> usize {
        let line_end = text[start..]
            .find('\n')
            .map_or(text.len(), |i| start + i);
        let Some(len) = regex_literal_len(&text[start..line_end]) else {
            return start + 1;
        };
        let next = start + len;
        let bytes = text.as_bytes();

        let Some(p) = prev_non_space(bytes, start) else {
            return next;
        };
        let c = bytes[p];

        if BEFORE_RE_CHARS.contains(&c) {
            return next;
        }

        if c == b'.' {
            // spread: `.../re/`
            if p > 0 && bytes[p - 1] == b'.' {
                return next;
            }
        } else if c == b'+' || c == b'-' {
            // `x++ / y` is a division, anything else is a regex
            if p == 0 || bytes[p - 1] != c {
                return next;
            }
            match prev_non_space(bytes, p - 1) {
                Some(q) if is_ident_byte(bytes[q]) => {}
                _ => return next,
            }
        } else if is_ident_byte(c) {
            let end = p + 1;
            let mut q = p;
            while q > 0 && is_ident_byte(bytes[q - 1]) {
                q -= 1;
            }
            if BEFORE_RE_WORDS.contains(&&text[q..end]) {
                return next;
            }
        }

        start + 1
    }
}

impl Brackets {
    /// Skips a bracketed group starting at `pos`, counting only its own
    /// bracket kind and ignoring brackets inside strings and regexes.
    fn skip_balanced(&self, text: &str, pos: usize) -> usize {
        let bytes = text.as_bytes();
        let open = bytes[pos];
        let close = match open {
            b'(' => b')',
            b'[' => b']',
            _ => b'}',
        };
        let mut depth = 1;
        let mut i = pos + 1;

        while i < bytes.len() {
            let c = bytes[i];
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            } else if c == b'"' || c == b'\'' || c == b'`' {
                i = skip_quoted(text, i);
                continue;
            } else if c == b'/' {
                let end = self.find_regex_end(text, i);
                if end > i + 1 {
                    i = end;
                    continue;
                }
            }
            i += 1;
        }

        text.len()
    }
}

/// Skips a quoted string starting at `pos`. An unterminated quote skips
/// only the quote character.
fn skip_quoted(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    let quote = bytes[pos];
    let mut i = pos + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    pos + 1
}

/// Length of the regex literal at the start of `line`, if any.
fn regex_literal_len(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    match bytes.get(1) {
        None | Some(b'*') | Some(b'>') | Some(b'/') => return None,
        _ => {}
    }

    let mut i = 1;
    loop {
        match bytes.get(i)? {
            b'\\' => i += 2,
            b'[' => {
                i += 1;
                loop {
                    match bytes.get(i)? {
                        b'\\' => i += 2,
                        b']' => break,
                        _ => i += 1,
                    }
                }
                i += 1;
            }
            b'/' => {
                i += 1;
                while matches!(bytes.get(i), Some(b'g' | b'i' | b'm' | b'u' | b'y')) {
                    i += 1;
                }
                return Some(i);
            }
            _ => i += 1,
        }
    }
}

fn prev_non_space(bytes: &[u8], pos: usize) -> Option<usize> {
    (0..pos).rev().find(|&i| !bytes[i].is_ascii_whitespace())
}

fn is_ident_byte(b: u8) -> bool {
    b == b'$' || b == b'_' || b.is_ascii_alphanumeric()
}

fn char_len(rest: &str) -> usize {
    rest.chars().next().map_or(1, char::len_utf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> Vec<String> {
        Brackets.split(text, 0, &Delimiters::default())
    }

    #[test]
    fn test_quick_test() {
        let d = Delimiters::default();
        assert!(Brackets.quick_test("a {b} c", &d));
        assert!(!Brackets.quick_test("a b c", &d));
        assert!(!Brackets.quick_test("a { b", &d));
    }

    #[test]
    fn test_split_alternates() {
        assert_eq!(split("a {b} c {d}"), vec!["a ", "b", " c ", "d"]);
        assert_eq!(split("{x}"), vec!["", "x"]);
    }

    #[test]
    fn test_split_nested_and_strings() {
        assert_eq!(split("{ {a: 1}.a } z"), vec!["", " {a: 1}.a ", " z"]);
        assert_eq!(split("{ '}' + x }!"), vec!["", " '}' + x ", "!"]);
        assert_eq!(split("{ f(')') }"), vec!["", " f(')') "]);
    }

    #[test]
    fn test_split_escapes() {
        // escaped open in text stays literal
        assert_eq!(split(r"a \{b} c"), vec![r"a \{b} c"]);
        // escaped close inside an expression is unescaped
        assert_eq!(split(r"{ '\}' }"), vec!["", " '}' "]);
    }

    #[test]
    fn test_custom_pair() {
        let d = Brackets.normalize(Some("[[ ]]")).unwrap();
        assert_eq!(d.open, "[[");
        assert_eq!(d.pair(), "[[ ]]");
        assert!(Brackets.quick_test("a [[b]]", &d));
        assert!(!Brackets.quick_test("a {b}", &d));
        assert_eq!(Brackets.split("a [[ b ]] c", 0, &d), vec!["a ", " b ", " c"]);
    }

    #[test]
    fn test_unsupported_pairs() {
        for pair in ["{", "< >", "a b", "{ } x", "' '"] {
            assert!(
                matches!(
                    Brackets.normalize(Some(pair)),
                    Err(CompileError::UnsupportedDelimiters(_))
                ),
                "{pair}"
            );
        }
        assert_eq!(Brackets.normalize(Some("{ }")).unwrap().open, "{");
    }

    #[test]
    fn test_find_regex_end() {
        let code = "x = /a[/]b/g.test(s)";
        assert_eq!(Brackets.find_regex_end(code, 4), 12);

        // division after an identifier
        let code = "a / b / c";
        assert_eq!(Brackets.find_regex_end(code, 2), 3);

        // after a keyword
        let code = "return /x/.source";
        assert_eq!(Brackets.find_regex_end(code, 7), 10);

        // postfix increment then division
        let code = "i++ / 2 /1";
        assert_eq!(Brackets.find_regex_end(code, 4), 5);

        // comment opener is never a regex
        assert_eq!(Brackets.find_regex_end("// x", 0), 1);
    }
}
