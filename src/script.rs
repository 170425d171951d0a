//! Default script transform.
//!
//! Tag scripts may declare methods with the shorthand `name(args) { ... }`.
//! The runtime keeps methods as fields of each tag instance, so every
//! shorthand method becomes `this.name = function(args) { ... }.bind(this)`.
//! Literals are set aside before the rewrite so nothing inside a string,
//! regex or template literal is touched.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::brackets::DelimiterMatcher;
use crate::error::{CompileError, Result};

/// Signatures that look like methods but open a control-flow block.
const CONTROL_KEYWORDS: &[&str] = &["if", "while", "for", "switch", "catch", "function"];

lazy_static! {
    static ref METHOD_SIGNATURE: Regex = Regex::new(
        r"(?m)^[ \t]*((async\s+|\*\s*)?([$_A-Za-z][$0-9A-Za-z_]*))\s*\([^()]*\)\s*\{"
    )
    .unwrap();

    static ref BIND_CALL: Regex = Regex::new(r"^\s*.\s*bind\b").unwrap();

    static ref LITERAL_SLOT: Regex = Regex::new(r"\x01%(\d+)\x01").unwrap();

    static ref IMPORT_START: Regex = Regex::new(r"(?m)^\s*import").unwrap();
}

/// Script with its literals replaced by numbered slots.
#[derive(Debug, Default)]
struct Excised {
    code: String,
    literals: Vec<String>,
}

impl Excised {
    fn slot(&mut self, literal: &str) {
        self.code
            .push_str(&format!("\x01%{}\x01", self.literals.len()));
        self.literals.push(literal.to_string());
    }

    fn restore(&self, code: &str) -> String {
        if self.literals.is_empty() {
            return code.to_string();
        }
        LITERAL_SLOT
            .replace_all(code, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.literals.get(i))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// Rewrites shorthand methods into instance-bound function fields.
pub fn rewrite_methods(js: &str, matcher: &dyn DelimiterMatcher) -> Result<String> {
    let excised = excise_literals(js, matcher)?;
    let mut out = String::with_capacity(excised.code.len());
    let mut rest = excised.code.as_str();

    while let Some(caps) = METHOD_SIGNATURE.captures(rest) {
        let Some(signature) = caps.get(0) else { break };
        let method = &caps[1];
        let prefix = caps.get(2).map_or("", |m| m.as_str().trim());
        let name = &caps[3];

        out.push_str(&rest[..signature.start()]);
        let body = &rest[signature.end()..];
        let body_len = skip_body(body);

        let is_method = !CONTROL_KEYWORDS.contains(&name);
        if is_method {
            let function = match prefix {
                "async" => format!("this.{} = async function", name),
                "*" => format!("this.{} = function*", name),
                _ => format!("this.{} = function", name),
            };
            out.push_str(&signature.as_str().replacen(method, &function, 1));
        } else {
            out.push_str(signature.as_str());
        }
        out.push_str(&body[..body_len]);

        rest = &body[body_len..];
        if is_method && !BIND_CALL.is_match(rest) {
            out.push_str(".bind(this)");
        }
    }
    out.push_str(rest);

    Ok(excised.restore(&out))
}

/// Returns the length of `s` up to and including the brace closing an
/// already opened block, or `s.len()` when it never closes.
fn skip_body(s: &str) -> usize {
    let mut depth = 1;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
    }
    s.len()
}

/// Moves non-empty strings, regex literals and template literals into slots
/// and drops comments.
fn excise_literals(code: &str, matcher: &dyn DelimiterMatcher) -> Result<Excised> {
    let bytes = code.as_bytes();
    let mut excised = Excised::default();
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        let end = match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => match code[i + 2..].find("*/") {
                Some(close) => {
                    excised.code.push_str(&code[last..i]);
                    excised.code.push(' ');
                    i += close + 4;
                    last = i;
                    continue;
                }
                None => i + 1,
            },
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                excised.code.push_str(&code[last..i]);
                i = code[i..].find('\n').map_or(code.len(), |n| i + n);
                last = i;
                continue;
            }
            b'/' => {
                let end = matcher.find_regex_end(code, i);
                if end > i + 1 {
                    excised.code.push_str(&code[last..i]);
                    excised.slot(&code[i..end]);
                    last = end;
                }
                end
            }
            b'\'' | b'"' => match string_end(bytes, i) {
                Some(end) if end - i > 2 => {
                    excised.code.push_str(&code[last..i]);
                    excised.slot(&code[i..end]);
                    last = end;
                    end
                }
                Some(end) => end,
                None => i + 1,
            },
            b'`' => {
                let end = template_end(code, i, matcher)?;
                excised.code.push_str(&code[last..i]);
                excised.slot(&code[i..end]);
                last = end;
                end
            }
            _ => i + 1,
        };
        i = end;
    }

    excised.code.push_str(&code[last..]);
    Ok(excised)
}

/// End of a single-line quoted string starting at `start`. Escaped line
/// breaks continue the string.
fn string_end(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' | b'\r' => return None,
            c if c == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// End of the template literal starting at `start`, interpolations included.
fn template_end(code: &str, start: usize, matcher: &dyn DelimiterMatcher) -> Result<usize> {
    let bytes = code.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return Ok(i + 1),
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                i = interpolation_end(code, i + 2, start, matcher)?;
            }
            _ => i += 1,
        }
    }
    Err(CompileError::UnclosedTemplateLiteral { offset: start })
}

/// End of a `${ ... }` interpolation whose body starts at `from`.
fn interpolation_end(
    code: &str,
    from: usize,
    template_start: usize,
    matcher: &dyn DelimiterMatcher,
) -> Result<usize> {
    let bytes = code.as_bytes();
    let mut expected = vec![b'}'];
    let mut i = from;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'\'' | b'"' => {
                i = string_end(bytes, i).unwrap_or(i + 1);
                continue;
            }
            b'`' => {
                i = template_end(code, i, matcher)?;
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = code[i..].find('\n').map_or(code.len(), |n| i + n);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = code[i + 2..].find("*/").map_or(code.len(), |n| i + n + 4);
                continue;
            }
            b'/' => {
                let end = matcher.find_regex_end(code, i);
                i = end.max(i + 1);
                continue;
            }
            b'(' => expected.push(b')'),
            b'[' => expected.push(b']'),
            b'{' => expected.push(b'}'),
            b')' | b']' | b'}' => {
                if expected.pop() != Some(c) {
                    return Err(CompileError::UnbalancedDelimiter {
                        found: c as char,
                        offset: i,
                    });
                }
                if expected.is_empty() {
                    return Ok(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }

    Err(CompileError::UnclosedTemplateLiteral {
        offset: template_start,
    })
}

/// Pulls `import` statements out of `js`. Returns the remaining code and
/// the statements, one per line, in encounter order.
pub fn hoist_imports(js: &str) -> (String, String) {
    let mut code = String::with_capacity(js.len());
    let mut imports = String::new();
    let mut last = 0;
    let mut pos = 0;

    while let Some(m) = IMPORT_START.find_at(js, pos) {
        match import_end(&js[m.end()..]) {
            Some(len) => {
                let end = m.end() + len;
                code.push_str(&js[last..m.start()]);
                imports.push_str(js[m.start()..end].trim());
                imports.push('\n');
                last = end;
                pos = end;
            }
            None => {
                pos = m.start() + js[m.start()..].chars().next().map_or(1, char::len_utf8);
            }
        }
        if pos >= js.len() {
            break;
        }
    }

    code.push_str(&js[last..]);
    (code, imports)
}

/// Length of an import statement's tail after the `import` keyword: up to
/// the first quote, then the rest of that line and its line break.
fn import_end(after: &str) -> Option<usize> {
    let mut chars = after.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '(' => return None,
        Some(c) if c.is_whitespace() && chars.next() == Some('(') => return None,
        _ => {}
    }

    let quote = after
        .find(['\'', '"'])
        .or_else(|| after.rfind('|'))?;
    let line = &after[quote + 1..];
    let len = match line.find('\n') {
        Some(n) => quote + 1 + n + 1,
        None => after.len(),
    };
    Some(len)
}
