//! Line-level editing of application config files
//!
//! A [`ConfigDocument`] keeps the file as its original lines (line endings included) and
//! only ever rewrites the value portion of a line whose key matches exactly. Everything
//! else, including indentation, comments, trailing `;`/`,` and unknown keys, is rendered
//! back byte-for-byte.

use crate::config::ConfigFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Single,
    Double,
    Bare,
}

/// Byte range of a value literal within a line, quotes included
#[derive(Debug, Clone, Copy)]
struct ValueSpan {
    start: usize,
    end: usize,
    quote: Quote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The key already had this value; nothing was touched
    Unchanged,
    Replaced,
    /// The key was missing and a new line was added (INI and dotenv only)
    Appended,
    /// The key was missing and the format does not allow appending
    KeyNotFound,
}

#[derive(Debug, Clone)]
pub struct ConfigDocument {
    format: ConfigFormat,
    lines: Vec<String>,
}

impl ConfigDocument {
    pub fn parse(format: ConfigFormat, content: &str) -> Self {
        Self {
            format,
            lines: content.split_inclusive('\n').map(str::to_string).collect(),
        }
    }

    pub fn render(&self) -> String {
        self.lines.concat()
    }

    /// Current value of the first line assigning `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.lines.iter().find_map(|line| {
            let span = locate(self.format, line, key)?;
            Some(decode(self.format, line, span))
        })
    }

    /// Set every line assigning `key` to `value`
    pub fn set(&mut self, key: &str, value: &str) -> SetOutcome {
        let mut matched = false;
        let mut changed = false;

        for line in &mut self.lines {
            let Some(span) = locate(self.format, line, key) else {
                continue;
            };
            matched = true;
            if decode(self.format, line, span) == value {
                continue;
            }
            let rendered = render(self.format, span.quote, value);
            let updated = format!("{}{}{}", &line[..span.start], rendered, &line[span.end..]);
            *line = updated;
            changed = true;
        }

        if changed {
            return SetOutcome::Replaced;
        }
        if matched {
            return SetOutcome::Unchanged;
        }

        match self.format {
            ConfigFormat::Ini | ConfigFormat::Dotenv => {
                if let Some(last) = self.lines.last_mut() {
                    if !last.ends_with('\n') {
                        last.push('\n');
                    }
                }
                let separator = if self.format == ConfigFormat::Ini {
                    " = "
                } else {
                    "="
                };
                let rendered = render(self.format, Quote::Bare, value);
                self.lines.push(format!("{key}{separator}{rendered}\n"));
                SetOutcome::Appended
            }
            _ => SetOutcome::KeyNotFound,
        }
    }
}

fn locate(format: ConfigFormat, line: &str, key: &str) -> Option<ValueSpan> {
    match format {
        ConfigFormat::PhpVariable => locate_php_variable(line, key.trim_start_matches('$')),
        ConfigFormat::PhpArray => locate_php_array(line, key),
        ConfigFormat::PhpDefine => locate_php_define(line, key),
        ConfigFormat::Ini => locate_ini(line, key),
        ConfigFormat::Dotenv => locate_dotenv(line, key),
    }
}

fn indent(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn skip_ws(line: &str, mut i: usize) -> usize {
    let bytes = line.as_bytes();
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    i
}

/// Consume `token` at `i`, returning the index after it
fn expect(line: &str, i: usize, token: &str) -> Option<usize> {
    line.get(i..)?.starts_with(token).then_some(i + token.len())
}

/// Consume `'key'` or `"key"` at `i`
fn expect_quoted_key(line: &str, i: usize, key: &str) -> Option<usize> {
    let quote = line.get(i..)?.chars().next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let i = expect(line, i + 1, key)?;
    expect(line, i, &quote.to_string())
}

fn content_end(line: &str) -> usize {
    line.trim_end_matches(['\n', '\r']).len()
}

/// Parse the value literal starting at `start`
///
/// Quoted literals end at the matching unescaped quote; bare literals end at the first
/// terminator or the end of the line, without trailing whitespace.
fn parse_literal(line: &str, start: usize, terminators: &[char]) -> Option<ValueSpan> {
    let end_of_content = content_end(line);
    let rest = line.get(start..end_of_content)?;

    match rest.chars().next() {
        Some(quote @ ('\'' | '"')) => {
            let mut escaped = false;
            for (offset, c) in rest.char_indices().skip(1) {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == quote {
                    return Some(ValueSpan {
                        start,
                        end: start + offset + 1,
                        quote: if quote == '\'' {
                            Quote::Single
                        } else {
                            Quote::Double
                        },
                    });
                }
            }
            None
        }
        _ => {
            let bare_end = rest
                .find(|c: char| terminators.contains(&c))
                .unwrap_or(rest.len());
            let value = rest[..bare_end].trim_end();
            Some(ValueSpan {
                start,
                end: start + value.len(),
                quote: Quote::Bare,
            })
        }
    }
}

/// `$key = value;` and `$CFG->key = value;`
fn locate_php_variable(line: &str, key: &str) -> Option<ValueSpan> {
    let i = expect(line, indent(line), "$")?;
    let i = skip_ws(line, expect(line, i, key)?);
    if line.get(i..)?.starts_with("==") {
        return None;
    }
    let i = skip_ws(line, expect(line, i, "=")?);
    parse_literal(line, i, &[';'])
}

/// `'key' => value,`
fn locate_php_array(line: &str, key: &str) -> Option<ValueSpan> {
    let i = skip_ws(line, expect_quoted_key(line, indent(line), key)?);
    let i = skip_ws(line, expect(line, i, "=>")?);
    parse_literal(line, i, &[',', ')', ']'])
}

/// `define('KEY', value);`
fn locate_php_define(line: &str, key: &str) -> Option<ValueSpan> {
    let i = skip_ws(line, expect(line, indent(line), "define")?);
    let i = skip_ws(line, expect(line, i, "(")?);
    let i = skip_ws(line, expect_quoted_key(line, i, key)?);
    let i = skip_ws(line, expect(line, i, ",")?);
    parse_literal(line, i, &[')'])
}

/// `key = value`
fn locate_ini(line: &str, key: &str) -> Option<ValueSpan> {
    let i = skip_ws(line, expect(line, indent(line), key)?);
    let i = skip_ws(line, expect(line, i, "=")?);
    let end = content_end(line);
    let value = line.get(i..end)?.trim_end();
    Some(ValueSpan {
        start: i,
        end: i + value.len(),
        quote: Quote::Bare,
    })
}

/// `KEY=value`, optionally prefixed with `export `
fn locate_dotenv(line: &str, key: &str) -> Option<ValueSpan> {
    let mut i = indent(line);
    if let Some(after) = expect(line, i, "export ") {
        i = skip_ws(line, after);
    }
    let i = skip_ws(line, expect(line, i, key)?);
    let i = skip_ws(line, expect(line, i, "=")?);
    parse_literal(line, i, &[])
}

fn is_php(format: ConfigFormat) -> bool {
    matches!(
        format,
        ConfigFormat::PhpVariable | ConfigFormat::PhpArray | ConfigFormat::PhpDefine
    )
}

fn decode(format: ConfigFormat, line: &str, span: ValueSpan) -> String {
    let raw = &line[span.start..span.end];
    match span.quote {
        Quote::Bare => raw.to_string(),
        Quote::Single => {
            let inner = &raw[1..raw.len() - 1];
            if is_php(format) {
                unescape(inner, &['\\', '\''])
            } else {
                inner.to_string()
            }
        }
        Quote::Double => {
            let inner = &raw[1..raw.len() - 1];
            if is_php(format) {
                unescape(inner, &['\\', '"', '$'])
            } else {
                unescape(inner, &['\\', '"'])
            }
        }
    }
}

fn render(format: ConfigFormat, quote: Quote, value: &str) -> String {
    match format {
        ConfigFormat::PhpVariable | ConfigFormat::PhpArray | ConfigFormat::PhpDefine => {
            if quote == Quote::Double {
                format!("\"{}\"", escape(value, &['\\', '"', '$']))
            } else {
                format!("'{}'", escape(value, &['\\', '\'']))
            }
        }
        ConfigFormat::Ini => value.replace(['\r', '\n'], " "),
        ConfigFormat::Dotenv => {
            let value = value.replace(['\r', '\n'], " ");
            match quote {
                Quote::Single if !value.contains('\'') => format!("'{value}'"),
                Quote::Bare if !needs_dotenv_quotes(&value) => value,
                _ => format!("\"{}\"", escape(&value, &['\\', '"'])),
            }
        }
    }
}

fn needs_dotenv_quotes(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '$' | '\\' | '`'))
}

fn escape(value: &str, specials: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if specials.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn unescape(value: &str, escapable: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if escapable.contains(&next) {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}
