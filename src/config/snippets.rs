//! Legacy INI tokenizer.
//!
//! This turns a gcfg-style document into a list of raw sections, each
//! holding the variables declared in it. Values are unescaped but not
//! interpreted; typing happens in `inputs`.

use crate::errors::ConfigError;
use failure::Fallible;

/// A single `[Name]` or `[Name "subsection"]` block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct SectionSnippet {
    /// Lowercased section name.
    pub(crate) name: String,
    /// Subsection, verbatim.
    pub(crate) subsection: Option<String>,
    /// Line of the header, for error reporting.
    pub(crate) line: usize,
    pub(crate) vars: Vec<VarSnippet>,
}

/// A single variable assignment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct VarSnippet {
    /// Lowercased variable name.
    pub(crate) name: String,
    /// `None` for a bare name without `=`.
    pub(crate) value: Option<String>,
    pub(crate) line: usize,
}

/// Tokenize a whole document into sections, in declaration order.
pub(crate) fn parse_document(content: &str) -> Fallible<Vec<SectionSnippet>> {
    let mut sections: Vec<SectionSnippet> = vec![];

    for (idx, raw) in content.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
            continue;
        }

        if trimmed.starts_with('[') {
            let section = parse_header(trimmed, line)?;
            trace!("ini line {}: section '{}'", line, section.name);
            sections.push(section);
            continue;
        }

        let var = parse_variable(trimmed, line)?;
        match sections.last_mut() {
            Some(section) => section.vars.push(var),
            None => return Err(ConfigError::parse(line, trimmed, "expected section header").into()),
        }
    }

    Ok(sections)
}

/// Parse `[name]` or `[name "sub"]`, with an optional trailing comment.
fn parse_header(text: &str, line: usize) -> Fallible<SectionSnippet> {
    let close = match text.rfind(']') {
        Some(pos) => pos,
        None => return Err(ConfigError::parse(line, text, "unterminated section header").into()),
    };
    let trailer = text[close + 1..].trim();
    if !trailer.is_empty() && !trailer.starts_with(';') && !trailer.starts_with('#') {
        return Err(ConfigError::parse(line, text, "unexpected data after section header").into());
    }

    let inner = text[1..close].trim();
    let (name, rest) = match inner.find(|c: char| c.is_whitespace()) {
        Some(pos) => (&inner[..pos], inner[pos..].trim()),
        None => (inner, ""),
    };
    if name.is_empty() || !name.chars().all(is_name_char) {
        return Err(ConfigError::parse(line, text, "invalid section name").into());
    }

    let subsection = if rest.is_empty() {
        None
    } else {
        Some(parse_subsection(rest, text, line)?)
    };

    Ok(SectionSnippet {
        name: name.to_lowercase(),
        subsection,
        line,
        vars: vec![],
    })
}

fn parse_subsection(rest: &str, header: &str, line: usize) -> Fallible<String> {
    if rest.len() < 2 || !rest.starts_with('"') || !rest.ends_with('"') {
        return Err(ConfigError::parse(line, header, "subsection name must be quoted").into());
    }

    let mut out = String::new();
    let mut chars = rest[1..rest.len() - 1].chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ '"') | Some(escaped @ '\\') => out.push(escaped),
                _ => {
                    return Err(ConfigError::parse(line, header, "invalid escape in subsection").into());
                }
            },
            '"' => {
                return Err(ConfigError::parse(line, header, "unescaped quote in subsection").into());
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Parse `name = value` or a bare `name`.
fn parse_variable(text: &str, line: usize) -> Fallible<VarSnippet> {
    // A comment marker before any `=` ends a bare name.
    let (name, value) = match text.find(|c: char| c == '=' || c == ';' || c == '#') {
        Some(pos) if text[pos..].starts_with('=') => {
            (text[..pos].trim(), Some(parse_value(&text[pos + 1..], line)?))
        }
        _ => (strip_comment(text).trim(), None),
    };

    if name.is_empty() || !name.chars().all(is_name_char) {
        return Err(ConfigError::parse(line, text, "invalid variable name").into());
    }

    Ok(VarSnippet {
        name: name.to_lowercase(),
        value,
        line,
    })
}

/// Unquote and unescape a value, dropping any inline comment.
fn parse_value(raw: &str, line: usize) -> Fallible<String> {
    let mut out = String::new();
    let mut quoted = false;
    // Length of `out` up to the last quoted or escaped char; trailing
    // whitespace past it is trimmed.
    let mut keep = 0;
    let mut chars = raw.trim_start().chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                quoted = !quoted;
                keep = out.len();
            }
            '\\' => {
                let escaped = match chars.next() {
                    Some('"') => '"',
                    Some('\\') => '\\',
                    Some('n') => '\n',
                    Some('t') => '\t',
                    _ => {
                        return Err(ConfigError::parse(line, raw.trim(), "invalid escape sequence").into());
                    }
                };
                out.push(escaped);
                keep = out.len();
            }
            ';' | '#' if !quoted => break,
            c => {
                out.push(c);
                if quoted {
                    keep = out.len();
                }
            }
        }
    }

    if quoted {
        return Err(ConfigError::parse(line, raw.trim(), "unterminated quoted value").into());
    }

    let tail = out[keep..].trim_end().len();
    out.truncate(keep + tail);
    Ok(out)
}

fn strip_comment(text: &str) -> &str {
    match text.find(|c: char| c == ';' || c == '#') {
        Some(pos) => &text[..pos],
        None => text,
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'
}
