//! Path normalization and route template parsing.
//!
//! Templates embed `{name}` or `{name:regex}` placeholders. Slashes inside
//! a placeholder belong to its regex and are never treated as separators.

/// Normalizes a route template.
///
/// The result starts with a slash, has no repeated slashes and no trailing
/// slash (except for the root). Placeholder contents are left untouched.
///
/// ```
/// use helix_routing::path::normalize;
///
/// assert_eq!(normalize("users//{id}/"), "/users/{id}");
/// assert_eq!(normalize(""), "/");
/// assert_eq!(normalize("/files/{path:a//b}"), "/files/{path:a//b}");
/// ```
pub fn normalize(template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 1);
    out.push('/');
    let mut depth = 0usize;
    let mut after_separator = true;

    for ch in template.chars() {
        match ch {
            '/' if depth == 0 => {
                if !after_separator {
                    out.push('/');
                    after_separator = true;
                }
                continue;
            }
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        out.push(ch);
        after_separator = false;
    }

    if out.len() > 1 && after_separator {
        out.pop();
    }
    out
}

/// Normalizes an inbound request path: query and fragment are dropped,
/// then slashes are collapsed as for templates.
///
/// ```
/// use helix_routing::path::normalize_request_path;
///
/// assert_eq!(normalize_request_path("//users/42/?tab=posts"), "/users/42");
/// ```
pub fn normalize_request_path(path: &str) -> String {
    let end = path.find(|c: char| c == '?' || c == '#').unwrap_or(path.len());
    let segments: Vec<&str> = path[..end].split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Splits a normalized request path into its segments.
pub(crate) fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// A piece of one template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Param {
        name: String,
        /// Inline `{name:regex}` constraint, if given.
        constraint: Option<String>,
        /// Byte offset of the name in the template.
        offset: usize,
    },
}

/// A template error: byte offset and reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError {
    pub offset: usize,
    pub reason: String,
}

impl TemplateError {
    fn new(offset: usize, reason: impl Into<String>) -> Self {
        Self {
            offset,
            reason: reason.into(),
        }
    }
}

/// Parses a normalized template into segments of tokens.
///
/// ```
/// use helix_routing::path::{parse, Token};
///
/// let segments = parse("/users/{id:\\d+}").unwrap();
/// assert_eq!(segments.len(), 2);
/// assert_eq!(segments[0], vec![Token::Literal("users".into())]);
/// assert!(matches!(&segments[1][0], Token::Param { name, .. } if name == "id"));
///
/// let err = parse("/{2bad}").unwrap_err();
/// assert_eq!(err.offset, 2);
/// ```
pub fn parse(template: &str) -> Result<Vec<Vec<Token>>, TemplateError> {
    let bytes = template.as_bytes();
    let mut segments = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut literal = String::new();
    let mut names: Vec<String> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' => {
                flush(&mut literal, &mut current);
                if i > 0 {
                    segments.push(std::mem::take(&mut current));
                }
                i += 1;
            }
            b'{' => {
                flush(&mut literal, &mut current);
                let (token, next) = parse_param(template, i)?;
                if let Token::Param { name, offset, .. } = &token {
                    if names.contains(name) {
                        let reason = format!("duplicate parameter `{name}`");
                        return Err(TemplateError::new(*offset, reason));
                    }
                    names.push(name.clone());
                }
                current.push(token);
                i = next;
            }
            b'}' => return Err(TemplateError::new(i, "unmatched `}`")),
            _ => {
                let ch_len = template[i..].chars().next().map_or(1, char::len_utf8);
                literal.push_str(&template[i..i + ch_len]);
                i += ch_len;
            }
        }
    }

    flush(&mut literal, &mut current);
    if !current.is_empty() {
        segments.push(current);
    }
    Ok(segments)
}

fn flush(literal: &mut String, current: &mut Vec<Token>) {
    if !literal.is_empty() {
        current.push(Token::Literal(std::mem::take(literal)));
    }
}

/// Parses the placeholder opening at `open`; returns it and the index
/// just past its closing brace.
fn parse_param(template: &str, open: usize) -> Result<(Token, usize), TemplateError> {
    let bytes = template.as_bytes();
    let name_start = open + 1;
    let mut i = name_start;

    while i < bytes.len() && bytes[i] != b':' && bytes[i] != b'}' {
        i += 1;
    }
    if i >= bytes.len() {
        return Err(TemplateError::new(open, "unclosed `{`"));
    }

    let name = &template[name_start..i];
    validate_name(name, name_start)?;

    if bytes[i] == b'}' {
        let token = Token::Param {
            name: name.to_string(),
            constraint: None,
            offset: name_start,
        };
        return Ok((token, i + 1));
    }

    // `{name:regex}`: the regex may itself contain balanced braces.
    let regex_start = i + 1;
    let mut depth = 1usize;
    let mut j = regex_start;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
        j += 1;
    }
    if j >= bytes.len() {
        return Err(TemplateError::new(open, "unclosed `{`"));
    }

    let constraint = &template[regex_start..j];
    if constraint.is_empty() {
        return Err(TemplateError::new(regex_start, "empty constraint"));
    }

    let token = Token::Param {
        name: name.to_string(),
        constraint: Some(constraint.to_string()),
        offset: name_start,
    };
    Ok((token, j + 1))
}

fn validate_name(name: &str, start: usize) -> Result<(), TemplateError> {
    let mut chars = name.char_indices();
    let Some((_, first)) = chars.next() else {
        return Err(TemplateError::new(start, "empty parameter name"));
    };
    if first.is_ascii_digit() {
        return Err(TemplateError::new(start, "parameter name must not start with a digit"));
    }
    for (offset, ch) in std::iter::once((0, first)).chain(chars) {
        if !(ch.is_ascii_alphanumeric() || ch == '_') {
            return Err(TemplateError::new(
                start + offset,
                format!("invalid character `{ch}` in parameter name"),
            ));
        }
    }
    Ok(())
}
