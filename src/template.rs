//! Command templates with `{name}` placeholders. Substitution is purely
//! textual and all-or-nothing; `{{` and `}}` escape literal braces.

use std::collections::HashMap;

use crate::command::CommandError;

/// A named slot in a command template, filled interactively before execution.
#[derive(Debug, Clone)]
pub struct PlaceholderSpec {
    pub name: String,
    pub prompt: String,
    pub validator: Option<fn(&str) -> Result<(), String>>,
}

impl PlaceholderSpec {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            validator: None,
        }
    }
}

/// Placeholder names referenced by the template, in first-appearance order,
/// deduplicated. Fails with `Parse` on an unterminated marker.
pub fn extract_placeholders(template: &str) -> Result<Vec<String>, CommandError> {
    let mut names = Vec::new();
    walk(template, |piece| {
        if let Piece::Marker(name) = piece {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    })?;
    Ok(names)
}

/// Replaces every `{name}` marker with its value. Any marker without a value
/// fails with `UnknownPlaceholder` and produces no partial output.
pub fn substitute(
    template: &str,
    values: &HashMap<String, String>,
) -> Result<String, CommandError> {
    let mut out = String::with_capacity(template.len());
    let mut missing = None;
    walk(template, |piece| match piece {
        Piece::Literal(text) => out.push_str(text),
        Piece::Marker(name) => match values.get(name) {
            Some(value) => out.push_str(value),
            None => {
                if missing.is_none() {
                    missing = Some(name.to_string());
                }
            }
        },
    })?;
    match missing {
        Some(name) => Err(CommandError::UnknownPlaceholder(name)),
        None => Ok(out),
    }
}

enum Piece<'a> {
    Literal(&'a str),
    Marker(&'a str),
}

fn walk<'a>(template: &'a str, mut emit: impl FnMut(Piece<'a>)) -> Result<(), CommandError> {
    let mut rest = template;
    while !rest.is_empty() {
        match rest.find(['{', '}']) {
            None => {
                emit(Piece::Literal(rest));
                break;
            }
            Some(pos) => {
                if pos > 0 {
                    emit(Piece::Literal(&rest[..pos]));
                }
                let brace = rest.as_bytes()[pos];
                rest = &rest[pos + 1..];
                if brace == b'}' {
                    // Lone '}' is only valid as the '}}' escape.
                    if rest.starts_with('}') {
                        emit(Piece::Literal("}"));
                        rest = &rest[1..];
                        continue;
                    }
                    return Err(CommandError::Parse(format!(
                        "unmatched '}}' in template {template:?}"
                    )));
                }
                if rest.starts_with('{') {
                    emit(Piece::Literal("{"));
                    rest = &rest[1..];
                    continue;
                }
                let end = rest.find('}').ok_or_else(|| {
                    CommandError::Parse(format!("unterminated placeholder in template {template:?}"))
                })?;
                let name = &rest[..end];
                if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return Err(CommandError::Parse(format!(
                        "invalid placeholder name {name:?}"
                    )));
                }
                emit(Piece::Marker(name));
                rest = &rest[end + 1..];
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn extracts_names_in_order_without_duplicates() {
        let names = extract_placeholders("mv {src} {dest} # again {src}").unwrap();
        assert_eq!(names, vec!["src".to_string(), "dest".to_string()]);
    }

    #[test]
    fn substitution_is_purely_textual() {
        let out = substitute("mv {dest}", &values(&[("dest", "/tmp")])).unwrap();
        assert_eq!(out, "mv /tmp");
    }

    #[test]
    fn missing_value_yields_unknown_placeholder() {
        let err = substitute("mv {unknown}", &values(&[])).unwrap_err();
        assert!(matches!(err, CommandError::UnknownPlaceholder(name) if name == "unknown"));
    }

    #[test]
    fn escaped_braces_are_literal() {
        let out = substitute("echo {{x}} {name}", &values(&[("name", "a")])).unwrap();
        assert_eq!(out, "echo {x} a");
    }

    #[test]
    fn unterminated_marker_is_a_parse_error() {
        assert!(matches!(
            extract_placeholders("mv {dest"),
            Err(CommandError::Parse(_))
        ));
        assert!(matches!(
            extract_placeholders("mv dest}"),
            Err(CommandError::Parse(_))
        ));
    }

    #[test]
    fn empty_or_odd_names_rejected() {
        assert!(extract_placeholders("a {} b").is_err());
        assert!(extract_placeholders("a {no spaces} b").is_err());
    }
}
