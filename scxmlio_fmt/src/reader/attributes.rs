use super::{ParseResult, Parser, SyntaxError};
use log::{error, warn};
use quick_xml::events::BytesStart;
use quick_xml::name::{PrefixDeclaration, ResolveResult};
use scxmlio_core::{ModelError, NsBinding, Value};
use std::collections::HashMap;

impl<'a> Parser<'a> {
    /// Collects the unqualified attributes of an SCXML element.
    ///
    /// Fails on unknown attributes and on missing required ones.
    /// Namespace declarations are skipped, and attributes in other namespaces are ignored.
    pub(super) fn attrs(
        &self,
        tag: &BytesStart<'_>,
        element: &str,
        keys: &[&str],
        opt_keys: &[&str],
    ) -> ParseResult<HashMap<String, String>> {
        let mut attrs = HashMap::new();
        for attr in tag.attributes() {
            let attr = attr?;
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let key = std::str::from_utf8(attr.key.as_ref())?;
            if attr.key.prefix().is_some() {
                if let (ResolveResult::Unknown(prefix), _) = self.reader.resolve_attribute(attr.key) {
                    return Err(SyntaxError::UnknownPrefix(
                        String::from_utf8_lossy(&prefix).into_owned(),
                    )
                    .into());
                }
                warn!(target: "parser", "ignoring foreign attribute '{key}' of '{element}'");
            } else if keys.contains(&key) || opt_keys.contains(&key) {
                let val = attr.unescape_value()?.into_owned();
                attrs.insert(key.to_owned(), val);
            } else {
                error!(target: "parser", "found unknown attribute '{key}' of '{element}'");
                return Err(ModelError::UnknownAttribute {
                    element: element.to_string(),
                    attribute: key.to_string(),
                }
                .into());
            }
        }
        for key in keys {
            if !attrs.contains_key(*key) {
                error!(target: "parser", "missing required attribute '{key}' of '{element}'");
                return Err(ModelError::MissingAttribute {
                    element: element.to_string(),
                    attribute: key.to_string(),
                }
                .into());
            }
        }
        Ok(attrs)
    }

    /// Collects all attributes but namespace declarations, by qualified name and in document order.
    pub(super) fn raw_attrs(&self, tag: &BytesStart<'_>) -> ParseResult<Vec<(String, String)>> {
        let mut attrs = Vec::new();
        for attr in tag.attributes() {
            let attr = attr?;
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            if let (ResolveResult::Unknown(prefix), _) = self.reader.resolve_attribute(attr.key) {
                return Err(
                    SyntaxError::UnknownPrefix(String::from_utf8_lossy(&prefix).into_owned()).into(),
                );
            }
            let key = std::str::from_utf8(attr.key.as_ref())?.to_owned();
            let val = attr.unescape_value()?.into_owned();
            attrs.push((key, val));
        }
        Ok(attrs)
    }
}

/// The namespace declarations of an element.
pub(super) fn bindings(tag: &BytesStart<'_>) -> ParseResult<Vec<NsBinding>> {
    let mut bindings = Vec::new();
    for attr in tag.attributes() {
        let attr = attr?;
        let prefix = match attr.key.as_namespace_binding() {
            Some(PrefixDeclaration::Default) => None,
            Some(PrefixDeclaration::Named(prefix)) => Some(std::str::from_utf8(prefix)?),
            None => continue,
        };
        let uri = attr.unescape_value()?;
        bindings.push(NsBinding::new(prefix, uri.into_owned()));
    }
    Ok(bindings)
}

/// Splits a whitespace-separated list of tokens.
pub(super) fn tokens(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_owned).collect()
}

/// Parses an enumerated attribute.
pub(super) fn enumerated<T: Copy>(
    element: &str,
    attribute: &str,
    value: Option<String>,
    variants: &[(&str, T)],
) -> Result<Option<T>, ModelError> {
    let Some(value) = value else {
        return Ok(None);
    };
    variants
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, variant)| Some(*variant))
        .ok_or_else(|| {
            error!(target: "parser", "invalid value '{value}' for attribute '{attribute}' of '{element}'");
            ModelError::InvalidValue {
                element: element.to_string(),
                attribute: attribute.to_string(),
                value,
            }
        })
}

/// Takes a value given either literally or as an expression (e.g., `event` and `eventexpr`),
/// failing if both are given.
pub(super) fn value(
    attrs: &mut HashMap<String, String>,
    element: &str,
    literal: &str,
    expr: &str,
) -> Result<Option<Value>, ModelError> {
    match (attrs.remove(literal), attrs.remove(expr)) {
        (Some(_), Some(_)) => Err(conflict(element, literal, expr)),
        (Some(literal), None) => Ok(Some(Value::Literal(literal))),
        (None, Some(expr)) => Ok(Some(Value::Expr(expr))),
        (None, None) => Ok(None),
    }
}

/// Fails if both specifications are present.
pub(super) fn exclusive(
    element: &str,
    (first, has_first): (&str, bool),
    (second, has_second): (&str, bool),
) -> Result<(), ModelError> {
    if has_first && has_second {
        Err(conflict(element, first, second))
    } else {
        Ok(())
    }
}

fn conflict(element: &str, first: &str, second: &str) -> ModelError {
    error!(target: "parser", "'{element}' cannot specify both '{first}' and '{second}'");
    ModelError::ConflictingAttributes {
        element: element.to_string(),
        first: first.to_string(),
        second: second.to_string(),
    }
}
