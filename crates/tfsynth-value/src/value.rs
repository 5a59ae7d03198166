//! Attribute values
//!
//! [`Value`] is the sum type stored in construct attributes: plain literals,
//! [`ReferenceToken`]s, and [`Template`]s that splice tokens into text.

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Number, Value as JsonValue};

use crate::error::ValueError;
use crate::token::ReferenceToken;

/// JSON key marking a reference in loosely-typed input
pub const REF_MARKER: &str = "$ref";

/// JSON key marking a template in loosely-typed input
pub const TEMPLATE_MARKER: &str = "$template";

/// Attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null
    Null,
    /// Boolean literal
    Bool(bool),
    /// Numeric literal
    Number(Number),
    /// String literal, passed through unchanged
    String(String),
    /// Ordered list
    List(Vec<Value>),
    /// Nested mapping, insertion ordered
    Map(IndexMap<String, Value>),
    /// Attribute of another node
    Reference(ReferenceToken),
    /// String built from text and references
    Template(Template),
}

/// Piece of a [`Template`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Literal text
    Text(String),
    /// Interpolated reference
    Reference(ReferenceToken),
}

/// String with embedded references
///
/// ```
/// use tfsynth_value::{ReferenceToken, Template};
///
/// let account = ReferenceToken::parse("aws_id.account_id").unwrap();
/// let arn = Template::new().text("arn:aws:iam::").reference(account).text(":root");
/// assert_eq!(arn.references().count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template(Vec<Fragment>);

impl Template {
    /// Empty template
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append literal text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.is_empty() {
            self.0.push(Fragment::Text(text));
        }
        self
    }

    /// Append a reference
    #[must_use]
    pub fn reference(mut self, token: ReferenceToken) -> Self {
        self.0.push(Fragment::Reference(token));
        self
    }

    /// Fragments in order
    #[inline]
    #[must_use]
    pub fn fragments(&self) -> &[Fragment] {
        &self.0
    }

    /// References in order of appearance
    pub fn references(&self) -> impl Iterator<Item = &ReferenceToken> {
        self.0.iter().filter_map(|f| match f {
            Fragment::Reference(token) => Some(token),
            Fragment::Text(_) => None,
        })
    }
}

impl Value {
    /// Build a map value from key/value pairs
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a list value
    pub fn list<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Short name of the variant, used in diagnostics
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Reference(_) => "reference",
            Self::Template(_) => "template",
        }
    }

    /// True for a bare reference token
    #[inline]
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }

    /// All tokens in this value, depth first, in document order
    #[must_use]
    pub fn references(&self) -> Vec<&ReferenceToken> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a ReferenceToken>) {
        match self {
            Self::Reference(token) => out.push(token),
            Self::Template(template) => out.extend(template.references()),
            Self::List(items) => items.iter().for_each(|v| v.collect_references(out)),
            Self::Map(entries) => entries.values().for_each(|v| v.collect_references(out)),
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) => {}
        }
    }

    /// Resolve into plain JSON
    ///
    /// `expr` maps a token to the bare interpolation expression (without
    /// `${}`), e.g. `aws_kms_key.aws_kms.id`. Literals pass through unchanged.
    ///
    /// # Errors
    /// Propagates the first error returned by `expr`
    pub fn resolve<F, E>(&self, expr: &mut F) -> Result<JsonValue, E>
    where
        F: FnMut(&ReferenceToken) -> Result<String, E>,
    {
        Ok(match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Number(n) => JsonValue::Number(n.clone()),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::List(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|v| v.resolve(expr))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Map(entries) => {
                let mut map = JsonMap::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), value.resolve(expr)?);
                }
                JsonValue::Object(map)
            }
            Self::Reference(token) => JsonValue::String(format!("${{{}}}", expr(token)?)),
            Self::Template(template) => {
                let mut out = String::new();
                for fragment in template.fragments() {
                    match fragment {
                        Fragment::Text(text) => out.push_str(text),
                        Fragment::Reference(token) => {
                            out.push_str("${");
                            out.push_str(&expr(token)?);
                            out.push('}');
                        }
                    }
                }
                JsonValue::String(out)
            }
        })
    }

    /// Convert loosely-typed JSON, honouring `$ref` and `$template` markers
    ///
    /// `{"$ref": "node.attr"}` becomes a [`Value::Reference`];
    /// `{"$template": ["text", {"$ref": "node.attr"}]}` becomes a
    /// [`Value::Template`]. Everything else maps structurally.
    ///
    /// # Errors
    /// Returns error if a marker object is malformed
    pub fn from_json(json: JsonValue) -> Result<Self, ValueError> {
        Ok(match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => Self::Number(n),
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => Self::List(
                items
                    .into_iter()
                    .map(Self::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            JsonValue::Object(map) => {
                if let Some(marker) = map.get(REF_MARKER) {
                    return parse_ref(marker, map.len()).map(Self::Reference);
                }
                if let Some(parts) = map.get(TEMPLATE_MARKER) {
                    return parse_template(parts, map.len()).map(Self::Template);
                }
                let mut entries = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    entries.insert(key, Self::from_json(value)?);
                }
                Self::Map(entries)
            }
        })
    }
}

fn parse_ref(marker: &JsonValue, len: usize) -> Result<ReferenceToken, ValueError> {
    if len != 1 {
        return Err(ValueError::Malformed {
            marker: REF_MARKER,
            reason: "must be the only key in its object".to_string(),
        });
    }
    let expr = marker.as_str().ok_or_else(|| ValueError::Malformed {
        marker: REF_MARKER,
        reason: "expected a string".to_string(),
    })?;
    Ok(ReferenceToken::parse(expr)?)
}

fn parse_template(parts: &JsonValue, len: usize) -> Result<Template, ValueError> {
    let malformed = |reason: &str| ValueError::Malformed {
        marker: TEMPLATE_MARKER,
        reason: reason.to_string(),
    };
    if len != 1 {
        return Err(malformed("must be the only key in its object"));
    }
    let parts = parts.as_array().ok_or_else(|| malformed("expected a list"))?;

    let mut template = Template::new();
    for part in parts {
        template = match part {
            JsonValue::String(text) => template.text(text.clone()),
            JsonValue::Object(map) => {
                let marker = map
                    .get(REF_MARKER)
                    .ok_or_else(|| malformed("parts must be strings or $ref objects"))?;
                template.reference(parse_ref(marker, map.len())?)
            }
            _ => return Err(malformed("parts must be strings or $ref objects")),
        };
    }
    Ok(template)
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and become `Null`
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<ReferenceToken> for Value {
    fn from(value: ReferenceToken) -> Self {
        Self::Reference(value)
    }
}

impl From<Template> for Value {
    fn from(value: Template) -> Self {
        Self::Template(value)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(value: Vec<V>) -> Self {
        Self::list(value)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(value: IndexMap<String, Value>) -> Self {
        Self::Map(value)
    }
}
