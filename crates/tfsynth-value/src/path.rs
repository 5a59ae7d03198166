//! Attribute paths
//!
//! Provides [`AttributePath`] for addressing a value inside a construct's
//! attributes, e.g. `arn`, `tags.Name` or `ingress[0].from_port`.

use smallvec::SmallVec;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::PathError;

/// One step below the root attribute
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    /// Map or object key
    Key(String),
    /// List element
    Index(usize),
}

/// Path to an attribute of a construct
///
/// Always starts at a named top-level attribute, so the attribute a
/// reference reads can be checked against the node's schema.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributePath {
    attribute: String,
    rest: SmallVec<[PathSegment; 2]>,
}

impl AttributePath {
    /// Path to a top-level attribute
    #[inline]
    #[must_use]
    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            attribute: name.into(),
            rest: SmallVec::new(),
        }
    }

    /// Append a key segment, returning new path
    #[inline]
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.rest.push(PathSegment::Key(key.into()));
        new
    }

    /// Append an index segment, returning new path
    #[inline]
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut new = self.clone();
        new.rest.push(PathSegment::Index(index));
        new
    }

    /// Name of the top-level attribute
    #[inline]
    #[must_use]
    pub fn root(&self) -> &str {
        &self.attribute
    }

    /// Segments below the top-level attribute
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.rest
    }

    /// Number of segments including the top-level attribute
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rest.len() + 1
    }

    /// Paths always name at least one attribute
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

impl Display for AttributePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.attribute)?;
        for segment in &self.rest {
            match segment {
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for AttributePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }

        let mut path: Option<Self> = None;
        for part in s.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(pos) => part.split_at(pos),
                None => (part, ""),
            };
            if key.is_empty() {
                return Err(PathError::EmptySegment {
                    path: s.to_string(),
                });
            }
            if !key.chars().all(is_key_char) {
                return Err(PathError::InvalidSegment(key.to_string()));
            }

            let mut next = match path {
                None => Self::attribute(key),
                Some(p) => p.key(key),
            };

            while !rest.is_empty() {
                let (digits, tail) = rest
                    .strip_prefix('[')
                    .and_then(|r| r.split_once(']'))
                    .ok_or_else(|| PathError::InvalidIndex(part.to_string()))?;
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| PathError::InvalidIndex(part.to_string()))?;
                next = next.index(index);
                rest = tail;
            }

            path = Some(next);
        }

        path.ok_or(PathError::Empty)
    }
}
