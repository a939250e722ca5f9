//! The bound-parameter bundle handed to middleware and handlers.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};

use serde::Serialize;

use crate::coerce::Value;

/// Coerced values of one source, keyed by parameter name.
pub type Params = BTreeMap<String, Value>;

/// Where a parameter is read from.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ParamSource {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

impl ParamSource {
    /// All sources, in binding order.
    pub const ALL: [Self; 5] = [Self::Path, Self::Query, Self::Header, Self::Cookie, Self::Body];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path   => "path",
            Self::Query  => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
            Self::Body   => "body",
        }
    }
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every declared parameter of a matched route, coerced, grouped by source.
///
/// A bundle only exists once binding has fully succeeded. Middleware receive
/// it by value and return the bundle the next stage sees.
///
/// ```rust
/// use routebind::{Bundle, ParamSource, Value};
///
/// let mut bundle = Bundle::default();
/// bundle.insert(ParamSource::Path, "id", Value::Int(42));
/// assert_eq!(bundle.path["id"], Value::Int(42));
/// assert_eq!(bundle.get(ParamSource::Path, "id").and_then(Value::as_int), Some(42));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Bundle {
    pub path: Params,
    pub query: Params,
    pub header: Params,
    pub cookie: Params,
    pub body: Params,
}

impl Bundle {
    pub fn get(&self, source: ParamSource, name: &str) -> Option<&Value> {
        self[source].get(name)
    }

    /// Adds or replaces a value, returning the previous one.
    pub fn insert(&mut self, source: ParamSource, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self[source].insert(name.into(), value.into())
    }

    pub fn remove(&mut self, source: ParamSource, name: &str) -> Option<Value> {
        self[source].remove(name)
    }
}

impl Index<ParamSource> for Bundle {
    type Output = Params;

    fn index(&self, source: ParamSource) -> &Params {
        match source {
            ParamSource::Path   => &self.path,
            ParamSource::Query  => &self.query,
            ParamSource::Header => &self.header,
            ParamSource::Cookie => &self.cookie,
            ParamSource::Body   => &self.body,
        }
    }
}

impl IndexMut<ParamSource> for Bundle {
    fn index_mut(&mut self, source: ParamSource) -> &mut Params {
        match source {
            ParamSource::Path   => &mut self.path,
            ParamSource::Query  => &mut self.query,
            ParamSource::Header => &mut self.header,
            ParamSource::Cookie => &mut self.cookie,
            ParamSource::Body   => &mut self.body,
        }
    }
}
