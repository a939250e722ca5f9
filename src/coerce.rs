//! Type coercion engine.
//!
//! Every parameter reaches the router as text. A [`TypeDescriptor`] says what
//! that text must look like and what it becomes:
//!
//! | Descriptor | Accepts | Produces |
//! |---|---|---|
//! | `int` | unsigned decimal digits | [`Value::Int`] |
//! | `float` | digits, optionally `.` and more digits | [`Value::Float`] |
//! | `bool` | `true`, `1`, `false`, `0` | [`Value::Bool`] |
//! | `string` | anything | [`Value::String`] |
//! | `array` | any JSON document | [`Value::Array`] |
//! | composite | a JSON object with the declared fields | [`Value::Object`] |
//!
//! Signs, exponents and surrounding whitespace are rejected for `int` and
//! `float`.
//!
//! Composite values are built from an explicit, ordered field table. Each
//! field is coerced recursively; a single failing field fails the whole
//! object, so callers never observe a half-built composite.

use std::borrow::Cow;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::CoercionError;

// ── Descriptors ───────────────────────────────────────────────────────────────

/// Declared type of a parameter or composite field.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeDescriptor {
    Int,
    Float,
    String,
    Bool,
    /// Any JSON document, kept as decoded.
    Array,
    Composite(Arc<CompositeType>),
    /// A composite referenced by name, resolved through a [`TypeRegistry`]
    /// when a value is coerced. Unresolved names fail with
    /// [`CoercionError::WrongType`].
    Named(String),
}

impl TypeDescriptor {
    pub fn composite(ty: CompositeType) -> Self {
        Self::Composite(Arc::new(ty))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

/// Parses the textual names `int`, `float`, `string`, `bool` and `array`.
/// Any other name is taken as a reference to a registered composite.
impl FromStr for TypeDescriptor {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "int"    => Self::Int,
            "float"  => Self::Float,
            "string" => Self::String,
            "bool"   => Self::Bool,
            "array"  => Self::Array,
            name     => Self::Named(name.to_owned()),
        })
    }
}

impl From<CompositeType> for TypeDescriptor {
    fn from(ty: CompositeType) -> Self {
        Self::composite(ty)
    }
}

/// A named object type with an ordered field table.
///
/// ```rust
/// use routebind::{CompositeType, TypeDescriptor};
///
/// let point = CompositeType::new("Point")
///     .field("x", TypeDescriptor::Int)
///     .field("y", TypeDescriptor::Int)
///     .optional("label", TypeDescriptor::String);
/// assert_eq!(point.fields().len(), 3);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CompositeType {
    name: String,
    fields: Vec<Field>,
}

impl CompositeType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: Vec::new() }
    }

    /// Adds a required field.
    pub fn field(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.fields.push(Field { name: name.into(), ty, optional: false, default: None });
        self
    }

    /// Adds an optional field. When absent from the input it is absent from
    /// the constructed object as well.
    pub fn optional(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.fields.push(Field { name: name.into(), ty, optional: true, default: None });
        self
    }

    /// Adds an optional field that takes `default` when absent.
    pub fn optional_or(mut self, name: impl Into<String>, ty: TypeDescriptor, default: Value) -> Self {
        self.fields.push(Field { name: name.into(), ty, optional: true, default: Some(default) });
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn fields(&self) -> &[Field] { &self.fields }
}

/// One entry of a [`CompositeType`]'s field table.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    name: String,
    ty: TypeDescriptor,
    optional: bool,
    default: Option<Value>,
}

impl Field {
    pub fn name(&self) -> &str { &self.name }
    pub fn ty(&self) -> &TypeDescriptor { &self.ty }
    pub fn is_optional(&self) -> bool { self.optional }
}

/// Composite types addressable by name from [`TypeDescriptor::Named`].
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<CompositeType>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `ty` under its own name, replacing any previous entry.
    pub fn register(&mut self, ty: CompositeType) -> &mut Self {
        self.types.insert(ty.name.clone(), Arc::new(ty));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<CompositeType>> {
        self.types.get(name)
    }
}

// ── Values ────────────────────────────────────────────────────────────────────

/// A coerced parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Array(serde_json::Value),
    Object(Object),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self { Self::Int(v) => Some(*v), _ => None }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self { Self::Float(v) => Some(*v), _ => None }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self { Self::Bool(v) => Some(*v), _ => None }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self { Self::String(v) => Some(v), _ => None }
    }

    pub fn as_array(&self) -> Option<&serde_json::Value> {
        match self { Self::Array(v) => Some(v), _ => None }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self { Self::Object(v) => Some(v), _ => None }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Self::Int(v) }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Self::Float(v) }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self { Self::Bool(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Self::String(v.to_owned()) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Self::String(v) }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Int(v)    => serializer.serialize_i64(*v),
            Self::Float(v)  => serializer.serialize_f64(*v),
            Self::Bool(v)   => serializer.serialize_bool(*v),
            Self::String(v) => serializer.serialize_str(v),
            Self::Array(v)  => v.serialize(serializer),
            Self::Object(v) => v.serialize(serializer),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v)    => write!(f, "{v}"),
            Self::Float(v)  => write!(f, "{v}"),
            Self::Bool(v)   => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Array(v)  => write!(f, "{v}"),
            Self::Object(v) => {
                write!(f, "{}(", v.type_name)?;
                for (i, (name, value)) in v.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// An instance of a [`CompositeType`]. Fields keep their declared order.
#[derive(Clone, Debug, PartialEq)]
pub struct Object {
    type_name: String,
    fields: Vec<(String, Value)>,
}

impl Object {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), fields: Vec::new() }
    }

    /// Appends a field. Used when building expected values by hand.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn type_name(&self) -> &str { &self.type_name }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self { Self::Object(v) }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// ── Coercion ──────────────────────────────────────────────────────────────────

/// Converts `raw` into a value of type `ty`.
///
/// Named composites are looked up in `types`.
pub fn coerce(raw: &str, ty: &TypeDescriptor, types: &TypeRegistry) -> Result<Value, CoercionError> {
    match ty {
        TypeDescriptor::Int => {
            if !is_unsigned_decimal(raw) {
                return Err(CoercionError::WrongType);
            }
            // Digits only, so the sole failure left is overflow.
            raw.parse().map(Value::Int).map_err(|_| CoercionError::WrongType)
        }
        TypeDescriptor::Float => {
            let well_formed = match raw.split_once('.') {
                Some((whole, frac)) => is_unsigned_decimal(whole) && is_unsigned_decimal(frac),
                None => is_unsigned_decimal(raw),
            };
            if !well_formed {
                return Err(CoercionError::WrongType);
            }
            raw.parse().map(Value::Float).map_err(|_| CoercionError::WrongType)
        }
        TypeDescriptor::Bool => match raw {
            "true" | "1"  => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _             => Err(CoercionError::WrongType),
        },
        TypeDescriptor::String => Ok(Value::String(raw.to_owned())),
        TypeDescriptor::Array => serde_json::from_str(raw)
            .map(Value::Array)
            .map_err(|_| CoercionError::InvalidJson),
        TypeDescriptor::Composite(composite) => construct(raw, composite, types),
        TypeDescriptor::Named(name) => match types.get(name) {
            Some(composite) => construct(raw, composite, types),
            None => Err(CoercionError::WrongType),
        },
    }
}

/// Text form of a decoded JSON value, as fed back into [`coerce`].
///
/// Strings contribute their contents; everything else its JSON encoding.
pub(crate) fn raw_text(value: &serde_json::Value) -> Cow<'_, str> {
    match value {
        serde_json::Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

fn construct(raw: &str, ty: &CompositeType, types: &TypeRegistry) -> Result<Value, CoercionError> {
    let decoded: serde_json::Value = serde_json::from_str(raw).map_err(|_| CoercionError::InvalidJson)?;
    let serde_json::Value::Object(input) = decoded else {
        return Err(CoercionError::WrongType);
    };

    let mut object = Object::new(ty.name.as_str());
    for field in &ty.fields {
        match input.get(&field.name) {
            Some(value) => {
                let value = coerce(&raw_text(value), &field.ty, types)?;
                object.fields.push((field.name.clone(), value));
            }
            None if field.optional => {
                if let Some(default) = &field.default {
                    object.fields.push((field.name.clone(), default.clone()));
                }
            }
            None => return Err(CoercionError::MissingField(field.name.clone())),
        }
    }
    Ok(Value::Object(object))
}

fn is_unsigned_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
