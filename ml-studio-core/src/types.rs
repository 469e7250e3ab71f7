//! Interop type mapping
//!
//! Published services exchange every argument and result as a text cell. The
//! [`TypeTag`] declared for a parameter decides how a [`Value`] is written into
//! that cell and read back out of it, and which schema fragment describes the
//! parameter on the service help page.
//!
//! Four tags are understood by clients in any language. Everything else goes
//! through [`TypeTag::Opaque`], a tagged JSON document that only this SDK (and
//! the entry script it uploads) knows how to read.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value as Json};

use crate::error::{Error, Result};
use crate::value::Value;

/// Interop type tag of a parameter or result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// 64-bit signed integer
    Int,

    /// Boolean
    Bool,

    /// 64-bit floating point
    Float,

    /// Unicode text
    Text,

    /// Tagged JSON understood only by this SDK
    Opaque,
}

impl TypeTag {
    /// All interoperable tags
    pub const INTEROP: [TypeTag; 4] = [TypeTag::Int, TypeTag::Bool, TypeTag::Float, TypeTag::Text];

    /// Whether clients in other languages can produce and consume this tag
    pub fn is_interoperable(self) -> bool {
        !matches!(self, TypeTag::Opaque)
    }

    /// Schema fragment describing this tag in a service definition
    pub fn schema(self) -> Json {
        match self {
            TypeTag::Int => json!({"type": "integer", "format": "int64"}),
            TypeTag::Bool => json!({"type": "Boolean"}),
            TypeTag::Float => json!({"type": "number", "format": "double"}),
            TypeTag::Text => json!({"type": "string"}),
            TypeTag::Opaque => json!({"type": "string", "format": "string"}),
        }
    }

    /// Recover a tag from a schema fragment produced by [`TypeTag::schema`]
    pub fn from_schema(schema: &Json) -> Option<TypeTag> {
        let kind = schema.get("type")?.as_str()?;
        let format = schema.get("format").and_then(Json::as_str);

        match (kind.to_ascii_lowercase().as_str(), format) {
            ("integer", _) => Some(TypeTag::Int),
            ("boolean", _) => Some(TypeTag::Bool),
            ("number", _) => Some(TypeTag::Float),
            ("string", Some("string")) => Some(TypeTag::Opaque),
            ("string", _) => Some(TypeTag::Text),
            _ => None,
        }
    }

    /// Tag for a column type reported in a service response (`Int64`, `Double`, ...)
    pub fn from_column_type(name: &str) -> Option<TypeTag> {
        match name.to_ascii_lowercase().as_str() {
            "int32" | "int64" | "integer" => Some(TypeTag::Int),
            "boolean" | "bool" => Some(TypeTag::Bool),
            "double" | "single" | "number" | "float" => Some(TypeTag::Float),
            "string" => Some(TypeTag::Text),
            _ => None,
        }
    }

    /// Encode a value into its wire cell
    pub fn encode(self, value: &Value) -> Result<String> {
        encode(self, value)
    }

    /// Decode a wire cell into a value
    pub fn decode(self, wire: &str) -> Result<Value> {
        decode(self, wire)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Int => write!(f, "int"),
            TypeTag::Bool => write!(f, "bool"),
            TypeTag::Float => write!(f, "float"),
            TypeTag::Text => write!(f, "str"),
            TypeTag::Opaque => write!(f, "object"),
        }
    }
}

impl FromStr for TypeTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "int" | "integer" => Ok(TypeTag::Int),
            "bool" | "boolean" => Ok(TypeTag::Bool),
            "float" | "double" => Ok(TypeTag::Float),
            "str" | "string" | "text" => Ok(TypeTag::Text),
            "object" | "opaque" => Ok(TypeTag::Opaque),
            other => Err(Error::InvalidArgument(format!("unknown type tag: {}", other))),
        }
    }
}

/// Encode `value` into a wire cell according to `tag`
pub fn encode(tag: TypeTag, value: &Value) -> Result<String> {
    match (tag, value) {
        (TypeTag::Int, Value::Int(v)) => Ok(v.to_string()),
        (TypeTag::Bool, Value::Bool(v)) => Ok(if *v { "true" } else { "false" }.to_string()),
        (TypeTag::Float, Value::Float(v)) => Ok(format_float(*v)),
        (TypeTag::Float, Value::Int(_)) => Ok(format_float(value.as_float().unwrap_or_default())),
        (TypeTag::Text, Value::Text(v)) => Ok(v.clone()),
        (TypeTag::Text, Value::Bytes(bytes)) => String::from_utf8(bytes.clone()).map_err(|_| {
            Error::TypeMismatch("byte string is not valid UTF-8 and cannot be sent as text".into())
        }),
        (TypeTag::Opaque, value) => opaque::encode(value),
        (tag, value) => Err(Error::TypeMismatch(format!(
            "cannot encode {} value as {}",
            value.kind(),
            tag
        ))),
    }
}

/// Decode a wire cell according to `tag`
pub fn decode(tag: TypeTag, wire: &str) -> Result<Value> {
    match tag {
        TypeTag::Int => parse_int(wire).map(Value::Int),
        TypeTag::Bool => parse_bool(wire).map(Value::Bool),
        TypeTag::Float => parse_float(wire).map(Value::Float),
        TypeTag::Text => Ok(Value::Text(wire.to_string())),
        TypeTag::Opaque => opaque::decode(wire),
    }
}

/// Format a float the way a JSON encoder on the service side would
fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        serde_json::Number::from_f64(v).map_or_else(|| v.to_string(), |n| n.to_string())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn parse_int(wire: &str) -> Result<i64> {
    let text = wire.trim();
    if let Ok(v) = text.parse::<i64>() {
        return Ok(v);
    }

    // Integral floats ("3.0") are produced by some service runtimes
    match text.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() < 9.2e18 => Ok(v as i64),
        _ => Err(Error::TypeMismatch(format!("expected an integer, got {:?}", wire))),
    }
}

fn parse_bool(wire: &str) -> Result<bool> {
    match wire.trim() {
        "true" | "True" => Ok(true),
        "false" | "False" => Ok(false),
        other => Err(Error::TypeMismatch(format!("expected a boolean, got {:?}", other))),
    }
}

fn parse_float(wire: &str) -> Result<f64> {
    match wire.trim() {
        "NaN" | "nan" => Ok(f64::NAN),
        "Infinity" | "inf" => Ok(f64::INFINITY),
        "-Infinity" | "-inf" => Ok(f64::NEG_INFINITY),
        text => text
            .parse::<f64>()
            .map_err(|_| Error::TypeMismatch(format!("expected a float, got {:?}", wire))),
    }
}

/// Tagged JSON encoding for values without an interop tag
///
/// Every value becomes `{"type": <name>, "value": <payload>}`:
///
/// | name | payload |
/// |------|---------|
/// | `null` | `"null"` |
/// | `bool` | `"true"` / `"false"` |
/// | `int` | decimal text |
/// | `float` | decimal text |
/// | `unicode` | the text itself |
/// | `bytes` | standard base64, no line breaks |
/// | `list`, `tuple` | array of encoded elements |
/// | `dict` | array of `[key, value]` pairs of encoded elements |
pub mod opaque {
    use super::{json, parse_float, Engine, Error, Json, Result, Value, STANDARD};

    /// Encode a value into an opaque cell
    pub fn encode(value: &Value) -> Result<String> {
        Ok(to_json(value).to_string())
    }

    /// Decode an opaque cell
    pub fn decode(wire: &str) -> Result<Value> {
        let parsed: Json = serde_json::from_str(wire)?;
        if !parsed.is_object() {
            return Err(Error::TypeMismatch(format!("expected a tagged object, got {}", wire)));
        }
        from_json(&parsed)
    }

    /// Tagged JSON document for a value
    pub fn to_json(value: &Value) -> Json {
        match value {
            Value::Null => json!({"type": "null", "value": "null"}),
            Value::Bool(v) => json!({"type": "bool", "value": if *v { "true" } else { "false" }}),
            Value::Int(v) => json!({"type": "int", "value": v.to_string()}),
            Value::Float(v) => json!({"type": "float", "value": float_text(*v)}),
            Value::Text(v) => json!({"type": "unicode", "value": v}),
            Value::Bytes(v) => json!({"type": "bytes", "value": STANDARD.encode(v)}),
            Value::List(items) => json!({"type": "list", "value": items.iter().map(to_json).collect::<Vec<_>>()}),
            Value::Tuple(items) => json!({"type": "tuple", "value": items.iter().map(to_json).collect::<Vec<_>>()}),
            Value::Dict(entries) => json!({
                "type": "dict",
                "value": entries.iter().map(|(k, v)| json!([to_json(k), to_json(v)])).collect::<Vec<_>>()
            }),
        }
    }

    /// Value described by a tagged JSON document
    pub fn from_json(tagged: &Json) -> Result<Value> {
        let kind = tagged
            .get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| Error::TypeMismatch("tagged value has no type".into()))?;
        let payload = tagged
            .get("value")
            .ok_or_else(|| Error::TypeMismatch(format!("tagged {} value has no payload", kind)))?;

        match kind {
            "null" => Ok(Value::Null),
            "bool" => match text(payload)? {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                other => Err(Error::TypeMismatch(format!("invalid bool payload: {:?}", other))),
            },
            "int" | "long" => text(payload)?
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| Error::TypeMismatch(format!("invalid int payload: {}", payload))),
            "float" => parse_float(text(payload)?).map(Value::Float),
            "unicode" => Ok(Value::Text(text(payload)?.to_string())),
            "bytes" => STANDARD
                .decode(text(payload)?)
                .map(Value::Bytes)
                .map_err(|e| Error::TypeMismatch(format!("invalid base64 payload: {}", e))),
            "list" => elements(payload).map(Value::List),
            "tuple" => elements(payload).map(Value::Tuple),
            "dict" => {
                let pairs = payload
                    .as_array()
                    .ok_or_else(|| Error::TypeMismatch("dict payload is not an array".into()))?;
                pairs
                    .iter()
                    .map(|pair| match pair.as_array().map(Vec::as_slice) {
                        Some([key, value]) => Ok((from_json(key)?, from_json(value)?)),
                        _ => Err(Error::TypeMismatch("dict entry is not a [key, value] pair".into())),
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Dict)
            }
            other => Err(Error::TypeMismatch(format!("unsupported type: {}", other))),
        }
    }

    fn text(payload: &Json) -> Result<&str> {
        payload
            .as_str()
            .ok_or_else(|| Error::TypeMismatch(format!("expected a string payload, got {}", payload)))
    }

    fn elements(payload: &Json) -> Result<Vec<Value>> {
        payload
            .as_array()
            .ok_or_else(|| Error::TypeMismatch("sequence payload is not an array".into()))?
            .iter()
            .map(from_json)
            .collect()
    }

    fn float_text(v: f64) -> String {
        if v.is_nan() {
            "nan".to_string()
        } else if v.is_infinite() {
            if v > 0.0 { "inf" } else { "-inf" }.to_string()
        } else {
            format!("{:?}", v)
        }
    }
}
