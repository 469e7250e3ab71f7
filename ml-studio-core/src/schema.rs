//! Parameter and return schemas of published services

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value as Json};

use crate::error::{Error, Result};
use crate::types::TypeTag;
use crate::value::Value;

/// A named, typed parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name, also used as the input column name
    pub name: String,

    /// Declared interop type
    pub tag: TypeTag,
}

impl Parameter {
    /// Create a new parameter
    pub fn new(name: &str, tag: TypeTag) -> Self {
        Self {
            name: name.to_string(),
            tag,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.tag)
    }
}

/// Ordered mapping from parameter name to interop type tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSchema {
    /// Parameters in call order
    parameters: Vec<Parameter>,

    /// Parameter indices by name for faster lookup
    indices: HashMap<String, usize>,
}

impl ParameterSchema {
    /// Create a schema from parameters in call order
    pub fn new(parameters: Vec<Parameter>) -> Result<Self> {
        let mut indices = HashMap::with_capacity(parameters.len());
        for (i, parameter) in parameters.iter().enumerate() {
            if indices.insert(parameter.name.clone(), i).is_some() {
                return Err(Error::InvalidArgument(format!(
                    "duplicate parameter name: {}",
                    parameter.name
                )));
            }
        }

        Ok(Self { parameters, indices })
    }

    /// Build a schema from `(name, tag)` pairs
    pub fn typed<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, TypeTag)>,
    {
        Self::new(pairs.into_iter().map(|(name, tag)| Parameter::new(name, tag)).collect())
    }

    /// Schema in which every parameter uses the opaque encoding
    pub fn untyped<'a, I>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::typed(names.into_iter().map(|name| (name, TypeTag::Opaque)))
    }

    /// Parameters in call order
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Parameter names in call order
    pub fn names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    /// Get the index of a parameter by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Check if the schema has no parameters
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Parameters whose values only this SDK can decode
    pub fn opaque_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| !p.tag.is_interoperable())
    }

    /// Encode one call's positional arguments into wire cells
    pub fn encode_row(&self, args: &[Value]) -> Result<Vec<String>> {
        if args.len() != self.parameters.len() {
            return Err(Error::InvalidArgument(format!(
                "expected {} arguments, got {}",
                self.parameters.len(),
                args.len()
            )));
        }

        self.parameters
            .iter()
            .zip(args)
            .map(|(parameter, arg)| {
                parameter.tag.encode(arg).map_err(|e| match e {
                    Error::TypeMismatch(msg) => {
                        Error::TypeMismatch(format!("argument `{}`: {}", parameter.name, msg))
                    }
                    other => other,
                })
            })
            .collect()
    }

    /// Reorder named arguments into call order
    pub fn order_named(&self, named: Vec<(String, Value)>) -> Result<Vec<Value>> {
        let mut slots: Vec<Option<Value>> = vec![None; self.parameters.len()];

        for (name, value) in named {
            let index = self
                .index_of(&name)
                .ok_or_else(|| Error::InvalidArgument(format!("unexpected argument: {}", name)))?;
            if slots[index].replace(value).is_some() {
                return Err(Error::InvalidArgument(format!("argument given twice: {}", name)));
            }
        }

        slots
            .into_iter()
            .zip(&self.parameters)
            .map(|(slot, parameter)| {
                slot.ok_or_else(|| {
                    Error::InvalidArgument(format!("missing argument: {}", parameter.name))
                })
            })
            .collect()
    }

    /// `InputSchema` document of a service definition
    pub fn to_json(&self) -> Json {
        let map: Map<String, Json> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.tag.schema()))
            .collect();
        Json::Object(map)
    }
}

impl fmt::Display for ParameterSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", parameter)?;
        }
        write!(f, ")")
    }
}

/// Declared shape of a service's result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnSchema {
    /// One value in a column named `result`
    Single(TypeTag),

    /// Several values in columns `result0`, `result1`, ...; decoded as a tuple
    Tuple(Vec<TypeTag>),

    /// Several values in named columns; decoded as a dict keyed by column name
    Named(Vec<(String, TypeTag)>),
}

impl Default for ReturnSchema {
    fn default() -> Self {
        ReturnSchema::Single(TypeTag::Opaque)
    }
}

impl ReturnSchema {
    /// Output column names and their tags
    pub fn columns(&self) -> Vec<(String, TypeTag)> {
        match self {
            ReturnSchema::Single(tag) => vec![("result".to_string(), *tag)],
            ReturnSchema::Tuple(tags) => tags
                .iter()
                .enumerate()
                .map(|(i, tag)| (format!("result{}", i), *tag))
                .collect(),
            ReturnSchema::Named(columns) => columns.clone(),
        }
    }

    /// `OutputSchema` document of a service definition
    pub fn to_json(&self) -> Json {
        let map: Map<String, Json> = self
            .columns()
            .into_iter()
            .map(|(name, tag)| (name, tag.schema()))
            .collect();
        Json::Object(map)
    }

    /// Decode one result row
    pub fn decode_row(&self, row: &[String]) -> Result<Value> {
        let columns = self.columns();
        if row.len() < columns.len() {
            return Err(Error::Protocol(format!(
                "expected {} result columns, got {}",
                columns.len(),
                row.len()
            )));
        }

        match self {
            ReturnSchema::Single(tag) => tag.decode(&row[0]),
            ReturnSchema::Tuple(tags) => tags
                .iter()
                .zip(row)
                .map(|(tag, cell)| tag.decode(cell))
                .collect::<Result<Vec<_>>>()
                .map(Value::Tuple),
            ReturnSchema::Named(columns) => columns
                .iter()
                .zip(row)
                .map(|((name, tag), cell)| Ok((Value::Text(name.clone()), tag.decode(cell)?)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Dict),
        }
    }
}
