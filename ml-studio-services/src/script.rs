//! Entry script run by the service
//!
//! The service calls `azureml_main(df1, df2)` with the input records as a data
//! frame whose columns are the parameter names. The generated script rebuilds
//! the packaged function, calls it once per input row and returns one output
//! row per call, or hands it the whole frame when publishing with
//! [`InputMode::Frame`]. Opaque parameters and results go through the tagged
//! JSON helpers defined at the top of the script.
//!
//! The script is UTF-8 and says so on its first line; values inlined into it
//! are written as ASCII-only literals.

use std::fmt::Write;

use ml_studio_core::{ParameterSchema, ReturnSchema, TypeTag};

use crate::package::FunctionPackage;

/// Name the packaged function is bound to inside the script
const USER_FUNCTION: &str = "__user_function";

const CODING: &str = "# -*- coding: utf-8 -*-\n";

const PRELUDE: &str = r#"import base64
import json
import math

import pandas

try:
    import numpy
except ImportError:
    numpy = None

try:
    _text_type = unicode
except NameError:
    _text_type = str


def _decode_inner(tagged):
    kind = tagged['type']
    payload = tagged['value']
    if kind == 'null':
        return None
    if kind == 'bool':
        if payload == 'true':
            return True
        if payload == 'false':
            return False
        raise ValueError('invalid bool payload: ' + payload)
    if kind in ('int', 'long'):
        return int(payload)
    if kind == 'float':
        return float(payload)
    if kind == 'unicode':
        return payload
    if kind == 'bytes':
        return bytearray(base64.b64decode(payload))
    if kind == 'list':
        return [_decode_inner(item) for item in payload]
    if kind == 'tuple':
        return tuple(_decode_inner(item) for item in payload)
    if kind == 'dict':
        return dict((_decode_inner(k), _decode_inner(v)) for k, v in payload)
    raise ValueError('unknown value type: ' + kind)


def _decode(text):
    return _decode_inner(json.loads(text))


def _float_text(value):
    if math.isnan(value):
        return 'NaN'
    if math.isinf(value):
        return 'Infinity' if value > 0 else '-Infinity'
    return repr(value)


def _encode_inner(value):
    if value is None:
        return {'type': 'null', 'value': 'null'}
    if numpy is not None:
        if isinstance(value, numpy.bool_):
            return {'type': 'bool', 'value': 'true' if value else 'false'}
        if isinstance(value, numpy.integer):
            return {'type': 'int', 'value': str(int(value))}
        if isinstance(value, numpy.floating):
            return {'type': 'float', 'value': _float_text(float(value))}
        if isinstance(value, numpy.ndarray):
            return {'type': 'list', 'value': [_encode_inner(item) for item in value.tolist()]}
    if isinstance(value, bool):
        return {'type': 'bool', 'value': 'true' if value else 'false'}
    if isinstance(value, int) or type(value).__name__ == 'long':
        return {'type': 'int', 'value': str(value)}
    if isinstance(value, float):
        return {'type': 'float', 'value': _float_text(value)}
    if isinstance(value, _text_type):
        return {'type': 'unicode', 'value': value}
    if isinstance(value, (bytes, bytearray)):
        return {'type': 'bytes', 'value': base64.b64encode(bytes(value)).decode('ascii')}
    if isinstance(value, list):
        return {'type': 'list', 'value': [_encode_inner(item) for item in value]}
    if isinstance(value, tuple):
        return {'type': 'tuple', 'value': [_encode_inner(item) for item in value]}
    if isinstance(value, dict):
        return {'type': 'dict', 'value': [[_encode_inner(k), _encode_inner(v)] for k, v in value.items()]}
    raise TypeError('cannot encode value of type ' + type(value).__name__)


def _encode(value):
    return json.dumps(_encode_inner(value))
"#;

/// How the service hands its input to the function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputMode {
    /// One call per input row, one argument per column
    #[default]
    Rows,

    /// One call with the whole input frame; the function returns a frame
    Frame,
}

/// Render the entry script for a packaged function
pub fn entry_script(
    function_name: &str,
    package: &FunctionPackage,
    parameters: &ParameterSchema,
    returns: &ReturnSchema,
    mode: InputMode,
) -> String {
    let mut script = String::from(CODING);
    script.push_str(PRELUDE);

    script.push('\n');
    match package {
        FunctionPackage::SourceBacked { source, .. } => {
            script.push_str(source);
        }
        FunctionPackage::InlineBacked { code, globals } => {
            for (name, encoded) in globals {
                let _ = writeln!(script, "{} = _decode({})", name, python_literal(encoded));
            }
            script.push('\n');
            script.push_str(code);
        }
    }
    if !script.ends_with('\n') {
        script.push('\n');
    }

    script.push('\n');
    let _ = write!(script, "{} = {}\n\n", USER_FUNCTION, function_name);
    match mode {
        InputMode::Rows => script.push_str(&main_source(parameters, returns)),
        InputMode::Frame => script.push_str(&frame_main_source()),
    }

    script
}

fn frame_main_source() -> String {
    format!("def azureml_main(df1=None, df2=None):\n    return {}(df1)\n", USER_FUNCTION)
}

fn main_source(parameters: &ParameterSchema, returns: &ReturnSchema) -> String {
    let mut lines = vec![
        "def azureml_main(df1=None, df2=None):".to_string(),
        "    results = []".to_string(),
        "    for i in range(df1.shape[0]):".to_string(),
    ];

    for parameter in parameters.parameters() {
        let cell = format!("df1[\"{}\"][i]", parameter.name);
        if parameter.tag.is_interoperable() {
            lines.push(format!("        {} = {}", parameter.name, cell));
        } else {
            lines.push(format!("        {} = _decode({})", parameter.name, cell));
        }
    }

    lines.push(format!(
        "        results.append({}({}))",
        USER_FUNCTION,
        parameters.names().join(", ")
    ));

    lines.push(match returns {
        ReturnSchema::Single(tag) => format!(
            "    return pandas.DataFrame([{} for r in results], columns=['result'])",
            output_cell("r", *tag)
        ),
        ReturnSchema::Tuple(tags) => {
            let names: Vec<String> = (0..tags.len()).map(|i| format!("r{}", i)).collect();
            let cells: Vec<String> = names
                .iter()
                .zip(tags)
                .map(|(name, tag)| output_cell(name, *tag))
                .collect();
            let columns: Vec<String> = (0..tags.len()).map(|i| format!("'result{}'", i)).collect();
            format!(
                "    return pandas.DataFrame([({},) for {} in results], columns=[{}])",
                cells.join(", "),
                names.join(", "),
                columns.join(", ")
            )
        }
        ReturnSchema::Named(columns) => {
            let cells: Vec<String> = columns
                .iter()
                .map(|(name, tag)| output_cell(&format!("r[{}]", python_literal(name)), *tag))
                .collect();
            let names: Vec<String> = columns.iter().map(|(name, _)| python_literal(name)).collect();
            format!(
                "    return pandas.DataFrame([({},) for r in results], columns=[{}])",
                cells.join(", "),
                names.join(", ")
            )
        }
    });

    let mut source = lines.join("\n");
    source.push('\n');
    source
}

/// Python unicode literal for `text` that uses only printable ASCII
fn python_literal(text: &str) -> String {
    let mut literal = String::with_capacity(text.len() + 3);
    literal.push_str("u\"");
    for c in text.chars() {
        match c {
            '"' => literal.push_str("\\\""),
            '\\' => literal.push_str("\\\\"),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\t' => literal.push_str("\\t"),
            ' '..='~' => literal.push(c),
            c if u32::from(c) <= 0xffff => {
                let _ = write!(literal, "\\u{:04x}", u32::from(c));
            }
            c => {
                let _ = write!(literal, "\\U{:08x}", u32::from(c));
            }
        }
    }
    literal.push('"');
    literal
}

fn output_cell(expr: &str, tag: TypeTag) -> String {
    if tag.is_interoperable() {
        expr.to_string()
    } else {
        format!("_encode({})", expr)
    }
}
