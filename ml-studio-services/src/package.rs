//! Function packaging
//!
//! A [`FunctionPackage`] holds everything needed to rebuild a function on the
//! service: the module that defines it when that file can be read, otherwise
//! its inline body plus a snapshot of the globals it references.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ml_studio_core::types::opaque;
use ml_studio_core::{Error, Result};
use tracing::debug;

use crate::function::RemoteFunction;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Captured code of a function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionPackage {
    /// The whole defining module
    SourceBacked {
        /// Path the source was read from
        module_path: PathBuf,

        /// Module contents
        source: String,
    },

    /// The inline definition and its globals
    InlineBacked {
        /// Definition text
        code: String,

        /// Global name to opaque-encoded value, in name order
        globals: BTreeMap<String, String>,
    },
}

impl FunctionPackage {
    /// Whether the package carries the defining module
    pub fn is_source_backed(&self) -> bool {
        matches!(self, FunctionPackage::SourceBacked { .. })
    }
}

/// Capture a function for remote execution
///
/// The defining file wins when it can be read. Otherwise every global named by
/// the inline body must be bound in the function's context; only direct
/// references are captured.
pub fn package(function: &RemoteFunction) -> Result<FunctionPackage> {
    check_identifier("function name", function.name())?;
    for param in function.params() {
        check_identifier("parameter name", param)?;
    }

    if let Some(path) = function.source_file() {
        match read_module(path) {
            Ok(source) => {
                debug!(function = function.name(), path = %path.display(), "packaging defining module");
                return Ok(FunctionPackage::SourceBacked {
                    module_path: path.to_path_buf(),
                    source,
                });
            }
            Err(e) => {
                debug!(function = function.name(), path = %path.display(), error = %e, "source unavailable, using inline body");
            }
        }
    }

    let inline = function.inline_body().ok_or_else(|| {
        Error::InvalidArgument(format!(
            "function `{}` has neither a readable source file nor an inline body",
            function.name()
        ))
    })?;

    let mut globals = BTreeMap::new();
    for name in &inline.globals {
        let value = function.context().get(name).ok_or_else(|| Error::MissingDependency {
            symbol: name.clone(),
        })?;
        check_identifier("global name", name)?;
        globals.insert(name.clone(), opaque::encode(value)?);
    }

    debug!(function = function.name(), globals = globals.len(), "packaging inline body");
    Ok(FunctionPackage::InlineBacked {
        code: inline.code.clone(),
        globals,
    })
}

/// Module text as UTF-8
///
/// A byte order mark is dropped. Modules that are not UTF-8 are accepted when
/// their `coding` declaration names Latin-1.
fn read_module(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(_) if declared_encoding(bytes).as_deref().map_or(false, is_latin1) => {
            Ok(bytes.iter().copied().map(char::from).collect())
        }
        Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
    }
}

/// Encoding named by a `coding[:=]` comment on one of the first two lines
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    bytes.split(|&b| b == b'\n').take(2).find_map(|line| {
        let line = String::from_utf8_lossy(line);
        let start = line.find("coding")? + "coding".len();
        let rest = line[start..].strip_prefix([':', '='])?.trim_start();
        let name: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            .collect();
        (!name.is_empty()).then_some(name)
    })
}

fn is_latin1(encoding: &str) -> bool {
    matches!(
        encoding.to_ascii_lowercase().replace('_', "-").as_str(),
        "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "l1"
    )
}

fn check_identifier(what: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .map_or(false, |c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric());

    if !valid {
        return Err(Error::InvalidArgument(format!("{} `{}` is not an identifier", what, name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{entry_script, InputMode};
    use ml_studio_core::{ParameterSchema, ReturnSchema, TypeTag, Value};
    use std::io::Write;
    use tempfile::NamedTempFile;
    use test_case::test_case;

    const MODULE: &str = "def helper(x):\n    return x * 2\n\ndef doubled(a):\n    return helper(a)\n";

    fn source_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_source_backed_when_readable() {
        let file = source_file(MODULE);
        let function = RemoteFunction::new("doubled", ["a"]).with_source_file(file.path());

        match package(&function).unwrap() {
            FunctionPackage::SourceBacked { module_path, source } => {
                assert_eq!(module_path, file.path());
                assert_eq!(source, MODULE);
            }
            other => panic!("expected source package, got {:?}", other),
        }
    }

    #[test]
    fn test_source_package_is_deterministic() {
        let file = source_file(MODULE);
        let function = RemoteFunction::new("doubled", ["a"]).with_source_file(file.path());

        assert_eq!(package(&function).unwrap(), package(&function).unwrap());
    }

    #[test]
    fn test_bom_is_stripped() {
        let file = source_file(&format!("\u{feff}{}", MODULE));
        let function = RemoteFunction::new("doubled", ["a"]).with_source_file(file.path());

        assert!(matches!(package(&function).unwrap(), FunctionPackage::SourceBacked { source, .. } if source == MODULE));
    }

    #[test]
    fn test_bom_module_script_declares_utf8() {
        let module = "\u{feff}def greet(name):\n    return u'caf\u{e9} ' + name\n";
        let file = source_file(module);
        let function = RemoteFunction::new("greet", ["name"]).with_source_file(file.path());
        let parameters = ParameterSchema::typed([("name", TypeTag::Text)]).unwrap();

        let package = package(&function).unwrap();
        let script = entry_script("greet", &package, &parameters, &ReturnSchema::Single(TypeTag::Text), InputMode::Rows);

        assert_eq!(script.lines().next(), Some("# -*- coding: utf-8 -*-"));
        assert!(!script.contains('\u{feff}'));
        assert!(script.contains("return u'caf\u{e9} ' + name"));
    }

    #[test]
    fn test_latin1_module_is_transcoded() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"# -*- coding: latin-1 -*-\ndef label(x):\n    return u'caf\xe9'\n").unwrap();
        let function = RemoteFunction::new("label", ["x"]).with_source_file(file.path());

        match package(&function).unwrap() {
            FunctionPackage::SourceBacked { source, .. } => assert!(source.contains("return u'caf\u{e9}'")),
            other => panic!("expected source package, got {:?}", other),
        }
    }

    #[test]
    fn test_undeclared_non_utf8_module_uses_inline_body() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"def label(x):\n    return '\xe9'\n").unwrap();
        let function = RemoteFunction::new("label", ["x"])
            .with_source_file(file.path())
            .with_inline_body("def label(x):\n    return x\n", Vec::new());

        assert!(!package(&function).unwrap().is_source_backed());
    }

    #[test_case(b"# -*- coding: latin-1 -*-\n", Some("latin-1") ; "emacs style")]
    #[test_case(b"#!/usr/bin/env python\n# vim: set fileencoding=iso-8859-1 :\n", Some("iso-8859-1") ; "second line")]
    #[test_case(b"import os\nimport sys\n# coding: utf-8\n", None ; "third line ignored")]
    fn coding_declarations(head: &[u8], expected: Option<&str>) {
        assert_eq!(declared_encoding(head).as_deref(), expected);
    }

    #[test]
    fn test_falls_back_to_inline_body() {
        let function = RemoteFunction::new("scale", ["x"])
            .with_source_file("/nonexistent/module.py")
            .with_inline_body("def scale(x):\n    return x * factor + offset\n", ["offset", "factor"])
            .bind("factor", 2)
            .bind("offset", "unused text")
            .bind("unreferenced", Value::Null);

        match package(&function).unwrap() {
            FunctionPackage::InlineBacked { code, globals } => {
                assert!(code.starts_with("def scale(x):"));
                assert_eq!(globals.keys().collect::<Vec<_>>(), ["factor", "offset"]);
                assert_eq!(opaque::decode(&globals["factor"]).unwrap(), Value::Int(2));
            }
            other => panic!("expected inline package, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_dependency() {
        let function = RemoteFunction::new("scale", ["x"])
            .with_inline_body("def scale(x):\n    return x * factor\n", ["factor"]);

        match package(&function) {
            Err(Error::MissingDependency { symbol }) => assert_eq!(symbol, "factor"),
            other => panic!("expected missing dependency, got {:?}", other),
        }
    }

    #[test]
    fn test_no_code_available() {
        let function = RemoteFunction::new("ghost", ["x"]);
        assert!(matches!(package(&function), Err(Error::InvalidArgument(_))));
    }

    #[test_case("x" ; "single letter")]
    #[test_case("_private" ; "leading underscore")]
    #[test_case("value2" ; "trailing digit")]
    fn accepts_identifier(name: &str) {
        assert!(check_identifier("name", name).is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("2nd" ; "leading digit")]
    #[test_case("a-b" ; "dash")]
    #[test_case("df1[\"x\"]" ; "expression")]
    fn rejects_non_identifier(name: &str) {
        assert!(matches!(check_identifier("name", name), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_parameter_names_must_be_identifiers() {
        let function = RemoteFunction::new("f", ["not valid"]).with_inline_body("def f(x): pass\n", Vec::new());
        assert!(matches!(package(&function), Err(Error::InvalidArgument(_))));
    }
}
