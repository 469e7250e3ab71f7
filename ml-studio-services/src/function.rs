//! Functions that can be published as web services

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ml_studio_core::{Error, Result, Value};

/// Local implementation of a function
pub type LocalHandler = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Inline definition of a function and the globals it reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineBody {
    /// Full definition text, including the `def` line
    pub code: String,

    /// Names of module-level globals the body references
    pub globals: Vec<String>,
}

/// A function to run remotely
///
/// The remote code comes from either the file that defines the function or an
/// inline body. Values of globals referenced by an inline body are taken from
/// the function's context, which is captured when the function is packaged.
#[derive(Clone)]
pub struct RemoteFunction {
    /// Function name
    name: String,

    /// Parameter names in call order
    params: Vec<String>,

    /// File that defines the function
    source_file: Option<PathBuf>,

    /// Inline definition
    inline: Option<InlineBody>,

    /// Values of globals
    context: BTreeMap<String, Value>,

    /// Optional local implementation
    local: Option<LocalHandler>,
}

impl RemoteFunction {
    /// Create a function with the given name and parameter names
    pub fn new<'a, I>(name: &str, params: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            name: name.to_string(),
            params: params.into_iter().map(str::to_string).collect(),
            source_file: None,
            inline: None,
            context: BTreeMap::new(),
            local: None,
        }
    }

    /// Set the file that defines the function
    #[must_use]
    pub fn with_source_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_file = Some(path.into());
        self
    }

    /// Set the inline definition and the globals it references
    #[must_use]
    pub fn with_inline_body<'a, I>(mut self, code: &str, globals: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.inline = Some(InlineBody {
            code: code.to_string(),
            globals: globals.into_iter().map(str::to_string).collect(),
        });
        self
    }

    /// Bind a global to a value
    #[must_use]
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.context.insert(name.to_string(), value.into());
        self
    }

    /// Set the local implementation
    #[must_use]
    pub fn with_local<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.local = Some(Arc::new(handler));
        self
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter names in call order
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// File that defines the function
    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    /// Inline definition
    pub fn inline_body(&self) -> Option<&InlineBody> {
        self.inline.as_ref()
    }

    /// Bound globals
    pub fn context(&self) -> &BTreeMap<String, Value> {
        &self.context
    }

    /// Run the local implementation
    pub fn call_local(&self, args: &[Value]) -> Result<Value> {
        let handler = self.local.as_ref().ok_or_else(|| {
            Error::InvalidOperation(format!("function `{}` has no local implementation", self.name))
        })?;

        if args.len() != self.params.len() {
            return Err(Error::InvalidArgument(format!(
                "`{}` takes {} arguments, got {}",
                self.name,
                self.params.len(),
                args.len()
            )));
        }

        handler(args)
    }
}

impl fmt::Debug for RemoteFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("source_file", &self.source_file)
            .field("inline", &self.inline)
            .field("context", &self.context)
            .field("local", &self.local.is_some())
            .finish()
    }
}
