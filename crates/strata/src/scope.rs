//! evaluated values and the contexts built from them
use crate::catalog::Namespace;
use crate::error::{Error, Result};
use crate::include::{FileId, IncludeChain, INCLUDE_ROOT};
use crate::util;
use hcl::eval::{Context, Evaluate};
use hcl::value::Map;
use std::path::Path;

pub type Values = Map<String, hcl::Value>;

/// Values of one evaluation run
///
/// Locals are kept per file, globals are shared by the whole chain.
#[derive(Debug, Default, Clone)]
pub struct Scopes {
    locals: Vec<Values>,
    includes: Vec<hcl::Value>,
    globals: Values,
}

impl Scopes {
    pub fn new(chain: &IncludeChain) -> Self {
        let (locals, includes) = chain
            .files()
            .map(|(id, _)| (Values::new(), chain.include_value(id)))
            .unzip();

        Self {
            locals,
            includes,
            globals: Values::new(),
        }
    }

    pub fn locals(&self, file: FileId) -> &Values {
        &self.locals[file.0]
    }

    pub fn globals(&self) -> &Values {
        &self.globals
    }

    pub fn include(&self, file: FileId) -> &hcl::Value {
        &self.includes[file.0]
    }

    pub fn store(&mut self, namespace: Namespace, file: FileId, name: &str, value: hcl::Value) {
        let values = match namespace {
            Namespace::Local => &mut self.locals[file.0],
            Namespace::Global => &mut self.globals,
        };
        values.insert(name.to_owned(), value);
    }

    /// Context for an expression of file `file`
    pub fn context(&self, file: FileId) -> Context<'static> {
        context(
            Some(self.locals(file)),
            self.globals(),
            Some(self.include(file)),
        )
    }

    pub(crate) fn into_parts(self) -> (Vec<Values>, Vec<hcl::Value>, Values) {
        (self.locals, self.includes, self.globals)
    }
}

/// Declares `local`, `global` and `include`
///
/// The namespaces that are `None` are left undeclared so references to them fail.
pub fn context(
    locals: Option<&Values>,
    globals: &Values,
    include: Option<&hcl::Value>,
) -> Context<'static> {
    let mut context = Context::new();

    if let Some(locals) = locals {
        context.declare_var(
            hcl::Identifier::unchecked(Namespace::Local.root()),
            hcl::Value::Object(locals.clone()),
        );
    }

    context.declare_var(
        hcl::Identifier::unchecked(Namespace::Global.root()),
        hcl::Value::Object(globals.clone()),
    );

    if let Some(include) = include {
        context.declare_var(hcl::Identifier::unchecked(INCLUDE_ROOT), include.clone());
    }

    context
}

/// Evaluates `expression`, turning a panic inside the evaluator into [Error::PanicRecovered]
///
/// The inner result carries the error reported by the expression itself.
pub(crate) fn evaluate_guarded(
    expression: &hcl::Expression,
    context: &Context,
    path: &Path,
) -> Result<Result<hcl::Value, hcl::eval::Error>> {
    catch_panic(path, || expression.evaluate(context))
}

fn catch_panic<T>(path: &Path, f: impl FnOnce() -> T) -> Result<T> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).map_err(|payload| {
        let payload = util::panic_message(payload.as_ref());
        tracing::error!(path=%path.display(), %payload, "expression evaluation panicked");
        Error::PanicRecovered {
            path: path.to_owned(),
            payload,
        }
    })
}
