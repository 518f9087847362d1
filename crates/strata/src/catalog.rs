//! named bindings of the `locals` and `globals` blocks of one file
//!
//! ```hcl
//! locals {
//!   env = "prod"
//! }
//!
//! globals {
//!   region = "eu-west-1"
//!   bucket = "${local.env}-${global.region}"
//! }
//! ```
use crate::error::{Error, Result};
use crate::source::SourceFile;
use crate::util;
use hcl_edit::structure::{Block, Structure};
use indexmap::IndexMap;

pub const LOCALS_BLOCK: &str = "locals";
pub const GLOBALS_BLOCK: &str = "globals";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Local,
    Global,
}

impl Namespace {
    /// Variable name expressions use to reach this namespace
    pub fn root(self) -> &'static str {
        match self {
            Namespace::Local => "local",
            Namespace::Global => "global",
        }
    }

    fn block(self) -> &'static str {
        match self {
            Namespace::Local => LOCALS_BLOCK,
            Namespace::Global => GLOBALS_BLOCK,
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.root())
    }
}

/// A name bound to an expression
///
/// `expression` is only `None` for a global that was referenced before any file defined it.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub namespace: Namespace,
    pub expression: Option<hcl::Expression>,
    pub evaluated: bool,
    pub value: Option<hcl::Value>,
}

impl Binding {
    pub fn new(namespace: Namespace, name: impl Into<String>, expression: hcl::Expression) -> Self {
        Self {
            name: name.into(),
            namespace,
            expression: Some(expression),
            evaluated: false,
            value: None,
        }
    }

    /// A global awaiting its defining file
    pub fn provisional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Namespace::Global,
            expression: None,
            evaluated: false,
            value: None,
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.expression.is_none()
    }

    /// `namespace.name`, the way expressions refer to it
    pub fn address(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

pub type Bindings = IndexMap<String, Binding>;

/// Bindings declared by a single file
#[derive(Debug, Default)]
pub struct Catalog {
    pub locals: Option<Bindings>,
    pub globals: Option<Bindings>,
}

impl Catalog {
    pub fn get(&self, namespace: Namespace) -> Option<&Bindings> {
        match namespace {
            Namespace::Local => self.locals.as_ref(),
            Namespace::Global => self.globals.as_ref(),
        }
    }
}

/// Collects the bindings of `file`
///
/// A missing block is not an error, a second one is.
pub fn extract(file: &SourceFile) -> Result<Catalog> {
    let locals = file
        .single_block(LOCALS_BLOCK)?
        .map(|block| bindings(file, Namespace::Local, block))
        .transpose()?;

    let globals = file
        .single_block(GLOBALS_BLOCK)?
        .map(|block| bindings(file, Namespace::Global, block))
        .transpose()?;

    tracing::debug!(
        path=%file.path().display(),
        locals=locals.as_ref().map_or(0, IndexMap::len),
        globals=globals.as_ref().map_or(0, IndexMap::len),
        "extracted bindings"
    );

    Ok(Catalog { locals, globals })
}

fn bindings(file: &SourceFile, namespace: Namespace, block: &Block) -> Result<Bindings> {
    let mut bindings = Bindings::new();

    for structure in block.body.iter() {
        let attribute = match structure {
            Structure::Attribute(attribute) => attribute,
            Structure::Block(nested) => {
                return Err(Error::NestedBlock {
                    path: file.path().to_owned(),
                    block: namespace.block(),
                    name: nested.ident.value().as_str().to_owned(),
                })
            }
        };

        let name = attribute.key.value().as_str();
        // parsed keys are always valid, bodies built in code are not checked by hcl-edit
        if !util::is_identifier(name) {
            return Err(Error::InvalidIdentifier {
                path: file.path().to_owned(),
                name: name.to_owned(),
            });
        }

        if bindings.contains_key(name) {
            return Err(Error::DuplicateBinding {
                path: file.path().to_owned(),
                namespace,
                name: name.to_owned(),
            });
        }

        tracing::trace!(%namespace, name, "add binding");
        bindings.insert(
            name.to_owned(),
            Binding::new(namespace, name, attribute.value.clone().into()),
        );
    }

    Ok(bindings)
}
