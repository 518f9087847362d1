//! variables produced by an evaluation run
//!
//! Every file of the chain gets its own record: its own locals, the globals of the whole chain and its `include`
//! values. Decoding the rest of a file happens against [FileVariables::context].
//!
//! Serialized, a chain looks like this:
//!
//! ```yaml
//! /live/prod/app/strata.hcl:
//!   local:
//!     name: app
//!   global:
//!     region: eu-west-1
//!   include:
//!     file: /live/prod/app/strata.hcl
//!     ...
//! ```
use crate::catalog::Namespace;
use crate::error::{Diagnostics, Result};
use crate::include::IncludeChain;
use crate::scope::{self, Scopes, Values};
use hcl::eval::Context;
use serde::ser::{SerializeMap, Serializer};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ChainVariables {
    files: Vec<FileVariables>,
}

impl ChainVariables {
    pub(crate) fn new(chain: &IncludeChain, scopes: Scopes) -> Self {
        let (locals, includes, globals) = scopes.into_parts();

        let files = chain
            .files()
            .zip(locals.into_iter().zip(includes))
            .map(|((_, file), (local, include))| FileVariables {
                path: file.path().to_owned(),
                local,
                global: globals.clone(),
                include,
            })
            .collect();

        Self { files }
    }

    /// From child to root
    pub fn files(&self) -> &[FileVariables] {
        &self.files
    }

    /// The file the chain was resolved from
    pub fn entry(&self) -> Option<&FileVariables> {
        self.files.first()
    }

    pub fn file(&self, path: &Path) -> Option<&FileVariables> {
        self.files.iter().find(|file| file.path == path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileVariables {
    pub path: PathBuf,
    pub local: Values,
    pub global: Values,
    pub include: hcl::Value,
}

impl FileVariables {
    /// `{ local = {...}, global = {...} }`
    pub fn namespace(&self) -> hcl::Value {
        let mut namespace = hcl::value::Map::new();
        namespace.insert(
            Namespace::Local.root().to_owned(),
            hcl::Value::Object(self.local.clone()),
        );
        namespace.insert(
            Namespace::Global.root().to_owned(),
            hcl::Value::Object(self.global.clone()),
        );
        hcl::Value::Object(namespace)
    }

    /// Declares `local`, `global` and `include` for decoding the rest of the file
    pub fn context(&self) -> Context<'static> {
        scope::context(Some(&self.local), &self.global, Some(&self.include))
    }

    pub fn evaluate(&self, expression: &hcl::Expression) -> Result<hcl::Value> {
        match scope::evaluate_guarded(expression, &self.context(), &self.path)? {
            Ok(value) => Ok(value),
            Err(error) => {
                let mut diagnostics = Diagnostics::default();
                diagnostics.push(self.path.clone(), "expression".to_owned(), error);
                Err(diagnostics.into())
            }
        }
    }
}

impl serde::ser::Serialize for FileVariables {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut ser = serializer.serialize_map(Some(3))?;
        ser.serialize_entry(Namespace::Local.root(), &Object(&self.local))?;
        ser.serialize_entry(Namespace::Global.root(), &Object(&self.global))?;
        ser.serialize_entry("include", &self.include)?;
        ser.end()
    }
}

impl serde::ser::Serialize for ChainVariables {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut ser = serializer.serialize_map(Some(self.files.len()))?;
        for file in &self.files {
            ser.serialize_entry(&file.path.display().to_string(), file)?;
        }
        ser.end()
    }
}

/// Serializes a value map in insertion order
struct Object<'a>(&'a Values);

impl serde::ser::Serialize for Object<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut ser = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0 {
            ser.serialize_entry(key, value)?;
        }
        ser.end()
    }
}
