//! error types for loading and evaluating a chain
use crate::catalog::Namespace;
use std::fmt;
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unable to read {}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse hcl file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: hcl_edit::parser::Error,
    },

    #[error("{}: only one `{block}` block is allowed per file", .path.display())]
    DuplicateBlock { path: PathBuf, block: &'static str },

    #[error("{}: `{name}` is not a valid identifier", .path.display())]
    InvalidIdentifier { path: PathBuf, name: String },

    #[error("{}: `{namespace}.{name}` is declared more than once", .path.display())]
    DuplicateBinding {
        path: PathBuf,
        namespace: Namespace,
        name: String,
    },

    #[error("{}: blocks are not allowed inside `{block}` (found `{name}`)", .path.display())]
    NestedBlock {
        path: PathBuf,
        block: &'static str,
        name: String,
    },

    #[error("{}: `{referenced_by}` references undefined `local.{name}`", .path.display())]
    UndefinedLocalReference {
        path: PathBuf,
        name: String,
        referenced_by: String,
    },

    #[error("{}: `{referenced_by}` references unsupported variable `{root}`", .path.display())]
    UnsupportedRootReference {
        path: PathBuf,
        root: String,
        referenced_by: String,
    },

    #[error("{}: `{referenced_by}` must reference an attribute of `{root}`, not `{root}` itself", .path.display())]
    IncompleteReference {
        path: PathBuf,
        root: String,
        referenced_by: String,
    },

    #[error("cyclic reference between {}", .bindings.join(", "))]
    CyclicReference { bindings: Vec<String> },

    #[error("`global.{name}` is referenced but never defined in the include chain")]
    UnresolvedGlobalReference { name: String },

    #[error("`global.{name}` is defined in both {} and {}", .first.display(), .second.display())]
    DuplicateGlobalDefinition {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("{}: could not evaluate all globals, remaining: {}", .path.display(), .remaining.join(", "))]
    CouldNotEvaluateAllGlobals {
        path: PathBuf,
        remaining: Vec<String>,
    },

    #[error("{}: globals did not converge within {max_sweeps} sweeps", .path.display())]
    MaxIterationsExceeded { path: PathBuf, max_sweeps: usize },

    #[error("{}: evaluation aborted unexpectedly: {payload}", .path.display())]
    PanicRecovered { path: PathBuf, payload: String },

    #[error("{}: the `include` block has no `path`", .path.display())]
    IncludedConfigMissingPath { path: PathBuf },

    #[error("{}: invalid include path: {reason}", .path.display())]
    InvalidIncludePath { path: PathBuf, reason: String },

    #[error("include cycle: {chain}")]
    IncludeCycle { chain: PathList },

    #[error(transparent)]
    Evaluation(#[from] Diagnostics),
}

/// Files in resolution order, displayed as `a -> b -> a`
#[derive(Debug, Clone, PartialEq)]
pub struct PathList(pub Vec<PathBuf>);

impl fmt::Display for PathList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, path) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", path.display())?;
        }
        Ok(())
    }
}

/// Expression errors collected during one evaluation pass
///
/// The error reported by [hcl::eval] is kept as it is.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

#[derive(Debug)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub binding: String,
    pub error: hcl::eval::Error,
}

impl Diagnostics {
    pub fn push(&mut self, path: PathBuf, binding: String, error: hcl::eval::Error) {
        tracing::debug!(path=%path.display(), %binding, "evaluation failed");
        self.entries.push(Diagnostic {
            path,
            binding,
            error,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Evaluation(self))
        }
    }
}

impl std::error::Error for Diagnostics {}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, diagnostic) in self.entries.iter().enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            write!(
                f,
                "{}: failed to evaluate `{}`: {}",
                diagnostic.path.display(),
                diagnostic.binding,
                diagnostic.error
            )?;
        }
        Ok(())
    }
}
