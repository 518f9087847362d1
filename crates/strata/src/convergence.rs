//! Evaluation of a standalone `globals` block without a dependency graph
//!
//! Globals are evaluated in sweeps. Each sweep evaluates every pending global whose `global.*` references already
//! have a value, using only the values of the previous sweeps. Sweeps repeat until nothing is pending or a sweep made
//! no progress, which happens for cycles and for references to globals that do not exist.
//!
//! References are checked up front the same way the dependency graph checks them, so a bare `global` or a `var.*`
//! fails before anything is evaluated.
//!
//! For a file without `include` and without locals this produces the same values as [crate::evaluator].
use crate::catalog::{self, Bindings, Namespace};
use crate::error::{Diagnostics, Error, Result};
use crate::graph;
use crate::scope::{self, Values};
use crate::source::SourceFile;
use crate::visit::references;
use std::path::Path;

/// Upper bound for the number of sweeps
///
/// A chain of `n` references needs `n` sweeps, so this is only reached for absurdly long chains.
pub const DEFAULT_MAX_SWEEPS: usize = 1000;

/// Evaluates the `globals` block of `file`
///
/// A file without `globals` block evaluates to no globals.
pub fn evaluate_globals_block(file: &SourceFile, max_sweeps: usize) -> Result<Values> {
    let catalog = catalog::extract(file)?;
    match catalog.globals {
        Some(globals) => converge(file.path(), &globals, max_sweeps),
        None => Ok(Values::new()),
    }
}

/// Sweeps over `globals` until all of them are evaluated
#[tracing::instrument(level = "debug", skip(globals))]
pub fn converge(path: &Path, globals: &Bindings, max_sweeps: usize) -> Result<Values> {
    let mut pending: Vec<Pending> = Vec::with_capacity(globals.len());
    for binding in globals.values() {
        let Some(expression) = &binding.expression else {
            continue;
        };

        let mut reads = vec![];
        for reference in references(expression) {
            let name = graph::referenced_name(path, &reference, &binding.address())?;
            if reference.root == Namespace::Global.root() {
                reads.push(name.to_owned());
            }
        }

        pending.push(Pending {
            name: binding.name.as_str(),
            expression,
            reads,
        });
    }

    let mut evaluated = Values::new();

    for sweep in 1..=max_sweeps {
        if pending.is_empty() {
            return Ok(evaluated);
        }

        let context = scope::context(None, &evaluated, None);
        let (ready, waiting): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|global| global.reads.iter().all(|name| evaluated.contains_key(name)));
        pending = waiting;

        if ready.is_empty() {
            let remaining = pending.iter().map(|global| global.name.to_owned()).collect();
            return Err(Error::CouldNotEvaluateAllGlobals {
                path: path.to_owned(),
                remaining,
            });
        }

        let mut diagnostics = Diagnostics::default();
        let mut next = evaluated.clone();
        for global in &ready {
            // same as the graph walk, a panic ends the run
            match scope::evaluate_guarded(global.expression, &context, path)? {
                Ok(value) => {
                    next.insert(global.name.to_owned(), value);
                }
                Err(error) => diagnostics.push(
                    path.to_owned(),
                    format!("{}.{}", Namespace::Global, global.name),
                    error,
                ),
            }
        }
        diagnostics.into_result()?;

        tracing::debug!(
            sweep,
            evaluated = ready.len(),
            pending = pending.len(),
            "sweep done"
        );
        evaluated = next;
    }

    if pending.is_empty() {
        return Ok(evaluated);
    }

    Err(Error::MaxIterationsExceeded {
        path: path.to_owned(),
        max_sweeps,
    })
}

struct Pending<'a> {
    name: &'a str,
    expression: &'a hcl::Expression,
    reads: Vec<String>,
}
