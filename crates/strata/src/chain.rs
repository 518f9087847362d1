//! One evaluation run over an include chain
//!
//! Files are added to the [DependencyGraph] child first. After every file the graph is checked for cycles and all
//! locals that can already be evaluated are evaluated. Globals wait until the root file was added, since any file up
//! the chain may define a global a child references.
use crate::catalog;
use crate::convergence::{self, DEFAULT_MAX_SWEEPS};
use crate::error::Result;
use crate::evaluator::{self, Phase};
use crate::graph::DependencyGraph;
use crate::include::IncludeChain;
use crate::scope::{Scopes, Values};
use crate::source::{SourceFile, SourceLoader};
use crate::variables::ChainVariables;
use std::path::Path;

#[derive(derive_new::new, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Drop edges implied by longer paths before globals are evaluated
    #[new(value = "true")]
    pub transitive_reduction: bool,

    /// Sweep ceiling of [crate::convergence]
    #[new(value = "DEFAULT_MAX_SWEEPS")]
    pub max_sweeps: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

impl Options {
    pub fn with_transitive_reduction(mut self, transitive_reduction: bool) -> Self {
        self.transitive_reduction = transitive_reduction;
        self
    }

    pub fn with_max_sweeps(mut self, max_sweeps: usize) -> Self {
        self.max_sweeps = max_sweeps;
        self
    }
}

/// Loads the chain starting at `entry` and evaluates it
pub fn resolve_variables(
    entry: &Path,
    loader: &dyn SourceLoader,
    options: &Options,
) -> Result<ChainVariables> {
    let chain = IncludeChain::resolve(entry, loader)?;
    evaluate_chain(&chain, options)
}

/// Evaluates every local and global of `chain`
#[tracing::instrument(level = "debug", skip(chain), fields(files = chain.len()))]
pub fn evaluate_chain(chain: &IncludeChain, options: &Options) -> Result<ChainVariables> {
    let mut graph = DependencyGraph::new();
    let mut scopes = Scopes::new(chain);

    for (id, file) in chain.files() {
        let catalog = catalog::extract(file)?;
        graph.add_file(id, file.path(), &catalog)?;
        graph.validate_acyclic()?;
        evaluator::evaluate(&mut graph, &mut scopes, Phase::LocalsOnly)?;
    }

    graph.validate_complete()?;
    if options.transitive_reduction {
        graph.transitive_reduction();
    }
    evaluator::evaluate(&mut graph, &mut scopes, Phase::All)?;

    tracing::info!(
        files = chain.len(),
        globals = scopes.globals().len(),
        "chain evaluated"
    );

    Ok(ChainVariables::new(chain, scopes))
}

/// Globals of a single file, evaluated in sweeps without following its `include`
pub fn evaluate_standalone_globals(file: &SourceFile, options: &Options) -> Result<Values> {
    convergence::evaluate_globals_block(file, options.max_sweeps)
}

/// The graph [evaluate_chain] would walk, without evaluating anything
pub fn dependency_graph(chain: &IncludeChain, options: &Options) -> Result<DependencyGraph> {
    let mut graph = DependencyGraph::for_chain(chain)?;
    if options.transitive_reduction {
        graph.transitive_reduction();
    }
    Ok(graph)
}
