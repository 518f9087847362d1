//! Evaluation of a [DependencyGraph] in dependency order
//!
//! The graph is walked breadth first from its root. A vertex is only visited once every vertex it depends on was
//! visited and evaluated in the same walk, so each expression sees the values it reads.
//!
//! Evaluation happens in two phases:
//!
//! 1. [Phase::LocalsOnly] after each file was added: evaluates locals (and what they depend on) but stops at
//!    globals, because a parent file may still define a global that is referenced here.
//! 2. [Phase::All] once the root file was added: evaluates everything that is left.
//!
//! A binding is evaluated once. Walking the graph again skips it without touching its expression.
use crate::catalog::Namespace;
use crate::error::{Diagnostics, Result};
use crate::graph::{DependencyGraph, Vertex};
use crate::scope::{self, Scopes};
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Defer every global
    LocalsOnly,
    /// Evaluate locals and globals
    All,
}

/// Outcome of visiting a single vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    /// Dependents may be visited
    Continue,
    /// Dependents have to wait
    Stop,
}

/// Walks `graph` and evaluates every binding `phase` allows
///
/// Failing expressions do not stop the walk, only their dependents are skipped. All failures are reported together
/// once the walk is done.
#[tracing::instrument(level = "debug", skip(graph, scopes))]
pub fn evaluate(graph: &mut DependencyGraph, scopes: &mut Scopes, phase: Phase) -> Result<()> {
    let mut diagnostics = Diagnostics::default();
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut ready: HashMap<NodeIndex, usize> = HashMap::new();
    let mut queue = VecDeque::from([graph.root()]);

    while let Some(index) = queue.pop_front() {
        if !visited.insert(index) {
            continue;
        }

        if evaluate_vertex(graph, scopes, index, phase, &mut diagnostics)? == Flow::Stop {
            continue;
        }

        let dependents: Vec<NodeIndex> = graph.dependents(index).collect();
        for dependent in dependents {
            let satisfied = ready.entry(dependent).or_default();
            *satisfied += 1;
            if *satisfied == graph.dependencies(dependent).count() {
                queue.push_back(dependent);
            }
        }
    }

    tracing::debug!(?phase, visited = visited.len(), "walk done");
    diagnostics.into_result()
}

pub(crate) fn evaluate_vertex(
    graph: &mut DependencyGraph,
    scopes: &mut Scopes,
    index: NodeIndex,
    phase: Phase,
    diagnostics: &mut Diagnostics,
) -> Result<Flow> {
    let (binding, file) = match graph.vertex(index) {
        Vertex::Root | Vertex::IncludeSentinel(_) => return Ok(Flow::Continue),
        Vertex::Binding { binding, file } => (binding, *file),
    };

    if phase == Phase::LocalsOnly && binding.namespace == Namespace::Global {
        return Ok(Flow::Stop);
    }

    if binding.evaluated {
        return Ok(Flow::Continue);
    }

    let (Some(expression), Some(file)) = (&binding.expression, file) else {
        // provisional globals are rejected before the last walk
        tracing::debug!(vertex = %graph.vertex(index), "no expression, stopping");
        return Ok(Flow::Stop);
    };

    let path: PathBuf = graph
        .file_path(file)
        .map(ToOwned::to_owned)
        .unwrap_or_default();
    let context = scopes.context(file);

    // a panic inside hcl-rs ends the whole run, no known expression triggers one
    let value = match scope::evaluate_guarded(expression, &context, &path)? {
        Ok(value) => value,
        Err(error) => {
            diagnostics.push(path, binding.address(), error);
            return Ok(Flow::Stop);
        }
    };

    tracing::trace!(binding = %binding.address(), ?value, "evaluated");
    scopes.store(binding.namespace, file, &binding.name, value.clone());

    if let Vertex::Binding { binding, .. } = graph.vertex_mut(index) {
        binding.value = Some(value);
        binding.evaluated = true;
    }

    Ok(Flow::Continue)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::catalog;
    use crate::error::Error;
    use crate::include::{FileId, IncludeChain};
    use crate::source::test::source_file;
    use pretty_assertions::assert_eq;

    /// Graph and scopes of a single file chain
    fn prepare(contents: &str) -> (DependencyGraph, Scopes) {
        let file = source_file(contents);
        let catalog = catalog::extract(&file).expect("valid bindings");
        let chain = IncludeChain::standalone(file).expect("standalone file");
        let mut graph = DependencyGraph::new();
        graph
            .add_file(FileId(0), chain.file(FileId(0)).expect("entry file").path(), &catalog)
            .expect("valid graph");
        graph.validate_acyclic().expect("acyclic");
        (graph, Scopes::new(&chain))
    }

    #[test]
    fn locals_only_defers_globals() {
        let (mut graph, mut scopes) = prepare(
            r#"
            locals {
              a = "a"
              b = "${local.a}/b"
              c = "${global.x}/c"
            }
            globals {
              x = "x"
            }
            "#,
        );

        evaluate(&mut graph, &mut scopes, Phase::LocalsOnly).expect("evaluates");
        assert_eq!(scopes.locals(FileId(0)).len(), 2);
        assert_eq!(scopes.locals(FileId(0))["b"], hcl::Value::from("a/b"));
        assert!(scopes.globals().is_empty());

        evaluate(&mut graph, &mut scopes, Phase::All).expect("evaluates");
        assert_eq!(scopes.locals(FileId(0))["c"], hcl::Value::from("x/c"));
        assert_eq!(scopes.globals()["x"], hcl::Value::from("x"));
    }

    #[test]
    fn waits_for_every_dependency() {
        // `d` is reachable through `a` long before `c` was evaluated
        let (mut graph, mut scopes) = prepare(
            r#"
            globals {
              a = "a"
              b = "b"
              c = "${global.b}c"
              e = "${global.c}e"
              d = "${global.a}${global.e}d"
            }
            "#,
        );

        evaluate(&mut graph, &mut scopes, Phase::All).expect("evaluates");
        assert_eq!(scopes.globals()["d"], hcl::Value::from("abced"));
    }

    #[test]
    fn failures_only_stop_their_branch() {
        let (mut graph, mut scopes) = prepare(
            r#"
            globals {
              broken = 1 + "one"
              dependent = global.broken
              fine = "fine"
            }
            "#,
        );

        let err = evaluate(&mut graph, &mut scopes, Phase::All).expect_err("must error");
        let Error::Evaluation(diagnostics) = err else {
            panic!("expected diagnostics");
        };
        let failed: Vec<_> = diagnostics.iter().map(|d| d.binding.as_str()).collect();
        assert_eq!(failed, vec!["global.broken"]);
        assert_eq!(scopes.globals()["fine"], hcl::Value::from("fine"));
        assert!(!scopes.globals().contains_key("dependent"));
    }

    #[test]
    fn evaluated_bindings_are_not_evaluated_again() {
        let (mut graph, mut scopes) = prepare("globals {\n a = \"first\"\n}");
        evaluate(&mut graph, &mut scopes, Phase::All).expect("evaluates");

        let a = graph.global("a").expect("global a");
        if let Vertex::Binding { binding, .. } = graph.vertex_mut(a) {
            let replaced: hcl_edit::expr::Expression = "1 + \"not a number\"".parse().expect("parses");
            binding.expression = Some(replaced.into());
        }

        evaluate(&mut graph, &mut scopes, Phase::All).expect("nothing to evaluate");
        assert_eq!(scopes.globals()["a"], hcl::Value::from("first"));

        let Vertex::Binding { binding, .. } = graph.vertex(a) else {
            panic!("a must be a binding");
        };
        assert!(binding.evaluated);
        assert_eq!(binding.value, Some(hcl::Value::from("first")));
    }

    #[test]
    fn include_values_are_available() {
        let (mut graph, mut scopes) = prepare("locals {\n file = include.file\n level = include.level\n}");
        evaluate(&mut graph, &mut scopes, Phase::LocalsOnly).expect("evaluates");
        assert_eq!(scopes.locals(FileId(0))["file"], hcl::Value::from("test.hcl"));
        assert_eq!(scopes.locals(FileId(0))["level"], hcl::Value::from(0u64));
    }
}
