//! Dependency graph of all bindings of an include chain
//!
//! Every binding is a vertex. An edge `source -> target` means that the expression of `target` reads the value of
//! `source`, so `source` has to be evaluated first. Bindings without references hang off the [Vertex::Root].
//!
//! Files are added child first. A global that is referenced before any file defined it gets a provisional vertex
//! (a [Binding] without expression); the first file that defines the global fills in that same vertex.
//!
//! Example, child and parent:
//!
//! ```hcl
//! # child.hcl
//! include { path = "parent.hcl" }
//! locals  { name = "app" }
//! globals { bucket = "${local.name}-${global.region}" }
//!
//! # parent.hcl
//! globals { region = "eu-west-1" }
//! ```
//!
//! ```text
//! Root -> include#0
//! Root -> include#1
//! Root -> local.name -> global.bucket
//! Root -> global.region -> global.bucket
//! ```
use crate::catalog::{Binding, Bindings, Catalog, Namespace};
use crate::error::{Error, Result};
use crate::include::{FileId, IncludeChain, INCLUDE_ROOT};
use crate::visit::{references, Reference};
use indexmap::IndexMap;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub enum Vertex {
    /// Anchor of the traversal, has no value
    Root,
    /// A local or global, owned by the file that defines it
    Binding {
        binding: Binding,
        file: Option<FileId>,
    },
    /// Readiness of the `include` values of a file
    IncludeSentinel(FileId),
}

impl std::fmt::Display for Vertex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Vertex::Root => f.write_str("root"),
            Vertex::Binding {
                binding,
                file: Some(file),
            } if binding.namespace == Namespace::Local => write!(f, "{}{}", binding.address(), file),
            Vertex::Binding { binding, .. } if binding.is_provisional() => {
                write!(f, "{} (undefined)", binding.address())
            }
            Vertex::Binding { binding, .. } => f.write_str(&binding.address()),
            Vertex::IncludeSentinel(file) => write!(f, "include{file}"),
        }
    }
}

/// Vertices that belong to a single file
#[derive(Debug)]
struct FileScope {
    path: PathBuf,
    include: NodeIndex,
    locals: IndexMap<String, NodeIndex>,
}

#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<Vertex, ()>,
    root: NodeIndex,
    files: IndexMap<FileId, FileScope>,
    globals: IndexMap<String, NodeIndex>,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(Vertex::Root);
        Self {
            graph,
            root,
            files: Default::default(),
            globals: Default::default(),
        }
    }

    /// Adds the bindings of every file of `chain` and validates the result
    ///
    /// Nothing is evaluated, this is the graph the evaluator would walk.
    pub fn for_chain(chain: &IncludeChain) -> Result<Self> {
        let mut graph = Self::new();
        for (id, file) in chain.files() {
            let catalog = crate::catalog::extract(file)?;
            graph.add_file(id, file.path(), &catalog)?;
        }
        graph.validate_acyclic()?;
        graph.validate_complete()?;
        Ok(graph)
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn vertex(&self, index: NodeIndex) -> &Vertex {
        &self.graph[index]
    }

    pub(crate) fn vertex_mut(&mut self, index: NodeIndex) -> &mut Vertex {
        &mut self.graph[index]
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Vertices that read the value of `index`
    pub fn dependents(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(index, Direction::Outgoing)
    }

    /// Vertices whose value `index` reads
    pub fn dependencies(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(index, Direction::Incoming)
    }

    /// Vertex of a global, provisional or not
    pub fn global(&self, name: &str) -> Option<NodeIndex> {
        self.globals.get(name).copied()
    }

    pub fn local(&self, file: FileId, name: &str) -> Option<NodeIndex> {
        self.files
            .get(&file)
            .and_then(|scope| scope.locals.get(name))
            .copied()
    }

    pub fn include_sentinel(&self, file: FileId) -> Option<NodeIndex> {
        self.files.get(&file).map(|scope| scope.include)
    }

    pub fn file_path(&self, file: FileId) -> Option<&Path> {
        self.files.get(&file).map(|scope| scope.path.as_path())
    }

    /// Adds vertices and edges for the bindings of one file
    ///
    /// Files have to be added child first so references to globals of parent files become provisional vertices.
    #[tracing::instrument(level = "debug", skip(self, path, catalog), fields(path = %path.display()))]
    pub fn add_file(&mut self, file: FileId, path: &Path, catalog: &Catalog) -> Result<()> {
        let include = self.graph.add_node(Vertex::IncludeSentinel(file));
        self.connect(self.root, include);
        self.files.insert(
            file,
            FileScope {
                path: path.to_owned(),
                include,
                locals: Default::default(),
            },
        );

        let mut added = vec![];
        for namespace in [Namespace::Local, Namespace::Global] {
            if let Some(bindings) = catalog.get(namespace) {
                added.extend(self.add_vertices(file, bindings)?);
            }
        }

        for vertex in added {
            self.add_edges(file, vertex)?;
        }

        Ok(())
    }

    /// Registers the vertices of one namespace, returns the vertices that received an expression
    fn add_vertices(&mut self, file: FileId, bindings: &Bindings) -> Result<Vec<NodeIndex>> {
        let mut added = Vec::with_capacity(bindings.len());

        for (name, binding) in bindings {
            let index = match binding.namespace {
                Namespace::Local => {
                    let index = self.graph.add_node(Vertex::Binding {
                        binding: binding.clone(),
                        file: Some(file),
                    });
                    self.scope_mut(file).locals.insert(name.clone(), index);
                    index
                }
                Namespace::Global => self.define_global(file, binding)?,
            };

            tracing::trace!(vertex = %self.graph[index], "add vertex");
            added.push(index);
        }

        Ok(added)
    }

    fn define_global(&mut self, file: FileId, binding: &Binding) -> Result<NodeIndex> {
        let Some(&index) = self.globals.get(&binding.name) else {
            let index = self.graph.add_node(Vertex::Binding {
                binding: binding.clone(),
                file: Some(file),
            });
            self.globals.insert(binding.name.clone(), index);
            return Ok(index);
        };

        let first = match &self.graph[index] {
            Vertex::Binding {
                binding: existing,
                file: Some(owner),
            } if !existing.is_provisional() => self.files.get(owner).map(|scope| scope.path.clone()),
            _ => None,
        };

        if let Some(first) = first {
            return Err(Error::DuplicateGlobalDefinition {
                name: binding.name.clone(),
                first,
                second: self.scope(file).path.clone(),
            });
        }

        // referenced by a child, defined here
        tracing::debug!(name = %binding.name, "provisional global defined");
        if let Vertex::Binding {
            binding: existing,
            file: owner,
        } = &mut self.graph[index]
        {
            existing.expression = binding.expression.clone();
            *owner = Some(file);
        }

        Ok(index)
    }

    fn add_edges(&mut self, file: FileId, target: NodeIndex) -> Result<()> {
        let (expression, referenced_by) = match &self.graph[target] {
            Vertex::Binding { binding, .. } => match &binding.expression {
                Some(expression) => (expression.clone(), binding.address()),
                None => return Ok(()),
            },
            _ => return Ok(()),
        };

        let references = references(&expression);
        if references.is_empty() {
            self.connect(self.root, target);
            return Ok(());
        }

        for reference in references {
            let source = self.reference_source(file, &reference, &referenced_by)?;
            tracing::trace!(%reference, target = %self.graph[target], "add edge");
            self.connect(source, target);
        }

        Ok(())
    }

    fn reference_source(
        &mut self,
        file: FileId,
        reference: &Reference,
        referenced_by: &str,
    ) -> Result<NodeIndex> {
        let path = self.scope(file).path.clone();
        let name = referenced_name(&path, reference, referenced_by)?;
        let root = reference.root.as_str();

        if root == INCLUDE_ROOT {
            return Ok(self.scope(file).include);
        }

        if root == Namespace::Local.root() {
            return self
                .scope(file)
                .locals
                .get(name)
                .copied()
                .ok_or_else(|| Error::UndefinedLocalReference {
                    path,
                    name: name.to_owned(),
                    referenced_by: referenced_by.to_owned(),
                });
        }

        if let Some(&index) = self.globals.get(name) {
            return Ok(index);
        }

        // could come from a parent file, add an empty vertex for now
        tracing::debug!(%name, "provisional global");
        let index = self.graph.add_node(Vertex::Binding {
            binding: Binding::provisional(name),
            file: None,
        });
        self.globals.insert(name.to_owned(), index);
        Ok(index)
    }

    fn connect(&mut self, source: NodeIndex, target: NodeIndex) {
        self.graph.update_edge(source, target, ());
    }

    fn scope(&self, file: FileId) -> &FileScope {
        &self.files[&file]
    }

    fn scope_mut(&mut self, file: FileId) -> &mut FileScope {
        &mut self.files[&file]
    }

    /// Rejects dependency cycles, naming every binding that is part of one
    pub fn validate_acyclic(&self) -> Result<()> {
        let mut bindings = vec![];

        for component in petgraph::algo::tarjan_scc(&self.graph) {
            let is_cycle = component.len() > 1
                || component
                    .first()
                    .is_some_and(|&index| self.graph.contains_edge(index, index));

            if is_cycle {
                let mut names: Vec<String> = component
                    .iter()
                    .map(|&index| self.graph[index].to_string())
                    .collect();
                names.sort();
                bindings.extend(names);
            }
        }

        if bindings.is_empty() {
            Ok(())
        } else {
            Err(Error::CyclicReference { bindings })
        }
    }

    /// Rejects globals that were referenced but never defined
    ///
    /// Only meaningful once the root file of the chain was added.
    pub fn validate_complete(&self) -> Result<()> {
        for (name, &index) in &self.globals {
            if let Vertex::Binding { binding, .. } = &self.graph[index] {
                if binding.is_provisional() {
                    return Err(Error::UnresolvedGlobalReference { name: name.clone() });
                }
            }
        }
        Ok(())
    }

    /// Removes edges that are implied by a longer path
    ///
    /// Reachability between any two vertices stays the same. The graph must be acyclic.
    pub fn transitive_reduction(&mut self) {
        let edges: Vec<(NodeIndex, NodeIndex)> = self
            .graph
            .edge_references()
            .map(|edge| (edge.source(), edge.target()))
            .collect();

        let mut removed = 0;
        for (source, target) in edges {
            let redundant = self
                .graph
                .neighbors_directed(source, Direction::Outgoing)
                .filter(|&next| next != target)
                .any(|next| petgraph::algo::has_path_connecting(&self.graph, next, target, None));

            if redundant {
                if let Some(edge) = self.graph.find_edge(source, target) {
                    self.graph.remove_edge(edge);
                    removed += 1;
                }
            }
        }

        tracing::debug!(removed, remaining = self.graph.edge_count(), "transitive reduction");
    }

    /// Graphviz rendering for debugging
    pub fn to_dot(&self) -> String {
        let labeled = self.graph.map(|_, vertex| vertex.to_string(), |_, _| "");
        Dot::with_config(&labeled, &[Config::EdgeNoLabel]).to_string()
    }
}

/// The attribute `reference` reads from `local`, `global` or `include`
///
/// Any other variable, or one of these three without an attribute, is rejected.
pub(crate) fn referenced_name<'a>(
    path: &Path,
    reference: &'a Reference,
    referenced_by: &str,
) -> Result<&'a str> {
    let root = reference.root.as_str();
    let known_root = root == Namespace::Local.root()
        || root == Namespace::Global.root()
        || root == INCLUDE_ROOT;

    if !known_root {
        return Err(Error::UnsupportedRootReference {
            path: path.to_owned(),
            root: reference.root.clone(),
            referenced_by: referenced_by.to_owned(),
        });
    }

    reference
        .name
        .as_deref()
        .ok_or_else(|| Error::IncompleteReference {
            path: path.to_owned(),
            root: reference.root.clone(),
            referenced_by: referenced_by.to_owned(),
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::test::source_file;
    use pretty_assertions::assert_eq;

    fn graph_of(files: &[&str]) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph::new();
        for (index, contents) in files.iter().enumerate() {
            let file = source_file(contents);
            let catalog = crate::catalog::extract(&file)?;
            graph.add_file(FileId(index), Path::new(&format!("/{index}.hcl")), &catalog)?;
        }
        Ok(graph)
    }

    fn dependencies_of(graph: &DependencyGraph, index: NodeIndex) -> Vec<String> {
        let mut names: Vec<String> = graph
            .dependencies(index)
            .map(|index| graph.vertex(index).to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn literals_hang_off_the_root() {
        let graph = graph_of(&["globals {\n a = 1\n}"]).expect("valid graph");
        let a = graph.global("a").expect("global a");
        assert_eq!(dependencies_of(&graph, a), vec!["root"]);
    }

    #[test]
    fn references_become_edges() {
        let graph = graph_of(&[r#"
            locals {
              name = "app"
            }
            globals {
              region = "eu-west-1"
              bucket = "${local.name}-${global.region}-${include.level}"
            }
            "#])
        .expect("valid graph");

        let bucket = graph.global("bucket").expect("global bucket");
        assert_eq!(
            dependencies_of(&graph, bucket),
            vec!["global.region", "include#0", "local.name#0"]
        );
    }

    #[test]
    fn every_file_gets_a_sentinel() {
        let graph = graph_of(&["locals {\n a = 1\n}", "locals {\n a = 2\n}"]).expect("valid graph");

        // root, two sentinels, two locals
        assert_eq!(graph.vertex_count(), 5);
        for file in [FileId(0), FileId(1)] {
            let sentinel = graph.include_sentinel(file).expect("sentinel");
            assert_eq!(dependencies_of(&graph, sentinel), vec!["root"]);
        }
        assert_ne!(graph.local(FileId(0), "a"), graph.local(FileId(1), "a"));
        assert!(graph.local(FileId(2), "a").is_none());
    }

    #[test]
    fn unknown_globals_are_provisional() {
        let graph = graph_of(&["globals {\n a = global.b\n}"]).expect("valid graph");
        let b = graph.global("b").expect("provisional b");
        assert!(matches!(
            graph.vertex(b),
            Vertex::Binding { binding, file: None } if binding.is_provisional()
        ));
        assert!(matches!(
            graph.validate_complete(),
            Err(Error::UnresolvedGlobalReference { name }) if name == "b"
        ));
    }

    #[test]
    fn parent_fills_in_provisional_global() {
        let graph = graph_of(&["globals {\n a = global.b\n}", "globals {\n b = 1\n}"])
            .expect("valid graph");

        let b = graph.global("b").expect("global b");
        let Vertex::Binding { binding, file } = graph.vertex(b) else {
            panic!("b must be a binding");
        };
        assert!(!binding.is_provisional());
        assert_eq!(*file, Some(FileId(1)));
        assert_eq!(dependencies_of(&graph, b), vec!["root"]);
        assert!(graph.validate_complete().is_ok());
    }

    #[test]
    fn second_definition_errors() {
        let err = graph_of(&["globals {\n a = 1\n}", "globals {\n a = 2\n}"])
            .expect_err("must error");
        let Error::DuplicateGlobalDefinition { name, first, second } = err else {
            panic!("expected a duplicate definition");
        };
        assert_eq!(name, "a");
        assert_eq!(first, PathBuf::from("/0.hcl"));
        assert_eq!(second, PathBuf::from("/1.hcl"));
    }

    #[test]
    fn locals_are_scoped_to_their_file() {
        let err = graph_of(&["locals {\n a = 1\n}", "globals {\n b = local.a\n}"])
            .expect_err("must error");
        assert!(matches!(
            err,
            Error::UndefinedLocalReference { name, .. } if name == "a"
        ));
    }

    #[test]
    fn unknown_roots_error() {
        let err = graph_of(&["locals {\n a = var.b\n}"]).expect_err("must error");
        assert!(matches!(
            err,
            Error::UnsupportedRootReference { root, .. } if root == "var"
        ));
    }

    #[test]
    fn bare_namespace_errors() {
        let err = graph_of(&["locals {\n a = global\n}"]).expect_err("must error");
        assert!(matches!(err, Error::IncompleteReference { .. }));
    }

    #[test]
    fn cycles_are_named() {
        let graph = graph_of(&["globals {\n a = global.b\n b = global.a\n c = 1\n}"])
            .expect("cycles are only detected on validation");
        let err = graph.validate_acyclic().expect_err("must error");
        let Error::CyclicReference { bindings } = err else {
            panic!("expected a cycle");
        };
        assert_eq!(bindings, vec!["global.a", "global.b"]);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let graph = graph_of(&["locals {\n a = local.a\n}"]).expect("valid graph");
        assert!(matches!(
            graph.validate_acyclic(),
            Err(Error::CyclicReference { bindings }) if bindings == vec!["local.a#0"]
        ));
    }

    #[test]
    fn cycles_across_files() {
        let graph = graph_of(&["globals {\n a = global.b\n}", "globals {\n b = global.a\n}"])
            .expect("valid graph");
        assert!(graph.validate_acyclic().is_err());
    }

    #[test]
    fn transitive_reduction_keeps_reachability() {
        let mut graph = graph_of(&[r#"
            globals {
              x = 1
              y = global.x
              z = global.x + global.y
            }
            "#])
        .expect("valid graph");

        let x = graph.global("x").expect("x");
        let z = graph.global("z").expect("z");
        let before = graph.edge_count();
        assert!(graph.graph.contains_edge(x, z));

        graph.transitive_reduction();

        assert_eq!(graph.edge_count(), before - 1);
        assert!(!graph.graph.contains_edge(x, z));
        assert!(petgraph::algo::has_path_connecting(&graph.graph, x, z, None));
        assert_eq!(dependencies_of(&graph, z), vec!["global.y"]);
    }

    #[test]
    fn dot_output_names_vertices() {
        let graph = graph_of(&["globals {\n a = 1\n}"]).expect("valid graph");
        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("global.a"));
    }
}
