//! visitor pattern helpers
mod references;
mod visit_traversals;
pub use references::{references, Reference};
pub use visit_traversals::VisitTraversals;

/// Visitor that sees every [hcl::Traversal] of an expression
///
/// Names bound by `for` expressions and template `for` directives are announced through
/// [TraversalVisitor::enter_scope] before their body is visited.
pub trait TraversalVisitor {
    fn visit(&mut self, traversal: &hcl::Traversal);

    fn enter_scope(&mut self, _bound: &[hcl::Identifier]) {}

    fn exit_scope(&mut self) {}
}

// blanket impl for FnMut
impl<F> TraversalVisitor for F
where
    F: FnMut(&hcl::Traversal),
{
    fn visit(&mut self, traversal: &hcl::Traversal) {
        self(traversal)
    }
}
