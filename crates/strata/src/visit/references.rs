use super::{TraversalVisitor, VisitTraversals};
use hcl::{Expression, Identifier, Traversal, TraversalOperator};

/// A free variable read by an expression
///
/// `global.region` becomes `root = "global", name = Some("region")`. A bare `global` has no name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub root: String,
    pub name: Option<String>,
}

impl Reference {
    fn from_traversal(traversal: &Traversal) -> Option<Self> {
        let Expression::Variable(var) = &traversal.expr else {
            return None;
        };

        let name = match traversal.operators.first() {
            Some(TraversalOperator::GetAttr(ident)) => Some(ident.as_str().to_owned()),
            Some(TraversalOperator::Index(Expression::String(key))) => Some(key.clone()),
            _ => None,
        };

        Some(Self {
            root: var.as_str().to_owned(),
            name,
        })
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}.{}", self.root, name),
            None => f.write_str(&self.root),
        }
    }
}

/// Free variables of `expr` in order of appearance, without duplicates
pub fn references(expr: &Expression) -> Vec<Reference> {
    let mut collector = ReferenceCollector::default();
    expr.visit_traversals(&mut collector);
    collector.references
}

#[derive(Default)]
struct ReferenceCollector {
    references: Vec<Reference>,
    scopes: Vec<Vec<Identifier>>,
}

impl ReferenceCollector {
    fn is_bound(&self, root: &str) -> bool {
        self.scopes
            .iter()
            .flatten()
            .any(|ident| ident.as_str() == root)
    }
}

impl TraversalVisitor for ReferenceCollector {
    fn visit(&mut self, traversal: &Traversal) {
        let Some(reference) = Reference::from_traversal(traversal) else {
            return;
        };

        if self.is_bound(&reference.root) {
            return;
        }

        if !self.references.contains(&reference) {
            tracing::trace!(%reference, "found reference");
            self.references.push(reference);
        }
    }

    fn enter_scope(&mut self, bound: &[Identifier]) {
        self.scopes.push(bound.to_vec());
    }

    fn exit_scope(&mut self) {
        self.scopes.pop();
    }
}
