use super::TraversalVisitor;
use hcl::{
    template::{Directive, Element},
    Expression, Identifier, ObjectKey, Operation, Template, Traversal, TraversalOperator,
};

/// Recursively visit all [hcl::Traversal]s
pub trait VisitTraversals {
    fn visit_traversals(&self, visitor: &mut dyn TraversalVisitor);
}

impl VisitTraversals for Expression {
    fn visit_traversals(&self, visitor: &mut dyn TraversalVisitor) {
        match self {
            Expression::Variable(variable) => {
                // a standalone variable is a traversal with no operators...kind of
                let traversal = Traversal::new(
                    Expression::Variable(variable.clone()),
                    Vec::<TraversalOperator>::new(),
                );
                visitor.visit(&traversal);
            }
            Expression::Traversal(traversal) => {
                visitor.visit(traversal);
                if !matches!(traversal.expr, Expression::Variable(_)) {
                    traversal.expr.visit_traversals(visitor);
                }
                for operator in &traversal.operators {
                    if let TraversalOperator::Index(index) = operator {
                        index.visit_traversals(visitor);
                    }
                }
            }
            Expression::Array(array) => {
                for expr in array {
                    expr.visit_traversals(visitor);
                }
            }
            Expression::Object(object) => {
                for (key, value) in object {
                    if let ObjectKey::Expression(key) = key {
                        key.visit_traversals(visitor);
                    }
                    value.visit_traversals(visitor);
                }
            }
            Expression::TemplateExpr(template_expr) => match Template::from_expr(template_expr) {
                Ok(template) => template.visit_traversals(visitor),
                Err(err) => {
                    // evaluation reports the same error with more context
                    tracing::debug!(%err, "template does not parse, skipping")
                }
            },
            Expression::FuncCall(func_call) => {
                for arg in &func_call.args {
                    arg.visit_traversals(visitor);
                }
            }
            Expression::Parenthesis(expr) => {
                expr.visit_traversals(visitor);
            }
            Expression::Conditional(cond) => {
                cond.cond_expr.visit_traversals(visitor);
                cond.true_expr.visit_traversals(visitor);
                cond.false_expr.visit_traversals(visitor);
            }
            Expression::Operation(operation) => match operation.as_ref() {
                Operation::Binary(binop) => {
                    binop.lhs_expr.visit_traversals(visitor);
                    binop.rhs_expr.visit_traversals(visitor);
                }
                Operation::Unary(unop) => {
                    unop.expr.visit_traversals(visitor);
                }
            },
            Expression::ForExpr(forexpr) => {
                // the collection is evaluated outside of the loop scope
                forexpr.collection_expr.visit_traversals(visitor);

                visitor.enter_scope(&bound_names(
                    forexpr.key_var.as_ref(),
                    &forexpr.value_var,
                ));
                forexpr
                    .key_expr
                    .iter()
                    .for_each(|e| e.visit_traversals(visitor));
                forexpr.value_expr.visit_traversals(visitor);
                forexpr
                    .cond_expr
                    .iter()
                    .for_each(|e| e.visit_traversals(visitor));
                visitor.exit_scope();
            }
            _ => {}
        }
    }
}

impl VisitTraversals for Template {
    fn visit_traversals(&self, visitor: &mut dyn TraversalVisitor) {
        for element in self.elements() {
            match element {
                Element::Interpolation(interpolation) => {
                    interpolation.expr.visit_traversals(visitor);
                }
                Element::Directive(directive) => match directive {
                    Directive::If(ifdir) => {
                        ifdir.cond_expr.visit_traversals(visitor);
                        ifdir.true_template.visit_traversals(visitor);
                        ifdir
                            .false_template
                            .iter()
                            .for_each(|t| t.visit_traversals(visitor));
                    }
                    Directive::For(fordir) => {
                        fordir.collection_expr.visit_traversals(visitor);

                        visitor.enter_scope(&bound_names(
                            fordir.key_var.as_ref(),
                            &fordir.value_var,
                        ));
                        fordir.template.visit_traversals(visitor);
                        visitor.exit_scope();
                    }
                },
                Element::Literal(_) => {}
            }
        }
    }
}

fn bound_names(key_var: Option<&Identifier>, value_var: &Identifier) -> Vec<Identifier> {
    key_var
        .into_iter()
        .chain(std::iter::once(value_var))
        .cloned()
        .collect()
}
