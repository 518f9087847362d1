//! # strata - layered variables for included hcl files
//!
//! `strata` evaluates the `locals` and `globals` of a chain of hcl files that include each other, so the rest of each
//! file can be decoded with those values at hand.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `strata` works internally.
//!
//! ### Example
//!
//! ```hcl
//! # live/prod/app/strata.hcl
//! include {
//!   path = "../../root.hcl"
//! }
//!
//! locals {
//!   name = "app"
//! }
//!
//! globals {
//!   bucket = "${local.name}-${global.region}"
//! }
//! ```
//!
//! ```hcl
//! # live/root.hcl
//! globals {
//!   region = "eu-west-1"
//! }
//! ```
//!
//! - `local.*` is only visible inside the file that declares it
//! - `global.*` is shared by every file of the chain, no matter which file declares it
//! - `include.*` describes the position of a file in the chain (see [include])
//!
//! ### Loading files
//!
//! Files are read through a [source::SourceLoader] and parsed as a `body` ([hcl_edit::structure::Body]). At this
//! point a file only has to be valid hcl. [include::IncludeChain::resolve] follows the `path` of each `include` block
//! until it reaches a file without one, the root.
//!
//! ### Bindings
//!
//! [catalog::extract] collects the attributes of the (single) `locals` and `globals` block of a file. Each attribute
//! is a [catalog::Binding]: a name and the expression that produces its value.
//!
//! ### Dependency graph
//!
//! [visit::references] lists the variables an expression reads. Each such reference becomes an edge in the
//! [graph::DependencyGraph], pointing from the binding that is read to the binding that reads it.
//!
//! A child can read a global that only a parent declares. Since children are added first such a reference creates a
//! provisional global, which the parent fills in later.
//!
//! ### Evaluation
//!
//! We use [hcl::eval] to evaluate the expressions. The [hcl::eval::Context] of each expression declares `local`,
//! `global` and `include` with everything evaluated so far ([scope]).
//!
//! [evaluator::evaluate] walks the graph in dependency order. Locals are evaluated as soon as their file was added,
//! globals once the whole chain is known ([chain::evaluate_chain]).
//!
//! For a single `globals` block there is also [convergence], which needs no graph. Both produce the same values.
//!
//! ### Output
//!
//! [variables::ChainVariables] holds the values of every file and gets serialized via [serde].
//!
pub mod catalog;
pub mod chain;
pub mod convergence;
pub mod error;
pub mod evaluator;
pub mod graph;
pub mod include;
pub mod scope;
pub mod source;
mod util;
pub mod variables;
pub mod visit;

pub use chain::{evaluate_chain, resolve_variables, Options};
pub use error::{Error, Result};
pub use variables::{ChainVariables, FileVariables};
