//! Conformance tests
//!
//! Evaluates the globals of each *.hcl file in /tests/conformance/ with both engines, the dependency graph and the
//! sweeps, and checks that they agree.

use strata::convergence::{evaluate_globals_block, DEFAULT_MAX_SWEEPS};
use strata::include::IncludeChain;
use strata::source::{FsLoader, SourceFile};
use strata::{evaluate_chain, Options};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("STRATA_LOG"))
        .with_writer(std::io::stderr)
        .try_init();
}

fn graph_globals(file: SourceFile) -> strata::scope::Values {
    let chain = IncludeChain::standalone(file).expect("standalone file");
    let variables = evaluate_chain(&chain, &Options::default()).expect("graph evaluates");
    variables.entry().expect("entry file").global.clone()
}

#[test]
fn engines_agree() {
    init_logging();

    insta::glob!("conformance/*.hcl", |path| {
        let file = SourceFile::load(path, &FsLoader).expect("fixture must load");

        let swept = evaluate_globals_block(&file, DEFAULT_MAX_SWEEPS).expect("sweeps evaluate");
        let walked = graph_globals(file);

        pretty_assertions::assert_eq!(swept, walked, "{}", path.display());
    });
}

#[test]
fn engines_are_deterministic() {
    init_logging();

    insta::glob!("conformance/*.hcl", |path| {
        let file = SourceFile::load(path, &FsLoader).expect("fixture must load");

        let first = evaluate_globals_block(&file, DEFAULT_MAX_SWEEPS).expect("sweeps evaluate");
        let second = evaluate_globals_block(&file, DEFAULT_MAX_SWEEPS).expect("sweeps evaluate");
        pretty_assertions::assert_eq!(
            first.iter().collect::<Vec<_>>(),
            second.iter().collect::<Vec<_>>()
        );

        let first = graph_globals(file.clone());
        let second = graph_globals(file);
        pretty_assertions::assert_eq!(
            first.iter().collect::<Vec<_>>(),
            second.iter().collect::<Vec<_>>()
        );
    });
}

#[test]
fn conditional_compares_before_branching() {
    init_logging();

    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/conformance/expressions.hcl");
    let file = SourceFile::load(&path, &FsLoader).expect("fixture must load");

    let swept = evaluate_globals_block(&file, DEFAULT_MAX_SWEEPS).expect("sweeps evaluate");
    assert_eq!(swept["production"], hcl::Value::from("scaled"));
    assert_eq!(graph_globals(file)["production"], hcl::Value::from("scaled"));
}

#[test]
fn engines_reject_the_same_cycle() {
    init_logging();

    let file = SourceFile::parse("impossible.hcl", "globals {\n a = global.b\n b = global.a\n}")
        .expect("parses");

    let swept = evaluate_globals_block(&file, DEFAULT_MAX_SWEEPS).expect_err("sweeps fail");
    insta::assert_snapshot!(swept.to_string(), @"impossible.hcl: could not evaluate all globals, remaining: a, b");

    let chain = IncludeChain::standalone(file).expect("standalone file");
    let walked = evaluate_chain(&chain, &Options::default()).expect_err("graph fails");
    insta::assert_snapshot!(walked.to_string(), @"cyclic reference between global.a, global.b");
}

#[test]
fn engines_reject_duplicate_globals_blocks() {
    init_logging();

    let file = SourceFile::parse(
        "twice.hcl",
        "globals {\n a = \"a\"\n}\n\nglobals {\n b = \"b\"\n}",
    )
    .expect("parses");

    let swept = evaluate_globals_block(&file, DEFAULT_MAX_SWEEPS).expect_err("sweeps fail");
    insta::assert_snapshot!(swept.to_string(), @"twice.hcl: only one `globals` block is allowed per file");

    let chain = IncludeChain::standalone(file).expect("standalone file");
    let walked = evaluate_chain(&chain, &Options::default()).expect_err("graph fails");
    assert_eq!(walked.to_string(), swept.to_string());
}

/// Both engines must fail on `contents`, with the same message
fn rejected_by_both(contents: &str) -> String {
    init_logging();

    let file = SourceFile::parse("rejected.hcl", contents).expect("parses");
    let swept = evaluate_globals_block(&file, DEFAULT_MAX_SWEEPS).expect_err("sweeps fail");

    let chain = IncludeChain::standalone(file).expect("standalone file");
    let walked = evaluate_chain(&chain, &Options::default()).expect_err("graph fails");

    pretty_assertions::assert_eq!(swept.to_string(), walked.to_string());
    swept.to_string()
}

#[test]
fn engines_reject_a_bare_namespace() {
    let message = rejected_by_both("globals {\n a = 1\n b = global\n}");
    insta::assert_snapshot!(message, @"rejected.hcl: `global.b` must reference an attribute of `global`, not `global` itself");
}

#[test]
fn engines_reject_a_computed_attribute() {
    let message = rejected_by_both("globals {\n k = \"a\"\n a = 1\n b = global[\"${global.k}\"]\n}");
    insta::assert_snapshot!(message, @"rejected.hcl: `global.b` must reference an attribute of `global`, not `global` itself");
}

#[test]
fn engines_reject_unknown_variables() {
    let message = rejected_by_both("globals {\n a = var.region\n}");
    insta::assert_snapshot!(message, @"rejected.hcl: `global.a` references unsupported variable `var`");
}
