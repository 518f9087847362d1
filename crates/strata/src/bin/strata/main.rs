mod cli;

use strata::include::IncludeChain;
use strata::source::{FsLoader, SourceFile};
use strata::Options;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("STRATA_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Variables(vars_cli) => variables(vars_cli),
        cli::Command::Evaluate(eval_cli) => evaluate(eval_cli),
        cli::Command::Globals(globals_cli) => globals(globals_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn variables(cli: cli::VariablesCommand) -> anyhow::Result<()> {
    let chain = load(&cli.input)?;
    let variables = strata::evaluate_chain(&chain, &options(&cli.engine))?;

    if cli.all {
        return output(&cli.output, &variables);
    }

    let entry = variables
        .entry()
        .ok_or_else(|| anyhow::anyhow!("No files loaded"))?;
    output(&cli.output, &entry.namespace())
}

pub fn evaluate(cli: cli::EvaluateCommand) -> anyhow::Result<()> {
    let chain = load(&cli.input)?;
    let variables = strata::evaluate_chain(&chain, &options(&cli.engine))?;
    let entry = variables
        .entry()
        .ok_or_else(|| anyhow::anyhow!("No files loaded"))?;

    let expr: hcl_edit::expr::Expression = cli.expression.parse()?;
    let value = entry.evaluate(&expr.into())?;

    output(&cli.output, &value)
}

pub fn globals(cli: cli::GlobalsCommand) -> anyhow::Result<()> {
    anyhow::ensure!(cli.max_sweeps > 0, "--max-sweeps must be at least 1");

    let file = match &cli.file {
        Some(path) => SourceFile::load(path, &FsLoader)?,
        None => {
            let stdin = std::io::read_to_string(std::io::stdin())?;
            SourceFile::parse("<stdin>", &stdin)?
        }
    };

    let options = Options::default().with_max_sweeps(cli.max_sweeps);
    let globals = strata::chain::evaluate_standalone_globals(&file, &options)?;
    output(&cli.output, &hcl::Value::Object(globals))
}

fn load(input: &cli::InputArgs) -> anyhow::Result<IncludeChain> {
    let chain = IncludeChain::resolve(&input.file, &FsLoader)?;
    anyhow::ensure!(!chain.is_empty(), "No files loaded");
    Ok(chain)
}

fn options(engine: &cli::EngineArgs) -> Options {
    Options::default().with_transitive_reduction(!engine.no_reduce)
}

fn output(output: &cli::OutputArgs, value: &impl serde::Serialize) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}

/// (strata-)developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand::*;

    let chain = load(&cli.input)?;

    match cli.command {
        Graph => {
            let graph = strata::chain::dependency_graph(&chain, &options(&cli.engine))?;
            println!("{}", graph.to_dot());
        }
        Chain => {
            for (id, file) in chain.files() {
                println!(
                    "{id} level={} {}",
                    chain.level(id),
                    file.path().display()
                );
            }
        }
    }

    Ok(())
}
