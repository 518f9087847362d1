//! strata cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; strata ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the locals and globals of a file
    ///
    /// Follows the `include` blocks starting at the given file.
    #[command(alias = "vars")]
    Variables(VariablesCommand),

    /// Evaluate hcl expression in the context of a file
    ///
    /// `local`, `global` and `include` are available to the expression.
    #[command(alias = "eval")]
    Evaluate(EvaluateCommand),

    /// Evaluate the globals block of a single file
    ///
    /// Includes are not followed. Reads HCL from stdin unless a file is given.
    Globals(GlobalsCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct VariablesCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub engine: EngineArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// Print every file of the chain, not only the entry file
    #[clap(short = 'a', long = "all")]
    pub all: bool,
}

#[derive(Parser, Debug)]
pub struct EvaluateCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub engine: EngineArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// HCL expression to evaluate
    pub expression: String,
}

#[derive(Parser, Debug)]
pub struct GlobalsCommand {
    /// File with a globals block
    pub file: Option<PathBuf>,

    /// Give up after this many sweeps
    #[clap(long = "max-sweeps", default_value_t = strata::convergence::DEFAULT_MAX_SWEEPS)]
    pub max_sweeps: usize,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Entry file of the include chain
    #[clap(short = 'f', long = "input-file", default_value = "strata.hcl")]
    pub file: PathBuf,
}

#[derive(Parser, Debug)]
pub struct EngineArgs {
    /// Keep edges that are implied by longer paths
    #[clap(long = "no-reduce")]
    pub no_reduce: bool,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub engine: EngineArgs,

    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    /// Dependency graph in graphviz format
    Graph,
    /// Files of the include chain, child first
    Chain,
}
