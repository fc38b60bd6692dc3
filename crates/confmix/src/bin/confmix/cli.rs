//! confmix cli interface

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
    /// This is equivalent to running { cd <directory>; confmix ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[clap(flatten)]
    pub input: InputArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the value(s) of a key
    Get(KeyCommand),

    /// Print the name of the source defining a key
    Source(KeyCommand),

    /// Print the whole combined configuration
    Dump(DumpCommand),

    /// List all keys that carry a value
    Keys,
}

#[derive(Parser, Debug)]
pub struct KeyCommand {
    #[clap(flatten)]
    pub output: OutputArgs,

    /// Key such as `db.host`, `server(0).port` or `server[@id]`
    pub key: String,
}

#[derive(Parser, Debug)]
pub struct DumpCommand {
    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Definition document declaring the sources
    ///
    /// Defaults to `confmix.hcl` in the work directory unless files are given via --input-file
    #[clap(short = 'd', long = "definition", global(true))]
    pub definition: Option<PathBuf>,

    /// Combine files directly; earlier files override later ones
    #[clap(
        short = 'f',
        long = "input-file",
        global(true),
        conflicts_with("definition")
    )]
    pub files: Vec<PathBuf>,
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
