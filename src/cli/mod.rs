use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "imgcheck",
    about = "Interactive front-end for file system image checkers"
)]
pub struct Cli {
    /// Image file to pre-select in the TUI.
    pub image: Option<PathBuf>,

    /// Ask the checker for verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Ask the checker to attempt repairs.
    #[arg(short, long, global = true)]
    pub repair: bool,

    /// Checker executable to invoke.
    #[arg(long, global = true, default_value = "xcheck")]
    pub checker: String,

    /// Run the checker through WSL, translating paths with wslpath.
    #[arg(long, global = true)]
    pub wsl: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a verification without the TUI, streaming output to the terminal.
    Run(RunArgs),
    /// Re-scan a saved transcript file and print the pass/fail summary.
    Stats(StatsArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Image file to verify.
    pub image: PathBuf,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Transcript file previously saved from the output panel.
    pub file: PathBuf,
}

/// Parse CLI arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}
