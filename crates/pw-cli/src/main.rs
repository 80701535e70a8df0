mod commands;
mod fs_runtime;

use clap::{Parser, Subcommand};
use commands::{EditArgs, GenerateArgs, InsertArgs, LintArgs, RemoveArgs, ScanArgs, TagArgs};
use std::process::ExitCode;

/// Pagewright - edit React components through their rendered page
#[derive(Parser, Debug)]
#[command(name = "pagewright")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the layer tree of a component
    Scan(ScanArgs),

    /// Regenerate a component from its rendered document
    Generate(GenerateArgs),

    /// Insert a markup fragment into a component
    Insert(InsertArgs),

    /// Remove a tagged element from a component
    Remove(RemoveArgs),

    /// Check a component for sync problems
    Lint(LintArgs),

    /// Allocate a fresh tag for a new element
    Tag(TagArgs),

    /// Change one property of an element and write it back
    Edit(EditArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Scan(args) => commands::scan_cmd(args)?,
        Command::Generate(args) => commands::generate_cmd(args)?,
        Command::Insert(args) => commands::insert_cmd(args)?,
        Command::Remove(args) => commands::remove_cmd(args)?,
        Command::Lint(args) => {
            if commands::lint_cmd(args)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Tag(args) => commands::tag_cmd(args)?,
        Command::Edit(args) => commands::edit_cmd(args).await?,
    }
    Ok(ExitCode::SUCCESS)
}
