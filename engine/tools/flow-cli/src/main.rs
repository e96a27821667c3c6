use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

mod commands;

#[derive(Parser)]
#[command(name = "flow-cli")]
#[command(about = "CLI driver for the flowcore workflow execution engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, validate, and run workflow documents.
    Workflow(commands::workflow::WorkflowArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    flowcore::utils::logger::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Workflow(args) => commands::workflow::handle(args).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_subcommand() {
        let cli = Cli::try_parse_from(["flow-cli", "workflow", "run", "wf.json"]).unwrap();
        match cli.command {
            Commands::Workflow(args) => match args.command {
                commands::workflow::WorkflowCommands::Run { path, .. } => assert_eq!(path, "wf.json"),
                other => panic!("expected Run, got {other:?}"),
            },
        }
    }
}
