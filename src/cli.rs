//! Command line entry point for applications.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::lifecycle::{Application, Bootstrap, CheckCommand, FileConfigurationFactory, ServerCommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the application as an HTTP server
    Server {
        /// Path to the TOML configuration file
        config: PathBuf,
    },
    /// Parse and validate the configuration file
    Check {
        /// Path to the TOML configuration file
        config: PathBuf,
    },
}

/// Parse the process arguments and run the chosen command.
pub async fn run<A: Application>(application: A) -> crate::Result<()> {
    let cli = Cli::parse();
    let mut bootstrap = Bootstrap::new(application);

    match cli.command {
        Command::Server { config } => {
            bootstrap.set_configuration_factory(FileConfigurationFactory::new(config));
            bootstrap.set_install_logging(true);
            ServerCommand::run(&bootstrap).await
        }
        Command::Check { config } => {
            bootstrap.set_configuration_factory(FileConfigurationFactory::new(config));
            CheckCommand::run(&bootstrap)?;
            println!("Configuration is OK");
            Ok(())
        }
    }
}
